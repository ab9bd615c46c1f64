//! Scenario presets.
//!
//! A scenario is a named preset that swaps the default persona for a
//! specialized system instruction. Unrecognized codes are not an error:
//! older clients may send codes this build no longer knows, and the reply
//! must still go out under the default persona.

use serde::Serialize;

/// A selectable assistant preset.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    /// Stable code clients send with a message
    pub code: &'static str,
    /// Display title
    pub title: &'static str,
    /// One-line description for pickers
    pub description: &'static str,
    #[serde(skip)]
    instruction: &'static str,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        code: "contract_helper",
        title: "Contract help",
        description: "Explain terms, flag risks, draft negotiation wording",
        instruction: "You are an assistant for reviewing contracts. Your job: explain \
            contract terms in plain language, point out risks and important clauses, \
            and help draft wording for negotiations.",
    },
    Scenario {
        code: "marketing",
        title: "Marketing",
        description: "Posts, promotions, and copy for a micro-business",
        instruction: "You are a marketing assistant for a micro-business. Help write \
            posts, come up with promotions, and draft copy for social media and ads.",
    },
];

/// The full scenario catalog, for the API.
pub fn catalog() -> &'static [Scenario] {
    SCENARIOS
}

/// The system instruction for a scenario code.
///
/// `None` and unknown codes both return the empty string, which tells the
/// composer to fall back to the default persona.
pub fn instruction_for(code: Option<&str>) -> &'static str {
    let Some(code) = code else {
        return "";
    };

    SCENARIOS
        .iter()
        .find(|s| s.code == code)
        .map(|s| s.instruction)
        .unwrap_or("")
}
