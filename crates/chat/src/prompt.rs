//! Prompt composition.
//!
//! [`compose`] turns the four context sources into one flat prompt with a
//! hard character bound. Sections appear in a fixed order (SYSTEM,
//! HISTORY, DOCUMENTS, USER), each only when its input is non-empty, and a
//! fresh [`PromptBudget`] caps every section and the total. Pure function:
//! no storage, no network, same output for the same inputs.

use counsel_core::Limits;

use crate::budget::PromptBudget;

/// Cap for the system instruction section, in characters.
///
/// Fixed rather than configurable: the instruction is operator-controlled,
/// not user-controlled, so it does not need a tunable defense.
pub const SYSTEM_INSTRUCTION_CAP: usize = 2000;

/// The default persona used when no scenario supplies an instruction.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a smart and careful assistant for micro-business owners.\
  \nAnswer briefly, clearly, and with structure.\
  \nIf a question is unclear, ask for clarification.\
  \nIf you do not have enough information, say so directly.\
  \nDo not invent facts or make up document contents.\
  \nIf the user attached a document, rely only on the text you were given.\
  \nKeep answers simple and useful, without filler or needless formality.";

/// Compose the full prompt from its four sources.
///
/// Guarantee: the result never exceeds `limits.max_prompt_chars`
/// characters, no matter how large any single input is.
pub fn compose(
    system_instruction: &str,
    history: &str,
    documents: &str,
    user_text: &str,
    limits: &Limits,
) -> String {
    let system_instruction = if system_instruction.is_empty() {
        DEFAULT_SYSTEM_INSTRUCTION
    } else {
        system_instruction
    };

    let mut budget = PromptBudget::new(limits.max_prompt_chars);
    let mut prompt = String::new();

    prompt.push_str("SYSTEM:\n");
    prompt.push_str(&budget.take(system_instruction, SYSTEM_INSTRUCTION_CAP));
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("HISTORY:\n");
        prompt.push_str(&budget.take(history, limits.max_history_chars));
        prompt.push_str("\n\n");
    }

    if !documents.is_empty() {
        // Documents share the history budget class: both are bulk external
        // text with the same tolerance for truncation.
        prompt.push_str("DOCUMENTS:\n");
        prompt.push_str(&budget.take(documents, limits.max_history_chars));
        prompt.push_str("\n\n");
    }

    if !user_text.is_empty() {
        prompt.push_str("USER:\n");
        prompt.push_str(&budget.take(user_text, limits.max_request_chars));
        prompt.push_str("\n\n");
    }

    // Headers and separators are not budget-accounted, so clamp the
    // assembled string to keep the hard bound regardless.
    if prompt.chars().count() > limits.max_prompt_chars {
        prompt = prompt.chars().take(limits.max_prompt_chars).collect();
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_trunc_limits() -> Limits {
        Limits {
            max_prompt_chars: 5000,
            max_history_chars: 2000,
            max_request_chars: 1000,
            ..Limits::default()
        }
    }

    fn tight_limits() -> Limits {
        Limits {
            max_prompt_chars: 200,
            max_history_chars: 80,
            max_request_chars: 60,
            ..Limits::default()
        }
    }

    #[test]
    fn default_instruction_substituted_when_empty() {
        let prompt = compose("", "", "", "hello", &no_trunc_limits());
        assert!(prompt.contains("SYSTEM:"));
        assert!(prompt.contains("assistant for micro-business owners"));
        assert!(prompt.contains("USER:\nhello"));
    }

    #[test]
    fn custom_instruction_used_when_provided() {
        let prompt = compose("custom persona", "", "", "hi", &no_trunc_limits());
        assert!(prompt.contains("custom persona"));
        assert!(!prompt.contains("assistant for micro-business owners"));
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let prompt = compose("sys", "hist", "doc", "user", &no_trunc_limits());

        let mut last_index = 0;
        for marker in ["SYSTEM:", "HISTORY:", "DOCUMENTS:", "USER:"] {
            let index = prompt.find(marker).unwrap_or_else(|| {
                panic!("section {marker} missing from prompt:\n{prompt}")
            });
            assert!(index >= last_index, "section {marker} out of order");
            last_index = index;
        }
    }

    #[test]
    fn empty_optional_sections_are_omitted() {
        let prompt = compose("sys", "", "", "hi", &no_trunc_limits());
        assert!(!prompt.contains("HISTORY:"));
        assert!(!prompt.contains("DOCUMENTS:"));
        assert!(prompt.contains("USER:"));
    }

    #[test]
    fn prompt_never_exceeds_total_limit() {
        let limits = tight_limits();
        let long_history = "H".repeat(200);
        let long_docs = "D".repeat(200);
        let long_user = "U".repeat(200);

        let cases = [
            ("", long_history.as_str(), "", "ok"),
            ("", "", long_docs.as_str(), "ok"),
            ("", "", "", long_user.as_str()),
            ("", long_history.as_str(), long_docs.as_str(), long_user.as_str()),
        ];

        for (system, history, documents, user) in cases {
            let prompt = compose(system, history, documents, user, &limits);
            assert!(
                prompt.chars().count() <= limits.max_prompt_chars,
                "prompt length {} exceeds {}",
                prompt.chars().count(),
                limits.max_prompt_chars
            );

            // The untruncated originals must not survive intact.
            if !history.is_empty() {
                assert!(!prompt.contains(history));
            }
            if !documents.is_empty() {
                assert!(!prompt.contains(documents));
            }
            if user.chars().count() > limits.max_request_chars {
                assert!(!prompt.contains(user));
            }
        }
    }

    #[test]
    fn tight_budget_keeps_user_section() {
        // History is cut to its 80-char section cap, and the user request
        // still lands in full.
        let limits = tight_limits();
        let history = "H".repeat(200);

        let prompt = compose("sys", &history, "", "ok", &limits);

        assert!(prompt.chars().count() <= 200);
        assert_eq!(prompt.chars().filter(|&c| c == 'H').count(), 80);
        assert!(prompt.contains("USER:\nok"));
    }

    #[test]
    fn history_section_capped_at_history_limit() {
        let limits = no_trunc_limits();
        let history = "H".repeat(3000);
        let prompt = compose("sys", &history, "", "ok", &limits);
        assert_eq!(prompt.chars().filter(|&c| c == 'H').count(), 2000);
    }

    #[test]
    fn multibyte_inputs_never_panic() {
        let limits = tight_limits();
        let history = "Ж".repeat(300);
        let user = "щи".repeat(100);

        let prompt = compose("", &history, "", &user, &limits);
        assert!(prompt.chars().count() <= limits.max_prompt_chars);
    }

    #[test]
    fn huge_inputs_respect_default_limits() {
        let limits = Limits::default();
        let blob = "x".repeat(200_000);
        let prompt = compose(&blob, &blob, &blob, &blob, &limits);
        assert!(prompt.chars().count() <= limits.max_prompt_chars);
    }
}
