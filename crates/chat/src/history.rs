//! Conversation history for the prompt.
//!
//! The store hands back the most recent turns in its natural order:
//! newest-first. The model needs to read the conversation the way it
//! happened, so the reversal to oldest-first is done here, explicitly, at
//! the boundary; nothing downstream may assume the store's order.

use counsel_core::{Message, MessageStore, StoreError};
use uuid::Uuid;

/// Fetch the last `n` turns of a chat and render them oldest-first as flat
/// text, one `"<role>: <content>"` line per turn.
///
/// A chat with no turns yields an empty string, not an error. A store
/// failure propagates; history is required context and the reply cannot
/// proceed without it.
pub async fn recent_history(
    store: &dyn MessageStore,
    chat_id: Uuid,
    n: usize,
) -> Result<String, StoreError> {
    let mut turns = store.recent(chat_id, n).await?;
    turns.reverse();
    Ok(render(&turns))
}

/// Render already-chronological turns as flat text.
pub fn render(turns: &[Message]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!("{}: {}\n", turn.role, turn.content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_core::Role;

    fn turn(role: Role, content: &str) -> Message {
        let chat_id = Uuid::new_v4();
        match role {
            Role::User => Message::user(chat_id, content),
            Role::Assistant => Message::assistant(chat_id, content),
            Role::System => Message::system(chat_id, content),
        }
    }

    #[test]
    fn render_formats_one_line_per_turn() {
        let turns = vec![
            turn(Role::User, "how do I invoice a client?"),
            turn(Role::Assistant, "Start with the contract terms."),
        ];
        let text = render(&turns);
        assert_eq!(
            text,
            "user: how do I invoice a client?\nassistant: Start with the contract terms.\n"
        );
    }

    #[test]
    fn render_of_no_turns_is_empty() {
        assert_eq!(render(&[]), "");
    }

    #[tokio::test]
    async fn recent_history_reverses_store_order() {
        use counsel_core::{Chat, ChatStore};
        use counsel_storage::InMemoryStore;

        let store = InMemoryStore::new();
        let chat = Chat::new(Uuid::new_v4(), None);
        store.create(&chat).await.unwrap();

        // Appended in conversation order; the store returns them newest-first.
        for (role, content) in [
            (Role::User, "first"),
            (Role::Assistant, "second"),
            (Role::User, "third"),
        ] {
            let mut msg = turn(role, content);
            msg.chat_id = chat.id;
            store.append(&msg).await.unwrap();
        }

        let text = recent_history(&store, chat.id, 10).await.unwrap();
        assert_eq!(text, "user: first\nassistant: second\nuser: third\n");
    }

    #[tokio::test]
    async fn recent_history_of_empty_chat_is_empty_not_error() {
        use counsel_storage::InMemoryStore;

        let store = InMemoryStore::new();
        let text = recent_history(&store, Uuid::new_v4(), 10).await.unwrap();
        assert_eq!(text, "");
    }
}
