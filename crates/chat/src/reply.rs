//! The reply orchestrator.
//!
//! One linear pipeline per request: validate, authorize, persist the user
//! turn, gather context, compose the bounded prompt, generate, persist the
//! assistant turn, touch the chat. Each step has a fixed failure policy;
//! see [`ReplyError`] for which steps are fatal. There are no retries here;
//! retry policy, if any, belongs to the transport layer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

use counsel_core::{
    ChatStore, DocumentTextSource, Enricher, GenerationError, Generator, Limits, Message,
    MessageStore, ReplyError,
};

use crate::{documents, history, prompt, scenario};

/// How many stored turns to fetch for prompt history.
///
/// Deliberately generous: the budget trims the rendered text down to
/// `max_history_chars`, so fetching more costs one bounded query, not
/// prompt space.
const HISTORY_TURNS: usize = 50;

/// The top-level reply use case.
///
/// Holds the collaborator handles and the read-only limits; everything
/// per-request (the prompt budget included) is created inside [`reply`](Self::reply).
pub struct ReplyService {
    chats: Arc<dyn ChatStore>,
    messages: Arc<dyn MessageStore>,
    documents: Arc<dyn DocumentTextSource>,
    generator: Arc<dyn Generator>,
    enricher: Option<Arc<dyn Enricher>>,
    limits: Limits,
    /// Process-wide cap on concurrent generation calls. Callers past the
    /// cap queue here instead of degrading backend latency for everyone.
    llm_gate: Arc<Semaphore>,
    llm_timeout: Duration,
}

impl ReplyService {
    /// Create a reply service with a 30-second generation deadline.
    pub fn new(
        chats: Arc<dyn ChatStore>,
        messages: Arc<dyn MessageStore>,
        documents: Arc<dyn DocumentTextSource>,
        generator: Arc<dyn Generator>,
        limits: Limits,
    ) -> Self {
        Self {
            chats,
            messages,
            documents,
            generator,
            enricher: None,
            llm_gate: Arc::new(Semaphore::new(limits.max_concurrent_llm)),
            llm_timeout: Duration::from_secs(30),
            limits,
        }
    }

    /// Enable request enrichment (e.g. web-search augmentation).
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Override the generation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// Process a user message and return the persisted assistant turn.
    ///
    /// # Errors
    ///
    /// See [`ReplyError`]. On `Generation` failures the user turn stays
    /// persisted; the chat record keeps the question even when the answer
    /// never arrived.
    pub async fn reply(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        user_text: &str,
        document_ids: &[Uuid],
        scenario_code: Option<&str>,
    ) -> Result<Message, ReplyError> {
        // 1. Validate before any side effect.
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ReplyError::InvalidInput);
        }

        // 2. Authorize: the chat must exist and belong to the caller.
        let chat = self
            .chats
            .get(chat_id)
            .await?
            .ok_or(ReplyError::NotFound)?;
        if !chat.is_owned_by(user_id) {
            return Err(ReplyError::AccessDenied);
        }

        // 3. Persist the user turn. The exchange needs a durable record of
        // the question before anything else happens.
        let truncated = user_text.chars().count() > self.limits.max_request_chars;
        let user_turn = Message::user(chat_id, user_text).with_truncated(truncated);
        self.messages.append(&user_turn).await?;

        // 4. Gather context. History is required; document context is
        // best-effort and resolves to a (possibly empty) string.
        let (history_text, documents_text) = tokio::join!(
            history::recent_history(self.messages.as_ref(), chat_id, HISTORY_TURNS),
            documents::gather_documents(self.documents.as_ref(), document_ids),
        );
        let history_text = history_text?;

        // 5. Select the system instruction; unknown scenarios fall back to
        // the default persona inside the composer.
        let instruction = scenario::instruction_for(scenario_code);

        // 6. Compose the bounded prompt. Enrichment, when enabled, runs on
        // the raw user text and outside the budget accounting; whatever
        // comes back is capped like any other user text.
        let user_for_prompt = match &self.enricher {
            Some(enricher) => enricher.enrich(user_text).await,
            None => user_text.to_string(),
        };
        let prompt = prompt::compose(
            instruction,
            &history_text,
            &documents_text,
            &user_for_prompt,
            &self.limits,
        );

        // 7. Generate under the concurrency gate, with a deadline. The
        // permit is the only resource held across the backend call.
        let permit = self
            .llm_gate
            .acquire()
            .await
            .map_err(|_| GenerationError::Network("generation gate closed".into()))?;
        let started = Instant::now();
        let response =
            match tokio::time::timeout(self.llm_timeout, self.generator.generate(&prompt)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(GenerationError::Timeout(format!(
                        "no response within {}s",
                        self.llm_timeout.as_secs()
                    ))
                    .into());
                }
            };
        let latency_ms = started.elapsed().as_millis() as i64;
        drop(permit);

        // 8. Persist the assistant turn with its measured latency.
        let assistant_turn = Message::assistant(chat_id, response).with_latency(latency_ms);
        self.messages.append(&assistant_turn).await?;

        // 9. Touch the chat. Best-effort: a failed touch never fails an
        // exchange that already happened.
        if let Err(e) = self.chats.touch(chat_id, Utc::now()).await {
            warn!(chat_id = %chat_id, error = %e, "failed to advance last_message_at");
        }

        debug!(
            chat_id = %chat_id,
            latency_ms,
            prompt_chars = prompt.chars().count(),
            "reply generated"
        );

        Ok(assistant_turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use counsel_core::{Chat, Role};
    use counsel_storage::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // --- Test doubles ---

    /// Returns a fixed reply and records the prompt it saw.
    struct RecordingGenerator {
        reply: String,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api {
                status_code: 503,
                message: "overloaded".into(),
            })
        }
    }

    /// Sleeps long enough to trip any short deadline.
    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }
    }

    /// Tracks how many generate calls are in flight at once.
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for ConcurrencyProbe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".into())
        }
    }

    struct SuffixEnricher;

    #[async_trait]
    impl Enricher for SuffixEnricher {
        async fn enrich(&self, user_text: &str) -> String {
            format!("{user_text}\n\n[WEB SEARCH RESULTS]\nmarket rates for plumbing")
        }
    }

    // --- Fixture ---

    struct Fixture {
        store: Arc<InMemoryStore>,
        chat: Chat,
        user_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let chat = Chat::new(user_id, Some("Shop questions".into()));
        store.create(&chat).await.unwrap();
        Fixture {
            store,
            chat,
            user_id,
        }
    }

    fn service(store: &Arc<InMemoryStore>, generator: Arc<dyn Generator>) -> ReplyService {
        ReplyService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            generator,
            Limits::default(),
        )
    }

    // --- Tests ---

    #[tokio::test]
    async fn successful_reply_persists_both_turns() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("Here is what I would do."));
        let svc = service(&f.store, generator.clone());

        let reply = svc
            .reply(f.chat.id, f.user_id, "How do I price my services?", &[], None)
            .await
            .unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Here is what I would do.");
        assert!(reply.latency_ms.is_some());

        let turns = f.store.list(f.chat.id, 100, 0).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "How do I price my services?");
        assert_eq!(turns[1].id, reply.id);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_side_effect() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("x")));

        let err = svc
            .reply(f.chat.id, f.user_id, "   \n\t ", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplyError::InvalidInput));
        assert!(f.store.list(f.chat.id, 100, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_chat_is_not_found() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("x")));

        let err = svc
            .reply(Uuid::new_v4(), f.user_id, "hello", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplyError::NotFound));
    }

    #[tokio::test]
    async fn foreign_chat_is_denied_and_nothing_is_persisted() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("x")));

        let intruder = Uuid::new_v4();
        let err = svc
            .reply(f.chat.id, intruder, "let me in", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplyError::AccessDenied));
        assert!(f.store.list(f.chat.id, 100, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_keeps_the_user_turn() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(FailingGenerator));

        let err = svc
            .reply(f.chat.id, f.user_id, "will this fail?", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplyError::Generation(_)));

        // No rollback: the question is recorded even though the answer
        // never arrived.
        let turns = f.store.list(f.chat.id, 100, 0).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_a_generation_failure() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(SlowGenerator))
            .with_timeout(Duration::from_millis(100));

        let err = svc
            .reply(f.chat.id, f.user_id, "anyone there?", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplyError::Generation(GenerationError::Timeout(_))
        ));

        // Only the user turn was persisted.
        let turns = f.store.list(f.chat.id, 100, 0).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn prior_turns_reach_the_prompt_oldest_first() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("noted"));
        let svc = service(&f.store, generator.clone());

        svc.reply(f.chat.id, f.user_id, "first question", &[], None)
            .await
            .unwrap();
        svc.reply(f.chat.id, f.user_id, "second question", &[], None)
            .await
            .unwrap();

        let prompt = generator.last_prompt();
        assert!(prompt.contains("HISTORY:"));
        let first = prompt.find("user: first question").unwrap();
        let second = prompt.find("user: second question").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn partial_document_failure_keeps_the_rest() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("based on your documents..."));
        let svc = service(&f.store, generator.clone());

        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let missing = Uuid::new_v4();
        f.store.put_document_text(doc_a, "lease agreement text").await;
        f.store.put_document_text(doc_b, "supplier invoice text").await;

        let reply = svc
            .reply(
                f.chat.id,
                f.user_id,
                "summarize my documents",
                &[doc_a, missing, doc_b],
                None,
            )
            .await;

        assert!(reply.is_ok());
        let prompt = generator.last_prompt();
        assert!(prompt.contains("lease agreement text"));
        assert!(prompt.contains("supplier invoice text"));
    }

    #[tokio::test]
    async fn scenario_code_selects_the_instruction() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("reviewing..."));
        let svc = service(&f.store, generator.clone());

        svc.reply(
            f.chat.id,
            f.user_id,
            "check this clause",
            &[],
            Some("contract_helper"),
        )
        .await
        .unwrap();

        let prompt = generator.last_prompt();
        assert!(prompt.contains("reviewing contracts"));
        assert!(!prompt.contains("assistant for micro-business owners"));
    }

    #[tokio::test]
    async fn unknown_scenario_falls_back_to_default_persona() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("hello"));
        let svc = service(&f.store, generator.clone());

        svc.reply(f.chat.id, f.user_id, "hi", &[], Some("astrology"))
            .await
            .unwrap();

        assert!(generator
            .last_prompt()
            .contains("assistant for micro-business owners"));
    }

    #[tokio::test]
    async fn enrichment_reaches_the_prompt_but_not_the_stored_turn() {
        let f = fixture().await;
        let generator = Arc::new(RecordingGenerator::new("rates vary"));
        let svc =
            service(&f.store, generator.clone()).with_enricher(Arc::new(SuffixEnricher));

        svc.reply(f.chat.id, f.user_id, "what do plumbers charge?", &[], None)
            .await
            .unwrap();

        assert!(generator.last_prompt().contains("market rates for plumbing"));

        let turns = f.store.list(f.chat.id, 100, 0).await.unwrap();
        assert_eq!(turns[0].content, "what do plumbers charge?");
    }

    #[tokio::test]
    async fn touch_failure_is_swallowed() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("fine")));

        f.store.fail_touches(true);
        let reply = svc.reply(f.chat.id, f.user_id, "still works?", &[], None).await;
        assert!(reply.is_ok());
    }

    #[tokio::test]
    async fn successful_reply_advances_last_message_at() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("done")));
        let before = f.chat.last_message_at;

        svc.reply(f.chat.id, f.user_id, "tick", &[], None)
            .await
            .unwrap();

        let chat = f.store.get(f.chat.id).await.unwrap().unwrap();
        assert!(chat.last_message_at >= before);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_generation_is_capped() {
        let f = fixture().await;
        let probe = Arc::new(ConcurrencyProbe::new());
        let limits = Limits {
            max_concurrent_llm: 1,
            ..Limits::default()
        };
        let svc = Arc::new(ReplyService::new(
            f.store.clone(),
            f.store.clone(),
            f.store.clone(),
            probe.clone(),
            limits,
        ));

        let mut handles = Vec::new();
        for i in 0..4 {
            let svc = svc.clone();
            let chat_id = f.chat.id;
            let user_id = f.user_id;
            handles.push(tokio::spawn(async move {
                svc.reply(chat_id, user_id, &format!("question {i}"), &[], None)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(probe.max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn over_long_request_is_flagged_truncated() {
        let f = fixture().await;
        let svc = service(&f.store, Arc::new(RecordingGenerator::new("ok")));

        let long = "q".repeat(Limits::default().max_request_chars + 1);
        svc.reply(f.chat.id, f.user_id, &long, &[], None)
            .await
            .unwrap();

        let turns = f.store.list(f.chat.id, 100, 0).await.unwrap();
        assert!(turns[0].truncated);
    }
}
