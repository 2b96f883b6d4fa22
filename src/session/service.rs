//! Chat loop driving one turn at a time per session

use super::{validate_session_id, ChatSession, ChatTurn};
use crate::agent::{AgentEventSink, SqlAgent};
use crate::config::AgentConfig;
use crate::core::llm::ChatModel;
use crate::database::{ConnectionProvider, DataSource};
use crate::error::ChatError;
use crate::storage::ConversationStorage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub transcript: Vec<ChatTurn>,
}

/// Ties together the connection provider, the model and transcript storage
pub struct ChatService {
    provider: Arc<ConnectionProvider>,
    model: Arc<dyn ChatModel>,
    storage: Arc<dyn ConversationStorage>,
    agent_config: AgentConfig,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(
        provider: Arc<ConnectionProvider>,
        model: Arc<dyn ChatModel>,
        storage: Arc<dyn ConversationStorage>,
        agent_config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            model,
            storage,
            agent_config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    async fn load(&self, session_id: &str) -> Result<ChatSession, ChatError> {
        let turns = self
            .storage
            .load(session_id)
            .await
            .map_err(ChatError::Storage)?;
        Ok(ChatSession::restore(session_id, turns))
    }

    async fn store(&self, session: &ChatSession) -> Result<(), ChatError> {
        self.storage
            .save(session.id(), session.transcript())
            .await
            .map_err(ChatError::Storage)
    }

    /// Current transcript; a new session starts with the greeting
    pub async fn transcript(&self, session_id: &str) -> Result<Vec<ChatTurn>, ChatError> {
        validate_session_id(session_id)?;
        Ok(self.load(session_id).await?.transcript().to_vec())
    }

    /// Reset the session to the greeting alone
    pub async fn clear(&self, session_id: &str) -> Result<Vec<ChatTurn>, ChatError> {
        validate_session_id(session_id)?;
        let mut session = self.load(session_id).await?;
        session.clear();
        self.store(&session).await?;
        tracing::info!("[Session {}] History cleared", session_id);
        Ok(session.transcript().to_vec())
    }

    /// Run one user message through the agent
    ///
    /// Blank messages return `Ok(None)`. Configuration and connection errors
    /// are raised before the transcript changes; agent errors leave the
    /// user's message in place without a reply.
    pub async fn submit(
        &self,
        session_id: &str,
        source: &DataSource,
        message: &str,
        sink: &dyn AgentEventSink,
    ) -> Result<Option<TurnOutcome>, ChatError> {
        validate_session_id(session_id)?;
        if message.trim().is_empty() {
            return Ok(None);
        }

        let db = self.provider.obtain(source).await?;
        let agent = SqlAgent::new(db, self.model.clone(), self.agent_config.clone());

        let lock = self.turn_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_turn(session_id, source, message, &agent, sink).await
        };
        self.release_turn_lock(session_id, lock).await;
        result
    }

    async fn run_turn(
        &self,
        session_id: &str,
        source: &DataSource,
        message: &str,
        agent: &SqlAgent,
        sink: &dyn AgentEventSink,
    ) -> Result<Option<TurnOutcome>, ChatError> {
        let mut session = self.load(session_id).await?;
        if session.begin_turn(message).is_none() {
            return Ok(None);
        }
        self.store(&session).await?;

        let question = message.trim();
        tracing::info!("[Session {}] Asking agent ({}): {}", session_id, source, question);

        match agent.run(question, sink).await {
            Ok(reply) => {
                session.complete_turn(reply.clone());
                self.store(&session).await?;
                Ok(Some(TurnOutcome {
                    reply,
                    transcript: session.transcript().to_vec(),
                }))
            }
            Err(e) => {
                tracing::error!("[Session {}] Agent failed: {:#}", session_id, e);
                session.abort_turn();
                self.store(&session).await?;
                Err(ChatError::Agent(e))
            }
        }
    }

    /// Drop the session's lock entry once no other turn is waiting on it
    async fn release_turn_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.lock().await;
        // One reference in the map, one held here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::sql_agent::tests::{answer, step, ScriptedModel};
    use crate::agent::CollectingSink;
    use crate::database::provider::tests::{config_for, CountingConnector};
    use crate::database::sqlite::tests::seed_inventory;
    use crate::database::RemoteParams;
    use crate::session::{Role, GREETING};
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        connector: Arc<CountingConnector>,
        model: Arc<ScriptedModel>,
        service: ChatService,
    }

    fn fixture(replies: Vec<String>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = seed_inventory(&dir);
        let connector = Arc::new(CountingConnector::default());
        let provider =
            Arc::new(ConnectionProvider::new(connector.clone(), &config_for(path)).unwrap());
        let model = Arc::new(ScriptedModel::new(replies));
        let service = ChatService::new(
            provider,
            model.clone(),
            Arc::new(InMemoryStorage::new()),
            AgentConfig {
                max_iterations: 10,
                top_k: 10,
                max_rows: 50,
            },
        );
        Fixture {
            _dir: dir,
            connector,
            model,
            service,
        }
    }

    #[tokio::test]
    async fn test_stock_question_on_local_database() {
        let f = fixture(vec![
            step(
                "count stocked items",
                "sql_db_query",
                json!({"query": "SELECT COUNT(*) FROM Inventory WHERE quantity > 0"}),
            ),
            answer("3 items are in stock."),
        ]);
        let sink = CollectingSink::new();

        let outcome = f
            .service
            .submit("s1", &DataSource::Local, "How many items are in stock?", &sink)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.reply, "3 items are in stock.");
        assert_eq!(
            outcome.transcript,
            vec![
                ChatTurn::assistant(GREETING),
                ChatTurn::user("How many items are in stock?"),
                ChatTurn::assistant("3 items are in stock."),
            ]
        );
        assert_eq!(f.connector.local_opens.load(Ordering::SeqCst), 1);
        assert!(!sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_grows_two_per_turn() {
        let n = 4;
        let f = fixture((0..n).map(|i| answer(&format!("answer {}", i))).collect());

        for i in 0..n {
            f.service
                .submit("s1", &DataSource::Local, &format!("question {}", i), &CollectingSink::new())
                .await
                .unwrap()
                .unwrap();
        }

        let transcript = f.service.transcript("s1").await.unwrap();
        assert_eq!(transcript.len(), 1 + 2 * n);
        for i in 0..n {
            assert_eq!(transcript[1 + 2 * i], ChatTurn::user(format!("question {}", i)));
            assert_eq!(transcript[2 + 2 * i], ChatTurn::assistant(format!("answer {}", i)));
        }
        // The handle was opened once and reused
        assert_eq!(f.connector.local_opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_password_stops_before_agent() {
        let f = fixture(vec![answer("should never be used")]);
        let source = DataSource::Remote(RemoteParams {
            host: "db.internal".to_string(),
            user: "reader".to_string(),
            password: String::new(),
            database: "shop".to_string(),
        });

        let err = f
            .service
            .submit("s1", &source, "How many items are in stock?", &CollectingSink::new())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(f.model.call_count(), 0);
        assert_eq!(f.connector.remote_opens.load(Ordering::SeqCst), 0);
        assert_eq!(f.service.transcript("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_keeps_user_turn_and_stays_usable() {
        let f = fixture(Vec::new());

        let err = f
            .service
            .submit("s1", &DataSource::Local, "first", &CollectingSink::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Agent(_)));

        let transcript = f.service.transcript("s1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, Role::User);

        // The next message is still accepted
        let again = f
            .service
            .submit("s1", &DataSource::Local, "second", &CollectingSink::new())
            .await;
        assert!(matches!(again, Err(ChatError::Agent(_))));
        assert_eq!(f.service.transcript("s1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_turn_locks_released_after_each_turn() {
        let f = fixture(vec![answer("a"), answer("b")]);

        for (session, question) in [("s1", "q1"), ("s2", "q2")] {
            f.service
                .submit(session, &DataSource::Local, question, &CollectingSink::new())
                .await
                .unwrap();
        }
        let _ = f
            .service
            .submit("s3", &DataSource::Local, "model is out of replies", &CollectingSink::new())
            .await;

        assert!(f.service.turn_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_message_recorded_as_typed() {
        let f = fixture(vec![answer("120 bolts")]);

        let outcome = f
            .service
            .submit("s1", &DataSource::Local, "  How many bolts?\n", &CollectingSink::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.transcript[1], ChatTurn::user("  How many bolts?\n"));
        let calls = f.model.calls.lock().unwrap();
        assert!(calls[0].iter().any(|m| m.content.ends_with("How many bolts?")));
    }

    #[tokio::test]
    async fn test_blank_message_ignored() {
        let f = fixture(vec![]);
        let outcome = f
            .service
            .submit("s1", &DataSource::Local, "  \n", &CollectingSink::new())
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(f.connector.local_opens.load(Ordering::SeqCst), 0);
        assert_eq!(f.model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_to_greeting() {
        let f = fixture(vec![answer("a")]);
        f.service
            .submit("s1", &DataSource::Local, "q", &CollectingSink::new())
            .await
            .unwrap();

        let cleared = f.service.clear("s1").await.unwrap();
        assert_eq!(cleared, vec![ChatTurn::assistant(GREETING)]);
        assert_eq!(f.service.transcript("s1").await.unwrap(), cleared);
    }

    #[tokio::test]
    async fn test_invalid_session_id() {
        let f = fixture(vec![]);
        let err = f.service.transcript("../x").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidSession(_)));
    }
}
