use concilia_core::{MatchingResult, ReviewSession};
use concilia_engine::MatchEngine;
use concilia_import::StatementProfile;
use concilia_storage::DbPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;

pub struct AppState {
    pub db: DbPool,
    pub engine: MatchEngine,
    pub statement_profile: StatementProfile,
    sessions: RwLock<HashMap<Uuid, ReviewSession>>,
}

impl AppState {
    pub fn new(db: DbPool, engine: MatchEngine, statement_profile: StatementProfile) -> Self {
        Self {
            db,
            engine,
            statement_profile,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn open_session(&self, result: MatchingResult) -> (Uuid, ReviewSession) {
        let id = Uuid::new_v4();
        let session = ReviewSession::new(result);
        self.sessions.write().await.insert(id, session.clone());
        (id, session)
    }

    pub async fn session(&self, id: Uuid) -> Result<ReviewSession, ApiError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ApiError::SessionNotFound(id))
    }

    /// Drops a finished review. Handles already cloned by in-flight
    /// requests stay valid until those requests complete.
    pub async fn close_session(&self, id: Uuid) -> Result<(), ApiError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(ApiError::SessionNotFound(id))
    }
}
