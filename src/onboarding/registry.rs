//! Live participant sessions, keyed by identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::model::ParticipantId;
use super::orchestrator::OnboardingOrchestrator;
use super::session::ProfileSession;
use crate::error::OnboardingError;
use crate::store::Database;

/// Everything one signed-in participant owns.
pub struct ParticipantSession {
    pub cache: Arc<ProfileSession>,
    pub orchestrator: OnboardingOrchestrator,
    cancel: CancellationToken,
}

impl ParticipantSession {
    /// Cancelled on sign-out and on shutdown.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

pub struct SessionRegistry {
    db: Arc<dyn Database>,
    store_timeout: Duration,
    cancel: CancellationToken,
    sessions: RwLock<HashMap<ParticipantId, Arc<ParticipantSession>>>,
}

impl SessionRegistry {
    pub fn new(db: Arc<dyn Database>, store_timeout: Duration) -> Self {
        Self {
            db,
            store_timeout,
            cancel: CancellationToken::new(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// The live session for `identity`, opening it (with the initial load)
    /// on first use. A failed initial load leaves nothing registered.
    pub async fn open(
        &self,
        identity: &ParticipantId,
    ) -> Result<Arc<ParticipantSession>, OnboardingError> {
        if let Some(existing) = self.get(identity).await {
            return Ok(existing);
        }

        let cancel = self.cancel.child_token();
        let cache = Arc::new(ProfileSession::new(
            identity.clone(),
            Arc::clone(&self.db),
            self.store_timeout,
        ));
        cache.load(&cancel).await?;

        let session = Arc::new(ParticipantSession {
            orchestrator: OnboardingOrchestrator::new(
                Arc::clone(&self.db),
                Arc::clone(&cache),
                self.store_timeout,
            ),
            cache,
            cancel,
        });

        let mut sessions = self.sessions.write().await;
        // Another request may have opened it while we were loading.
        let entry = sessions
            .entry(identity.clone())
            .or_insert_with(|| Arc::clone(&session));
        if Arc::ptr_eq(entry, &session) {
            info!(identity = %identity, "Participant session opened");
        } else {
            debug!(identity = %identity, "Participant session opened concurrently, reusing");
        }
        Ok(Arc::clone(entry))
    }

    pub async fn get(&self, identity: &ParticipantId) -> Option<Arc<ParticipantSession>> {
        self.sessions.read().await.get(identity).cloned()
    }

    /// Tear the session down: pending store calls are cancelled and the
    /// cache is cleared. Returns whether a session existed.
    pub async fn sign_out(&self, identity: &ParticipantId) -> bool {
        let removed = self.sessions.write().await.remove(identity);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                session.cache.sign_out();
                info!(identity = %identity, "Participant signed out");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cancel every session and drop them all.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (_, session) in &drained {
            session.cache.sign_out();
        }
        info!(sessions = drained.len(), "Session registry shut down");
    }
}
