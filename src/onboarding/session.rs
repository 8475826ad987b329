//! Profile session cache: the authenticated participant's profile and role
//! details, shared read-only with every consumer of the session.
//!
//! The entry only changes through [`ProfileSession::refresh`] (invoked by the
//! initial load and by the orchestrator after a write) and
//! [`ProfileSession::sign_out`]. Readers get an `Arc` snapshot, so a refresh
//! replaces the whole entry at once and nobody sees a half-updated cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::call::store_call;
use super::model::{MentorDetail, ParticipantId, Profile, RoleDetail, StudentDetail};
use super::roles::{self, Role, RoleSet};
use super::state::VerificationStatus;
use crate::error::OnboardingError;
use crate::store::Database;

/// Snapshot of what the store held for the participant at the last refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheEntry {
    pub profile: Option<Profile>,
    pub student: Option<StudentDetail>,
    pub mentor: Option<MentorDetail>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// `None` until a profile row exists.
    pub fn status(&self) -> VerificationStatus {
        self.profile
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(VerificationStatus::None)
    }

    pub fn role_set(&self) -> RoleSet {
        self.profile
            .as_ref()
            .map(|p| p.role_set.clone())
            .unwrap_or_default()
    }

    pub fn has_role(&self, role: Role) -> bool {
        roles::has_role(self.profile.as_ref(), role)
    }

    pub fn detail(&self, role: Role) -> Option<RoleDetail> {
        match role {
            Role::Student => self.student.clone().map(RoleDetail::Student),
            Role::Mentor => self.mentor.clone().map(RoleDetail::Mentor),
        }
    }

    /// Whether the intake form for `role` must (still) be shown.
    pub fn requires_onboarding(&self, role: Role) -> bool {
        let complete = match role {
            Role::Student => self.student.as_ref().is_some_and(|d| d.onboarding_complete),
            Role::Mentor => self.mentor.as_ref().is_some_and(|d| d.onboarding_complete),
        };
        !complete
    }

    /// Roles whose intake is done.
    pub fn onboarded_roles(&self) -> RoleSet {
        Role::ALL
            .into_iter()
            .filter(|r| !self.requires_onboarding(*r))
            .collect()
    }
}

/// Holds the loading flag up until dropped, including when the refresh
/// future itself is dropped mid-fetch.
struct Loading<'a>(&'a AtomicBool);

impl<'a> Loading<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owned session state for one authenticated participant.
pub struct ProfileSession {
    identity: ParticipantId,
    db: Arc<dyn Database>,
    store_timeout: Duration,
    entry: watch::Sender<Arc<CacheEntry>>,
    loading: AtomicBool,
    refresh_lock: Mutex<()>,
}

impl ProfileSession {
    /// An empty session. Call [`ProfileSession::load`] before relying on it.
    pub fn new(identity: ParticipantId, db: Arc<dyn Database>, store_timeout: Duration) -> Self {
        let (entry, _rx) = watch::channel(Arc::new(CacheEntry::default()));
        Self {
            identity,
            db,
            store_timeout,
            entry,
            loading: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn identity(&self) -> &ParticipantId {
        &self.identity
    }

    /// Latest fetched state. Never waits on the store.
    pub fn current(&self) -> Arc<CacheEntry> {
        self.entry.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Change notifications for consumers that re-render on refresh.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheEntry>> {
        self.entry.subscribe()
    }

    /// Initial load at session start.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<Arc<CacheEntry>, OnboardingError> {
        self.refresh(cancel).await
    }

    /// Re-fetch the profile and both role details, then swap the entry.
    ///
    /// On failure the previous entry stays in place.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<CacheEntry>, OnboardingError> {
        let _guard = self.refresh_lock.lock().await;
        let loading = Loading::start(&self.loading);
        let fetched = self.fetch(cancel).await;
        drop(loading);

        match fetched {
            Ok(entry) => {
                let entry = Arc::new(entry);
                self.entry.send_replace(Arc::clone(&entry));
                info!(
                    identity = %self.identity,
                    status = %entry.status(),
                    roles = %entry.role_set(),
                    "Profile session refreshed"
                );
                Ok(entry)
            }
            Err(e) => {
                warn!(identity = %self.identity, error = %e, "Profile session refresh failed");
                Err(e)
            }
        }
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<CacheEntry, OnboardingError> {
        let timeout = self.store_timeout;
        let profile = store_call(
            "get_profile_by_identity",
            timeout,
            cancel,
            self.db.get_profile_by_identity(&self.identity),
        )
        .await?;

        let (student, mentor) = match profile.as_ref() {
            Some(p) => {
                let student =
                    store_call("get_student_detail", timeout, cancel, self.db.get_student_detail(p.id))
                        .await?;
                let mentor =
                    store_call("get_mentor_detail", timeout, cancel, self.db.get_mentor_detail(p.id))
                        .await?;
                (student, mentor)
            }
            None => (None, None),
        };

        Ok(CacheEntry {
            profile,
            student,
            mentor,
            fetched_at: Some(Utc::now()),
        })
    }

    /// Tear the entry down at sign-out.
    pub fn sign_out(&self) {
        self.entry.send_replace(Arc::new(CacheEntry::default()));
        info!(identity = %self.identity, "Profile session cleared");
    }
}
