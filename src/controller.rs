//! Vote selection and submission.
//!
//! The controller is the single writer of the competitor snapshot, both selection sets and
//! the submission flag. Every intent takes `&mut self`, so intents from one participant are
//! serialized by construction; only the increments of one submission run concurrently.
//!
//! Known limitation: increments are absolute writes computed from the last snapshot
//! (`value + 1`), and the store offers no cross-record atomicity. Concurrent voters on other
//! devices can overwrite each other, and retrying after a partially failed submission can
//! count the already-written selections twice.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::competitor::{Category, Competitor, CounterName};
use crate::config::Config;
use crate::error::VoteError;
use crate::guard::{SqliteFlagStore, SubmissionGuard};
use crate::selection::{Selections, Toggle};
use crate::session::{HttpSessionService, LocalSessionService, SessionService};
use crate::store::{open_counter_store, CounterStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No snapshot loaded yet
    Loading,
    Voting,
    Submitted,
}

/// One counter write of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    pub competitor_id: String,
    pub counter: CounterName,
    pub new_value: u32,
}

/// What a successful submission did
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub increments: Vec<Increment>,
    /// Whether the post-submission refresh succeeded
    pub refreshed: bool,
}

pub struct VoteController {
    store: Arc<dyn CounterStore>,
    sessions: Arc<dyn SessionService>,
    guard: SubmissionGuard,
    competitors: Vec<Competitor>,
    selections: Selections,
    loaded: bool,
    submitted: bool,
}

impl VoteController {
    pub fn new(
        store: Arc<dyn CounterStore>,
        sessions: Arc<dyn SessionService>,
        guard: SubmissionGuard,
    ) -> Self {
        Self {
            store,
            sessions,
            guard,
            competitors: Vec::new(),
            selections: Selections::default(),
            loaded: false,
            submitted: false,
        }
    }

    /// Wire up collaborators from configuration: the vote server when `remote_url` is set,
    /// otherwise the shared SQLite file. The flag always lives in the device database.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let guard = SubmissionGuard::new(SqliteFlagStore::open(&config.device_path)?);

        let store = open_counter_store(config)?;
        let sessions: Arc<dyn SessionService> = match &config.remote_url {
            Some(url) => Arc::new(HttpSessionService::new(url.as_str())),
            None => Arc::new(LocalSessionService),
        };

        Ok(Self::new(store, sessions, guard))
    }

    /// Start a session: sign in anonymously in the background, load the flag and the
    /// first snapshot.
    ///
    /// Sign-in failure is only logged. A failed first load leaves the controller in
    /// `Loading` until a later refresh succeeds. An unreadable flag counts as submitted; the
    /// snapshot is still loaded before the flag error is returned.
    pub async fn initialize(&mut self) -> Result<ControllerState, VoteError> {
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            match sessions.establish_anonymous().await {
                Ok(session) => info!(session_id = %session.id, "Signed in anonymously"),
                Err(e) => warn!(error = %VoteError::from(e), "Anonymous sign-in failed"),
            }
        });

        let flag = self.guard.is_submitted();
        match &flag {
            Ok(true) => info!("Device already submitted votes"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "Failed to read submission flag, blocking submission"),
        }
        self.submitted = !matches!(flag, Ok(false));

        self.refresh_competitors().await?;
        flag.map_err(VoteError::FlagStorage)?;
        Ok(self.state())
    }

    /// Replace the snapshot with a fresh full read. On failure the previous snapshot stays.
    pub async fn refresh_competitors(&mut self) -> Result<&[Competitor], VoteError> {
        match self.store.list_all().await {
            Ok(competitors) => {
                info!(count = competitors.len(), "Loaded competitors");
                self.competitors = competitors;
                self.loaded = true;
                Ok(&self.competitors)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load competitors, keeping previous snapshot");
                Err(VoteError::FetchFailed(e))
            }
        }
    }

    pub fn toggle_selection(
        &mut self,
        competitor_id: &str,
        category: Category,
    ) -> Result<Toggle, VoteError> {
        self.selections.toggle(competitor_id, category)
    }

    /// Apply both selection sets as one batch of counter writes.
    ///
    /// Nothing is written unless the device has not submitted yet, both categories hold
    /// exactly two ids and every id is in the snapshot. The writes are issued concurrently
    /// and all of them run to completion; the submission succeeds only if every one does.
    pub async fn submit_votes(&mut self) -> Result<SubmissionReceipt, VoteError> {
        if self.submitted || self.guard.is_submitted().map_err(VoteError::FlagStorage)? {
            self.submitted = true;
            return Err(VoteError::AlreadySubmitted);
        }

        if !self.selections.is_complete() {
            return Err(VoteError::IncompleteSelection {
                flavor: self.selections.get(Category::Flavor).len(),
                looks: self.selections.get(Category::Looks).len(),
            });
        }

        let increments = self.plan_increments()?;
        let attempted = increments.len();

        let mut batch = JoinSet::new();
        for increment in increments.iter().cloned() {
            let store = Arc::clone(&self.store);
            batch.spawn(async move {
                let result = store
                    .increment(&increment.competitor_id, increment.counter, increment.new_value)
                    .await;
                result.map_err(|e| (increment, e))
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((increment, e))) => {
                    error!(
                        competitor_id = %increment.competitor_id,
                        counter = %increment.counter,
                        error = %e,
                        "Vote update failed"
                    );
                    failures.push(e);
                }
                Err(e) => {
                    error!(error = %e, "Vote update task failed");
                    failures.push(StoreError::Join(e.to_string()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(VoteError::SubmissionFailed {
                failed: failures.len(),
                attempted,
                source: failures.swap_remove(0),
            });
        }

        // The writes landed; from here on nothing may undo the submission
        if let Err(e) = self.guard.mark_submitted() {
            error!(error = %e, "Votes recorded but the submission flag was not persisted");
        }
        self.submitted = true;
        self.selections.clear();

        let refreshed = self.refresh_competitors().await.is_ok();
        info!(writes = attempted, refreshed, "Votes submitted successfully");

        Ok(SubmissionReceipt {
            increments,
            refreshed,
        })
    }

    /// Resolve every selection against the snapshot, failing on the first unknown id
    fn plan_increments(&self) -> Result<Vec<Increment>, VoteError> {
        let mut increments = Vec::new();

        for category in Category::ALL {
            let counter = category.counter();
            for competitor_id in self.selections.get(category).ids() {
                let competitor = self
                    .competitor(competitor_id)
                    .ok_or_else(|| VoteError::UnknownCompetitor(competitor_id.clone()))?;

                increments.push(Increment {
                    competitor_id: competitor_id.clone(),
                    counter,
                    new_value: competitor.votes(counter).saturating_add(1),
                });
            }
        }

        Ok(increments)
    }

    pub fn clear_selections(&mut self) {
        self.selections.clear();
    }

    /// Forget that this device submitted. Counters and selections are left alone.
    pub fn reset_submission_flag(&mut self) -> Result<(), VoteError> {
        self.guard.reset().map_err(VoteError::FlagStorage)?;
        self.submitted = false;
        info!("Submission flag removed");
        Ok(())
    }

    pub fn state(&self) -> ControllerState {
        if !self.loaded {
            ControllerState::Loading
        } else if self.submitted {
            ControllerState::Submitted
        } else {
            ControllerState::Voting
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn competitors(&self) -> &[Competitor] {
        &self.competitors
    }

    pub fn competitor(&self, competitor_id: &str) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.id == competitor_id)
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }
}
