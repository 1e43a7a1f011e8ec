use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::deposit::DepositOperation;
use super::summary::Summary;
use super::ServiceError;
use crate::models::goals::{DepositInput, Goal, GoalEvent, NewGoal};
use crate::repositories::goals::GoalRepository;
use crate::utils::currency::{format_usd, Cents};

/// Outcome message shown after a user action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

/// What the user typed into the new-goal form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoalDraft {
    pub name: String,
    pub target_cents: Cents,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub deadline_date: Option<NaiveDate>,
}

#[derive(Default)]
struct BoardState {
    goals: Vec<Goal>,
    loading: bool,
    load_error: Option<String>,
    banner: Option<Banner>,
    /// Bumped on every load and teardown; a load only applies its result
    /// if the generation is unchanged when it returns.
    generation: u64,
    /// Bumped on teardown only. Deposits started under an older epoch
    /// leave the board alone when they return.
    epoch: u64,
    in_flight: HashSet<String>,
}

/// In-memory view of the signed-in user's goals.
///
/// The lock is only held for local bookkeeping, never across a backend
/// call.
pub struct GoalBoard {
    repository: Arc<dyn GoalRepository>,
    state: Mutex<BoardState>,
}

impl GoalBoard {
    pub fn new(repository: Arc<dyn GoalRepository>) -> Self {
        Self {
            repository,
            state: Mutex::new(BoardState::default()),
        }
    }

    /// Replaces the collection with the user's goals. Returns `Ok(false)`
    /// when a newer load or a teardown superseded this one and the result
    /// was dropped.
    pub async fn load(&self, user_id: &str) -> Result<bool, ServiceError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.loading = true;
            state.load_error = None;
            state.generation
        };

        let result = self.repository.fetch_goals(user_id).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            log::debug!("Discarding stale goals for user {}.", user_id);
            return Ok(false);
        }

        state.loading = false;
        match result {
            Ok(goals) => {
                state.goals = goals;
                Ok(true)
            }
            Err(e) => {
                state.load_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Forgets the current user's goals; loads and deposits still in flight
    /// are dropped when they return.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.epoch += 1;
        state.goals.clear();
        state.in_flight.clear();
        state.loading = false;
        state.load_error = None;
        state.banner = None;
    }

    pub async fn goals(&self) -> Vec<Goal> {
        self.state.lock().await.goals.clone()
    }

    pub async fn goal(&self, goal_id: &str) -> Option<Goal> {
        self.state
            .lock()
            .await
            .goals
            .iter()
            .find(|goal| goal.id == goal_id)
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn load_error(&self) -> Option<String> {
        self.state.lock().await.load_error.clone()
    }

    pub async fn banner(&self) -> Option<Banner> {
        self.state.lock().await.banner.clone()
    }

    pub async fn is_depositing(&self, goal_id: &str) -> bool {
        self.state.lock().await.in_flight.contains(goal_id)
    }

    pub async fn summary(&self) -> Summary {
        Summary::from_goals(&self.state.lock().await.goals)
    }

    pub async fn create_goal(&self, user_id: &str, draft: GoalDraft) -> Result<Goal, ServiceError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("Give your goal a name.".to_string()));
        }
        if draft.target_cents.is_zero() {
            return Err(ServiceError::Validation(
                "Enter a target amount greater than zero.".to_string(),
            ));
        }

        let input = NewGoal {
            user_id: user_id.to_string(),
            name: name.to_string(),
            target_cents: draft.target_cents,
            emoji: draft.emoji.filter(|emoji| !emoji.is_empty()),
            color: draft.color.filter(|color| !color.is_empty()),
            deadline_date: draft.deadline_date,
        };

        self.state.lock().await.banner = None;
        let result = self.repository.create_goal(&input).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(goal) => {
                state.goals.push(goal.clone());
                state.goals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                state.banner = Some(Banner::Success(format!("New goal \"{}\" added!", goal.name)));
                Ok(goal)
            }
            Err(e) => {
                state.banner = Some(Banner::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Records a deposit optimistically.
    ///
    /// The goal's balance moves to `saved + amount` before the backend is
    /// contacted. On success the backend's goal replaces it; on failure the
    /// goal returns to its pre-deposit balance unless a reload already
    /// replaced it. Other goals are never touched. Only one deposit per
    /// goal may be in flight.
    pub async fn record_deposit(
        &self,
        user_id: &str,
        goal_id: &str,
        amount: Cents,
        note: Option<String>,
    ) -> Result<Goal, ServiceError> {
        let (mut operation, epoch) = {
            let mut state = self.state.lock().await;
            if state.in_flight.contains(goal_id) {
                return Err(ServiceError::DepositInFlight(goal_id.to_string()));
            }

            let mut operation = DepositOperation::begin(&state.goals, goal_id, amount)?;
            let optimistic = operation.apply()?;
            replace_goal(&mut state.goals, optimistic);
            state.in_flight.insert(goal_id.to_string());
            state.banner = None;
            (operation, state.epoch)
        };

        let input = DepositInput {
            user_id: user_id.to_string(),
            goal: operation.original().clone(),
            amount,
            note: note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
        };
        let result = self.repository.record_deposit(&input).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            log::debug!("Board torn down during deposit into goal {}.", goal_id);
            return match result {
                Ok(updated) => operation.confirm(updated),
                Err(e) => Err(e.into()),
            };
        }
        state.in_flight.remove(goal_id);

        match result {
            Ok(updated) => {
                let confirmed = operation.confirm(updated)?;
                replace_goal(&mut state.goals, confirmed.clone());
                state.banner = Some(Banner::Success(format!(
                    "Deposited {} toward \"{}\".",
                    format_usd(amount),
                    operation.original().name
                )));
                Ok(confirmed)
            }
            Err(e) => {
                let message = e.to_string();
                if !operation.roll_back(&mut state.goals, message.clone())? {
                    log::debug!("Goal {} changed during the deposit; keeping the newer entry.", goal_id);
                }
                state.banner = Some(Banner::Error(message));
                log::warn!("Deposit into goal {} rolled back: {}", goal_id, e);
                Err(e.into())
            }
        }
    }

    /// Ledger entries for one of the user's goals.
    pub async fn history(&self, user_id: &str, goal_id: &str) -> Result<Vec<GoalEvent>, ServiceError> {
        Ok(self.repository.fetch_events(goal_id, user_id).await?)
    }
}

fn replace_goal(goals: &mut [Goal], replacement: Goal) {
    if let Some(slot) = goals.iter_mut().find(|goal| goal.id == replacement.id) {
        *slot = replacement;
    }
}
