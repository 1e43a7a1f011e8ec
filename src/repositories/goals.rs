use async_trait::async_trait;

use super::rest::RestClient;
use super::RepositoryError;
use crate::models::goals::{
    DepositInput, Goal, GoalEvent, GoalInsert, GoalRow, NewGoal, NewGoalEvent, SavedUpdate, GOAL_COLUMNS,
};
use crate::utils::currency::Cents;

const GOALS: &str = "goals";
const GOAL_EVENTS: &str = "goal_events";
const GOAL_EVENT_COLUMNS: &str = "id, user_id, goal_id, delta_cents, note, created_at";

#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Goals owned by `user_id`, oldest first.
    async fn fetch_goals(&self, user_id: &str) -> Result<Vec<Goal>, RepositoryError>;

    async fn create_goal(&self, input: &NewGoal) -> Result<Goal, RepositoryError>;

    async fn insert_event(&self, event: &NewGoalEvent) -> Result<(), RepositoryError>;

    /// Ledger entries for one goal, oldest first.
    async fn fetch_events(&self, goal_id: &str, user_id: &str) -> Result<Vec<GoalEvent>, RepositoryError>;

    /// Overwrites the goal's saved balance and returns the stored goal.
    async fn update_saved(&self, goal_id: &str, user_id: &str, saved: Cents) -> Result<Goal, RepositoryError>;

    /// Appends the ledger entry, then writes `goal.saved_cents + amount` as
    /// the new balance.
    ///
    /// The two writes are independent requests. If the balance update fails
    /// the ledger row stays behind and nothing compensates for it; the
    /// caller only learns that the deposit failed. The update is a plain
    /// overwrite, so concurrent deposits from other sessions can be lost.
    async fn record_deposit(&self, input: &DepositInput) -> Result<Goal, RepositoryError> {
        self.insert_event(&input.event()).await?;

        let saved = input.goal.saved_cents.saturating_add(input.amount);
        match self.update_saved(&input.goal.id, &input.user_id, saved).await {
            Ok(goal) => Ok(goal),
            Err(e) => {
                log::warn!(
                    "Ledger entry of {} for goal {} was written but the balance update failed: {}",
                    input.amount,
                    input.goal.id,
                    e
                );
                Err(e)
            }
        }
    }
}

#[derive(Clone)]
pub struct RestGoalRepository {
    rest: RestClient,
}

impl RestGoalRepository {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl GoalRepository for RestGoalRepository {
    async fn fetch_goals(&self, user_id: &str) -> Result<Vec<Goal>, RepositoryError> {
        let rows: Vec<GoalRow> = self
            .rest
            .table(GOALS)
            .select(GOAL_COLUMNS)
            .eq("user_id", user_id)
            .order("created_at", true)
            .fetch()
            .await?;

        Ok(rows.into_iter().map(Goal::from).collect())
    }

    async fn create_goal(&self, input: &NewGoal) -> Result<Goal, RepositoryError> {
        let row: GoalRow = self
            .rest
            .table(GOALS)
            .select(GOAL_COLUMNS)
            .insert(&GoalInsert::from(input))
            .await?;

        log::info!("Created goal {} for user {}.", row.id, row.user_id);
        Ok(Goal::from(row))
    }

    async fn insert_event(&self, event: &NewGoalEvent) -> Result<(), RepositoryError> {
        self.rest.table(GOAL_EVENTS).insert_minimal(event).await
    }

    async fn fetch_events(&self, goal_id: &str, user_id: &str) -> Result<Vec<GoalEvent>, RepositoryError> {
        self.rest
            .table(GOAL_EVENTS)
            .select(GOAL_EVENT_COLUMNS)
            .eq("goal_id", goal_id)
            .eq("user_id", user_id)
            .order("created_at", true)
            .fetch()
            .await
    }

    async fn update_saved(&self, goal_id: &str, user_id: &str, saved: Cents) -> Result<Goal, RepositoryError> {
        let row: GoalRow = self
            .rest
            .table(GOALS)
            .select(GOAL_COLUMNS)
            .eq("id", goal_id)
            .eq("user_id", user_id)
            .update(&SavedUpdate { saved_cents: saved })
            .await?;

        Ok(Goal::from(row))
    }
}
