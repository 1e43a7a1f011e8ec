//! Optimistic deposit as an explicit state machine.
//!
//! ```text
//! Pending --apply--> Applied { optimistic }
//! Applied --confirm--> Confirmed(server goal)
//! Applied --roll_back--> RolledBack { error }
//! ```
//!
//! Only the deposited goal is ever touched; the rest of the collection may
//! change freely while the remote write is in flight.

use super::ServiceError;
use crate::models::goals::Goal;
use crate::utils::currency::Cents;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositState {
    Pending,
    /// The optimistic goal is on screen; the remote write is in flight.
    Applied { optimistic: Goal },
    /// The backend accepted the deposit; holds its version of the goal.
    Confirmed(Goal),
    RolledBack { error: String },
}

impl DepositState {
    fn name(&self) -> &'static str {
        match self {
            DepositState::Pending => "pending",
            DepositState::Applied { .. } => "applied",
            DepositState::Confirmed(_) => "confirmed",
            DepositState::RolledBack { .. } => "rolled back",
        }
    }
}

#[derive(Debug)]
pub struct DepositOperation {
    original: Goal,
    amount: Cents,
    state: DepositState,
}

impl DepositOperation {
    /// Captures the goal `goal_id` for a deposit of `amount`.
    pub fn begin(goals: &[Goal], goal_id: &str, amount: Cents) -> Result<Self, ServiceError> {
        if amount.is_zero() {
            return Err(ServiceError::Validation("Enter a positive deposit amount.".to_string()));
        }

        let original = goals
            .iter()
            .find(|goal| goal.id == goal_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("We couldn't find that goal anymore.".to_string()))?;

        Ok(Self {
            original,
            amount,
            state: DepositState::Pending,
        })
    }

    /// The goal as it was before the deposit.
    pub fn original(&self) -> &Goal {
        &self.original
    }

    pub fn amount(&self) -> Cents {
        self.amount
    }

    pub fn state(&self) -> &DepositState {
        &self.state
    }

    /// Computes the optimistic goal, `saved + amount`.
    pub fn apply(&mut self) -> Result<Goal, ServiceError> {
        if self.state != DepositState::Pending {
            return Err(ServiceError::InvalidTransition("apply", self.state.name()));
        }

        let saved_cents = self
            .original
            .saved_cents
            .checked_add(self.amount)
            .ok_or_else(|| ServiceError::Validation("That deposit is too large.".to_string()))?;

        let optimistic = Goal {
            saved_cents,
            ..self.original.clone()
        };
        self.state = DepositState::Applied {
            optimistic: optimistic.clone(),
        };

        Ok(optimistic)
    }

    /// Accepts the backend's goal as authoritative.
    pub fn confirm(&mut self, server: Goal) -> Result<Goal, ServiceError> {
        if !matches!(self.state, DepositState::Applied { .. }) {
            return Err(ServiceError::InvalidTransition("confirm", self.state.name()));
        }

        self.state = DepositState::Confirmed(server.clone());
        Ok(server)
    }

    /// Puts the original goal back into `goals`, but only while the entry
    /// still shows this deposit's optimistic balance. Returns whether the
    /// entry was restored.
    pub fn roll_back(&mut self, goals: &mut [Goal], error: String) -> Result<bool, ServiceError> {
        let optimistic = match &self.state {
            DepositState::Applied { optimistic } => optimistic,
            other => return Err(ServiceError::InvalidTransition("roll back", other.name())),
        };

        let restored = match goals.iter_mut().find(|goal| goal.id == self.original.id) {
            Some(slot) if *slot == *optimistic => {
                *slot = self.original.clone();
                true
            }
            _ => false,
        };

        self.state = DepositState::RolledBack { error };
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn goal(id: &str, saved: u64) -> Goal {
        Goal {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            name: format!("Goal {}", id),
            target_cents: Cents::new(100_000),
            saved_cents: Cents::new(saved),
            emoji: None,
            color: None,
            deadline_date: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn apply_then_confirm() {
        let goals = vec![goal("a", 10_000), goal("b", 0)];
        let mut operation = DepositOperation::begin(&goals, "a", Cents::new(2_500)).unwrap();

        let optimistic = operation.apply().unwrap();
        assert_eq!(optimistic.saved_cents, Cents::new(12_500));
        assert_eq!(operation.original().saved_cents, Cents::new(10_000));

        let server = goal("a", 13_000);
        assert_eq!(operation.confirm(server.clone()).unwrap(), server);
        assert_eq!(operation.state(), &DepositState::Confirmed(server));
    }

    #[test]
    fn roll_back_restores_only_the_deposited_goal() {
        let goals = vec![goal("a", 10_000), goal("b", 500)];
        let mut operation = DepositOperation::begin(&goals, "b", Cents::new(100)).unwrap();
        let optimistic = operation.apply().unwrap();

        let mut current = vec![goal("a", 15_000), optimistic, goal("c", 0)];
        assert!(operation.roll_back(&mut current, "offline".to_string()).unwrap());
        assert_eq!(current, vec![goal("a", 15_000), goal("b", 500), goal("c", 0)]);
        assert!(matches!(operation.state(), DepositState::RolledBack { error } if error == "offline"));
    }

    #[test]
    fn roll_back_leaves_a_replaced_entry_alone() {
        let goals = vec![goal("a", 10_000)];
        let mut operation = DepositOperation::begin(&goals, "a", Cents::new(100)).unwrap();
        operation.apply().unwrap();

        let mut reloaded = vec![goal("a", 20_000)];
        assert!(!operation.roll_back(&mut reloaded, "offline".to_string()).unwrap());
        assert_eq!(reloaded, vec![goal("a", 20_000)]);

        let mut emptied: Vec<Goal> = Vec::new();
        assert!(matches!(
            operation.roll_back(&mut emptied, "again".to_string()),
            Err(ServiceError::InvalidTransition("roll back", "rolled back"))
        ));
    }

    #[test]
    fn rejects_out_of_order_transitions() {
        let mut goals = vec![goal("a", 0)];
        let mut operation = DepositOperation::begin(&goals, "a", Cents::new(1)).unwrap();

        assert!(matches!(
            operation.confirm(goal("a", 1)),
            Err(ServiceError::InvalidTransition("confirm", "pending"))
        ));
        assert!(operation.roll_back(&mut goals, "x".to_string()).is_err());

        operation.apply().unwrap();
        assert!(matches!(
            operation.apply(),
            Err(ServiceError::InvalidTransition("apply", "applied"))
        ));
    }

    #[test]
    fn validates_before_capturing() {
        let goals = vec![goal("a", 0)];
        assert!(matches!(
            DepositOperation::begin(&goals, "a", Cents::ZERO),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            DepositOperation::begin(&goals, "missing", Cents::new(5)),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn overflowing_deposit_is_rejected() {
        let goals = vec![goal("a", u64::MAX)];
        let mut operation = DepositOperation::begin(&goals, "a", Cents::new(1)).unwrap();
        assert!(matches!(operation.apply(), Err(ServiceError::Validation(_))));
        assert_eq!(operation.state(), &DepositState::Pending);
    }
}
