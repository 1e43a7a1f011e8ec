use chrono::NaiveDate;

use crate::models::goals::{progress_percent, Goal};
use crate::utils::currency::Cents;

/// Dashboard totals across all of a user's goals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_saved: Cents,
    pub total_target: Cents,
    /// Overall completion, clamped to 0..=100.
    pub completion: u8,
    pub next_deadline: Option<NaiveDate>,
    pub goal_count: usize,
}

impl Summary {
    pub fn from_goals(goals: &[Goal]) -> Self {
        let total_saved = goals
            .iter()
            .fold(Cents::ZERO, |acc, goal| acc.saturating_add(goal.saved_cents));
        let total_target = goals
            .iter()
            .fold(Cents::ZERO, |acc, goal| acc.saturating_add(goal.target_cents));
        let next_deadline = goals.iter().filter_map(|goal| goal.deadline_date).min();

        Summary {
            total_saved,
            total_target,
            completion: progress_percent(total_saved, total_target),
            next_deadline,
            goal_count: goals.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn goal(saved: u64, target: u64, deadline: Option<(i32, u32, u32)>) -> Goal {
        Goal {
            id: format!("{}-{}", saved, target),
            user_id: "user-1".to_string(),
            name: "Goal".to_string(),
            target_cents: Cents::new(target),
            saved_cents: Cents::new(saved),
            emoji: None,
            color: None,
            deadline_date: deadline.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_board_has_zero_completion() {
        assert_eq!(Summary::from_goals(&[]), Summary::default());
    }

    #[test]
    fn aggregates_totals_and_earliest_deadline() {
        let goals = vec![
            goal(25_000, 100_000, Some((2027, 6, 1))),
            goal(50_000, 50_000, None),
            goal(0, 50_000, Some((2027, 1, 15))),
        ];
        let summary = Summary::from_goals(&goals);

        assert_eq!(summary.total_saved, Cents::new(75_000));
        assert_eq!(summary.total_target, Cents::new(200_000));
        assert_eq!(summary.completion, 38);
        assert_eq!(summary.next_deadline, NaiveDate::from_ymd_opt(2027, 1, 15));
        assert_eq!(summary.goal_count, 3);
    }

    #[test]
    fn completion_is_clamped() {
        let summary = Summary::from_goals(&[goal(300_000, 100_000, None)]);
        assert_eq!(summary.completion, 100);
    }
}
