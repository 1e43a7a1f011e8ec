use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::currency::Cents;

pub const GOAL_COLUMNS: &str =
    "id, user_id, name, target_cents, saved_cents, emoji, color, deadline_date, created_at";
pub const DEFAULT_EMOJI: &str = "🏦";
pub const DEFAULT_COLOR: &str = "#7C3AED";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub target_cents: Cents,
    pub saved_cents: Cents,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub deadline_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Progress toward the target as a whole percentage clamped to 0..=100.
    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.saved_cents, self.target_cents)
    }

    pub fn remaining_cents(&self) -> Cents {
        self.target_cents.saturating_sub(self.saved_cents)
    }

    pub fn emoji_or_default(&self) -> &str {
        self.emoji.as_deref().unwrap_or(DEFAULT_EMOJI)
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }
}

/// `min(100, round(saved / target * 100))`, or 0 when there is no target.
pub fn progress_percent(saved: Cents, target: Cents) -> u8 {
    if target.is_zero() {
        return 0;
    }

    let saved = u128::from(saved.get());
    let target = u128::from(target.get());
    // Integer form of round-half-up on saved * 100 / target.
    let rounded = (saved * 200 + target) / (target * 2);

    u8::try_from(rounded.min(100)).unwrap_or(100)
}

/// Goal row as the backend returns it. Numeric columns may arrive as JSON
/// numbers or as numeric strings (bigint columns), so they stay untyped
/// until [`Goal::from`] normalizes them.
#[derive(Clone, Debug, Deserialize)]
pub struct GoalRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub target_cents: Value,
    #[serde(default)]
    pub saved_cents: Value,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub deadline_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<GoalRow> for Goal {
    fn from(row: GoalRow) -> Self {
        Goal {
            target_cents: normalize_cents(&row.target_cents),
            saved_cents: normalize_cents(&row.saved_cents),
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            emoji: row.emoji,
            color: row.color,
            deadline_date: row.deadline_date,
            created_at: row.created_at,
        }
    }
}

/// Coerces a wire value to cents. Anything that is not a finite,
/// non-negative whole number becomes zero.
pub fn normalize_cents(value: &Value) -> Cents {
    match value {
        Value::Number(number) => {
            if let Some(v) = number.as_u64() {
                return Cents::new(v);
            }
            number.as_f64().and_then(whole_cents).unwrap_or_default()
        }
        Value::String(text) => {
            let text = text.trim();
            if let Ok(v) = text.parse::<u64>() {
                return Cents::new(v);
            }
            text.parse::<f64>().ok().and_then(whole_cents).unwrap_or_default()
        }
        _ => Cents::ZERO,
    }
}

fn whole_cents(value: f64) -> Option<Cents> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(Cents::new(value as u64))
    } else {
        None
    }
}

/// Input for creating a goal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGoal {
    pub user_id: String,
    pub name: String,
    pub target_cents: Cents,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub deadline_date: Option<NaiveDate>,
}

/// Insert payload for the `goals` table, defaults applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GoalInsert {
    pub user_id: String,
    pub name: String,
    pub target_cents: Cents,
    pub emoji: String,
    pub color: String,
    pub deadline_date: Option<NaiveDate>,
}

impl From<&NewGoal> for GoalInsert {
    fn from(input: &NewGoal) -> Self {
        GoalInsert {
            user_id: input.user_id.clone(),
            name: input.name.clone(),
            target_cents: input.target_cents,
            emoji: input.emoji.clone().unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            color: input.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            deadline_date: input.deadline_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SavedUpdate {
    pub saved_cents: Cents,
}

/// Append-only ledger entry recording a change to a goal's balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub delta_cents: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewGoalEvent {
    pub user_id: String,
    pub goal_id: String,
    pub delta_cents: i64,
    pub note: Option<String>,
}

/// A deposit against `goal`, which carries the balance the deposit was
/// computed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositInput {
    pub user_id: String,
    pub goal: Goal,
    pub amount: Cents,
    pub note: Option<String>,
}

impl DepositInput {
    pub fn event(&self) -> NewGoalEvent {
        NewGoalEvent {
            user_id: self.user_id.clone(),
            goal_id: self.goal.id.clone(),
            delta_cents: self.amount.as_delta(),
            note: self.note.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn row(target: Value, saved: Value) -> GoalRow {
        serde_json::from_value(json!({
            "id": "goal-1",
            "user_id": "user-1",
            "name": "Emergency fund",
            "target_cents": target,
            "saved_cents": saved,
            "emoji": null,
            "color": "#22C55E",
            "deadline_date": "2027-03-05",
            "created_at": "2026-01-02T03:04:05.123456+00:00"
        }))
        .unwrap()
    }

    #[rstest]
    #[case(json!(100000), json!(2500), 100_000, 2_500)]
    #[case(json!("100000"), json!("2500"), 100_000, 2_500)]
    #[case(json!("1e3"), json!(12.0), 1_000, 12)]
    #[case(json!("not a number"), json!(null), 0, 0)]
    #[case(json!(-5), json!(1.5), 0, 0)]
    fn normalizes_numeric_columns(
        #[case] target: Value,
        #[case] saved: Value,
        #[case] expected_target: u64,
        #[case] expected_saved: u64,
    ) {
        let goal = Goal::from(row(target, saved));
        assert_eq!(goal.target_cents, Cents::new(expected_target));
        assert_eq!(goal.saved_cents, Cents::new(expected_saved));
        assert_eq!(goal.deadline_date, NaiveDate::from_ymd_opt(2027, 3, 5));
    }

    #[test]
    fn missing_numeric_columns_normalize_to_zero() {
        let row: GoalRow = serde_json::from_value(json!({
            "id": "goal-1",
            "user_id": "user-1",
            "name": "Bike",
            "emoji": null,
            "color": null,
            "deadline_date": null,
            "created_at": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        let goal = Goal::from(row);
        assert_eq!(goal.target_cents, Cents::ZERO);
        assert_eq!(goal.emoji_or_default(), DEFAULT_EMOJI);
        assert_eq!(goal.color_or_default(), DEFAULT_COLOR);
    }

    #[rstest]
    #[case(0, 100_000, 0)]
    #[case(25_000, 100_000, 25)]
    #[case(100_000, 100_000, 100)]
    #[case(250_000, 100_000, 100)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(1, 200, 1)]
    #[case(500, 0, 0)]
    fn progress_is_rounded_and_clamped(#[case] saved: u64, #[case] target: u64, #[case] expected: u8) {
        assert_eq!(progress_percent(Cents::new(saved), Cents::new(target)), expected);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let mut goal = Goal::from(row(json!(100_000), json!(25_000)));
        assert_eq!(goal.remaining_cents(), Cents::new(75_000));
        goal.saved_cents = Cents::new(120_000);
        assert_eq!(goal.remaining_cents(), Cents::ZERO);
    }

    #[test]
    fn insert_payload_applies_defaults() {
        let input = NewGoal {
            user_id: "user-1".to_string(),
            name: "Trip".to_string(),
            target_cents: Cents::new(50_000),
            emoji: None,
            color: None,
            deadline_date: None,
        };
        let payload = serde_json::to_value(GoalInsert::from(&input)).unwrap();
        assert_eq!(
            payload,
            json!({
                "user_id": "user-1",
                "name": "Trip",
                "target_cents": 50000,
                "emoji": DEFAULT_EMOJI,
                "color": DEFAULT_COLOR,
                "deadline_date": null
            })
        );
    }
}
