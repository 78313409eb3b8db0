use crate::achievements::unlock_achievements;
use crate::errors::{EngineError, EngineResult};
use crate::models::{History, HistoryWrite, ToggleResponse};
use crate::store::HabitStore;
use crate::streak::calculate_streak;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a toggle treats the caller's history snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Trust the snapshot. Two sessions toggling the same habit at once can
    /// lose one of the updates.
    #[default]
    LastWriteWins,
    /// Write only if the stored history still equals the snapshot, otherwise
    /// fail with `Conflict`.
    CompareAndSwap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub date: NaiveDate,
    pub completed: bool,
    pub history: History,
    pub current_streak: u32,
}

/// Flips `date` in a copy of `history` and derives the streak from the result.
pub fn apply_toggle(history: &History, date: NaiveDate, today: NaiveDate) -> ToggleOutcome {
    let completed = !history.contains(date);
    let mut next = history.clone();
    next.set(date, completed);
    let current_streak = calculate_streak(&next, today);

    ToggleOutcome {
        date,
        completed,
        history: next,
        current_streak,
    }
}

/// Parses a `YYYY-MM-DD` target date, defaulting to `today`.
pub fn parse_target_date(value: Option<&str>, today: NaiveDate) -> EngineResult<NaiveDate> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(today),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|err| EngineError::validation(format!("invalid date '{value}': {err}"))),
    }
}

#[derive(Debug, Clone)]
pub struct Toggle<'a> {
    pub owner_id: &'a str,
    pub habit_id: Uuid,
    pub date: NaiveDate,
    pub snapshot: History,
    pub consistency: Consistency,
}

/// Toggles one day of a habit, persists history and streak together and, when
/// the day was switched on, unlocks any milestone badges.
///
/// The snapshot decides the direction of the flip. The streak in the response
/// and the one used for badges is the store's, derived from the stored
/// history. Badge failures are logged and never fail the toggle.
pub async fn toggle_habit<S: HabitStore>(
    store: &S,
    toggle: Toggle<'_>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> EngineResult<ToggleResponse> {
    let outcome = apply_toggle(&toggle.snapshot, toggle.date, today);
    let expected_base = match toggle.consistency {
        Consistency::LastWriteWins => None,
        Consistency::CompareAndSwap => Some(toggle.snapshot),
    };

    let current_streak = store
        .write_history_and_streak(
            toggle.owner_id,
            toggle.habit_id,
            HistoryWrite {
                date: outcome.date,
                completed: outcome.completed,
                today,
                expected_base,
            },
        )
        .await?;

    if current_streak != outcome.current_streak {
        debug!(
            owner_id = toggle.owner_id,
            habit_id = %toggle.habit_id,
            snapshot_streak = outcome.current_streak,
            stored_streak = current_streak,
            "snapshot was behind the stored history"
        );
    }
    info!(
        owner_id = toggle.owner_id,
        habit_id = %toggle.habit_id,
        date = %outcome.date,
        completed = outcome.completed,
        streak = current_streak,
        "habit toggled"
    );

    let new_badges = if outcome.completed {
        match unlock_achievements(store, toggle.owner_id, current_streak, now).await {
            Ok(badges) => badges,
            Err(err) => {
                warn!(owner_id = toggle.owner_id, "{err}");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok(ToggleResponse {
        date: outcome.date,
        completed: outcome.completed,
        current_streak,
        new_badges,
    })
}
