//! Milestone badges unlocked from streak lengths.
//!
//! Unlocks are monotonic: once a badge is in a profile it stays there, no
//! matter what later happens to the streak.

use crate::errors::{EngineError, EngineResult};
use crate::models::{Badge, BadgeSet};
use crate::store::HabitStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub id: &'static str,
    pub days: u32,
    pub label: &'static str,
}

pub const MILESTONES: [Milestone; 3] = [
    Milestone {
        id: "7-day",
        days: 7,
        label: "Week Warrior",
    },
    Milestone {
        id: "15-day",
        days: 15,
        label: "Consistency King",
    },
    Milestone {
        id: "30-day",
        days: 30,
        label: "Master of Discipline",
    },
];

impl Milestone {
    fn badge(&self, unlocked_at: DateTime<Utc>) -> Badge {
        Badge {
            id: self.id.to_string(),
            label: self.label.to_string(),
            unlocked_at,
        }
    }
}

/// Badges earned by `streak` that are not yet in `unlocked`.
pub fn newly_earned(streak: u32, unlocked: &BadgeSet, now: DateTime<Utc>) -> Vec<Badge> {
    MILESTONES
        .iter()
        .filter(|milestone| streak >= milestone.days && !unlocked.contains(milestone.id))
        .map(|milestone| milestone.badge(now))
        .collect()
}

/// Reads the owner's badges, appends whatever `streak` newly earns and
/// returns the badges that were actually added. Safe to re-run.
pub async fn unlock_achievements<S: HabitStore>(
    store: &S,
    owner_id: &str,
    streak: u32,
    now: DateTime<Utc>,
) -> EngineResult<Vec<Badge>> {
    let Some(unlocked) = store
        .read_badges(owner_id)
        .await
        .map_err(as_evaluation_error)?
    else {
        debug!(owner_id, "no profile yet; skipping achievements");
        return Ok(Vec::new());
    };

    let earned = newly_earned(streak, &unlocked, now);
    if earned.is_empty() {
        return Ok(earned);
    }

    let added = store
        .append_badges(owner_id, earned)
        .await
        .map_err(as_evaluation_error)?;
    for badge in &added {
        info!(owner_id, badge = %badge.id, streak, "badge unlocked");
    }
    Ok(added)
}

fn as_evaluation_error(err: EngineError) -> EngineError {
    match err {
        EngineError::AchievementEvaluation(_) => err,
        other => EngineError::AchievementEvaluation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(badges: &[Badge]) -> Vec<&str> {
        badges.iter().map(|badge| badge.id.as_str()).collect()
    }

    #[test]
    fn nothing_below_first_threshold() {
        assert!(newly_earned(6, &BadgeSet::default(), Utc::now()).is_empty());
    }

    #[test]
    fn week_streak_unlocks_first_badge() {
        let earned = newly_earned(7, &BadgeSet::default(), Utc::now());
        assert_eq!(ids(&earned), vec!["7-day"]);
        assert_eq!(earned[0].label, "Week Warrior");
    }

    #[test]
    fn jump_to_thirty_unlocks_all_three() {
        let earned = newly_earned(30, &BadgeSet::default(), Utc::now());
        assert_eq!(ids(&earned), vec!["7-day", "15-day", "30-day"]);
    }

    #[test]
    fn second_evaluation_earns_nothing() {
        let now = Utc::now();
        let mut unlocked = BadgeSet::default();
        unlocked.merge(newly_earned(16, &unlocked, now));

        assert_eq!(unlocked.len(), 2);
        assert!(newly_earned(16, &unlocked, now).is_empty());
    }

    #[test]
    fn only_missing_badges_are_returned() {
        let now = Utc::now();
        let unlocked = BadgeSet::from(newly_earned(7, &BadgeSet::default(), now));
        let earned = newly_earned(31, &unlocked, now);
        assert_eq!(ids(&earned), vec!["15-day", "30-day"]);
    }
}
