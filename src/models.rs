use crate::errors::{EngineError, EngineResult};
use crate::streak::calculate_streak;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Completed calendar days of one habit.
///
/// Serialized as a `{"YYYY-MM-DD": true}` map. A day is either present or
/// absent; `false` markers found on load are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<NaiveDate, bool>", into = "BTreeMap<NaiveDate, bool>")]
pub struct History(BTreeSet<NaiveDate>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date)
    }

    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.0.insert(date)
    }

    pub fn set(&mut self, date: NaiveDate, completed: bool) {
        if completed {
            self.0.insert(date);
        } else {
            self.0.remove(&date);
        }
    }

    pub fn latest(&self) -> Option<NaiveDate> {
        self.0.last().copied()
    }

    /// Most recent first.
    pub fn iter_desc(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<NaiveDate> for History {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<NaiveDate, bool>> for History {
    fn from(map: BTreeMap<NaiveDate, bool>) -> Self {
        map.into_iter()
            .filter_map(|(date, done)| done.then_some(date))
            .collect()
    }
}

impl From<History> for BTreeMap<NaiveDate, bool> {
    fn from(history: History) -> Self {
        history.0.into_iter().map(|date| (date, true)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    General,
    Health,
    Fitness,
    #[serde(rename = "Personal Growth")]
    PersonalGrowth,
    Productivity,
    Mindfulness,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Health,
        Category::Fitness,
        Category::PersonalGrowth,
        Category::Productivity,
        Category::Mindfulness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Health => "Health",
            Self::Fitness => "Fitness",
            Self::PersonalGrowth => "Personal Growth",
            Self::Productivity => "Productivity",
            Self::Mindfulness => "Mindfulness",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown category '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    current_streak: u32,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(
        owner_id: impl Into<String>,
        draft: HabitDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: draft.name,
            category: draft.category,
            description: draft.description,
            history: History::new(),
            current_streak: 0,
            created_at,
        }
    }

    /// Cached value written alongside the history it was derived from.
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// Applies a [`HistoryWrite`] and re-derives the cached streak from the
    /// resulting history. This is the only way the cached streak changes.
    pub(crate) fn apply_write(&mut self, write: &HistoryWrite) -> u32 {
        self.history.set(write.date, write.completed);
        self.current_streak = calculate_streak(&self.history, write.today);
        self.current_streak
    }
}

/// Validated input for a new habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitDraft {
    pub name: String,
    pub category: Category,
    pub description: String,
}

impl HabitDraft {
    /// Rejects blank names and unknown categories. A missing category falls
    /// back to `General`.
    pub fn from_request(request: CreateHabitRequest) -> EngineResult<Self> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("habit name must not be empty"));
        }

        let category = match request.category.as_deref().map(str::trim) {
            None | Some("") => Category::default(),
            Some(value) => value.parse().map_err(EngineError::Validation)?,
        };

        Ok(Self {
            name: name.to_string(),
            category,
            description: request.description.unwrap_or_default().trim().to_string(),
        })
    }
}

/// One day's completion change. The store derives the streak from the stored
/// history as of `today` and writes both together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWrite {
    pub date: NaiveDate,
    pub completed: bool,
    pub today: NaiveDate,
    /// When set, the write only applies if the stored history still equals it.
    pub expected_base: Option<History>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub label: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Unlocked badges keyed by id. Merging never replaces an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Badge>", into = "Vec<Badge>")]
pub struct BadgeSet(BTreeMap<String, Badge>);

impl BadgeSet {
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Set union by id; returns the badges that were not present before.
    pub fn merge(&mut self, badges: impl IntoIterator<Item = Badge>) -> Vec<Badge> {
        let mut added = Vec::new();
        for badge in badges {
            if !self.0.contains_key(&badge.id) {
                self.0.insert(badge.id.clone(), badge.clone());
                added.push(badge);
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Badge>> for BadgeSet {
    fn from(badges: Vec<Badge>) -> Self {
        let mut set = Self::default();
        set.merge(badges);
        set
    }
}

impl From<BadgeSet> for Vec<Badge> {
    fn from(set: BadgeSet) -> Self {
        let mut badges: Vec<Badge> = set.0.into_values().collect();
        badges.sort_by(|a, b| a.unlocked_at.cmp(&b.unlocked_at).then_with(|| a.id.cmp(&b.id)));
        badges
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub badges: BadgeSet,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            badges: BadgeSet::default(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub profiles: BTreeMap<String, UserProfile>,
    #[serde(default)]
    pub habits: BTreeMap<Uuid, Habit>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnsureProfileRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub date: Option<String>,
    pub history: History,
    #[serde(default)]
    pub compare_and_swap: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub date: NaiveDate,
    pub completed: bool,
    pub current_streak: u32,
    pub new_badges: Vec<Badge>,
}

#[derive(Debug, Serialize)]
pub struct HabitResponse {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub history: History,
    pub current_streak: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Habit> for HabitResponse {
    fn from(habit: Habit) -> Self {
        Self {
            current_streak: habit.current_streak(),
            id: habit.id,
            name: habit.name,
            category: habit.category,
            description: habit.description,
            history: habit.history,
            created_at: habit.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub day: u32,
    pub date: NaiveDate,
    pub completed: usize,
    pub total: usize,
    pub intensity: f64,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub month: String,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapPoint {
    pub date: NaiveDate,
    pub completed: bool,
    pub weekday: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Serialize)]
pub struct StreakTier {
    pub id: &'static str,
    pub name: &'static str,
    pub threshold: u32,
    pub unlocked: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub date: NaiveDate,
    pub completed_today: usize,
    pub total_habits: usize,
    pub best_streak: u32,
    pub categories: Vec<CategoryShare>,
    pub tiers: Vec<StreakTier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn history_serializes_as_true_markers() {
        let history: History = [day(2), day(1)].into_iter().collect();
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"{"2026-03-01":true,"2026-03-02":true}"#);
    }

    #[test]
    fn history_drops_false_markers_on_load() {
        let history: History =
            serde_json::from_str(r#"{"2026-03-01":true,"2026-03-02":false}"#).unwrap();
        assert!(history.contains(day(1)));
        assert!(!history.contains(day(2)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn badge_set_merge_is_a_union_by_id() {
        let at = Utc::now();
        let badge = |id: &str, label: &str| Badge {
            id: id.to_string(),
            label: label.to_string(),
            unlocked_at: at,
        };
        let mut set = BadgeSet::default();
        assert_eq!(set.merge([badge("7-day", "first")]).len(), 1);

        let added = set.merge([badge("7-day", "second"), badge("15-day", "other")]);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "15-day");
        assert_eq!(set.len(), 2);
        let kept = set.iter().find(|b| b.id == "7-day").unwrap();
        assert_eq!(kept.label, "first");
    }

    #[test]
    fn badge_set_dedupes_on_load() {
        let json = r#"[
            {"id":"7-day","label":"a","unlocked_at":"2026-01-01T00:00:00Z"},
            {"id":"7-day","label":"b","unlocked_at":"2026-01-02T00:00:00Z"}
        ]"#;
        let set: BadgeSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 1);
    }

    fn request(name: &str, category: Option<&str>) -> CreateHabitRequest {
        CreateHabitRequest {
            name: name.to_string(),
            category: category.map(str::to_string),
            description: None,
        }
    }

    #[test]
    fn draft_requires_a_name() {
        assert!(matches!(
            HabitDraft::from_request(request("   ", None)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn draft_defaults_category_and_trims() {
        let draft = HabitDraft::from_request(request("  Morning Run ", None)).unwrap();
        assert_eq!(draft.name, "Morning Run");
        assert_eq!(draft.category, Category::General);
        assert_eq!(draft.description, "");

        let draft = HabitDraft::from_request(request("Read", Some("Productivity"))).unwrap();
        assert_eq!(draft.category, Category::Productivity);
        assert!(HabitDraft::from_request(request("Read", Some("Hobbies"))).is_err());
    }

    #[test]
    fn toggle_request_requires_a_history_snapshot() {
        assert!(serde_json::from_str::<ToggleRequest>("{}").is_err());

        let request: ToggleRequest = serde_json::from_str(r#"{"history":{}}"#).unwrap();
        assert!(request.history.is_empty());
        assert!(!request.compare_and_swap);
    }

    #[test]
    fn apply_write_derives_streak_from_stored_history() {
        let mut habit = Habit::new(
            "u1",
            HabitDraft {
                name: "Run".to_string(),
                category: Category::Fitness,
                description: String::new(),
            },
            Utc::now(),
        );
        habit.history = [day(1), day(2)].into_iter().collect();

        let streak = habit.apply_write(&HistoryWrite {
            date: day(3),
            completed: true,
            today: day(3),
            expected_base: None,
        });
        assert_eq!(streak, 3);
        assert_eq!(habit.current_streak(), 3);
    }

    #[test]
    fn category_parses_display_names() {
        assert_eq!("personal growth".parse::<Category>(), Ok(Category::PersonalGrowth));
        assert_eq!(" Health ".parse::<Category>(), Ok(Category::Health));
        assert!("Gardening".parse::<Category>().is_err());
    }
}
