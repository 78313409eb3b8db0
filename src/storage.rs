use crate::errors::{EngineError, EngineResult};
use crate::models::{AppData, Badge, BadgeSet, Habit, HabitDraft, History, HistoryWrite, UserProfile};
use crate::store::{HabitStore, StoreEvent, StoreEventKind};
use chrono::{DateTime, Utc};
use std::{path::Path, path::PathBuf, sync::Arc};
use tokio::fs;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

/// Writes to a sibling temp file first so a failed write never truncates the
/// previous document.
pub async fn persist_data(path: &Path, data: &AppData) -> EngineResult<()> {
    let payload = serde_json::to_vec_pretty(data).map_err(EngineError::persistence)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).await.map_err(EngineError::persistence)?;
    fs::rename(&tmp, path).await.map_err(EngineError::persistence)?;
    Ok(())
}

/// Document store persisted as one JSON file.
#[derive(Clone)]
pub struct JsonStore {
    data_path: PathBuf,
    data: Arc<Mutex<AppData>>,
    events: broadcast::Sender<StoreEvent>,
}

impl JsonStore {
    pub fn new(data_path: PathBuf, data: AppData) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            events,
        }
    }

    pub async fn open(data_path: PathBuf) -> Self {
        let data = load_data(&data_path).await;
        Self::new(data_path, data)
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Runs `mutate` under the lock and persists the result. Any failure
    /// restores the in-memory document, so unsaved changes are never visible.
    async fn commit<T>(
        &self,
        event: Option<StoreEvent>,
        mutate: impl FnOnce(&mut AppData) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut data = self.data.lock().await;
        let snapshot = data.clone();

        let value = match mutate(&mut *data) {
            Ok(value) => value,
            Err(err) => {
                *data = snapshot;
                return Err(err);
            }
        };

        if let Err(err) = persist_data(&self.data_path, &data).await {
            error!(path = %self.data_path.display(), "failed to persist data: {err}");
            *data = snapshot;
            return Err(err);
        }
        drop(data);

        if let Some(event) = event {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
        Ok(value)
    }

    pub async fn create_habit(
        &self,
        owner_id: &str,
        draft: HabitDraft,
        now: DateTime<Utc>,
    ) -> EngineResult<Habit> {
        let habit = Habit::new(owner_id, draft, now);
        let created = habit.clone();
        self.commit(Some(habits_changed(owner_id)), move |data| {
            data.habits.insert(habit.id, habit);
            Ok(())
        })
        .await?;
        debug!(owner_id, habit_id = %created.id, "habit created");
        Ok(created)
    }

    /// Newest first.
    pub async fn list_habits(&self, owner_id: &str) -> Vec<Habit> {
        let data = self.data.lock().await;
        let mut habits: Vec<Habit> = data
            .habits
            .values()
            .filter(|habit| habit.owner_id == owner_id)
            .cloned()
            .collect();
        habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        habits
    }

    pub async fn get_habit(&self, owner_id: &str, habit_id: Uuid) -> EngineResult<Habit> {
        let data = self.data.lock().await;
        owned_habit(&data, owner_id, habit_id).cloned()
    }

    /// Removes the habit together with its whole history.
    pub async fn delete_habit(&self, owner_id: &str, habit_id: Uuid) -> EngineResult<()> {
        self.commit(Some(habits_changed(owner_id)), |data| {
            owned_habit(data, owner_id, habit_id)?;
            data.habits.remove(&habit_id);
            Ok(())
        })
        .await
    }

    pub async fn get_profile(&self, owner_id: &str) -> Option<UserProfile> {
        self.data.lock().await.profiles.get(owner_id).cloned()
    }

    /// Returns the existing profile, creating it on first access.
    pub async fn ensure_profile(
        &self,
        owner_id: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<UserProfile> {
        if let Some(profile) = self.get_profile(owner_id).await {
            return Ok(profile);
        }

        self.commit(Some(profile_changed(owner_id)), |data| {
            let profile = data
                .profiles
                .entry(owner_id.to_string())
                .or_insert_with(|| UserProfile::new(owner_id, email, now));
            Ok(profile.clone())
        })
        .await
    }

    pub async fn set_display_name(
        &self,
        owner_id: &str,
        display_name: Option<String>,
    ) -> EngineResult<UserProfile> {
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        self.commit(Some(profile_changed(owner_id)), |data| {
            let profile = data
                .profiles
                .get_mut(owner_id)
                .ok_or_else(|| EngineError::NotFound(format!("profile {owner_id}")))?;
            profile.display_name = display_name;
            Ok(profile.clone())
        })
        .await
    }
}

impl HabitStore for JsonStore {
    async fn read_history(&self, owner_id: &str, habit_id: Uuid) -> EngineResult<History> {
        let data = self.data.lock().await;
        Ok(owned_habit(&data, owner_id, habit_id)?.history.clone())
    }

    async fn write_history_and_streak(
        &self,
        owner_id: &str,
        habit_id: Uuid,
        write: HistoryWrite,
    ) -> EngineResult<u32> {
        self.commit(Some(habits_changed(owner_id)), |data| {
            let habit = data
                .habits
                .get_mut(&habit_id)
                .filter(|habit| habit.owner_id == owner_id)
                .ok_or_else(|| EngineError::NotFound(format!("habit {habit_id}")))?;

            if let Some(base) = &write.expected_base {
                if *base != habit.history {
                    warn!(owner_id, %habit_id, "rejecting toggle against stale history");
                    return Err(EngineError::Conflict(habit_id.to_string()));
                }
            }

            Ok(habit.apply_write(&write))
        })
        .await
    }

    async fn read_badges(&self, owner_id: &str) -> EngineResult<Option<BadgeSet>> {
        let data = self.data.lock().await;
        Ok(data.profiles.get(owner_id).map(|profile| profile.badges.clone()))
    }

    async fn append_badges(&self, owner_id: &str, badges: Vec<Badge>) -> EngineResult<Vec<Badge>> {
        self.commit(Some(profile_changed(owner_id)), |data| {
            let profile = data
                .profiles
                .get_mut(owner_id)
                .ok_or_else(|| EngineError::NotFound(format!("profile {owner_id}")))?;
            Ok(profile.badges.merge(badges))
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

fn owned_habit<'a>(data: &'a AppData, owner_id: &str, habit_id: Uuid) -> EngineResult<&'a Habit> {
    data.habits
        .get(&habit_id)
        .filter(|habit| habit.owner_id == owner_id)
        .ok_or_else(|| EngineError::NotFound(format!("habit {habit_id}")))
}

fn habits_changed(owner_id: &str) -> StoreEvent {
    StoreEvent {
        owner_id: owner_id.to_string(),
        kind: StoreEventKind::Habits,
    }
}

fn profile_changed(owner_id: &str) -> StoreEvent {
    StoreEvent {
        owner_id: owner_id.to_string(),
        kind: StoreEventKind::Profile,
    }
}
