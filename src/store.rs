//! Engine-facing view of the history/profile store.

use crate::errors::EngineResult;
use crate::models::{Badge, BadgeSet, History, HistoryWrite};
use std::future::Future;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Habits,
    Profile,
}

/// Published after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub owner_id: String,
    pub kind: StoreEventKind,
}

pub trait HabitStore: Send + Sync {
    fn read_history(
        &self,
        owner_id: &str,
        habit_id: Uuid,
    ) -> impl Future<Output = EngineResult<History>> + Send;

    /// Applies the date delta, re-derives the streak from the stored history
    /// and persists both as one update. Returns the persisted streak. Fails
    /// with `Conflict` when `write.expected_base` is set and differs from the
    /// stored history.
    fn write_history_and_streak(
        &self,
        owner_id: &str,
        habit_id: Uuid,
        write: HistoryWrite,
    ) -> impl Future<Output = EngineResult<u32>> + Send;

    /// `None` when the owner has no profile yet.
    fn read_badges(&self, owner_id: &str)
    -> impl Future<Output = EngineResult<Option<BadgeSet>>> + Send;

    /// Union by badge id. Returns only the badges that were actually added.
    fn append_badges(
        &self,
        owner_id: &str,
        badges: Vec<Badge>,
    ) -> impl Future<Output = EngineResult<Vec<Badge>>> + Send;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
