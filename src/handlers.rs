use crate::errors::AppError;
use crate::models::{
    Badge, CalendarResponse, CreateHabitRequest, DashboardResponse, EnsureProfileRequest,
    HabitDraft, HabitResponse, HeatmapPoint, History, ToggleRequest, ToggleResponse,
    UpdateProfileRequest, UserProfile,
};
use crate::state::AppState;
use crate::stats::{
    DEFAULT_HEATMAP_DAYS, MAX_HEATMAP_DAYS, build_dashboard, habit_heatmap, month_calendar,
    parse_month,
};
use crate::store::{HabitStore, StoreEvent, StoreEventKind};
use crate::toggle::{Toggle, parse_target_date, toggle_habit};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{Datelike, Local, NaiveDate, Utc};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<String>,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    state
        .store
        .get_profile(&owner_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("profile {owner_id} not found")))
}

pub async fn ensure_profile(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(payload): Json<EnsureProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(AppError::bad_request("email must not be empty"));
    }

    let profile = state.store.ensure_profile(&owner_id, email, Utc::now()).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .store
        .set_display_name(&owner_id, payload.display_name)
        .await?;
    Ok(Json(profile))
}

pub async fn get_badges(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<Badge>>, AppError> {
    let badges = state
        .store
        .read_badges(&owner_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("profile {owner_id} not found")))?;
    Ok(Json(badges.into()))
}

pub async fn list_habits(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Json<Vec<HabitResponse>> {
    let habits = state.store.list_habits(&owner_id).await;
    Json(habits.into_iter().map(HabitResponse::from).collect())
}

pub async fn create_habit(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(payload): Json<CreateHabitRequest>,
) -> Result<(StatusCode, Json<HabitResponse>), AppError> {
    let draft = HabitDraft::from_request(payload)?;
    let habit = state.store.create_habit(&owner_id, draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(habit.into())))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Path((owner_id, habit_id)): Path<(String, Uuid)>,
) -> Result<Json<HabitResponse>, AppError> {
    let habit = state.store.get_habit(&owner_id, habit_id).await?;
    Ok(Json(habit.into()))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path((owner_id, habit_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.store.delete_habit(&owner_id, habit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_history(
    State(state): State<AppState>,
    Path((owner_id, habit_id)): Path<(String, Uuid)>,
) -> Result<Json<History>, AppError> {
    let history = state.store.read_history(&owner_id, habit_id).await?;
    Ok(Json(history))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path((owner_id, habit_id)): Path<(String, Uuid)>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let today = today();
    let date = parse_target_date(payload.date.as_deref(), today)?;
    let toggle = Toggle {
        owner_id: &owner_id,
        habit_id,
        date,
        snapshot: payload.history,
        consistency: state.config.consistency(payload.compare_and_swap),
    };

    let response = toggle_habit(&state.store, toggle, today, Utc::now()).await?;
    Ok(Json(response))
}

pub async fn get_heatmap(
    State(state): State<AppState>,
    Path((owner_id, habit_id)): Path<(String, Uuid)>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<Vec<HeatmapPoint>>, AppError> {
    let days = query
        .days
        .unwrap_or(DEFAULT_HEATMAP_DAYS)
        .clamp(1, MAX_HEATMAP_DAYS);
    let history = state.store.read_history(&owner_id, habit_id).await?;
    Ok(Json(habit_heatmap(&history, today(), days)))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let (year, month) = match query.month.as_deref() {
        Some(value) => parse_month(value)
            .ok_or_else(|| AppError::bad_request("month must be formatted as YYYY-MM"))?,
        None => {
            let today = today();
            (today.year(), today.month())
        }
    };

    let habits = state.store.list_habits(&owner_id).await;
    month_calendar(&habits, year, month)
        .map(Json)
        .ok_or_else(|| AppError::bad_request("invalid month"))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Json<DashboardResponse> {
    let habits = state.store.list_habits(&owner_id).await;
    Json(build_dashboard(&habits))
}

/// Live feed of habit-list and profile snapshots for one owner.
pub async fn events(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = state.store.subscribe();
    let stream = owner_updates(receiver, owner_id.clone()).then(move |kind| {
        let state = state.clone();
        let owner_id = owner_id.clone();
        async move { snapshot_event(&state, &owner_id, kind).await }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Snapshot kinds owed to one owner's subscriber. After a lag the skipped
/// events are unknown, so both snapshots are owed.
fn owner_updates(
    receiver: broadcast::Receiver<StoreEvent>,
    owner_id: String,
) -> impl Stream<Item = StoreEventKind> {
    stream::unfold((receiver, owner_id), |(mut receiver, owner_id)| async move {
        loop {
            let kinds = match receiver.recv().await {
                Ok(event) if event.owner_id == owner_id => vec![event.kind],
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(owner_id = %owner_id, skipped, "live update subscriber lagged");
                    vec![StoreEventKind::Habits, StoreEventKind::Profile]
                }
                Err(RecvError::Closed) => return None,
            };
            return Some((stream::iter(kinds), (receiver, owner_id)));
        }
    })
    .flatten()
}

async fn snapshot_event(
    state: &AppState,
    owner_id: &str,
    kind: StoreEventKind,
) -> Result<Event, axum::Error> {
    match kind {
        StoreEventKind::Habits => {
            let habits: Vec<HabitResponse> = state
                .store
                .list_habits(owner_id)
                .await
                .into_iter()
                .map(HabitResponse::from)
                .collect();
            Event::default().event("habits").json_data(habits)
        }
        StoreEventKind::Profile => {
            let profile = state.store.get_profile(owner_id).await;
            Event::default().event("profile").json_data(profile)
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
