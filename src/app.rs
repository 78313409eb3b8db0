use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/users/:owner_id/profile",
            get(handlers::get_profile)
                .post(handlers::ensure_profile)
                .patch(handlers::update_profile),
        )
        .route("/api/users/:owner_id/badges", get(handlers::get_badges))
        .route(
            "/api/users/:owner_id/habits",
            get(handlers::list_habits).post(handlers::create_habit),
        )
        .route(
            "/api/users/:owner_id/habits/:habit_id",
            get(handlers::get_habit).delete(handlers::delete_habit),
        )
        .route(
            "/api/users/:owner_id/habits/:habit_id/history",
            get(handlers::get_history),
        )
        .route(
            "/api/users/:owner_id/habits/:habit_id/toggle",
            post(handlers::toggle),
        )
        .route(
            "/api/users/:owner_id/habits/:habit_id/heatmap",
            get(handlers::get_heatmap),
        )
        .route("/api/users/:owner_id/calendar", get(handlers::get_calendar))
        .route("/api/users/:owner_id/dashboard", get(handlers::get_dashboard))
        .route("/api/users/:owner_id/events", get(handlers::events))
        .with_state(state)
}
