pub mod achievements;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod streak;
pub mod toggle;

pub use app::router;
pub use config::Config;
pub use errors::{AppError, EngineError, EngineResult};
pub use state::AppState;
pub use storage::{JsonStore, load_data};
pub use store::HabitStore;
