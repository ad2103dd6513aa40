pub mod auth;
pub mod call_tracker;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod fixed_window;
pub mod handlers;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{ApiError, Result};
pub use server::create_app;
pub use state::{AppState, SharedState};
