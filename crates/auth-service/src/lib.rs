pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use config::AuthConfig;
pub use error::ApiError;
pub use service::AuthService;
pub use state::AuthState;
pub use store::{MemoryUserStore, PgUserStore, UserStore};
