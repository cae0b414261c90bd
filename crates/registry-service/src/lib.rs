pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use config::RegistryConfig;
pub use error::ApiError;
pub use service::RegistryService;
pub use state::RegistryState;
pub use store::{MemoryVehicleStore, PgVehicleStore, VehicleStore};
