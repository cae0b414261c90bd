pub mod auth_middleware;
pub mod plates;
pub mod roles;

pub use roles::Role;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
