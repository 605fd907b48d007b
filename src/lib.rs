pub mod comms;
pub mod config;
pub mod gate;
pub mod security;
pub mod transport;
pub mod utils;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
