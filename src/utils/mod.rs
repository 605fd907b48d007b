pub mod logging;
pub mod prune;
