pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod io;
pub mod lifecycle;
pub mod model;
pub mod paths;
pub mod progress;
pub mod query;
pub mod schedule;
pub mod store;
pub mod types;
pub mod workspace;

pub use error::{CrewtrackError, PermissionDenied, Result};
