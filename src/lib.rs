// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod adjust;
pub mod app_dirs;
pub mod catalog;
pub mod coach;
pub mod config;
pub mod generator;
pub mod mastery;
pub mod plan;
pub mod profile;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod store;
pub mod streak;

pub use coach::CoachError as Error;
