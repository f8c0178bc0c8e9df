// region:    --- Modules
pub mod auction;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod payment;
pub mod query;
pub mod relay;
pub mod scheduler;
pub mod settlement;
pub mod store;

// endregion: --- Modules
