pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use error::DevsyncError;
pub use github::{GitHubClient, GitHubSource};
pub use service::{BatchScheduler, HubHandle, SyncService};
