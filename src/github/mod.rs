//! GitHub source adapter: the REST client and the wire types it decodes.

pub mod client;
pub mod types;

pub use client::{GitHubClient, GitHubSource};
pub use types::{GitHubEvent, GitHubRepo};

/// Page size requested from GitHub; a shorter page marks the end of a listing.
pub const PER_PAGE: usize = 100;
