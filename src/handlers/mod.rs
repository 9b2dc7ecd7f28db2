pub mod stats;
pub mod user;
pub mod ws;
