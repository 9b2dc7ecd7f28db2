pub mod stats;

pub use stats::{LanguageStats, StatsPeriod, UserStats};
