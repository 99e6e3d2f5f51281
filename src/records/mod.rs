//! Stats and history collaborators fed by completed sessions

pub mod history;
pub mod stats;

pub use history::{ReadingHistory, ReadingHistoryItem, MAX_HISTORY_ITEMS};
pub use stats::{DailyStats, ReadingStats, StatsRepository, DAILY_RETENTION_DAYS};
