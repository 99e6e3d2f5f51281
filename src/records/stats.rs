//! Reading statistics and streaks

use crate::playback::session::StatsRecorder;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Days of per-day history kept
pub const DAILY_RETENTION_DAYS: usize = 90;

/// Totals for one calendar day (UTC)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub words_read: usize,
    /// Seconds
    pub time_spent: f64,
    pub sessions_completed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingStats {
    pub total_words_read: usize,
    /// Seconds
    pub total_time_spent: f64,
    pub sessions_completed: usize,
    pub streak_days: u32,
    pub longest_streak: u32,
    pub last_read_date: Option<DateTime<Utc>>,
    /// Newest first
    pub daily_stats: Vec<DailyStats>,
}

impl ReadingStats {
    /// Average words per minute over all recorded time, 0 if none
    pub fn average_wpm(&self) -> u32 {
        if self.total_time_spent <= 0.0 {
            return 0;
        }
        let minutes = self.total_time_spent / 60.0;
        (self.total_words_read as f64 / minutes) as u32
    }

    /// "1h 5m", or "5m" under an hour
    pub fn formatted_total_time(&self) -> String {
        let total = self.total_time_spent as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }

    pub fn streak_text(&self) -> String {
        match self.streak_days {
            0 => "Start reading to build a streak!".to_string(),
            1 => "1 day".to_string(),
            n => format!("{} days", n),
        }
    }

    pub fn longest_streak_text(&self) -> String {
        match self.longest_streak {
            0 => "No streak yet".to_string(),
            1 => "1 day".to_string(),
            n => format!("{} days", n),
        }
    }

    fn record(&mut self, word_count: usize, duration: Duration, at: DateTime<Utc>) {
        let seconds = duration.as_secs_f64();
        self.total_words_read += word_count;
        self.total_time_spent += seconds;
        self.sessions_completed += 1;

        self.update_daily(word_count, seconds, at.date_naive());
        self.update_streak(at);
    }

    fn update_daily(&mut self, word_count: usize, seconds: f64, day: NaiveDate) {
        match self.daily_stats.iter_mut().find(|d| d.date == day) {
            Some(daily) => {
                daily.words_read += word_count;
                daily.time_spent += seconds;
                daily.sessions_completed += 1;
            }
            None => self.daily_stats.push(DailyStats {
                date: day,
                words_read: word_count,
                time_spent: seconds,
                sessions_completed: 1,
            }),
        }

        self.daily_stats.sort_by(|a, b| b.date.cmp(&a.date));
        self.daily_stats.truncate(DAILY_RETENTION_DAYS);
    }

    fn update_streak(&mut self, at: DateTime<Utc>) {
        let today = at.date_naive();
        match self.last_read_date {
            None => {
                self.streak_days = 1;
                self.longest_streak = 1;
            }
            Some(last) => match (today - last.date_naive()).num_days() {
                0 => {}
                1 => {
                    self.streak_days += 1;
                    self.longest_streak = self.longest_streak.max(self.streak_days);
                }
                _ => self.streak_days = 1,
            },
        }
        self.last_read_date = Some(at);
    }
}

/// Thread-safe, in-memory statistics store
#[derive(Debug, Clone, Default)]
pub struct StatsRepository {
    stats: Arc<RwLock<ReadingStats>>,
}

impl StatsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved statistics
    pub fn with_stats(stats: ReadingStats) -> Self {
        Self {
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    /// Record a completed session that ended at `at`
    pub fn record_session_at(&self, word_count: usize, duration: Duration, at: DateTime<Utc>) {
        let mut stats = self.stats.write();
        stats.record(word_count, duration, at);
        debug!(
            "Recorded session: {} words in {:.1}s, streak {}",
            word_count,
            duration.as_secs_f64(),
            stats.streak_days
        );
    }

    pub fn snapshot(&self) -> ReadingStats {
        self.stats.read().clone()
    }

    pub fn reset(&self) {
        *self.stats.write() = ReadingStats::default();
    }
}

impl StatsRecorder for StatsRepository {
    fn record_session(&self, word_count: usize, duration: Duration) {
        self.record_session_at(word_count, duration, Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, hour, 0, 0).unwrap()
    }

    fn mins(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[test]
    fn test_totals_accumulate() {
        let repo = StatsRepository::new();
        repo.record_session_at(300, mins(2), day(1, 9));
        repo.record_session_at(100, mins(1), day(1, 18));

        let stats = repo.snapshot();
        assert_eq!(stats.total_words_read, 400);
        assert_eq!(stats.sessions_completed, 2);
        assert_eq!(stats.average_wpm(), 133);
        assert_eq!(stats.daily_stats.len(), 1);
        assert_eq!(stats.daily_stats[0].sessions_completed, 2);
    }

    #[test]
    fn test_average_wpm_without_time() {
        assert_eq!(ReadingStats::default().average_wpm(), 0);
    }

    #[test]
    fn test_formatted_total_time() {
        let mut stats = ReadingStats::default();
        stats.total_time_spent = 300.0;
        assert_eq!(stats.formatted_total_time(), "5m");
        stats.total_time_spent = 3900.0;
        assert_eq!(stats.formatted_total_time(), "1h 5m");
    }

    #[test]
    fn test_streak_rules() {
        let repo = StatsRepository::new();
        repo.record_session_at(10, mins(1), day(1, 10));
        let stats = repo.snapshot();
        assert_eq!((stats.streak_days, stats.longest_streak), (1, 1));

        // Same day leaves the streak alone
        repo.record_session_at(10, mins(1), day(1, 22));
        assert_eq!(repo.snapshot().streak_days, 1);

        repo.record_session_at(10, mins(1), day(2, 8));
        repo.record_session_at(10, mins(1), day(3, 8));
        let stats = repo.snapshot();
        assert_eq!((stats.streak_days, stats.longest_streak), (3, 3));

        // A gap restarts the streak but keeps the record
        repo.record_session_at(10, mins(1), day(6, 8));
        let stats = repo.snapshot();
        assert_eq!((stats.streak_days, stats.longest_streak), (1, 3));
        assert_eq!(stats.streak_text(), "1 day");
        assert_eq!(stats.longest_streak_text(), "3 days");
    }

    #[test]
    fn test_daily_history_is_capped_newest_first() {
        let repo = StatsRepository::new();
        let start = day(1, 12);
        for i in 0..100 {
            repo.record_session_at(1, mins(1), start + chrono::Duration::days(i));
        }

        let stats = repo.snapshot();
        assert_eq!(stats.daily_stats.len(), DAILY_RETENTION_DAYS);
        assert!(stats.daily_stats[0].date > stats.daily_stats[1].date);
        assert_eq!(
            stats.daily_stats[0].date,
            (start + chrono::Duration::days(99)).date_naive()
        );
    }

    #[test]
    fn test_reset() {
        let repo = StatsRepository::new();
        repo.record_session(50, mins(1));
        repo.reset();
        assert_eq!(repo.snapshot(), ReadingStats::default());
    }

    #[test]
    fn test_stats_round_trip_json() {
        let repo = StatsRepository::new();
        repo.record_session_at(120, mins(1), day(4, 7));
        let json = serde_json::to_string(&repo.snapshot()).unwrap();
        let restored: ReadingStats = serde_json::from_str(&json).unwrap();
        assert_eq!(StatsRepository::with_stats(restored).snapshot(), repo.snapshot());
    }
}
