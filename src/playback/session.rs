//! Reading sessions and completion reporting
//!
//! A session spans one engine bound to one source text, from `start` to
//! teardown. It completes at most once, and only when the content runs out.
//! Resets and teardowns abandon the session without reporting it.

use crate::playback::state::ReadingMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Receives one call per naturally completed session
pub trait StatsRecorder: Send + Sync {
    fn record_session(&self, word_count: usize, duration: Duration);
}

/// Notified after each completed session (rating prompts, paywall milestones)
pub trait CompletionListener: Send + Sync {
    fn session_completed(&self, summary: &SessionSummary);
}

impl<F> CompletionListener for F
where
    F: Fn(&SessionSummary) + Send + Sync,
{
    fn session_completed(&self, summary: &SessionSummary) {
        self(summary)
    }
}

/// Payload of the completion event
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub mode: ReadingMode,
    pub word_count: usize,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Reading speed over the whole session, pauses included
    pub fn words_per_minute(&self) -> f64 {
        let minutes = self.duration.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        self.word_count as f64 / minutes
    }
}

/// Ephemeral state of one reading session
#[derive(Clone, Debug)]
pub struct ReadingSession {
    id: Uuid,
    mode: ReadingMode,
    source_text: Arc<str>,
    word_count: usize,
    started_at: Option<Instant>,
    completed: bool,
}

impl ReadingSession {
    pub fn new(mode: ReadingMode, source_text: impl Into<Arc<str>>, word_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            source_text: source_text.into(),
            word_count,
            started_at: None,
            completed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Shared handle to the unmodified source text
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.source_text)
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Record the first transition into `Playing`
    pub fn mark_playing(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Mark the session complete. Returns `None` if it already completed.
    pub fn complete(&mut self, now: Instant) -> Option<SessionSummary> {
        if self.completed {
            return None;
        }
        self.completed = true;

        let duration = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or(Duration::ZERO);

        Some(SessionSummary {
            session_id: self.id,
            mode: self.mode,
            word_count: self.word_count,
            duration,
            completed_at: Utc::now(),
        })
    }
}

/// Fans a completed session out to the stats and rating collaborators
#[derive(Clone, Default)]
pub struct CompletionReporter {
    stats: Option<Arc<dyn StatsRecorder>>,
    listeners: Vec<Arc<dyn CompletionListener>>,
}

impl CompletionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stats collaborator
    pub fn with_stats(mut self, stats: Arc<dyn StatsRecorder>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Add a completion listener
    pub fn with_listener(mut self, listener: Arc<dyn CompletionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Record the session, then notify listeners
    pub fn report(&self, summary: &SessionSummary) {
        info!(
            "{} session completed: {} words in {:.1}s",
            summary.mode,
            summary.word_count,
            summary.duration.as_secs_f64()
        );

        if let Some(stats) = &self.stats {
            stats.record_session(summary.word_count, summary.duration);
        }

        for listener in &self.listeners {
            listener.session_completed(summary);
        }

        debug!("Notified {} completion listeners", self.listeners.len());
    }
}

impl std::fmt::Debug for CompletionReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionReporter")
            .field("stats", &self.stats.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
