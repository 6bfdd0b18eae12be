//! Transport commands and scheduler notifications.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use super::scheduler::{PlaybackState, UnitLabel};

// === Transport Control ===

/// User-level transport command, as issued by the CLI or the REST API
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCommand {
    Submit(String),
    Play,
    Pause,
    Stop,
    Restart,
    Clear,
    SetSpeed(f32),
    Faster,
    Slower,
}

// === Notifications ===

/// Outbound notification for a presentation layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    StateChanged { state: PlaybackState },
    /// Word at `index` became the highlighted word
    WordStarted { index: usize, word: String },
    /// A clip (word or letter) started playing
    UnitStarted { label: UnitLabel },
    /// Word produced no playable unit at all
    WordSkipped { index: usize, word: String },
    /// Reached the end of the token sequence
    Finished,
}

/// Scheduler event sink (wraps Option<Sender>)
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    inner: Option<Sender<SchedulerEvent>>,
}

impl Notifier {
    /// No-op notifier
    pub fn dummy() -> Self {
        Self { inner: None }
    }

    pub fn from_sender(tx: Sender<SchedulerEvent>) -> Self {
        Self { inner: Some(tx) }
    }

    /// Send event (no-op if dummy or receiver gone)
    pub fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.inner {
            let _ = tx.send(event);
        }
    }
}
