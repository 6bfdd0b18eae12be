//! Player adapter contract
//!
//! The scheduler drives exactly one visual-media surface through this trait.
//! Calls are fire-and-forget: outcomes of `load` (ready or error) and the end
//! of a clip arrive later as [`PlayerEvent`]s tagged with the epoch passed in.
//! The scheduler discards events whose epoch is no longer current.
//!
//! `play` may also reject synchronously, which the scheduler treats the same
//! as an error event for the in-flight unit.

use std::fmt;
use std::time::Instant;

use super::asset_cache::ClipHandle;
use super::resolver::AssetId;

/// Notification kinds emitted by a player adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// Loaded clip can start
    Ready,
    /// Clip played to its end
    Ended,
    /// Load or playback failed
    Error(String),
}

/// Player notification tagged with the epoch of the call that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    pub epoch: u64,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn ready(epoch: u64) -> Self {
        Self { epoch, kind: PlayerEventKind::Ready }
    }

    pub fn ended(epoch: u64) -> Self {
        Self { epoch, kind: PlayerEventKind::Ended }
    }

    pub fn error(epoch: u64, msg: impl Into<String>) -> Self {
        Self { epoch, kind: PlayerEventKind::Error(msg.into()) }
    }
}

/// Synchronous rejection of a `play` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Nothing loaded
    NotLoaded,
    /// Surface refused to start playback
    Rejected(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::NotLoaded => write!(f, "No clip loaded"),
            PlayerError::Rejected(e) => write!(f, "Playback rejected: {}", e),
        }
    }
}

impl std::error::Error for PlayerError {}

/// Single visual-media surface
pub trait ClipPlayer {
    /// Start loading `asset`. `cached` carries the preloaded handle when the
    /// cache has one. Answer with Ready or Error for `epoch`.
    fn load(&mut self, asset: &AssetId, cached: Option<ClipHandle>, epoch: u64);

    /// Start (or resume) the loaded clip. Emits Ended for `epoch` when done.
    fn play(&mut self, epoch: u64) -> Result<(), PlayerError>;

    /// Freeze the clip at its current position
    fn pause(&mut self);

    /// Stop and rewind. Returns only once the surface is reset.
    fn halt(&mut self);

    /// Playback rate for the current clip (in place) and future loads
    fn set_playback_rate(&mut self, rate: f32);

    /// Advance internal timers. Surfaces with their own clock ignore this.
    fn tick(&mut self, _now: Instant) {}
}
