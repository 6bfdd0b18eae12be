//! Core engine modules - tokenizer, resolver, cache, scheduler, workers
//!
//! These modules form the playback engine, independent of any player surface.

pub mod asset_cache;
pub mod events;
pub mod highlight;
pub mod player;
pub mod resolver;
pub mod scheduler;
pub mod tokenizer;
pub mod workers;

// Re-exports for convenience
pub use asset_cache::{AssetCache, AssetLoader, ClipHandle, LoadError};
pub use events::{Notifier, SchedulerEvent, TransportCommand};
pub use player::{ClipPlayer, PlayerError, PlayerEvent, PlayerEventKind};
pub use resolver::{AssetId, resolve_char, resolve_word};
pub use scheduler::{PlaybackState, PlaybackUnit, Scheduler, SchedulerError, SchedulerSnapshot, UnitLabel};
pub use tokenizer::{Token, tokenize};
pub use workers::Workers;
