//! signplay - text to sign-language clip playback
//!
//! Turns text into an ordered run of sign clips: one clip per word when the
//! store has it, finger-spelled letters otherwise. `core` holds the
//! scheduler and its contracts; `media` the concrete store and player.

// Scheduler engine (tokenizer, resolver, cache, player contract, workers)
pub mod core;

// Concrete collaborators
pub mod media;

// App modules
pub mod cli;
pub mod config;
pub mod runner;
pub mod server;

pub use crate::core::asset_cache::{AssetCache, AssetLoader, ClipHandle};
pub use crate::core::player::{ClipPlayer, PlayerEvent};
pub use crate::core::scheduler::{PlaybackState, Scheduler, SchedulerError};
pub use crate::media::{ClipStore, HeadlessPlayer};
