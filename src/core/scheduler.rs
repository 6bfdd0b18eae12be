//! Playback scheduler: word queue, spelling fallback and transport state machine
//!
//! **Architecture**: a passive state machine. It advances only when the owner
//! calls a transport method (`play`, `pause`, `stop`, ...), feeds it a
//! [`PlayerEvent`] via `handle_event()`, or calls `tick()` with the current
//! time. It never spawns or sleeps, so the owner decides the thread model
//! (see `runner.rs`) and tests drive time explicitly.
//!
//! # States
//!
//! `Idle -> Playing -> {Paused, Idle}`, `Paused -> {Playing, Idle}`.
//! End of sequence returns to `Idle` with the word index reset to 0.
//!
//! # Word expansion
//!
//! For each word (blank words are skipped):
//! 1. Highlight it and queue one word clip (`Hello.clip`). Single-character
//!    words queue their letter/digit clip directly.
//! 2. If the word clip fails to load or play, replace it with one letter clip
//!    per character, played back to back in order. A failing letter is skipped.
//! 3. When the queue drains, wait `word_gap / speed` and move to the next word.
//!
//! # Epoch guard
//!
//! Every load/play is tagged with the current epoch. `stop()` (and anything
//! built on it) bumps the epoch, so late events from an abandoned clip are
//! discarded instead of advancing a fresh sequence.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::asset_cache::AssetCache;
use super::events::{Notifier, SchedulerEvent};
use super::highlight::{HighlightedWord, highlight};
use super::player::{ClipPlayer, PlayerEvent, PlayerEventKind};
use super::resolver::{AssetId, resolve_char, resolve_word};
use super::tokenizer::{Token, tokenize};

/// Speed presets for faster/slower stepping
pub const SPEED_PRESETS: &[f32] = &[0.5, 1.0, 1.5, 2.0];

/// Pause between words at 1x speed
pub const DEFAULT_WORD_GAP: Duration = Duration::from_millis(300);

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Not active (initial, stopped or finished)
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playing or paused
    pub fn is_active(self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

/// Rejected transport call. State is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// play() with no submitted text
    NothingToPlay,
    /// submit() while playing
    Busy,
    /// Speed multiplier not finite and positive
    InvalidSpeed(f32),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::NothingToPlay => write!(f, "Nothing to play: submit some text first"),
            SchedulerError::Busy => write!(f, "Cannot submit text while playing"),
            SchedulerError::InvalidSpeed(s) => write!(f, "Invalid speed multiplier: {}", s),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Atomic thing the scheduler plays next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackUnit {
    /// Whole word as one clip
    Word { token: Token, asset_id: AssetId },
    /// One character of a word (spelling fallback)
    Letter { token: Token, char_index: usize, asset_id: AssetId },
}

impl PlaybackUnit {
    pub fn asset_id(&self) -> &AssetId {
        match self {
            PlaybackUnit::Word { asset_id, .. } | PlaybackUnit::Letter { asset_id, .. } => asset_id,
        }
    }

    pub fn token(&self) -> &Token {
        match self {
            PlaybackUnit::Word { token, .. } | PlaybackUnit::Letter { token, .. } => token,
        }
    }

    pub fn is_word(&self) -> bool {
        matches!(self, PlaybackUnit::Word { .. })
    }

    /// Caption for the presentation layer
    pub fn label(&self) -> UnitLabel {
        match self {
            PlaybackUnit::Word { token, .. } => UnitLabel::Word {
                text: token.sanitized.clone(),
            },
            PlaybackUnit::Letter { token, char_index, .. } => UnitLabel::Letter {
                ch: token.sanitized[*char_index..]
                    .chars()
                    .next()
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or('?'),
                word: token.sanitized.clone(),
            },
        }
    }
}

/// Current unit caption: "Signing: hello" or "Signing character: H from hello"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UnitLabel {
    Word { text: String },
    Letter { ch: char, word: String },
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitLabel::Word { text } => write!(f, "Signing: {}", text),
            UnitLabel::Letter { ch, word } => write!(f, "Signing character: {} from \"{}\"", ch, word),
        }
    }
}

/// Letter units for every alphanumeric character, left to right
fn letter_units(token: &Token) -> VecDeque<PlaybackUnit> {
    token
        .sanitized
        .char_indices()
        .filter_map(|(char_index, c)| {
            resolve_char(c).map(|asset_id| PlaybackUnit::Letter {
                token: token.clone(),
                char_index,
                asset_id,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// load() issued, waiting for Ready
    Loading,
    /// Ready arrived while paused
    Loaded,
    /// play() accepted (may be paused on the surface)
    Playing,
}

#[derive(Debug)]
struct InFlight {
    unit: PlaybackUnit,
    stage: Stage,
}

/// What the scheduler is waiting on
#[derive(Debug)]
enum Step {
    /// Nothing scheduled
    Idle,
    /// One unit loading or playing
    Unit(InFlight),
    /// Unit finished or failed while paused; next unit starts on resume
    Advance,
    /// Inter-word delay. `started` is set on the first tick after arming.
    Gap { started: Option<Instant>, delay: Duration },
}

/// Serializable copy of everything a presentation layer shows
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub session: Uuid,
    pub state: PlaybackState,
    pub word_index: usize,
    pub highlighted: Option<usize>,
    pub unit: Option<UnitLabel>,
    pub speed: f32,
    pub tokens: usize,
    pub status: String,
}

/// Playback scheduler over one player adapter.
pub struct Scheduler<P: ClipPlayer> {
    player: P,
    cache: Arc<AssetCache>,
    notifier: Notifier,
    /// Epoch counter (shared with the fetch workers)
    epoch: Arc<AtomicU64>,
    session: Uuid,
    tokens: Vec<Token>,
    state: PlaybackState,
    /// Index of the word driving playback (unit of resumability)
    position: usize,
    /// Pending units of the current word
    queue: VecDeque<PlaybackUnit>,
    step: Step,
    /// Current word has a highlighted, in-progress expansion
    word_active: bool,
    /// Some unit of the current word played to the end
    word_played: bool,
    speed: f32,
    word_gap: Duration,
}

impl<P: ClipPlayer> Scheduler<P> {
    pub fn new(player: P, cache: Arc<AssetCache>, epoch: Arc<AtomicU64>) -> Self {
        Self {
            player,
            cache,
            notifier: Notifier::dummy(),
            epoch,
            session: Uuid::new_v4(),
            tokens: Vec::new(),
            state: PlaybackState::Idle,
            position: 0,
            queue: VecDeque::new(),
            step: Step::Idle,
            word_active: false,
            word_played: false,
            speed: 1.0,
            word_gap: DEFAULT_WORD_GAP,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Base inter-word delay (at 1x speed)
    pub fn with_word_gap(mut self, gap: Duration) -> Self {
        self.word_gap = gap;
        self
    }

    // === Transport ===

    /// Replace the token sequence with `text`. Not allowed while playing.
    pub fn submit(&mut self, text: &str) -> Result<(), SchedulerError> {
        if self.state == PlaybackState::Playing {
            return Err(SchedulerError::Busy);
        }
        if self.state == PlaybackState::Paused {
            self.stop();
        }
        self.tokens = tokenize(text);
        self.position = 0;
        self.word_active = false;
        self.session = Uuid::new_v4();
        info!("Submitted {} tokens (session {})", self.tokens.len(), self.session);
        Ok(())
    }

    /// Start from the current word, or resume the paused unit.
    pub fn play(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            PlaybackState::Playing => {
                trace!("play(): already playing");
                Ok(())
            }
            PlaybackState::Paused => {
                self.set_state(PlaybackState::Playing);
                self.resume();
                Ok(())
            }
            PlaybackState::Idle => {
                if self.tokens.is_empty() {
                    return Err(SchedulerError::NothingToPlay);
                }
                info!("Playback started at word {}", self.position);
                self.set_state(PlaybackState::Playing);
                self.begin_word();
                Ok(())
            }
        }
    }

    /// Pause the in-flight unit (or the inter-word delay). No-op unless playing.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            trace!("pause(): not playing ({:?})", self.state);
            return;
        }
        match &mut self.step {
            Step::Unit(_) => self.player.pause(),
            Step::Gap { started, .. } => *started = None,
            Step::Advance | Step::Idle => {}
        }
        self.set_state(PlaybackState::Paused);
        debug!("Paused at word {}", self.position);
    }

    /// Abandon everything and rewind to the first word.
    pub fn stop(&mut self) {
        let epoch = self.bump_epoch();
        self.queue.clear();
        self.step = Step::Idle;
        self.player.halt();
        self.position = 0;
        self.word_active = false;
        self.word_played = false;
        self.set_state(PlaybackState::Idle);
        debug!("Stopped (epoch {})", epoch);
    }

    /// Stop, then play from the first word.
    ///
    /// `halt()` is synchronous and the epoch is already bumped, so nothing
    /// from the previous run can reach the new one.
    pub fn restart(&mut self) -> Result<(), SchedulerError> {
        self.stop();
        self.play()
    }

    /// Stop and drop the submitted text
    pub fn clear(&mut self) {
        self.stop();
        self.tokens.clear();
        info!("Text cleared");
    }

    /// Set the speed multiplier; applied to the player immediately.
    pub fn set_speed(&mut self, speed: f32) -> Result<(), SchedulerError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SchedulerError::InvalidSpeed(speed));
        }
        self.speed = speed;
        self.player.set_playback_rate(speed);
        info!("Speed set to {}x", speed);
        Ok(())
    }

    /// Step to the next faster preset. Returns the resulting speed.
    pub fn faster(&mut self) -> f32 {
        if let Some(&next) = SPEED_PRESETS.iter().find(|&&s| s > self.speed) {
            self.apply_preset(next);
        }
        self.speed
    }

    /// Step to the next slower preset. Returns the resulting speed.
    pub fn slower(&mut self) -> f32 {
        if let Some(&next) = SPEED_PRESETS.iter().rev().find(|&&s| s < self.speed) {
            self.apply_preset(next);
        }
        self.speed
    }

    fn apply_preset(&mut self, speed: f32) {
        self.speed = speed;
        self.player.set_playback_rate(speed);
        info!("Speed set to {}x", speed);
    }

    // === Event input ===

    /// Feed one player notification.
    pub fn handle_event(&mut self, event: PlayerEvent) {
        let current = self.epoch();
        if event.epoch != current {
            debug!("Discarding stale {:?} (epoch {} != {})", event.kind, event.epoch, current);
            return;
        }
        let Step::Unit(inflight) = &mut self.step else {
            trace!("Ignoring {:?}: no unit in flight", event.kind);
            return;
        };

        match event.kind {
            PlayerEventKind::Ready => {
                if inflight.stage != Stage::Loading {
                    trace!("Duplicate Ready for {}", inflight.unit.asset_id());
                    return;
                }
                inflight.stage = Stage::Loaded;
                if self.state == PlaybackState::Playing {
                    self.start_unit();
                }
            }
            PlayerEventKind::Ended => {
                if inflight.stage != Stage::Playing {
                    trace!("Ignoring Ended before play for {}", inflight.unit.asset_id());
                    return;
                }
                self.unit_finished();
            }
            PlayerEventKind::Error(msg) => self.unit_failed(&msg),
        }
    }

    /// Advance timers: the inter-word delay and the player's own clock.
    pub fn tick(&mut self, now: Instant) {
        self.player.tick(now);
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Step::Gap { started, delay } = &mut self.step {
            let start = *started.get_or_insert(now);
            if now.saturating_duration_since(start) >= *delay {
                self.position += 1;
                self.begin_word();
            }
        }
    }

    // === Sequencing ===

    fn resume(&mut self) {
        match &mut self.step {
            Step::Unit(inflight) => {
                // Loading: the pending Ready starts it
                if inflight.stage != Stage::Loading {
                    self.start_unit();
                }
            }
            Step::Gap { .. } => {
                self.step = Step::Gap {
                    started: None,
                    delay: self.current_word_gap(),
                };
            }
            Step::Advance => self.next_unit(),
            Step::Idle => self.begin_word(),
        }
        debug!("Resumed at word {}", self.position);
    }

    /// Expand the word at `position`, skipping blank words.
    fn begin_word(&mut self) {
        self.queue.clear();
        while let Some(token) = self.tokens.get(self.position) {
            if token.is_blank() {
                trace!("Skipping blank token {:?}", token.raw);
                self.position += 1;
                continue;
            }
            let token = token.clone();
            self.word_active = true;
            self.word_played = false;
            self.notifier.emit(SchedulerEvent::WordStarted {
                index: token.index,
                word: token.raw.clone(),
            });

            self.queue = match resolve_word(&token) {
                Some(asset_id) if token.char_count() > 1 => {
                    VecDeque::from([PlaybackUnit::Word { token, asset_id }])
                }
                _ => letter_units(&token),
            };
            self.next_unit();
            return;
        }
        self.finish();
    }

    fn next_unit(&mut self) {
        match self.queue.pop_front() {
            Some(unit) => self.load_unit(unit),
            None => self.word_done(),
        }
    }

    fn load_unit(&mut self, unit: PlaybackUnit) {
        let epoch = self.epoch();
        let asset_id = unit.asset_id().clone();
        // Word clips are never cached
        let cached = if unit.is_word() { None } else { self.cache.get(asset_id.as_str()) };
        trace!("Loading {} (cached={}, epoch {})", asset_id, cached.is_some(), epoch);

        self.step = Step::Unit(InFlight { unit, stage: Stage::Loading });
        self.player.set_playback_rate(self.speed);
        self.player.load(&asset_id, cached, epoch);
    }

    /// Call play() on the loaded (or paused) unit
    fn start_unit(&mut self) {
        let epoch = self.epoch();
        let result = self.player.play(epoch);
        let Step::Unit(inflight) = &mut self.step else {
            return;
        };
        match result {
            Ok(()) => {
                if inflight.stage != Stage::Playing {
                    inflight.stage = Stage::Playing;
                    let label = inflight.unit.label();
                    trace!("{}", label);
                    self.notifier.emit(SchedulerEvent::UnitStarted { label });
                }
            }
            Err(e) => self.unit_failed(&e.to_string()),
        }
    }

    fn unit_finished(&mut self) {
        if let Step::Unit(inflight) = std::mem::replace(&mut self.step, Step::Advance) {
            trace!("Finished {}", inflight.unit.asset_id());
        }
        self.word_played = true;
        self.continue_word();
    }

    fn unit_failed(&mut self, reason: &str) {
        if let Step::Unit(inflight) = std::mem::replace(&mut self.step, Step::Advance) {
            match inflight.unit {
                PlaybackUnit::Word { token, asset_id } => {
                    debug!("Word clip {} unavailable ({}), spelling {:?}", asset_id, reason, token.sanitized);
                    self.queue = letter_units(&token);
                }
                PlaybackUnit::Letter { asset_id, .. } => {
                    warn!("Letter clip {} unavailable ({}), skipping", asset_id, reason);
                }
            }
        }
        self.continue_word();
    }

    /// Next unit now, or on resume if paused
    fn continue_word(&mut self) {
        if self.state == PlaybackState::Playing {
            self.next_unit();
        }
    }

    fn word_done(&mut self) {
        if !self.word_played {
            if let Some(token) = self.tokens.get(self.position) {
                warn!("No clip could be played for {:?}, skipping word", token.raw);
                self.notifier.emit(SchedulerEvent::WordSkipped {
                    index: token.index,
                    word: token.raw.clone(),
                });
            }
        }
        self.step = Step::Gap {
            started: None,
            delay: self.current_word_gap(),
        };
    }

    fn finish(&mut self) {
        info!("Sequence finished");
        self.queue.clear();
        self.step = Step::Idle;
        self.position = 0;
        self.word_active = false;
        self.set_state(PlaybackState::Idle);
        self.notifier.emit(SchedulerEvent::Finished);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            trace!("State {:?} -> {:?}", self.state, state);
            self.state = state;
            self.notifier.emit(SchedulerEvent::StateChanged { state });
        }
    }

    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// `word_gap / speed`, rounded to whole nanoseconds
    fn current_word_gap(&self) -> Duration {
        let nanos = self.word_gap.as_nanos() as f64 / f64::from(self.speed);
        Duration::from_nanos(nanos.round() as u64)
    }

    // === Accessors ===

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the word driving playback
    pub fn word_index(&self) -> usize {
        self.position
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Highlighted word index, if any
    pub fn highlighted(&self) -> Option<usize> {
        self.highlight_active().then_some(self.position)
    }

    fn highlight_active(&self) -> bool {
        self.word_active && self.state.is_active()
    }

    pub fn highlight_view(&self) -> Vec<HighlightedWord<'_>> {
        highlight(&self.tokens, self.position, self.highlight_active())
    }

    /// Unit loading or playing right now
    pub fn current_unit(&self) -> Option<&PlaybackUnit> {
        match &self.step {
            Step::Unit(inflight) => Some(&inflight.unit),
            _ => None,
        }
    }

    pub fn current_label(&self) -> Option<UnitLabel> {
        self.current_unit().map(PlaybackUnit::label)
    }

    /// Units still queued for the current word
    pub fn pending_units(&self) -> impl Iterator<Item = &PlaybackUnit> {
        self.queue.iter()
    }

    /// Inter-word delay being waited on, if any
    pub fn pending_gap(&self) -> Option<Duration> {
        match &self.step {
            Step::Gap { delay, .. } => Some(*delay),
            _ => None,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    pub fn status_line(&self) -> &'static str {
        match self.state {
            PlaybackState::Playing => "Playing...",
            PlaybackState::Paused => "Paused - play to continue",
            PlaybackState::Idle if self.tokens.is_empty() => "Submit some text to convert to sign language",
            PlaybackState::Idle => "Ready to start",
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            session: self.session,
            state: self.state,
            word_index: self.position,
            highlighted: self.highlighted(),
            unit: self.current_label(),
            speed: self.speed,
            tokens: self.tokens.len(),
            status: self.status_line().to_string(),
        }
    }
}
