//! Headless player surface
//!
//! Implements the player contract without rendering anything: a clip "plays"
//! for a nominal duration scaled by the playback rate. Used by the CLI driver
//! and the REST server, and a faithful stand-in for a real surface in tests.
//!
//! Loads of uncached clips run on the fetch workers, tagged with the
//! scheduler epoch. Every load also takes a ticket; a fetch that finishes
//! after a newer load (or a halt) is dropped without touching the slot.

use crossbeam_channel::Sender;
use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::asset_cache::{AssetLoader, ClipHandle};
use crate::core::player::{ClipPlayer, PlayerError, PlayerEvent};
use crate::core::resolver::AssetId;
use crate::core::workers::Workers;

/// Clip ready to play
#[derive(Debug, Clone)]
struct LoadedClip {
    asset: AssetId,
    handle: ClipHandle,
}

/// Clip on the surface (playing or paused)
#[derive(Debug)]
struct Playback {
    asset: AssetId,
    epoch: u64,
    /// Media time left at 1x
    remaining: Duration,
    /// Wall time the current run started; None while paused
    running_since: Option<Instant>,
}

pub struct HeadlessPlayer {
    loader: Arc<dyn AssetLoader>,
    workers: Arc<Workers>,
    events: Sender<PlayerEvent>,
    clip_duration: Duration,
    rate: f32,
    slot: Arc<Mutex<Option<LoadedClip>>>,
    ticket: Arc<AtomicU64>,
    playback: Option<Playback>,
}

impl HeadlessPlayer {
    pub fn new(
        loader: Arc<dyn AssetLoader>,
        workers: Arc<Workers>,
        events: Sender<PlayerEvent>,
        clip_duration: Duration,
    ) -> Self {
        Self {
            loader,
            workers,
            events,
            clip_duration,
            rate: 1.0,
            slot: Arc::new(Mutex::new(None)),
            ticket: Arc::new(AtomicU64::new(0)),
            playback: None,
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Asset currently on the surface
    pub fn current_asset(&self) -> Option<&AssetId> {
        self.playback.as_ref().map(|p| &p.asset)
    }

    pub fn is_running(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.running_since.is_some())
    }

    /// Fold elapsed wall time into `remaining` at the current rate
    fn settle(&mut self, now: Instant) {
        let rate = self.rate;
        if let Some(pb) = &mut self.playback {
            if let Some(since) = pb.running_since {
                let consumed = media_time(now.saturating_duration_since(since), rate);
                pb.remaining = pb.remaining.saturating_sub(consumed);
                pb.running_since = Some(now);
            }
        }
    }

    /// Invalidate in-flight fetches and empty the slot; returns the new ticket
    fn reset_slot(&self, clip: Option<LoadedClip>) -> u64 {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let ticket = self.ticket.fetch_add(1, Ordering::AcqRel) + 1;
        *slot = clip;
        ticket
    }
}

/// Media time covered by `elapsed` wall time at `rate`, saturating
fn media_time(elapsed: Duration, rate: f32) -> Duration {
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * f64::from(rate)).unwrap_or(Duration::MAX)
}

impl ClipPlayer for HeadlessPlayer {
    fn load(&mut self, asset: &AssetId, cached: Option<ClipHandle>, epoch: u64) {
        self.playback = None;
        if let Some(handle) = cached {
            self.reset_slot(Some(LoadedClip { asset: asset.clone(), handle }));
            let _ = self.events.send(PlayerEvent::ready(epoch));
            return;
        }
        let ticket = self.reset_slot(None);

        let asset = asset.clone();
        let loader = Arc::clone(&self.loader);
        let slot = Arc::clone(&self.slot);
        let current_ticket = Arc::clone(&self.ticket);
        let events = self.events.clone();

        self.workers.execute_with_epoch(epoch, move || {
            let result = loader.fetch(&asset);
            // Ticket is only bumped under the slot lock
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            if current_ticket.load(Ordering::Acquire) != ticket {
                trace!("Dropping superseded fetch of {}", asset);
                return;
            }
            let event = match result {
                Ok(handle) => {
                    *guard = Some(LoadedClip { asset, handle });
                    PlayerEvent::ready(epoch)
                }
                Err(e) => PlayerEvent::error(epoch, e.to_string()),
            };
            drop(guard);
            let _ = events.send(event);
        });
    }

    fn play(&mut self, epoch: u64) -> Result<(), PlayerError> {
        let now = Instant::now();
        if let Some(pb) = &mut self.playback {
            if pb.running_since.is_none() {
                pb.running_since = Some(now);
                trace!("Resumed {}", pb.asset);
            }
            return Ok(());
        }

        let clip = self
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(PlayerError::NotLoaded)?;

        debug!(
            "Playing {} ({} bytes) at {}x",
            clip.asset,
            clip.handle.bytes,
            self.rate
        );
        self.playback = Some(Playback {
            asset: clip.asset,
            epoch,
            remaining: self.clip_duration,
            running_since: Some(now),
        });
        Ok(())
    }

    fn pause(&mut self) {
        self.settle(Instant::now());
        if let Some(pb) = &mut self.playback {
            pb.running_since = None;
        }
    }

    fn halt(&mut self) {
        self.reset_slot(None);
        self.playback = None;
    }

    fn set_playback_rate(&mut self, rate: f32) {
        if rate > 0.0 && rate.is_finite() {
            self.settle(Instant::now());
            self.rate = rate;
        }
    }

    fn tick(&mut self, now: Instant) {
        let rate = self.rate;
        let finished = match &self.playback {
            Some(Playback { running_since: Some(since), remaining, epoch, .. }) => {
                let consumed = media_time(now.saturating_duration_since(*since), rate);
                (consumed >= *remaining).then_some(*epoch)
            }
            _ => None,
        };
        if let Some(epoch) = finished {
            if let Some(pb) = self.playback.take() {
                trace!("Ended {}", pb.asset);
            }
            let _ = self.events.send(PlayerEvent::ended(epoch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset_cache::LoadError;
    use crate::core::player::PlayerEventKind;
    use crate::core::resolver::resolve_char;
    use crossbeam_channel::{Receiver, unbounded};
    use std::path::PathBuf;

    struct OnlyA;

    impl AssetLoader for OnlyA {
        fn fetch(&self, id: &AssetId) -> Result<ClipHandle, LoadError> {
            if id.as_str() == "A.clip" {
                Ok(ClipHandle { location: PathBuf::from("A.clip"), bytes: 10 })
            } else {
                Err(LoadError::Missing(id.clone()))
            }
        }
    }

    fn player(clip_ms: u64) -> (HeadlessPlayer, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        let workers = Arc::new(Workers::new(1, Arc::new(AtomicU64::new(0))));
        let p = HeadlessPlayer::new(Arc::new(OnlyA), workers, tx, Duration::from_millis(clip_ms));
        (p, rx)
    }

    fn recv(rx: &Receiver<PlayerEvent>) -> PlayerEvent {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_fetch_ready_then_ended() {
        let (mut p, rx) = player(100);
        p.load(&resolve_char('a').unwrap(), None, 0);
        assert_eq!(recv(&rx), PlayerEvent::ready(0));

        p.play(0).unwrap();
        let t0 = Instant::now();
        p.tick(t0);
        assert!(rx.try_recv().is_err());
        p.tick(t0 + Duration::from_millis(200));
        assert_eq!(recv(&rx), PlayerEvent::ended(0));
        assert!(p.current_asset().is_none());
    }

    #[test]
    fn test_missing_clip_reports_error() {
        let (mut p, rx) = player(100);
        p.load(&resolve_char('b').unwrap(), None, 0);
        assert!(matches!(recv(&rx).kind, PlayerEventKind::Error(_)));
        assert_eq!(p.play(0), Err(PlayerError::NotLoaded));
    }

    #[test]
    fn test_cached_handle_ready_immediately() {
        let (mut p, rx) = player(100);
        let handle = ClipHandle { location: PathBuf::from("Q.clip"), bytes: 1 };
        p.load(&resolve_char('q').unwrap(), Some(handle), 4);
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::ready(4));
        assert!(p.play(4).is_ok());
        assert_eq!(p.current_asset().unwrap().as_str(), "Q.clip");
    }

    #[test]
    fn test_pause_freezes_clip() {
        let (mut p, rx) = player(1000);
        let handle = ClipHandle { location: PathBuf::from("A.clip"), bytes: 1 };
        p.load(&resolve_char('a').unwrap(), Some(handle), 0);
        let _ = rx.try_recv();
        p.play(0).unwrap();
        p.pause();
        assert!(!p.is_running());

        p.tick(Instant::now() + Duration::from_secs(10));
        assert!(rx.try_recv().is_err());

        p.play(0).unwrap();
        assert!(p.is_running());
        p.tick(Instant::now() + Duration::from_secs(2));
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::ended(0));
    }

    #[test]
    fn test_rate_shortens_clip() {
        let (mut p, rx) = player(1000);
        p.set_playback_rate(2.0);
        let handle = ClipHandle { location: PathBuf::from("A.clip"), bytes: 1 };
        p.load(&resolve_char('a').unwrap(), Some(handle), 0);
        let _ = rx.try_recv();
        p.play(0).unwrap();

        let t0 = Instant::now();
        p.tick(t0 + Duration::from_millis(600));
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::ended(0));
        assert_eq!(p.rate(), 2.0);
    }

    /// Blocks every fetch until the test opens the gate
    struct GatedLoader {
        gate: Receiver<()>,
    }

    impl AssetLoader for GatedLoader {
        fn fetch(&self, id: &AssetId) -> Result<ClipHandle, LoadError> {
            let _ = self.gate.recv_timeout(Duration::from_secs(2));
            Ok(ClipHandle { location: PathBuf::from(id.as_str()), bytes: 1 })
        }
    }

    #[test]
    fn test_halt_drops_inflight_fetch() {
        let (gate_tx, gate_rx) = unbounded();
        let (tx, rx) = unbounded();
        let workers = Arc::new(Workers::new(1, Arc::new(AtomicU64::new(0))));
        let mut p = HeadlessPlayer::new(
            Arc::new(GatedLoader { gate: gate_rx }),
            workers,
            tx,
            Duration::from_millis(100),
        );

        p.load(&resolve_char('a').unwrap(), None, 0);
        p.halt();
        gate_tx.send(()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(p.play(0), Err(PlayerError::NotLoaded));
    }

    #[test]
    fn test_cached_load_after_halt_wins_over_late_fetch() {
        let (gate_tx, gate_rx) = unbounded();
        let (tx, rx) = unbounded();
        let workers = Arc::new(Workers::new(1, Arc::new(AtomicU64::new(0))));
        let mut p = HeadlessPlayer::new(
            Arc::new(GatedLoader { gate: gate_rx }),
            workers,
            tx,
            Duration::from_millis(100),
        );

        p.load(&resolve_char('a').unwrap(), None, 0);
        p.halt();
        let handle = ClipHandle { location: PathBuf::from("Q.clip"), bytes: 1 };
        p.load(&resolve_char('q').unwrap(), Some(handle), 1);
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::ready(1));

        gate_tx.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        p.play(1).unwrap();
        assert_eq!(p.current_asset().unwrap().as_str(), "Q.clip");
    }

    #[test]
    fn test_extreme_rate_saturates() {
        let (mut p, rx) = player(1000);
        p.set_playback_rate(1e30);
        let handle = ClipHandle { location: PathBuf::from("A.clip"), bytes: 1 };
        p.load(&resolve_char('a').unwrap(), Some(handle), 0);
        let _ = rx.try_recv();
        p.play(0).unwrap();

        std::thread::sleep(Duration::from_millis(2));
        p.pause();
        p.play(0).unwrap();
        p.tick(Instant::now() + Duration::from_millis(50));
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::ended(0));
    }

    #[test]
    fn test_media_time_scaling() {
        assert_eq!(media_time(Duration::from_millis(500), 4.0), Duration::from_secs(2));
        assert_eq!(media_time(Duration::from_secs(1), f32::MAX), Duration::MAX);
        assert_eq!(media_time(Duration::ZERO, 1e30), Duration::ZERO);
    }
}
