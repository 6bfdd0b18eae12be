//! Application runner: wires store, cache, player and scheduler, then drives
//! the scheduler from a single loop.
//!
//! The scheduler is passive. This loop owns it and feeds it three inputs:
//! player events (from fetch workers and the headless clock), transport
//! commands (from the REST API), and a periodic tick for timers.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use crate::cli::Args;
use crate::config::{self, PathConfig, Settings};
use crate::core::asset_cache::AssetCache;
use crate::core::events::{Notifier, SchedulerEvent, TransportCommand};
use crate::core::player::PlayerEvent;
use crate::core::scheduler::{PlaybackState, Scheduler, SchedulerError};
use crate::core::workers::Workers;
use crate::media::{ClipStore, HeadlessPlayer};
use crate::server::{ApiCommand, ApiServer, SharedApiState, WordSnapshot};

/// Loop wakeup when no input arrives
const TICK: Duration = Duration::from_millis(10);

/// How the loop reports progress to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    /// Print each clip label to stdout
    Stdout,
    /// Log only
    Quiet,
}

/// Everything one playback session needs, owned by the run loop
pub struct Session {
    scheduler: Scheduler<HeadlessPlayer>,
    cache: Arc<AssetCache>,
    player_rx: Receiver<PlayerEvent>,
    notes_rx: Receiver<SchedulerEvent>,
    echo: Echo,
}

impl Session {
    /// Build the collaborator graph from settings.
    pub fn build(settings: &Settings) -> Result<Self> {
        if !settings.assets_dir.is_dir() {
            warn!(
                "Assets directory {} does not exist; every clip will be missing",
                settings.assets_dir.display()
            );
        }

        let epoch = Arc::new(AtomicU64::new(0));
        let threads = settings.workers.unwrap_or_else(Workers::default_threads).max(1);
        let workers = Arc::new(Workers::new(threads, Arc::clone(&epoch)));
        info!("Fetch pool: {} threads", threads);

        let store = Arc::new(ClipStore::new(&settings.assets_dir));
        info!("Clip store: {}", store.root().display());
        let cache = Arc::new(AssetCache::new(store, Arc::clone(&workers)));
        if settings.preload_alphabet {
            cache.preload_alphabet();
        }

        let (player_tx, player_rx) = unbounded();
        let player = HeadlessPlayer::new(cache.loader(), workers, player_tx, settings.clip_duration());

        let (notes_tx, notes_rx) = unbounded();
        let mut scheduler = Scheduler::new(player, Arc::clone(&cache), epoch)
            .with_notifier(Notifier::from_sender(notes_tx))
            .with_word_gap(settings.word_gap());
        scheduler
            .set_speed(settings.speed)
            .with_context(|| format!("Bad speed in settings: {}", settings.speed))?;

        Ok(Self {
            scheduler,
            cache,
            player_rx,
            notes_rx,
            echo: Echo::Quiet,
        })
    }

    pub fn with_echo(mut self, echo: Echo) -> Self {
        self.echo = echo;
        self
    }

    pub fn scheduler(&self) -> &Scheduler<HeadlessPlayer> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<HeadlessPlayer> {
        &mut self.scheduler
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Apply one transport command
    pub fn apply(&mut self, command: TransportCommand) -> Result<(), SchedulerError> {
        debug!("Command: {:?}", command);
        let s = &mut self.scheduler;
        match command {
            TransportCommand::Submit(text) => s.submit(&text),
            TransportCommand::Play => s.play(),
            TransportCommand::Pause => {
                s.pause();
                Ok(())
            }
            TransportCommand::Stop => {
                s.stop();
                Ok(())
            }
            TransportCommand::Restart => s.restart(),
            TransportCommand::Clear => {
                s.clear();
                Ok(())
            }
            TransportCommand::SetSpeed(speed) => s.set_speed(speed),
            TransportCommand::Faster => {
                s.faster();
                Ok(())
            }
            TransportCommand::Slower => {
                s.slower();
                Ok(())
            }
        }
    }

    /// One pass without waiting: drain player events, advance timers.
    pub fn pump(&mut self) {
        while let Ok(event) = self.player_rx.try_recv() {
            self.scheduler.handle_event(event);
        }
        self.scheduler.tick(Instant::now());
        self.drain_notifications();
    }

    /// Run until idle (CLI) or until the command channel closes (server).
    pub fn run(&mut self, commands: &Receiver<ApiCommand>, shared: Option<&SharedApiState>, exit_when_idle: bool) {
        let player_rx = self.player_rx.clone();
        loop {
            select! {
                recv(player_rx) -> event => {
                    if let Ok(event) = event {
                        self.scheduler.handle_event(event);
                    }
                }
                recv(commands) -> msg => match msg {
                    Ok(ApiCommand { command, reply }) => {
                        let result = self.apply(command);
                        if let Err(e) = &result {
                            warn!("Rejected: {}", e);
                        }
                        let _ = reply.send(result);
                    }
                    Err(_) => {
                        info!("Command channel closed");
                        break;
                    }
                },
                default(TICK) => {}
            }

            self.scheduler.tick(Instant::now());
            self.drain_notifications();
            if let Some(shared) = shared {
                self.publish(shared);
            }

            if exit_when_idle && self.scheduler.state() == PlaybackState::Idle {
                break;
            }
        }
    }

    /// Push fresh snapshots to the API state
    pub fn publish(&self, shared: &SharedApiState) {
        let words = self.scheduler.highlight_view().iter().map(WordSnapshot::from).collect();
        shared.publish(self.scheduler.snapshot(), words, self.cache.snapshot());
    }

    fn drain_notifications(&self) {
        for note in self.notes_rx.try_iter() {
            match &note {
                SchedulerEvent::UnitStarted { label } => {
                    info!("{}", label);
                    if self.echo == Echo::Stdout {
                        println!("{}", label);
                    }
                }
                SchedulerEvent::WordSkipped { index, word } => {
                    warn!("No clip for word {} ({:?}), skipped", index, word);
                }
                SchedulerEvent::Finished => {
                    info!("Finished");
                    if self.echo == Echo::Stdout {
                        println!("Done.");
                    }
                }
                other => trace!("{:?}", other),
            }
        }
    }
}

/// Run signplay with parsed arguments.
///
/// With TEXT and no `--serve`: play once and exit. With `--serve`: start the
/// REST API, optionally play TEXT right away, and keep serving.
pub fn run_app(args: Args, paths: &PathConfig) -> Result<()> {
    let mut settings = Settings::load(paths)?;
    settings.apply_args(&args);
    debug!("Settings: {:?}", settings);
    info!("Assets: {}", settings.assets_dir.display());
    info!("Config: {}", config::config_file(config::SETTINGS_FILE, paths).display());

    if args.text.is_none() && !args.serve {
        bail!("Nothing to do: pass TEXT to sign or --serve to accept commands");
    }

    let echo = if args.serve { Echo::Quiet } else { Echo::Stdout };
    let mut session = Session::build(&settings)?.with_echo(echo);

    if let Some(text) = &args.text {
        session.scheduler_mut().submit(text)?;
        session.scheduler_mut().play()?;
    }

    if args.serve {
        let shared = Arc::new(SharedApiState::new(session.scheduler().snapshot(), session.cache().snapshot()));
        let commands = ApiServer::start(settings.server_port, Arc::clone(&shared));
        session.publish(&shared);
        session.run(&commands, Some(&shared), false);
    } else {
        let commands: Receiver<ApiCommand> = never();
        session.run(&commands, None, true);
    }

    info!("Exiting");
    Ok(())
}

/// Reply channel for callers driving a session in-process
pub fn command(command: TransportCommand) -> (ApiCommand, Receiver<Result<(), SchedulerError>>) {
    let (reply, rx): (Sender<_>, _) = crossbeam_channel::bounded(1);
    (ApiCommand { command, reply }, rx)
}
