//! End-to-end: clip directory on disk, headless player, real run loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::never;
use signplay::config::Settings;
use signplay::core::scheduler::UnitLabel;
use signplay::runner::Session;
use signplay::PlaybackState;
use uuid::Uuid;

fn clip_dir(names: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("signplay-it-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    for name in names {
        std::fs::write(dir.join(format!("{}.clip", name)), b"clip").unwrap();
    }
    dir
}

fn session(dir: &PathBuf, clip_ms: u64) -> Session {
    let settings = Settings {
        assets_dir: dir.clone(),
        clip_duration_ms: clip_ms,
        word_gap_ms: 10,
        workers: Some(2),
        ..Settings::default()
    };
    Session::build(&settings).unwrap()
}

/// Pump until `done` or timeout
fn pump_until(s: &mut Session, done: impl Fn(&Session) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        s.pump();
        if done(s) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn word_then_fallback_letters() {
    let dir = clip_dir(&["Hi", "H", "I", "5"]);
    let mut s = session(&dir, 20);
    s.scheduler_mut().submit("Hi, 5!").unwrap();
    s.scheduler_mut().play().unwrap();

    assert!(pump_until(&mut s, |s| s.scheduler().current_label() == Some(UnitLabel::Word { text: "Hi".into() })));
    assert_eq!(s.scheduler().highlighted(), Some(0));

    assert!(pump_until(&mut s, |s| s.scheduler().word_index() == 1));
    assert!(pump_until(&mut s, |s| s.scheduler().state() == PlaybackState::Idle));
    assert_eq!(s.scheduler().highlighted(), None);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_word_spells_letters() {
    let dir = clip_dir(&["C", "A", "T"]);
    let mut s = session(&dir, 20);
    s.scheduler_mut().submit("cat").unwrap();
    s.scheduler_mut().play().unwrap();

    assert!(pump_until(&mut s, |s| matches!(
        s.scheduler().current_label(),
        Some(UnitLabel::Letter { ch: 'C', .. })
    )));
    assert!(pump_until(&mut s, |s| matches!(
        s.scheduler().current_label(),
        Some(UnitLabel::Letter { ch: 'T', .. })
    )));
    assert!(pump_until(&mut s, |s| s.scheduler().state() == PlaybackState::Idle));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn pause_holds_position() {
    let dir = clip_dir(&["One", "Two"]);
    let mut s = session(&dir, 2000);
    s.scheduler_mut().submit("one two").unwrap();
    s.scheduler_mut().play().unwrap();
    assert!(pump_until(&mut s, |s| s.scheduler().player().is_running()));

    s.scheduler_mut().pause();
    assert_eq!(s.scheduler().state(), PlaybackState::Paused);
    std::thread::sleep(Duration::from_millis(30));
    s.pump();
    assert_eq!(s.scheduler().word_index(), 0);
    assert_eq!(s.scheduler().highlighted(), Some(0));

    s.scheduler_mut().stop();
    assert_eq!(s.scheduler().state(), PlaybackState::Idle);
    assert_eq!(s.scheduler().highlighted(), None);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn run_loop_exits_when_finished() {
    let dir = clip_dir(&["Go"]);
    let mut s = session(&dir, 5);
    s.scheduler_mut().submit("go").unwrap();
    s.scheduler_mut().play().unwrap();
    s.run(&never(), None, true);
    assert_eq!(s.scheduler().state(), PlaybackState::Idle);
    assert_eq!(s.scheduler().word_index(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}
