//! REST API implementation using rouille.
//!
//! GET endpoints read `SharedApiState` snapshots. POST endpoints wrap a
//! [`TransportCommand`] in an [`ApiCommand`] and wait (bounded) for the run
//! loop to reply, so scheduler rejections come back as HTTP 400.
//!
//! CORS headers are added to every response for browser access.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::core::asset_cache::CacheSnapshot;
use crate::core::events::TransportCommand;
use crate::core::highlight::HighlightedWord;
use crate::core::scheduler::{SchedulerError, SchedulerSnapshot};

/// How long a handler waits for the run loop to apply a command
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport command plus the channel the run loop answers on
#[derive(Debug)]
pub struct ApiCommand {
    pub command: TransportCommand,
    pub reply: Sender<Result<(), SchedulerError>>,
}

/// One word of the highlight view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSnapshot {
    pub index: usize,
    pub word: String,
    pub highlighted: bool,
}

impl From<&HighlightedWord<'_>> for WordSnapshot {
    fn from(w: &HighlightedWord<'_>) -> Self {
        Self {
            index: w.token.index,
            word: w.token.raw.clone(),
            highlighted: w.is_highlighted,
        }
    }
}

/// Full status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub scheduler: SchedulerSnapshot,
    pub words: Vec<WordSnapshot>,
    pub cache: CacheSnapshot,
}

/// Shared state readable by API handlers (updated by the run loop)
pub struct SharedApiState {
    pub scheduler: RwLock<SchedulerSnapshot>,
    pub words: RwLock<Vec<WordSnapshot>>,
    pub cache: RwLock<CacheSnapshot>,
}

impl SharedApiState {
    pub fn new(scheduler: SchedulerSnapshot, cache: CacheSnapshot) -> Self {
        Self {
            scheduler: RwLock::new(scheduler),
            words: RwLock::new(Vec::new()),
            cache: RwLock::new(cache),
        }
    }

    /// Replace all snapshots at once
    pub fn publish(&self, scheduler: SchedulerSnapshot, words: Vec<WordSnapshot>, cache: CacheSnapshot) {
        *self.scheduler.write().unwrap_or_else(|e| e.into_inner()) = scheduler;
        *self.words.write().unwrap_or_else(|e| e.into_inner()) = words;
        *self.cache.write().unwrap_or_else(|e| e.into_inner()) = cache;
    }

    fn status(&self) -> StatusResponse {
        StatusResponse {
            scheduler: self.scheduler.read().unwrap_or_else(|e| e.into_inner()).clone(),
            words: self.words.read().unwrap_or_else(|e| e.into_inner()).clone(),
            cache: self.cache.read().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

/// Request body for submitting text
#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
}

/// Generic API response
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn ok() -> Self {
        Self { success: true, message: None, error: None }
    }

    fn ok_msg(msg: &str) -> Self {
        Self { success: true, message: Some(msg.to_string()), error: None }
    }

    fn err(msg: &str) -> Self {
        Self { success: false, message: None, error: Some(msg.to_string()) }
    }
}

fn with_cors(response: Response) -> Response {
    response.with_additional_header("Access-Control-Allow-Origin", "*")
}

/// REST API server
pub struct ApiServer {
    port: u16,
    state: Arc<SharedApiState>,
    command_tx: Sender<ApiCommand>,
}

impl ApiServer {
    /// Start the API server in a background thread.
    /// Returns the command receiver for the run loop to poll.
    pub fn start(port: u16, state: Arc<SharedApiState>) -> Receiver<ApiCommand> {
        let (tx, rx) = unbounded();

        let server = ApiServer {
            port,
            state,
            command_tx: tx,
        };

        thread::Builder::new()
            .name("signplay-api".into())
            .spawn(move || server.run())
            .map_err(|e| log::error!("Failed to spawn API thread: {}", e))
            .ok();

        rx
    }

    fn run(self) {
        let addr = format!("0.0.0.0:{}", self.port);
        log::info!("API server starting on http://{}", addr);

        let state = self.state;
        let tx = self.command_tx;

        rouille::start_server(&addr, move |request| Self::handle_request(request, &state, &tx));
    }

    fn handle_request(request: &Request, state: &SharedApiState, tx: &Sender<ApiCommand>) -> Response {
        if request.method() == "OPTIONS" {
            return with_cors(Response::empty_204())
                .with_additional_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
                .with_additional_header("Access-Control-Allow-Headers", "Content-Type");
        }

        // /api/player/speed/{x} (router! doesn't capture floats well)
        let path = request.url();
        if request.method() == "POST" {
            if let Some(speed_str) = path.strip_prefix("/api/player/speed/") {
                return with_cors(match speed_str.parse::<f32>() {
                    Ok(speed) => Self::send_command(tx, TransportCommand::SetSpeed(speed)),
                    Err(_) => Response::json(&ApiResponse::err("Invalid speed value")).with_status_code(400),
                });
            }
        }

        let response = rouille::router!(request,
            (GET) ["/api/status"] => {
                Response::json(&state.status())
            },
            (GET) ["/api/highlight"] => {
                Response::json(&*state.words.read().unwrap_or_else(|e| e.into_inner()))
            },
            (GET) ["/api/cache"] => {
                Response::json(&*state.cache.read().unwrap_or_else(|e| e.into_inner()))
            },
            (GET) ["/api/health"] => {
                Response::json(&ApiResponse::ok_msg("signplay API server"))
            },

            (POST) ["/api/text"] => {
                Self::handle_text(request, tx)
            },

            (POST) ["/api/player/play"] => {
                Self::send_command(tx, TransportCommand::Play)
            },
            (POST) ["/api/player/pause"] => {
                Self::send_command(tx, TransportCommand::Pause)
            },
            (POST) ["/api/player/stop"] => {
                Self::send_command(tx, TransportCommand::Stop)
            },
            (POST) ["/api/player/restart"] => {
                Self::send_command(tx, TransportCommand::Restart)
            },
            (POST) ["/api/player/clear"] => {
                Self::send_command(tx, TransportCommand::Clear)
            },
            (POST) ["/api/player/faster"] => {
                Self::send_command(tx, TransportCommand::Faster)
            },
            (POST) ["/api/player/slower"] => {
                Self::send_command(tx, TransportCommand::Slower)
            },

            _ => {
                Response::json(&ApiResponse::err("Not found")).with_status_code(404)
            }
        );

        with_cors(response)
    }

    fn send_command(tx: &Sender<ApiCommand>, command: TransportCommand) -> Response {
        let (reply_tx, reply_rx) = bounded(1);
        if let Err(e) = tx.send(ApiCommand { command, reply: reply_tx }) {
            return Response::json(&ApiResponse::err(&format!("Failed to send command: {}", e)))
                .with_status_code(500);
        }
        match reply_rx.recv_timeout(REPLY_TIMEOUT) {
            Ok(Ok(())) => Response::json(&ApiResponse::ok()),
            Ok(Err(e)) => Response::json(&ApiResponse::err(&e.to_string())).with_status_code(400),
            Err(_) => Response::json(&ApiResponse::err("Player did not respond")).with_status_code(503),
        }
    }

    fn handle_text(request: &Request, tx: &Sender<ApiCommand>) -> Response {
        match rouille::input::json_input::<TextRequest>(request) {
            Ok(req) => Self::send_command(tx, TransportCommand::Submit(req.text)),
            Err(e) => Response::json(&ApiResponse::err(&format!("Invalid JSON: {}", e))).with_status_code(400),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::PlaybackState;
    use crate::core::tokenizer::tokenize;
    use crate::core::highlight::highlight;
    use uuid::Uuid;

    fn snapshot() -> SchedulerSnapshot {
        SchedulerSnapshot {
            session: Uuid::nil(),
            state: PlaybackState::Idle,
            word_index: 0,
            highlighted: None,
            unit: None,
            speed: 1.0,
            tokens: 0,
            status: "Ready to start".into(),
        }
    }

    fn cache() -> CacheSnapshot {
        CacheSnapshot { entries: vec![], pending: 0, hits: 0, misses: 0, failed_preloads: 0, hit_rate: 0.0 }
    }

    fn get(state: &SharedApiState, tx: &Sender<ApiCommand>, url: &str) -> Response {
        let req = Request::fake_http("GET", url, vec![], vec![]);
        ApiServer::handle_request(&req, state, tx)
    }

    /// Answers every command with `answer`, records what it saw
    fn responder(answer: Result<(), SchedulerError>) -> (Sender<ApiCommand>, Receiver<TransportCommand>) {
        let (tx, rx) = unbounded::<ApiCommand>();
        let (seen_tx, seen_rx) = unbounded();
        thread::spawn(move || {
            for cmd in rx {
                let _ = seen_tx.send(cmd.command);
                let _ = cmd.reply.send(answer.clone());
            }
        });
        (tx, seen_rx)
    }

    #[test]
    fn test_word_snapshot_from_view() {
        let tokens = tokenize("hello world");
        let words: Vec<WordSnapshot> = highlight(&tokens, 1, true).iter().map(WordSnapshot::from).collect();
        assert_eq!(words[1], WordSnapshot { index: 1, word: "world".into(), highlighted: true });
        assert!(!words[0].highlighted);
    }

    #[test]
    fn test_health_and_cors() {
        let state = SharedApiState::new(snapshot(), cache());
        let (tx, _rx) = unbounded();
        let resp = get(&state, &tx, "/api/health");
        assert_eq!(resp.status_code, 200);
        assert!(resp.headers.iter().any(|(k, v)| k == "Access-Control-Allow-Origin" && v == "*"));
    }

    #[test]
    fn test_unknown_route_404() {
        let state = SharedApiState::new(snapshot(), cache());
        let (tx, _rx) = unbounded();
        assert_eq!(get(&state, &tx, "/api/nope").status_code, 404);
    }

    #[test]
    fn test_post_forwards_command() {
        let state = SharedApiState::new(snapshot(), cache());
        let (tx, seen) = responder(Ok(()));
        let req = Request::fake_http("POST", "/api/player/pause", vec![], vec![]);
        assert_eq!(ApiServer::handle_request(&req, &state, &tx).status_code, 200);
        assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap(), TransportCommand::Pause);
    }

    #[test]
    fn test_speed_path_param() {
        let state = SharedApiState::new(snapshot(), cache());
        let (tx, seen) = responder(Ok(()));
        let req = Request::fake_http("POST", "/api/player/speed/1.5", vec![], vec![]);
        assert_eq!(ApiServer::handle_request(&req, &state, &tx).status_code, 200);
        assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap(), TransportCommand::SetSpeed(1.5));

        let bad = Request::fake_http("POST", "/api/player/speed/fast", vec![], vec![]);
        assert_eq!(ApiServer::handle_request(&bad, &state, &tx).status_code, 400);
    }

    #[test]
    fn test_scheduler_rejection_is_400() {
        let state = SharedApiState::new(snapshot(), cache());
        let (tx, _seen) = responder(Err(SchedulerError::Busy));
        let req = Request::fake_http(
            "POST",
            "/api/text",
            vec![("Content-Type".into(), "application/json".into())],
            br#"{"text":"hello"}"#.to_vec(),
        );
        assert_eq!(ApiServer::handle_request(&req, &state, &tx).status_code, 400);
    }

    #[test]
    fn test_publish_visible_in_status() {
        let state = SharedApiState::new(snapshot(), cache());
        let mut snap = snapshot();
        snap.state = PlaybackState::Playing;
        snap.tokens = 2;
        state.publish(snap, vec![WordSnapshot { index: 0, word: "hi".into(), highlighted: true }], cache());
        let status = state.status();
        assert_eq!(status.scheduler.state, PlaybackState::Playing);
        assert_eq!(status.words.len(), 1);
    }
}
