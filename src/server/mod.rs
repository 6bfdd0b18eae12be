//! REST API server for remote control of the scheduler.
//!
//! ```text
//! ┌─────────────────────────┐   crossbeam channel    ┌──────────────────────┐
//! │   API Server Thread     │  ── ApiCommand ──────▶ │   Run loop           │
//! │   (rouille HTTP)        │  ◀── reply ─────────── │   (runner.rs)        │
//! │                         │                        │                      │
//! │  POST /api/text         │  Submit(text)          │  scheduler.submit()  │
//! │  POST /api/player/pause │  Pause                 │  scheduler.pause()   │
//! └─────────────────────────┘                        └──────────────────────┘
//!          │                                                  │
//!          │  Arc<SharedApiState>                             │
//!          │◀──────────── read snapshots ─────────────────────│
//!          │                                        updated every loop pass
//! ```
//!
//! # Endpoints
//!
//! | Method | Path                      | Description                        |
//! |--------|---------------------------|------------------------------------|
//! | GET    | `/api/status`             | Scheduler, highlight and cache     |
//! | GET    | `/api/highlight`          | Words with highlight flags         |
//! | GET    | `/api/cache`              | Cached ids and hit/miss counters   |
//! | GET    | `/api/health`             | Health check                       |
//! | POST   | `/api/text`               | Submit text (`{"text": "..."}`)    |
//! | POST   | `/api/player/play`        | Play or resume                     |
//! | POST   | `/api/player/pause`       | Pause                              |
//! | POST   | `/api/player/stop`        | Stop and rewind                    |
//! | POST   | `/api/player/restart`     | Play from the first word           |
//! | POST   | `/api/player/clear`       | Stop and drop the text             |
//! | POST   | `/api/player/faster`      | Next faster speed preset           |
//! | POST   | `/api/player/slower`      | Next slower speed preset           |
//! | POST   | `/api/player/speed/{x}`   | Set speed multiplier               |

mod api;

pub use api::{ApiCommand, ApiServer, SharedApiState, StatusResponse, WordSnapshot};
