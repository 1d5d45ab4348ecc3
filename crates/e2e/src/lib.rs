//! Calc Sprint E2E Test Driver
//!
//! This crate drives the Calc Sprint arithmetic game in a real browser and
//! reports one pass/fail verdict per scripted scenario:
//! - Optionally spawns the game's web server and waits for it to answer
//! - Controls Playwright through a long-lived node bridge (JSON lines)
//! - Walks the game's screens, answers questions and inspects local storage
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner<P: Page>                                    │
//! │    ├── navigation  T1..T6  (timeLimit=5)                    │
//! │    ├── gameplay    E1..E4  (timeLimit=20, profile C)        │
//! │    └── expiry      E5      (timeLimit=5,  profile D)        │
//! │  Game: start_free_game / submit_answer / play_one_round     │
//! │  question::compute_answer   wait::Poll                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (trait)                                               │
//! │    └── PlaywrightHandle ── stdin/stdout ──> node bridge.js  │
//! │                                              └── browser    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod contract;
pub mod error;
pub mod game;
pub mod page;
pub mod playwright;
pub mod question;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod wait;

pub use error::{E2eError, E2eResult};
pub use page::Page;
pub use runner::{RunnerConfig, ScenarioRunner};
pub use scenario::{ScenarioId, ScenarioResult};
