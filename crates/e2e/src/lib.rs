//! Ecom OS E2E Acceptance Harness
//!
//! Rust-controlled browser acceptance testing for the Ecom OS web surfaces:
//! - Spawns the `ecomos-web` server as a subprocess with an isolated database
//! - Renders declarative YAML flow specs to Playwright scripts and runs them
//!   via `node`, one page per flow so the session cookie persists
//! - Treats unmet preconditions (no browser, no server binary) as a skipped
//!   suite with a logged rationale, never as cascading failures
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    FlowRunner (Rust)                       │
//! ├────────────────────────────────────────────────────────────┤
//! │  ServerHandle     spawn ecomos-web, poll /health           │
//! │  BrowserHandle    FlowSpec -> Playwright script -> node    │
//! │  FlowSpec (YAML)  navigate / fill / click / wait_url /     │
//! │                   assert / expect_outcome / screenshot     │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod error;
pub mod runner;
pub mod server;
pub mod spec;

pub use browser::{BrowserHandle, FlowOutcome};
pub use error::{E2eError, E2eResult};
pub use runner::FlowRunner;
pub use spec::{FlowSpec, FlowStep};
