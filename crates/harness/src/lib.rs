//! # postcheck-harness - Contract verification for a `/posts` REST endpoint
//!
//! This crate drives an external, stateful REST server that exposes a
//! bearer-protected `/posts` collection, resets it to a known baseline before
//! every scenario and asserts the server's request/response contract against
//! that baseline.
//!
//! ## Components
//!
//! - [`baseline`] - the immutable seed snapshot and expected-value oracle
//! - [`live_state`] - direct, uncached reads of the server's store file
//! - [`client`] - `reqwest` client bound to the server base URL
//! - [`identity`] - principal purge and bearer credential provisioning
//! - [`sync`] - two-phase drain/seed reset of the remote collection
//! - [`verify`] - response assertions
//! - [`scenario`] - the per-endpoint scenario catalogue
//! - [`suite`] - lifecycle orchestration and reporting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use postcheck_harness::{HarnessConfig, Scenario, Suite};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::default();
//!     let suite = Suite::new(&config)?;
//!     let report = suite.run(&Scenario::ALL).await?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```
//!
//! ## Endpoints consumed
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | POST | `/register` | none |
//! | GET | `/users` | none |
//! | DELETE | `/users/:id` | none |
//! | GET | `/posts[?id=..&id=..]` | bearer |
//! | GET | `/posts/:id` | bearer |
//! | POST | `/posts` | bearer |
//! | PUT | `/posts/:id` | bearer |
//! | PATCH | `/posts/:id` | bearer |
//! | DELETE | `/posts/:id` | bearer |

pub mod baseline;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod live_state;
pub mod model;
pub mod scenario;
pub mod suite;
pub mod sync;
pub mod verify;

pub use baseline::{Baseline, BaselineDiff};
pub use client::{ApiClient, ApiResponse};
pub use config::{HarnessConfig, MissingUpdatePolicy};
pub use error::{
    BaselineError, ClientError, ContractViolation, HarnessError, HarnessResult, LiveStateError,
    SetupError, SyncError, SyncPhase,
};
pub use live_state::LiveStateReader;
pub use model::{Credential, Post, PostPatch, Principal, PrincipalDescriptor};
pub use scenario::{Scenario, ScenarioContext};
pub use suite::{Outcome, Suite, SuiteReport};
pub use sync::{FixtureSynchronizer, ResyncReport};

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` applies to this workspace.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("postcheck_harness={},postcheck={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
