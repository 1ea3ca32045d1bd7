//! Suite lifecycle.
//!
//! ```text
//! purge principals -> register            (once)
//! for each scenario:
//!     resync -> run scenario -> record     (fail-stop on resync failure)
//! ```
//!
//! Scenarios run one at a time in catalogue order. Isolation comes only from
//! the resync before each one; two suites against the same server at once
//! would corrupt each other.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::baseline::Baseline;
use crate::client::ApiClient;
use crate::config::{HarnessConfig, MissingUpdatePolicy};
use crate::error::{HarnessError, HarnessResult, SetupError, SyncError};
use crate::identity;
use crate::live_state::LiveStateReader;
use crate::model::{Credential, PrincipalDescriptor};
use crate::scenario::{Scenario, ScenarioContext};
use crate::sync::{FixtureSynchronizer, ResyncReport};

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// An assertion did not hold.
    Failed(String),
    /// The scenario could not be carried out (transport, decoding, ...).
    Errored(String),
}

impl Outcome {
    fn from_result(result: HarnessResult<()>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(HarnessError::Contract(violation)) => Outcome::Failed(violation.to_string()),
            Err(other) => Outcome::Errored(other.to_string()),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "ok"),
            Outcome::Failed(msg) => write!(f, "FAILED: {}", msg),
            Outcome::Errored(msg) => write!(f, "ERROR: {}", msg),
        }
    }
}

/// Result of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub resync: ResyncReport,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// A resync failure that stopped the run.
#[derive(Debug)]
pub struct Abort {
    /// The scenario whose resync failed.
    pub scenario: Scenario,
    pub error: SyncError,
}

/// Result of a suite run.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub results: Vec<ScenarioReport>,
    /// Set when a resync failed; the remaining scenarios did not run.
    pub aborted: Option<Abort>,
    /// Scenarios that never ran because of an abort.
    pub skipped: Vec<Scenario>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
            .count()
    }

    pub fn errored(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Errored(_)))
            .count()
    }

    /// Whether every selected scenario ran and passed.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.results.iter().all(|r| r.outcome.is_passed())
    }

    pub fn outcome_of(&self, scenario: Scenario) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| r.scenario == scenario)
            .map(|r| &r.outcome)
    }
}

/// A configured suite: client, baseline, optional live-state oracle.
#[derive(Debug, Clone)]
pub struct Suite {
    client: ApiClient,
    baseline: Arc<Baseline>,
    live_state: Option<LiveStateReader>,
    synchronizer: FixtureSynchronizer,
    principal: PrincipalDescriptor,
    missing_update: MissingUpdatePolicy,
}

impl Suite {
    /// Builds a suite from a validated configuration.
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        config
            .validate()
            .map_err(|errors| HarnessError::Config(errors.join("; ")))?;

        let client = ApiClient::new(&config.base_url, config.timeout())?;
        let baseline = Arc::new(config.load_baseline()?);
        let live_state = config.db_path.as_ref().map(LiveStateReader::new);
        let synchronizer = FixtureSynchronizer::new(client.clone(), Arc::clone(&baseline));

        Ok(Self {
            client,
            baseline,
            live_state,
            synchronizer,
            principal: config.principal(),
            missing_update: config.missing_update_policy(),
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn live_state(&self) -> Option<&LiveStateReader> {
        self.live_state.as_ref()
    }

    pub fn synchronizer(&self) -> &FixtureSynchronizer {
        &self.synchronizer
    }

    /// Purges principals and registers the suite principal.
    pub async fn setup(&self) -> Result<Credential, SetupError> {
        identity::provision(&self.client, &self.principal).await
    }

    /// Runs setup, then every scenario in `scenarios`.
    ///
    /// Setup failures are returned as errors; resync failures are recorded
    /// in the report as an abort.
    pub async fn run(&self, scenarios: &[Scenario]) -> HarnessResult<SuiteReport> {
        let credential = self.setup().await?;
        Ok(self.run_with(&credential, scenarios).await)
    }

    /// Runs `scenarios` with an already provisioned credential.
    pub async fn run_with(&self, credential: &Credential, scenarios: &[Scenario]) -> SuiteReport {
        let ctx = ScenarioContext {
            client: &self.client,
            credential,
            baseline: &self.baseline,
            live_state: self.live_state.as_ref(),
            synchronizer: &self.synchronizer,
            missing_update: self.missing_update,
        };

        let mut report = SuiteReport::default();
        for (index, scenario) in scenarios.iter().copied().enumerate() {
            let resync = match self.synchronizer.resync(credential).await {
                Ok(resync) => resync,
                Err(error) => {
                    error!(
                        scenario = scenario.name(),
                        phase = %error.phase,
                        completed = error.completed,
                        total = error.total,
                        error = %error,
                        "Resync failed, stopping the run"
                    );
                    report.skipped = scenarios[index + 1..].to_vec();
                    report.aborted = Some(Abort { scenario, error });
                    break;
                }
            };

            let started = Instant::now();
            let outcome = Outcome::from_result(scenario.run(&ctx).await);
            let duration = started.elapsed();

            if outcome.is_passed() {
                info!(
                    scenario = scenario.name(),
                    elapsed_ms = duration.as_millis() as u64,
                    "Scenario passed"
                );
            } else {
                warn!(scenario = scenario.name(), outcome = %outcome, "Scenario did not pass");
            }

            report.results.push(ScenarioReport {
                scenario,
                resync,
                outcome,
                duration,
            });
        }

        info!(
            passed = report.passed(),
            failed = report.failed(),
            errored = report.errored(),
            skipped = report.skipped.len(),
            "Suite finished"
        );
        report
    }
}
