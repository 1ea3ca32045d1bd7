//! Test environment: a stub server plus a suite configured against it.

use postcheck_harness::{Credential, HarnessConfig, Suite};

use super::stub_server::{Faults, StubServer};

/// A running stub and a suite pointed at it.
pub struct TestEnv {
    pub server: StubServer,
    pub config: HarnessConfig,
    pub suite: Suite,
}

impl TestEnv {
    /// Starts a well-behaved stub; the live-state oracle is disabled.
    pub async fn start() -> Self {
        Self::start_with(Faults::default(), |_| {}).await
    }

    /// Starts a well-behaved stub with the live-state oracle reading its
    /// store file.
    pub async fn start_with_live_state() -> Self {
        Self::start().await.with_live_state()
    }

    /// Starts a stub with `faults`, letting the caller adjust the config.
    pub async fn start_with(faults: Faults, configure: impl FnOnce(&mut HarnessConfig)) -> Self {
        let server = StubServer::start_with(faults).await;
        let mut config = HarnessConfig::for_testing(server.base_url.clone());
        configure(&mut config);
        let suite = Suite::new(&config).expect("Failed to build suite");
        Self {
            server,
            config,
            suite,
        }
    }

    fn with_live_state(mut self) -> Self {
        self.config.db_path = Some(self.server.db_path.clone());
        self.suite = Suite::new(&self.config).expect("Failed to build suite");
        self
    }

    /// Purges principals and registers the test principal.
    pub async fn credential(&self) -> Credential {
        self.suite.setup().await.expect("Failed to provision principal")
    }

    /// Provisions a principal and resyncs the collection to the baseline.
    pub async fn synchronized(&self) -> Credential {
        let credential = self.credential().await;
        self.suite
            .synchronizer()
            .resync(&credential)
            .await
            .expect("Failed to resync");
        credential
    }
}
