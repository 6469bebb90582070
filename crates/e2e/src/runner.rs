//! Flow runner orchestrating server and browser

use std::path::PathBuf;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::browser::{BrowserConfig, BrowserHandle, FlowOutcome};
use crate::error::{E2eError, E2eResult};
use crate::server::{ServerConfig, ServerHandle};
use crate::spec::FlowSpec;

/// Result of running a single flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Present when an `expect_outcome` step ended the flow early.
    pub halted: Option<String>,
    pub error: Option<String>,
}

/// Result of running the whole suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<FlowResult>,
    /// Set when the whole suite was skipped (missing browser or binary).
    pub skip_rationale: Option<String>,
}

impl SuiteResult {
    fn skipped(total: usize, rationale: String) -> Self {
        Self {
            total,
            passed: 0,
            failed: 0,
            skipped: total,
            duration_ms: 0,
            results: vec![],
            skip_rationale: Some(rationale),
        }
    }
}

/// Main flow runner
pub struct FlowRunner {
    server_config: ServerConfig,
    browser_config: BrowserConfig,
    server: Option<ServerHandle>,
    specs_dir: PathBuf,
    output_dir: PathBuf,
}

impl FlowRunner {
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            browser_config: config.browser,
            server: None,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        }
    }

    /// Start the server under test
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }

        let server = ServerHandle::spawn(self.server_config.clone()).await?;
        self.browser_config.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run all flows in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let specs = FlowSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run flows matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = FlowSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<FlowSpec> = specs
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific flow by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<SuiteResult> {
        let specs = FlowSpec::load_all(&self.specs_dir)?;
        let found: Vec<FlowSpec> = specs.into_iter().filter(|s| s.name == name).collect();
        if found.is_empty() {
            return Err(E2eError::SpecParse(format!("Flow not found: {name}")));
        }
        self.run_specs(&found).await
    }

    /// Run a list of flow specs.
    ///
    /// Unmet preconditions (no browser, no server binary) skip the suite with
    /// a logged rationale instead of failing every flow for the same cause.
    pub async fn run_specs(&mut self, specs: &[FlowSpec]) -> E2eResult<SuiteResult> {
        let start = Instant::now();

        if let Err(e) =
            BrowserHandle::check_available(self.browser_config.node_modules_dir.as_deref())
        {
            warn!("Skipping {} flow(s): {}", specs.len(), e);
            return Ok(SuiteResult::skipped(specs.len(), e.to_string()));
        }

        match self.start_server().await {
            Ok(()) => {}
            Err(e @ E2eError::ServerBinaryNotFound(_)) => {
                warn!("Skipping {} flow(s): {}", specs.len(), e);
                return Ok(SuiteResult::skipped(specs.len(), e.to_string()));
            }
            Err(e) => return Err(e),
        }

        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} flow(s)...", specs.len());

        for spec in specs {
            let result = self.run_flow(spec).await;
            if result.success {
                passed += 1;
                match &result.halted {
                    Some(rationale) => {
                        info!("~ {} halted early: {}", result.name, rationale)
                    }
                    None => info!("ok {} ({} ms)", result.name, result.duration_ms),
                }
            } else {
                failed += 1;
                error!(
                    "FAILED {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Flow results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteResult {
            total: specs.len(),
            passed,
            failed,
            skipped: 0,
            duration_ms,
            results,
            skip_rationale: None,
        })
    }

    async fn run_flow(&self, spec: &FlowSpec) -> FlowResult {
        let start = Instant::now();

        let browser = match BrowserHandle::new(self.browser_config.clone()) {
            Ok(b) => b,
            Err(e) => {
                return FlowResult {
                    name: spec.name.clone(),
                    success: false,
                    duration_ms: 0,
                    halted: None,
                    error: Some(e.to_string()),
                }
            }
        };

        match browser.run_flow(spec).await {
            Ok(FlowOutcome::Completed) => FlowResult {
                name: spec.name.clone(),
                success: true,
                duration_ms: start.elapsed().as_millis() as u64,
                halted: None,
                error: None,
            },
            Ok(FlowOutcome::Halted { rationale, notice }) => FlowResult {
                name: spec.name.clone(),
                success: true,
                duration_ms: start.elapsed().as_millis() as u64,
                halted: Some(format!("{rationale} ({notice})")),
                error: None,
            },
            Err(e) => FlowResult {
                name: spec.name.clone(),
                success: false,
                duration_ms: start.elapsed().as_millis() as u64,
                halted: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Write suite results to a JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("flow-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for FlowRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Configuration for the flow runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
