//! Server management: spawning and health-checking the ecomos-web binary

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running server process
#[derive(Debug)]
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
    /// Holds the per-run state DB until the handle drops.
    _db_dir: Option<tempfile::TempDir>,
}

impl ServerHandle {
    /// Spawn the ecomos-web server with an isolated database.
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        if !config.binary_path.exists() {
            return Err(E2eError::ServerBinaryNotFound(
                config.binary_path.display().to_string(),
            ));
        }

        let port = config.port.unwrap_or_else(find_free_port);
        let base_url = format!("http://127.0.0.1:{port}");

        info!("Spawning web server on port {}", port);

        let db_dir = tempfile::tempdir()?;
        let db_path = db_dir.path().join("state.db");

        let mut cmd = Command::new(&config.binary_path);
        cmd.env("ECOMOS_WEB_ADDR", format!("127.0.0.1:{port}"))
            .env("ECOMOS_DB_PATH", &db_path)
            .env(
                "ECOMOS_TEST_CREDENTIALS",
                if config.test_credentials { "1" } else { "0" },
            );

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let handle = ServerHandle {
            child,
            base_url: base_url.clone(),
            port,
            _db_dir: Some(db_dir),
        };

        handle.wait_for_healthy(config.startup_timeout).await?;

        info!("Server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Poll the health route until the server answers or the window elapses.
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}/health", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while the server starts
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        info!("Stopping server (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the ecomos-web binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Seed the test identity and pre-fill the login form
    pub test_credentials: bool,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/ecomos-web"),
            port: None,
            test_credentials: true,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port1 = find_free_port();
        let port2 = find_free_port();

        assert!(port1 > 1024);
        assert!(port2 > 1024);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let err = ServerHandle::spawn(ServerConfig {
            binary_path: PathBuf::from("/nonexistent/ecomos-web"),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::ServerBinaryNotFound(_)));
    }
}
