//! Error types for the acceptance harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Server binary not found at {0}. Build it with: cargo build -p ecomos-web")]
    ServerBinaryNotFound(String),

    #[error("Node.js not found on PATH")]
    NodeNotFound,

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Flow spec parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
