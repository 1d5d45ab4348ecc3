//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Unexpected question format: {text:?}")]
    QuestionParse { text: String },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unexpected text in {selector}: {text:?}")]
    UnexpectedText { selector: String, text: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Process exit status for a run aborted by this error.
    ///
    /// A missing or unlaunchable automation toolchain exits with 2, every
    /// other abort with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            E2eError::PlaywrightNotFound | E2eError::BrowserLaunch(_) => 2,
            _ => 1,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
