//! Error types for table rendering.

use thiserror::Error;

/// WebDriver error code reported once the browser session is gone
const INVALID_SESSION: &str = "invalid session id";

/// Errors raised while rendering a table or managing the browser session.
///
/// Session-level failures ([`RenderError::is_fatal`]) abort the whole chunk;
/// everything else is scoped to the table being rendered.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The WebDriver binary could not be spawned.
    #[error("failed to start WebDriver `{driver}`: {source}")]
    DriverStart {
        driver: String,
        #[source]
        source: std::io::Error,
    },

    /// The WebDriver never answered its status endpoint.
    #[error("WebDriver at {url} not ready after {waited_ms} ms")]
    DriverNotReady { url: String, waited_ms: u64 },

    /// The WebDriver refused to open a browser session.
    #[error("failed to open browser session: {0}")]
    SessionStart(String),

    /// A cell marker did not appear within the element timeout.
    #[error("cell marker {id} not found within {timeout_ms} ms")]
    Timeout { id: usize, timeout_ms: u64 },

    /// An element the renderer needs is missing from the page.
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// The WebDriver answered with an error object.
    #[error("WebDriver error `{error}`: {message}")]
    Protocol { error: String, message: String },

    /// Transport failure talking to the WebDriver.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Screenshot payload could not be decoded.
    #[error("invalid screenshot: {0}")]
    Screenshot(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the browser session is unusable and the chunk must stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DriverStart { .. } | Self::DriverNotReady { .. } | Self::SessionStart(_) => true,
            Self::Protocol { error, .. } => error == INVALID_SESSION,
            _ => false,
        }
    }
}

/// Result alias for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;
