/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// Every failure the engine can produce is local and recoverable. None of
/// these variants are fatal to the process or to a running animation loop.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// The host refused to construct or resume the processing graph.
    #[error("audio graph unavailable: {0}")]
    GraphUnavailable(String),
    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An operation was invoked outside of its contract.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A file-backed signal could not be decoded.
    #[error("failed to decode audio: {0}")]
    Decode(#[from] hound::Error),
    /// Configuration could not be parsed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Encoding a surface to an image failed.
    #[error("image encoding failed: {0}")]
    Image(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
