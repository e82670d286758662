/// Result alias that carries the custom [`OverlayError`] type.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// A caller handed the core a value it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A render resource (font, texture) has not finished loading. Callers
    /// treat this as "try again next frame" rather than a hard failure.
    #[error("asset `{0}` is not loaded yet")]
    MissingAsset(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl OverlayError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Whether the failure is transient and the operation may be retried on a
    /// later frame.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MissingAsset(_))
    }
}

impl From<&str> for OverlayError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for OverlayError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
