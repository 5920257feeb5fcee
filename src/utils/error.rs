use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Transport failure: connect/read timeout, DNS, refused connection.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Non-2xx response from the gateway, or an OAuth response without a token.
    #[error("{message}")]
    Http {
        message: String,
        status: u16,
        body: Option<String>,
    },

    #[error("{message}")]
    InvalidArgument { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging initialization error: {0}")]
    LoggingInit(#[from] tracing_appender::rolling::InitError),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            message: format!("HTTP {}", status),
            status,
            body: Some(body.into()),
        }
    }

    pub fn token_missing(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            message: "OAuth token missing".to_string(),
            status,
            body: Some(body.into()),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Status code of an HTTP-level failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::HttpRequest(e) if e.is_timeout())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::HttpRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
