use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Client supplied parameters failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested record, payload or collection does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Upstream could not be reached or returned an unreadable response.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl WeatherError {
    pub fn invalid(message: impl Into<String>) -> Self {
        WeatherError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        WeatherError::NotFound(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::NotFound(_))
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        WeatherError::Network(e.to_string())
    }
}

impl From<rusqlite::Error> for WeatherError {
    fn from(e: rusqlite::Error) -> Self {
        WeatherError::StoreUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WeatherError>;
