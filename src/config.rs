use crate::error::{Result, WeatherError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "weather.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub weather: WeatherConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub location: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            location: "London".to_string(),
            endpoint: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub data_root: PathBuf,
    pub container: String,
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            container: "weather-data".to_string(),
            table: "weather_logs.db".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn log_db_path(&self) -> PathBuf {
        self.data_root.join(&self.table)
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_root.join("blobs")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7071,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: Some(PathBuf::from("logs")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub listen: Option<String>,
}

impl Config {
    /// Reads `path` (or `weather.toml` when present), then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WeatherError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from `lookup`, normally `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("OPENWEATHERMAP_API_KEY") {
            self.weather.api_key = Some(v);
        }
        if let Some(v) = get("WEATHER_LOCATION") {
            self.weather.location = v;
        }
        if let Some(v) = get("WEATHER_ENDPOINT") {
            self.weather.endpoint = v;
        }
        if let Some(v) = get("WEATHER_TIMEOUT_SECS") {
            self.weather.timeout_secs = parse_var("WEATHER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("WEATHER_DATA_ROOT") {
            self.storage.data_root = PathBuf::from(v);
        }
        if let Some(v) = get("WEATHER_CONTAINER") {
            self.storage.container = v;
        }
        if let Some(v) = get("WEATHER_HTTP_HOST") {
            self.http.host = v;
        }
        if let Some(v) = get("WEATHER_HTTP_PORT") {
            self.http.port = parse_var("WEATHER_HTTP_PORT", &v)?;
        }
        if let Some(v) = get("WEATHER_INTERVAL_SECS") {
            self.schedule.interval_secs = parse_var("WEATHER_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("WEATHER_METRICS_ADDR") {
            self.metrics.listen = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.weather.location.trim().is_empty() {
            return Err(WeatherError::Config("weather.location must not be empty".into()));
        }
        if self.weather.timeout_secs == 0 {
            return Err(WeatherError::Config("weather.timeout_secs must be > 0".into()));
        }
        if self.schedule.interval_secs == 0 {
            return Err(WeatherError::Config("schedule.interval_secs must be > 0".into()));
        }
        if self.storage.container.is_empty() || self.storage.container.contains(['/', '\\']) {
            return Err(WeatherError::Config(format!(
                "storage.container '{}' must be a single path segment",
                self.storage.container
            )));
        }
        Ok(())
    }

    /// The API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.weather
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.timeout_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| WeatherError::Config(format!("invalid {}='{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.weather.location, "London");
        assert_eq!(config.storage.container, "weather-data");
        assert_eq!(config.storage.log_db_path(), PathBuf::from("data/weather_logs.db"));
        assert!(config.api_key().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_sections() {
        let config = Config::from_toml_str(
            r#"
            [weather]
            api_key = "abc"
            location = "Paris"
            timeout_secs = 5

            [storage]
            data_root = "/var/lib/weather"

            [http]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.api_key(), Some("abc"));
        assert_eq!(config.weather.location, "Paris");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
        assert_eq!(config.storage.blob_root(), PathBuf::from("/var/lib/weather/blobs"));
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "0.0.0.0");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[weather]\ncity = \"Paris\"\n").unwrap_err();
        assert!(matches!(err, WeatherError::TomlDe(_)));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENWEATHERMAP_API_KEY", "from-env"),
            ("WEATHER_LOCATION", "Oslo"),
            ("WEATHER_HTTP_PORT", "9000"),
            ("WEATHER_DATA_ROOT", "  "),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_key(), Some("from-env"));
        assert_eq!(config.weather.location, "Oslo");
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.storage.data_root, PathBuf::from("data"));
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "WEATHER_HTTP_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, WeatherError::Config(_)));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let mut config = Config::default();
        config.weather.api_key = Some("   ".into());
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.schedule.interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
