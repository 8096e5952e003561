use orai_notify::SmtpConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default)]
    pub weather: WeatherConfig,
    /// File values; `SMTP_*` environment variables override them at startup.
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_eval_interval_secs")]
    pub eval_interval_secs: u64,
    #[serde(default = "default_digest_tick_secs")]
    pub digest_tick_secs: u64,
    /// Minimum spacing between outbound emails, shared by both workers.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            eval_interval_secs: default_eval_interval_secs(),
            digest_tick_secs: default_digest_tick_secs(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_url() -> String {
    "sqlite://data/orai.db?mode=rwc".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.meteo.lt/v1/places".to_string()
}

fn default_weather_timeout_secs() -> u64 {
    10
}

fn default_eval_interval_secs() -> u64 {
    60
}

fn default_digest_tick_secs() -> u64 {
    900
}

fn default_send_delay_ms() -> u64 {
    2000
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if !std::path::Path::new(path).exists() {
            tracing::warn!(path, "Config file not found, using defaults");
            return Ok(toml::from_str("")?);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
