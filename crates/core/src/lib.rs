pub mod domain;
pub mod ingest;
pub mod pipeline;
pub mod storage;
pub mod time;

pub mod config {
    use crate::domain::city::CityConfig;
    use anyhow::{ensure, Context};
    use serde::Deserialize;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    const DEFAULT_CITIES_PATH: &str = "config/config.json";
    const DEFAULT_DATA_DIR: &str = "data";
    const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";
    const DEFAULT_FX_BASE_URL: &str = "https://open.er-api.com";
    const DEFAULT_TIME_BASE_URL: &str = "http://worldtimeapi.org";
    const DEFAULT_REFERENCE_TIMEZONE: &str = "America/Bogota";
    const DEFAULT_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_RETRIES: u32 = 3;
    const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
    const DEFAULT_RUN_INTERVAL_MINUTES: u64 = 30;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub cities_path: PathBuf,
        pub data_dir: PathBuf,
        pub log_dir: Option<PathBuf>,
        pub sentry_dsn: Option<String>,
        pub weather_base_url: String,
        pub fx_base_url: String,
        pub time_base_url: String,
        pub reference_timezone: String,
        pub provider_timeout: Duration,
        pub provider_retries: u32,
        pub provider_retry_delay: Duration,
        pub run_interval_minutes: u64,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                cities_path: PathBuf::from(DEFAULT_CITIES_PATH),
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                log_dir: None,
                sentry_dsn: None,
                weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
                fx_base_url: DEFAULT_FX_BASE_URL.to_string(),
                time_base_url: DEFAULT_TIME_BASE_URL.to_string(),
                reference_timezone: DEFAULT_REFERENCE_TIMEZONE.to_string(),
                provider_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                provider_retries: DEFAULT_RETRIES,
                provider_retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
                run_interval_minutes: DEFAULT_RUN_INTERVAL_MINUTES,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                cities_path: env_string("IVV_CITIES_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.cities_path),
                data_dir: env_string("IVV_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.data_dir),
                log_dir: env_string("IVV_LOG_DIR").map(PathBuf::from),
                sentry_dsn: env_string("SENTRY_DSN"),
                weather_base_url: env_string("WEATHER_BASE_URL")
                    .unwrap_or(defaults.weather_base_url),
                fx_base_url: env_string("FX_BASE_URL").unwrap_or(defaults.fx_base_url),
                time_base_url: env_string("TIME_BASE_URL").unwrap_or(defaults.time_base_url),
                reference_timezone: env_string("REFERENCE_TIMEZONE")
                    .unwrap_or(defaults.reference_timezone),
                provider_timeout: env_parse::<u64>("PROVIDER_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.provider_timeout),
                provider_retries: env_parse::<u32>("PROVIDER_RETRIES")?
                    .unwrap_or(defaults.provider_retries),
                provider_retry_delay: env_parse::<u64>("PROVIDER_RETRY_DELAY_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.provider_retry_delay),
                run_interval_minutes: env_parse::<u64>("RUN_INTERVAL_MINUTES")?
                    .unwrap_or(defaults.run_interval_minutes),
            })
        }
    }

    fn env_string(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        env_string(key)
            .map(|s| {
                s.trim()
                    .parse::<T>()
                    .with_context(|| format!("{key} is not valid: {s}"))
            })
            .transpose()
    }

    /// The `ciudades` file. Read once per run; a bad file fails the run.
    #[derive(Debug, Clone, Deserialize)]
    pub struct CitiesConfig {
        #[serde(rename = "ciudades")]
        pub cities: Vec<CityConfig>,
    }

    impl CitiesConfig {
        pub fn load(path: &Path) -> anyhow::Result<Self> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read cities file {}", path.display()))?;
            Self::parse(&text).with_context(|| format!("invalid cities file {}", path.display()))
        }

        pub fn parse(text: &str) -> anyhow::Result<Self> {
            let config: Self = serde_json::from_str(text).context("failed to decode cities JSON")?;
            ensure!(!config.cities.is_empty(), "city list is empty");
            for city in &config.cities {
                city.validate()?;
            }
            Ok(config)
        }
    }

}
