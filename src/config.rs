use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://ajay-verma.in";

/// Foreground watch and background task cadence: every 5 seconds or every
/// 5 meters, whichever comes first.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
pub const SAMPLE_DISTANCE_M: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Reads `TRACKME_API_URL` and `TRACKME_DEBUG`, falling back to defaults.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("TRACKME_API_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let debug = std::env::var("TRACKME_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            api_base_url,
            debug,
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}
