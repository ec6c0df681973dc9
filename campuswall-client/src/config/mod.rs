use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApiSettings {
    /// Base URL of the Campuswall backend (e.g. http://localhost:8080/api).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Deserialize, Clone)]
pub struct SessionSettings {
    /// Path of the session file shared by client instances on this machine.
    #[serde(default = "default_session_file")]
    pub file: String,
    /// Poll interval for picking up session changes written by other
    /// instances, in milliseconds.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

// Matches the request timeout the web client shipped with.
fn default_timeout_ms() -> u64 {
    10_000
}

fn default_session_file() -> String {
    ".campuswall-session.json".to_string()
}

fn default_watch_interval_ms() -> u64 {
    500
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            file: default_session_file(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SessionSettings {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("config");

    let settings = config::Config::builder()
        .add_source(
            config::File::from(configuration_directory.join("base.yaml")).required(false),
        )
        .add_source(config::Environment::with_prefix("CAMPUSWALL").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}
