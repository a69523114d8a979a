use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    pub profile_name: String,
    pub backend: BackendConfig,
    pub sync: SyncConfig,
    pub ui: UiConfig,
}

/// Where the agent backend lives. The client talks to exactly one backend;
/// everything behind it (mail ingestion, AI processing, persistence) is the
/// backend's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

/// Poll cadence. `email_poll_interval_secs` drives the continuous
/// background refresh; the two `process_poll_*` knobs bound the temporary
/// fast-poll phase that follows a "process inbox" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub email_poll_interval_secs: u64,
    pub process_poll_interval_secs: u64,
    pub process_poll_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub default_view: String,
    pub confirm_draft_delete: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            profile_name: "default".to_string(),
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                request_timeout_secs: 30,
            },
            sync: SyncConfig {
                email_poll_interval_secs: 3,
                process_poll_interval_secs: 2,
                process_poll_window_secs: 60,
            },
            ui: UiConfig {
                default_view: "inbox".to_string(),
                confirm_draft_delete: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let rendered = toml::to_string_pretty(&config).expect("config serializes");
        let parsed: AppConfig = toml::from_str(&rendered).expect("config parses back");

        assert_eq!(parsed.backend.base_url, config.backend.base_url);
        assert_eq!(
            parsed.sync.email_poll_interval_secs,
            config.sync.email_poll_interval_secs
        );
        assert_eq!(parsed.ui.default_view, config.ui.default_view);
    }

    #[test]
    fn default_cadence_matches_backend_contract() {
        let config = AppConfig::default();
        assert_eq!(config.sync.email_poll_interval_secs, 3);
        assert_eq!(config.sync.process_poll_interval_secs, 2);
        assert_eq!(config.sync.process_poll_window_secs, 60);
        assert!(config.ui.confirm_draft_delete);
    }
}
