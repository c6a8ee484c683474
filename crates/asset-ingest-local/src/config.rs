use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Configuration for the asset-ingest-local watcher.
#[derive(Parser, Debug, Clone)]
#[command(name = "asset-ingest-local")]
#[command(about = "Watches category folders and uploads new files as content assets")]
pub struct Config {
    /// Root directory; each top-level subdirectory is one category folder
    #[arg(long, env = "INGEST_ROOT")]
    pub root: PathBuf,

    /// Folder -> category mapping file (defaults to <root>/pasta_map.json)
    #[arg(long, env = "CATEGORY_MAP_FILE")]
    pub map_file: Option<PathBuf>,

    /// Token endpoint URL
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: String,

    /// Asset creation endpoint URL
    #[arg(long, env = "ASSET_API_URL")]
    pub api_url: String,

    #[arg(long, env = "CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    #[arg(long, env = "ACCOUNT_ID")]
    pub account_id: String,

    #[arg(long, default_value = "client_credentials", env = "GRANT_TYPE")]
    pub grant_type: String,

    /// Wait after a create event before reading the file (milliseconds)
    #[arg(long, default_value = "2000", env = "SETTLE_DELAY_MS")]
    pub settle_delay_ms: u64,

    /// Timeout for asset creation calls (seconds)
    #[arg(long, default_value = "60", env = "UPLOAD_TIMEOUT_SECS")]
    pub upload_timeout_secs: u64,

    /// Timeout for token requests (seconds)
    #[arg(long, default_value = "15", env = "AUTH_TIMEOUT_SECS")]
    pub auth_timeout_secs: u64,

    /// Number of concurrent pipeline workers
    #[arg(long, default_value = "4", env = "INGEST_WORKERS")]
    pub workers: usize,

    /// Capacity of the settled-file work queue
    #[arg(long, default_value = "256", env = "INGEST_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Name of the per-folder archive subdirectory
    #[arg(long, default_value = "lidos", env = "ARCHIVE_DIR_NAME")]
    pub archive_dir_name: String,

    /// Enqueue files already present in the watched folders at startup
    #[arg(long, env = "SCAN_EXISTING")]
    pub scan_existing: bool,
}

impl Config {
    /// Get the effective category map path.
    pub fn effective_map_file(&self) -> PathBuf {
        self.map_file
            .clone()
            .unwrap_or_else(|| self.root.join("pasta_map.json"))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_args() -> Vec<&'static str> {
        vec![
            "asset-ingest-local",
            "--root",
            "/data/in",
            "--auth-url",
            "https://auth.example.com/v2/token",
            "--api-url",
            "https://rest.example.com/asset/v1/content/assets",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--account-id",
            "123",
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(required_args()).unwrap();
        assert_eq!(config.effective_map_file(), PathBuf::from("/data/in/pasta_map.json"));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.upload_timeout(), Duration::from_secs(60));
        assert_eq!(config.auth_timeout(), Duration::from_secs(15));
        assert_eq!(config.archive_dir_name, "lidos");
        assert_eq!(config.grant_type, "client_credentials");
        assert!(!config.scan_existing);
    }

    #[test]
    fn test_explicit_map_file() {
        let mut args = required_args();
        args.extend(["--map-file", "/etc/ingest/map.json", "--scan-existing"]);
        let config = Config::try_parse_from(args).unwrap();
        assert_eq!(config.effective_map_file(), PathBuf::from("/etc/ingest/map.json"));
        assert!(config.scan_existing);
    }
}
