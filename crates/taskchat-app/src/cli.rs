//! CLI argument definitions for the taskchat server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// taskchat - a conversational task manager served over HTTP.
#[derive(Parser, Debug)]
#[command(name = "taskchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Skip the completion model and answer chat with keyword rules only.
    #[arg(long = "no-llm")]
    pub no_llm: bool,

    /// Keep all state in memory. A user's tasks and transcript are dropped
    /// when their engine goes idle, and nothing survives a restart.
    #[arg(long = "ephemeral")]
    pub ephemeral: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TASKCHAT_CONFIG env var > ~/.taskchat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TASKCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > TASKCHAT_PORT env var > config file value > 8787.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("TASKCHAT_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        8787
    }

    /// Data directory override from --data-dir, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override from --log-level, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Completion API key.
    ///
    /// Priority: TASKCHAT_API_KEY env var > config file value.
    pub fn resolve_api_key(&self, config_key: Option<String>) -> Option<String> {
        std::env::var("TASKCHAT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or(config_key)
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".taskchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".taskchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "taskchat",
            "--port",
            "9000",
            "--no-llm",
            "--ephemeral",
            "-l",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.resolve_port(8787), 9000);
        assert!(args.no_llm);
        assert!(args.ephemeral);
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
        assert!(args.resolve_data_dir().is_none());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::try_parse_from(["taskchat", "-c", "/tmp/tc.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/tc.toml"));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(CliArgs::try_parse_from(["taskchat", "--port", "http"]).is_err());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/taskchat"), PathBuf::from("/var/lib/taskchat"));
        assert!(!expand_home("~/data").to_string_lossy().starts_with('~'));
    }
}
