use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Config file looked up in the working directory when `--config`
/// is not given. A missing default file means built-in defaults.
pub const DEFAULT_CONFIG_FILE: &str = "companion.json";

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Every section and field is optional; an empty `{}` file is a
// valid configuration equal to `Config::default()`.
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Where the companion extension pushes problems
    pub listener: ListenerConfig,

    /// How problems are laid out on disk
    pub workspace: WorkspaceConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

// ------------------------------------------------------------
// Listener configuration
// ------------------------------------------------------------
//
// Notes:
// - 10046 is the port Competitive Companion is set up to push to.
// - `max_wait_secs` caps waits that would otherwise be unbounded
//   (fixed-count and batch collection, the first idle-mode wait).
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    pub max_wait_secs: Option<f64>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10046,
            max_wait_secs: None,
        }
    }
}

impl ListenerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid listener host {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn max_wait(&self) -> anyhow::Result<Option<Duration>> {
        self.max_wait_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid listener.max_wait_secs {secs}"))
            })
            .transpose()
    }
}

// ------------------------------------------------------------
// Workspace configuration
// ------------------------------------------------------------
//
// `template_dir` is resolved against the directory problems are
// created in. Files in it ending in `source_extension` are renamed
// after the problem (`sol.cpp` -> `A.cpp`).
//
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub template_dir: PathBuf,
    pub source_extension: String,

    /// Append `_YYYYmmdd_HHMMSS` to every problem directory
    pub timestamp_dirs: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from(".template"),
            source_extension: "cpp".to_string(),
            timestamp_dirs: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Enables debug-level logging for this crate
    pub log: bool,
}

impl Config {
    pub fn debug_log(&self) -> bool {
        self.debug.as_ref().is_some_and(|d| d.log)
    }
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// An explicit path must exist. Without one, `companion.json` is
// used when present and defaults otherwise.
//
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.listener.port, 10046);
        assert_eq!(cfg.listener.host, "127.0.0.1");
        assert_eq!(cfg.workspace.source_extension, "cpp");
        assert!(cfg.workspace.timestamp_dirs);
        assert!(!cfg.debug_log());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{ "listener": { "port": 27121, "max_wait_secs": 2.5 }, "debug": { "log": true } }"#,
        )
        .unwrap();
        assert_eq!(cfg.listener.port, 27121);
        assert_eq!(cfg.listener.host, "127.0.0.1");
        assert_eq!(cfg.listener.max_wait().unwrap(), Some(Duration::from_millis(2500)));
        assert!(cfg.debug_log());
    }

    #[test]
    fn socket_addr_accepts_ipv6_hosts() {
        let cfg = ListenerConfig {
            host: "::1".to_string(),
            ..ListenerConfig::default()
        };
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "[::1]:10046");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{ "workspace": { "timestamp_dirs": false } }"#).unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert!(!cfg.workspace.timestamp_dirs);
        assert_eq!(cfg.workspace.template_dir, PathBuf::from(".template"));
    }
}
