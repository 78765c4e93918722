//! Host configuration (`omphalos.yaml`)
//!
//! ## Lookup
//!
//! ```text
//! --config <file>                       must exist
//!   └─ <root>/omphalos.yaml             optional
//!        └─ <config dir>/omphalos/omphalos.yaml
//!             └─ built-in defaults
//! ```
//!
//! Relative paths in the file are resolved against the root directory.
//! Command line and environment overrides are applied on top, then the
//! result is validated.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OmphalosError, Result, config_invalid, config_parse_failed};

/// Configuration file name
pub const CONFIG_FILE: &str = "omphalos.yaml";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    /// Dashboard files served at the root URL
    pub static_dir: PathBuf,
    pub bundles: BundlesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundlesConfig {
    /// Primary bundle directory
    pub dir: PathBuf,
    /// Additional single-bundle directories
    pub extra_paths: Vec<PathBuf>,
    /// Glob patterns of bundle names to skip
    pub ignore: Vec<String>,
    pub load_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: PathBuf::from("www"),
            bundles: BundlesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BundlesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("bundles"),
            extra_paths: Vec::new(),
            ignore: Vec::new(),
            load_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

impl HostConfig {
    /// Parse configuration from YAML; an empty document yields the defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Locate, read, override and validate the configuration
    pub fn load(root: &Path, explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let user_file = dirs::config_dir().map(|d| d.join("omphalos").join(CONFIG_FILE));
        let mut config = match locate(root, explicit, user_file.as_deref())? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Reading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::file_read_failed(path.display().to_string(), e.to_string())
        })?;
        Self::from_yaml(&content)
            .map_err(|e| config_parse_failed(path.display().to_string(), e.to_string()))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.to_ascii_lowercase();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(config_invalid("port must be between 1 and 65535"));
        }
        if self.bundles.load_timeout_secs == 0 {
            return Err(config_invalid("bundles.load_timeout_secs must be positive"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(config_invalid(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    pub fn bundles_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.bundles.dir)
    }

    pub fn extra_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.bundles.extra_paths.iter().map(|p| root.join(p)).collect()
    }

    pub fn static_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.static_dir)
    }

    /// Address to listen on; the host may be a name or an IP address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| config_invalid(format!("cannot resolve host '{}': {e}", self.host)))?
            .next()
            .ok_or_else(|| config_invalid(format!("host '{}' has no address", self.host)))
    }
}

/// Pick the configuration file to read, if any
fn locate(root: &Path, explicit: Option<&Path>, user_file: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(OmphalosError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = root.join(CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(user_file.filter(|p| p.is_file()).map(Path::to_path_buf))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_fixtures::create_temp_dir;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_yaml("").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.bundles.load_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = HostConfig::from_yaml(
            "port: 9090\nbundles:\n  ignore: ['test-*']\n  extra_paths: [../shared/ticker]\n",
        )
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bundles.dir, PathBuf::from("bundles"));
        assert_eq!(config.bundles.ignore, vec!["test-*".to_string()]);
        assert_eq!(
            config.extra_paths(Path::new("/srv")),
            vec![PathBuf::from("/srv/../shared/ticker")]
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(HostConfig::from_yaml("prot: 80\n").is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = HostConfig::default();
        config.port = 0;
        assert!(matches!(config.validate(), Err(OmphalosError::ConfigInvalid { .. })));

        let mut config = HostConfig::default();
        config.bundles.load_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_overrides() {
        let mut config = HostConfig::default();
        config.apply(&Overrides {
            port: Some(8080),
            log_level: Some("DEBUG".to_string()),
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_locate_order() {
        let temp = create_temp_dir();
        let root = temp.path();
        let user = root.join("user.yaml");
        std::fs::write(&user, "port: 1\n").unwrap();

        assert_eq!(locate(root, None, Some(&user)).unwrap(), Some(user.clone()));

        let local = root.join(CONFIG_FILE);
        std::fs::write(&local, "port: 2\n").unwrap();
        assert_eq!(locate(root, None, Some(&user)).unwrap(), Some(local));

        assert_eq!(locate(root, Some(&user), None).unwrap(), Some(user));
        assert_eq!(locate(&root.join("nowhere"), None, None).unwrap(), None);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp = create_temp_dir();
        let missing = temp.path().join("missing.yaml");
        let result = HostConfig::load(temp.path(), Some(&missing), &Overrides::default());
        assert!(matches!(result, Err(OmphalosError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_reports_parse_failure_with_path() {
        let temp = create_temp_dir();
        let file = temp.path().join(CONFIG_FILE);
        std::fs::write(&file, "port: [not a number\n").unwrap();
        let err = HostConfig::load(temp.path(), Some(&file), &Overrides::default()).unwrap_err();
        match err {
            OmphalosError::ConfigParseFailed { path, .. } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = HostConfig::default().socket_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:3000".parse().unwrap());
    }
}
