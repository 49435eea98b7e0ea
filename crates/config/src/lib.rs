//! Configuration loading and validation.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults.
//! 2. `config.toml` in the per-user configuration directory, if present.
//! 3. An explicitly requested file (TOML, YAML or JSON, by extension).
//! 4. `SHAREFIND_*` environment variables, with `__` separating nested keys
//!    (`SHAREFIND_CACHE__TOLERATE_WRITE_ERRORS=true`).
//!
//! ```toml
//! [cache]
//! reuse_snapshot_listings = true
//!
//! [backend]
//! type = "local"
//! root = "/mnt/shares"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SHAREFIND_";
const CONFIG_FILE: &str = "config.toml";
const CACHE_FILE: &str = "cache.sqlite";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "sharefind").ok_or_raise(|| ErrorKind::NoHomeDirectory)
}

/// Cache behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location of the cache database. Defaults to `cache.sqlite` in the
    /// per-user configuration directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Serve snapshot directory listings from the cache when they were
    /// recorded by an earlier run. Snapshots never change, so this only
    /// skips remote calls. The live share is always listed remotely.
    pub reuse_snapshot_listings: bool,
    /// Log failed cache writes instead of aborting the search.
    pub tolerate_write_errors: bool,
}

/// Where shares are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Shares mounted (or copied) onto the local filesystem.
    Local { root: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
}

impl Config {
    /// Load the configuration from every source, including the per-user
    /// configuration directory when there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = match project_dirs() {
            Ok(dirs) => Some(dirs.config_dir().join(CONFIG_FILE)),
            Err(err) => {
                tracing::debug!(error = %err, "Skipping user configuration");
                None
            },
        };
        Self::load_from(user.as_deref(), explicit)
    }

    /// Load the configuration, reading the user-level file from `user`
    /// instead of the platform's configuration directory.
    pub fn load_from(user: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user
            && user.is_file()
        {
            tracing::debug!(path = %user.display(), "Loading user configuration");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(explicit) = explicit {
            if !explicit.is_file() {
                exn::bail!(ErrorKind::Invalid(format!("{} is not a file", explicit.display())));
            }
            tracing::debug!(path = %explicit.display(), "Loading configuration file");
            figment = match explicit.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(explicit)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(explicit)),
                Some("json") => figment.merge(Json::file(explicit)),
                _ => exn::bail!(ErrorKind::Format(explicit.to_path_buf())),
            };
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(BackendConfig::Local { root }) = &self.backend
            && !root.is_absolute()
        {
            exn::bail!(ErrorKind::Invalid(format!("local backend root must be absolute: {}", root.display())));
        }
        if let Some(path) = &self.cache.path
            && path.as_os_str().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("cache path is empty".to_string()));
        }
        Ok(())
    }

    /// The configured backend. Searching without one is meaningless.
    pub fn backend(&self) -> Result<&BackendConfig> {
        self.backend
            .as_ref()
            .ok_or_raise(|| ErrorKind::Invalid("no backend configured".to_string()))
    }

    /// Location of the cache database, falling back to the per-user default.
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.config_dir().join(CACHE_FILE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from(None, None).unwrap();
            assert_eq!(config, Config::default());
            assert!(!config.cache.reuse_snapshot_listings);
            assert!(!config.cache.tolerate_write_errors);
            assert!(matches!(&*config.backend().unwrap_err(), ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("config.toml", "[backend]\ntype = \"local\"\nroot = \"/mnt/shares\"\n")]
    #[case("config.yaml", "backend:\n  type: local\n  root: /mnt/shares\n")]
    #[case("config.yml", "backend:\n  type: local\n  root: /mnt/shares\n")]
    #[case("config.json", r#"{"backend": {"type": "local", "root": "/mnt/shares"}}"#)]
    fn test_explicit_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load_from(None, Some(Path::new(name))).unwrap();
            assert_eq!(
                config.backend().unwrap(),
                &BackendConfig::Local { root: PathBuf::from("/mnt/shares") }
            );
            Ok(())
        });
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "user.toml",
                "[cache]\npath = \"/var/cache/user.sqlite\"\nreuse_snapshot_listings = true\n",
            )?;
            jail.create_file("explicit.toml", "[cache]\npath = \"/var/cache/explicit.sqlite\"\n")?;
            jail.set_env("SHAREFIND_CACHE__TOLERATE_WRITE_ERRORS", "true");
            let config = Config::load_from(Some(Path::new("user.toml")), Some(Path::new("explicit.toml"))).unwrap();
            assert_eq!(config.cache_path().unwrap(), PathBuf::from("/var/cache/explicit.sqlite"));
            assert!(config.cache.reuse_snapshot_listings);
            assert!(config.cache.tolerate_write_errors);
            Ok(())
        });
    }

    #[test]
    fn test_missing_user_file_is_ignored() {
        Jail::expect_with(|_jail| {
            assert!(Config::load_from(Some(Path::new("nope.toml")), None).is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = Config::load_from(None, Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_format() {
        Jail::expect_with(|jail| {
            jail.create_file("config.ini", "[cache]\n")?;
            let err = Config::load_from(None, Some(Path::new("config.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Format(_)));
            Ok(())
        });
    }

    #[test]
    fn test_relative_local_root() {
        Jail::expect_with(|jail| {
            jail.set_env("SHAREFIND_BACKEND__TYPE", "local");
            jail.set_env("SHAREFIND_BACKEND__ROOT", "shares");
            let err = Config::load_from(None, None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_value() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[cache]\nreuse_snapshot_listings = \"sometimes\"\n")?;
            let err = Config::load_from(None, Some(Path::new("config.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_backend_type() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[backend]\ntype = \"ftp\"\nroot = \"/\"\n")?;
            let err = Config::load_from(None, Some(Path::new("config.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }
}
