//! Configuration loading and validation.
//!
//! Configuration is layered with [`figment`], later layers overriding earlier
//! ones:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. `config.toml` in the platform configuration directory
//!    (e.g. `~/.config/slotkeeper/config.toml`).
//! 3. An explicitly requested file (TOML, YAML or JSON, by extension).
//! 4. Environment variables prefixed `SLOTKEEPER_`, with `__` separating
//!    nested keys (`SLOTKEEPER_CONVERTER__TIMEOUT=600`).
//!
//! ```toml
//! [store]
//! root = "/media/sdcard"
//!
//! [tracks]
//! index_width = 3
//! chapter_template = "{{ name }} - Chapter {{ number }}"
//!
//! [converter]
//! timeout = 3600
//! backends = ["aaxtomp3", "ffmpeg"]
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sidecar file name used when `store.database` isn't set.
pub const DEFAULT_DATABASE_NAME: &str = ".slotkeeper.json";
/// Track file stems are zero-padded to this many digits by default.
pub const DEFAULT_INDEX_WIDTH: usize = 3;
/// One hour; converting a long audiobook is slow.
pub const DEFAULT_CONVERTER_TIMEOUT: u64 = 60 * 60;
const ENV_PREFIX: &str = "SLOTKEEPER_";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: Store,
    pub tracks: Tracks,
    pub converter: Converter,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    /// Directory holding the numbered slot folders.
    pub root: PathBuf,
    /// Sidecar location; defaults to [`DEFAULT_DATABASE_NAME`] inside `root`.
    pub database: Option<PathBuf>,
}
impl Default for Store {
    fn default() -> Self {
        Self {
            root: PathBuf::from("sd-card"),
            database: None,
        }
    }
}
impl Store {
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| self.root.join(DEFAULT_DATABASE_NAME))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tracks {
    /// Digits in a track file stem (`001.mp3` for 3). Either 3 or 4.
    pub index_width: usize,
    /// Track name template for multi-track audiobooks.
    pub chapter_template: String,
    /// Track name template for every other multi-track content type.
    pub track_template: String,
}
impl Default for Tracks {
    fn default() -> Self {
        Self {
            index_width: DEFAULT_INDEX_WIDTH,
            chapter_template: "{{ name }} - Chapter {{ number }}".to_string(),
            track_template: "{{ name }} - Track {{ number }}".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Converter {
    /// Wall-clock limit for a single conversion, in seconds.
    pub timeout: u64,
    /// Backend ids to probe, highest priority first.
    pub backends: Vec<String>,
    /// Default activation secret used when a request doesn't carry one.
    pub secret: Option<String>,
}
impl Default for Converter {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONVERTER_TIMEOUT,
            backends: vec!["aaxtomp3".to_string(), "ffmpeg".to_string()],
            secret: None,
        }
    }
}
impl Converter {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Config {
    /// Load configuration from every layer, including the user's platform
    /// config file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(Self::user_config_file(), explicit)?)
    }

    /// `config.toml` in the platform configuration directory, if the platform
    /// has one.
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "slotkeeper").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Builds the layered figment. Missing optional files are skipped; a
    /// missing *explicit* file is an error.
    pub fn figment(user: Option<PathBuf>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user {
            tracing::trace!(path = %user.display(), "Merging user configuration file");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                Some("toml") | None => figment.merge(Toml::file(path)),
                Some(other) => exn::bail!(ErrorKind::UnsupportedFormat(other.to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| ErrorKind::Extract(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(3..=4).contains(&self.tracks.index_width) {
            exn::bail!(ErrorKind::IndexWidth(self.tracks.index_width));
        }
        if self.converter.timeout == 0 {
            exn::bail!(ErrorKind::Timeout);
        }
        if self.converter.backends.is_empty() {
            exn::bail!(ErrorKind::NoBackends);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn load_in_jail(explicit: Option<&str>) -> Result<Config> {
        Config::from_figment(Config::figment(None, explicit.map(Path::new))?)
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_in_jail(None).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.store.database_path(), Path::new("sd-card/.slotkeeper.json"));
            assert_eq!(config.converter.timeout(), Duration::from_secs(3600));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "slotkeeper.toml",
                r#"
                    [store]
                    root = "/media/card"
                    database = "/home/me/card.json"

                    [tracks]
                    index_width = 4

                    [converter]
                    timeout = 120
                "#,
            )?;
            jail.set_env("SLOTKEEPER_CONVERTER__TIMEOUT", "600");
            jail.set_env("SLOTKEEPER_CONVERTER__SECRET", "deadbeef");
            let config = load_in_jail(Some("slotkeeper.toml")).unwrap();
            assert_eq!(config.store.root, Path::new("/media/card"));
            assert_eq!(config.store.database_path(), Path::new("/home/me/card.json"));
            assert_eq!(config.tracks.index_width, 4);
            assert_eq!(config.converter.timeout, 600);
            assert_eq!(config.converter.secret.as_deref(), Some("deadbeef"));
            // Untouched keys keep their defaults.
            assert_eq!(config.tracks.track_template, Tracks::default().track_template);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "converter:\n  backends: [ffmpeg]\n")?;
            let config = load_in_jail(Some("config.yaml")).unwrap();
            assert_eq!(config.converter.backends, vec!["ffmpeg".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = load_in_jail(Some("nope.toml")).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("config.ini", "")?;
            let err = load_in_jail(Some("config.ini")).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("[tracks]\nindex_width = 2\n")]
    #[case("[tracks]\nindex_width = 5\n")]
    #[case("[converter]\ntimeout = 0\n")]
    #[case("[converter]\nbackends = []\n")]
    #[case("[tracks]\nindex_width = \"wide\"\n")]
    fn test_invalid(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", contents)?;
            assert!(load_in_jail(Some("bad.toml")).is_err());
            Ok(())
        });
    }
}
