//! Configuration, persisted as TOML.
//!
//! The default location is `$XDG_CONFIG_HOME/ontoscope/config.toml`
//! (falling back to `$HOME/.config/ontoscope/config.toml`). Every field has a
//! default, so a partial file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vocab;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// HTTP method used to send a query to a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A named remote SPARQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
}

/// IRIs used to classify and label subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default = "default_label_predicates")]
    pub label_predicates: Vec<String>,
    #[serde(default = "default_class_markers")]
    pub class_markers: Vec<String>,
    #[serde(default = "default_instance_markers")]
    pub instance_markers: Vec<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            label_predicates: default_label_predicates(),
            class_markers: default_class_markers(),
            instance_markers: default_instance_markers(),
            preferred_language: None,
        }
    }
}

/// Graph view display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_color")]
    pub default_color: String,
    /// Class label → node color.
    #[serde(default = "default_class_colors")]
    pub class_colors: BTreeMap<String, String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_color: default_color(),
            class_colors: default_class_colors(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default query / fetch timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_endpoint")]
    pub default_endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<String, EndpointConfig>,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_endpoint() -> String {
    "dbpedia".into()
}
fn default_user_agent() -> String {
    concat!("ontoscope/", env!("CARGO_PKG_VERSION")).into()
}
fn default_endpoints() -> BTreeMap<String, EndpointConfig> {
    BTreeMap::from([
        (
            "dbpedia".to_string(),
            EndpointConfig {
                url: "https://dbpedia.org/sparql".into(),
                method: HttpMethod::Get,
            },
        ),
        (
            "wikidata".to_string(),
            EndpointConfig {
                url: "https://query.wikidata.org/sparql".into(),
                method: HttpMethod::Get,
            },
        ),
    ])
}
fn default_label_predicates() -> Vec<String> {
    vec![vocab::RDFS_LABEL.into()]
}
fn default_class_markers() -> Vec<String> {
    vec![vocab::OWL_CLASS.into()]
}
fn default_instance_markers() -> Vec<String> {
    vec![vocab::OWL_NAMED_INDIVIDUAL.into()]
}
fn default_color() -> String {
    "#CCCCCC".into()
}
fn default_class_colors() -> BTreeMap<String, String> {
    [
        ("Ville", "#FF9999"),
        ("Stade", "#99FF99"),
        ("AttractionTouristique", "#9999FF"),
        ("Hébergement", "#FFFF99"),
        ("Transport", "#FF99FF"),
        ("Événement", "#99FFFF"),
    ]
    .into_iter()
    .map(|(class, color)| (class.to_string(), color.to_string()))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_endpoint: default_endpoint(),
            user_agent: default_user_agent(),
            endpoints: default_endpoints(),
            vocabulary: VocabularyConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load an explicit path, or the default location if it exists, or defaults.
    ///
    /// An explicit path that cannot be read is an error; a missing default file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Ok(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `$XDG_CONFIG_HOME/ontoscope/config.toml` with the standard `$HOME/.config` fallback.
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let config_home = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| ConfigError::NoHome)?,
    };
    Ok(config_home.join("ontoscope").join("config.toml"))
}
