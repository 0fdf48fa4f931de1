use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for releasing a changelog tree.
///
/// All relative paths are interpreted against the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The master changelogs.
    ///
    /// Tags are written into these files, and the files they include are
    /// frozen under a version-qualified name.
    pub master_files: Vec<PathBuf>,

    /// Included changelogs that are never frozen, even when they contain
    /// migration entries.
    pub skipped_include_files: Vec<PathBuf>,

    /// The context to set on the generated tag entry.
    ///
    /// When absent, no context attribute is generated.
    pub context: Option<String>,

    /// The directory that inclusion references which are not relative to
    /// their changelog resolve against.
    pub classpath_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_files: Vec::new(),
            skipped_include_files: Vec::new(),
            context: None,
            classpath_root: default_classpath_root(),
        }
    }
}

impl Config {
    /// The name of the configuration file, relative to the project root.
    pub const FILE_NAME: &'static str = ".changelog-release.toml";

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads the configuration from the project root, falling back to the
    /// default configuration when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(root: &Path) -> Result<Self, String> {
        let path = root.join(Self::FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

fn default_classpath_root() -> PathBuf {
    PathBuf::from("src/main/resources")
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        master_files: Vec<PathBuf>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        skipped_include_files: Vec<PathBuf>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,

        #[serde(default = "default_classpath_root")]
        classpath_root: PathBuf,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                master_files,
                skipped_include_files,
                context,
                classpath_root,
            } => Self {
                master_files,
                skipped_include_files,
                context,
                classpath_root,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            master_files: config.master_files,
            skipped_include_files: config.skipped_include_files,
            context: config.context,
            classpath_root: config.classpath_root,
        }
    }
}
