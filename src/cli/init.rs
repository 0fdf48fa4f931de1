use std::path::{Path, PathBuf};

use changelog_release::Config;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Master changelogs to list in the configuration
    #[arg(long = "master", value_name = "PATH")]
    masters: Vec<PathBuf>,

    /// The directory classpath-relative inclusions resolve against
    #[arg(long, value_name = "DIR")]
    classpath_root: Option<PathBuf>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(Config::FILE_NAME);
        if config_path.exists() {
            anyhow::bail!(
                "Project already initialized (found existing {})",
                Config::FILE_NAME
            );
        }

        let mut config = Config {
            master_files: self.masters,
            ..Config::default()
        };
        if let Some(classpath_root) = self.classpath_root {
            config.classpath_root = classpath_root;
        }
        config
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", Config::FILE_NAME))?;

        println!("Initialized changelog release settings in {}", root.display());
        println!("  Created: {}", Config::FILE_NAME);
        println!();
        println!("Next steps:");
        if config.master_files.is_empty() {
            println!("  List your master changelogs under `master_files`");
        }
        println!("  changelog-release tag <VERSION> --dry-run");

        Ok(())
    }
}
