use std::path::PathBuf;

mod init;
mod tag;
mod terminal;

use clap::ArgAction;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The project root; configured and relative paths resolve against it
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let root = std::path::absolute(&self.root)
            .map_err(|e| anyhow::anyhow!("Invalid project root {}: {e}", self.root.display()))?;
        self.command.run(&root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Tag a release
    ///
    /// Writes a tag entry for the new version into every master changelog,
    /// and freezes each included changelog with pending migration entries
    /// under a version-qualified filename.
    Tag(tag::Command),

    /// Write a default configuration file to the project root
    Init(init::Command),
}

impl Command {
    fn run(self, root: &std::path::Path) -> anyhow::Result<()> {
        match self {
            Self::Tag(command) => command.run(root),
            Self::Init(command) => command.run(root),
        }
    }
}
