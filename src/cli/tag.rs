use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
};

use anyhow::Context;
use changelog_release::{Config, Plan, Project, Release, Version};
use clap::Parser;
use tracing::instrument;

use super::terminal::Tone;

#[derive(Debug, Parser)]
pub struct Command {
    /// The version to release
    ///
    /// Prompted for when omitted and standard input is a terminal.
    version: Option<String>,

    /// A master changelog, in addition to those in the configuration file
    #[arg(long = "master", value_name = "PATH")]
    masters: Vec<PathBuf>,

    /// An included changelog that must never be frozen
    #[arg(long = "skip", value_name = "PATH")]
    skipped: Vec<PathBuf>,

    /// The context of the generated tag entries
    #[arg(long)]
    context: Option<String>,

    /// The directory classpath-relative inclusions resolve against
    #[arg(long, value_name = "DIR")]
    classpath_root: Option<PathBuf>,

    /// Show what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    output: OutputFormat,

    /// Never prompt for the version
    #[arg(long)]
    no_interactive: bool,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Command {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root).map_err(|e| anyhow::anyhow!(e))?;
        let version = self.version()?;

        let classpath_root = root.join(
            self.classpath_root
                .as_ref()
                .unwrap_or(&config.classpath_root),
        );
        let context = self.context.clone().or_else(|| config.context.clone());
        let release = Release::new(version, classpath_root).with_context(context);
        let mut project = Project::new(release);

        let masters: Vec<&PathBuf> = config.master_files.iter().chain(&self.masters).collect();
        if masters.is_empty() {
            anyhow::bail!(
                "No master changelogs given; pass --master or list `master_files` in {}",
                Config::FILE_NAME
            );
        }
        for master in masters {
            let path = root.join(master);
            project
                .add_master(&path)
                .with_context(|| format!("Failed to open master changelog {}", path.display()))?;
        }
        for skipped in config.skipped_include_files.iter().chain(&self.skipped) {
            project.skip_tagging(root.join(skipped));
        }

        let plan = project.plan()?;
        if !self.dry_run {
            project.commit()?;
        }

        match self.output {
            OutputFormat::Json => Self::output_json(&plan)?,
            OutputFormat::Text if !self.quiet => self.output_text(&plan, root),
            OutputFormat::Text => {}
        }
        Ok(())
    }

    fn version(&self) -> anyhow::Result<Version> {
        let input = match &self.version {
            Some(version) => version.clone(),
            None if !self.no_interactive && std::io::stdin().is_terminal() => {
                dialoguer::Input::<String>::new()
                    .with_prompt("Enter the new version to set")
                    .interact_text()?
            }
            None => anyhow::bail!(
                "You must specify the new version, either as an argument or interactively"
            ),
        };
        Ok(Version::new(&input)?)
    }

    fn output_json(plan: &Plan) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(plan)?);
        Ok(())
    }

    fn output_text(&self, plan: &Plan, root: &Path) {
        let display = |path: &Path| path.strip_prefix(root).unwrap_or(path).display().to_string();

        if self.dry_run {
            println!(
                "{}",
                Tone::DryRun.paint(&format_args!(
                    "Dry run: nothing was written for version {}",
                    plan.version
                ))
            );
        } else {
            println!(
                "{}",
                Tone::Released.paint(&format_args!("✅ Released version {}", plan.version))
            );
        }

        for master in &plan.masters {
            println!("  {} {}", Tone::Muted.paint("tagged "), display(master));
        }
        for rotation in &plan.rotations {
            println!(
                "  {} {} -> {} {}",
                Tone::Muted.paint("frozen "),
                display(&rotation.from),
                display(&rotation.to),
                Tone::Muted.paint(&format_args!("({} entries)", rotation.entries))
            );
        }
        for skipped in &plan.skipped {
            println!("  {} {}", Tone::Muted.paint("skipped"), display(skipped));
        }
        if plan.rotations.is_empty() {
            println!(
                "{}",
                Tone::Muted.paint("No included changelog had pending entries.")
            );
        }
    }
}
