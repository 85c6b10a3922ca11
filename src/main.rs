use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::error;
use std::path::PathBuf;

use sphinx_multi_theme::app::MultiThemeBuild;
use sphinx_multi_theme::builder::SiteBuilder;
use sphinx_multi_theme::config::{BuildConfig, ReplicationStrategy, ThemeValue, TreeStyle};
use sphinx_multi_theme::replicator::{self, EXIT_SUCCESS};

/// Render one documentation tree into several independently themed output trees.
///
/// The first theme renders into the output directory, every further theme
/// into its own subdirectory (`theme_<name>` unless configured otherwise).
#[derive(Parser, Debug)]
#[command(name = "sphinx-multi-theme", version)]
struct Cli {
    /// Source directory
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Configuration file (default: multitheme.toml/.yaml in the source directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Theme to build; repeat for several, the first one is the primary theme
    #[arg(short = 't', long = "theme", value_name = "NAME")]
    themes: Vec<String>,

    /// Number of parallel jobs within one theme pass
    #[arg(short, long)]
    jobs: Option<usize>,

    /// List the output tree after a successful build
    #[arg(long)]
    print_files: bool,

    #[arg(long, value_enum)]
    tree_style: Option<TreeStyle>,

    /// How secondary themes get their own process
    #[arg(long, value_enum)]
    replication: Option<ReplicationStrategy>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    fn load_config(&self) -> Result<BuildConfig> {
        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let dir = self.source.clone().unwrap_or_else(|| PathBuf::from("."));
                BuildConfig::discover(&dir)
            }
        };

        let mut config = match config_path {
            Some(path) => BuildConfig::from_file(&path)?,
            None => BuildConfig::default(),
        };

        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if !self.themes.is_empty() {
            config.html_theme =
                ThemeValue::Multi(self.themes.iter().map(|name| name.as_str().into()).collect());
        }
        if self.jobs.is_some() {
            config.parallel_jobs = self.jobs;
        }
        if self.print_files {
            config.multi_theme_print_files = true;
        }
        if self.tree_style.is_some() {
            config.multi_theme_print_files_style = self.tree_style;
        }
        if let Some(replication) = self.replication {
            config.replication = replication;
        }
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let config = cli.load_config().context("Failed to load configuration")?;
    let mut build = MultiThemeBuild::new(config, SiteBuilder::new());

    if let Some(index) = replicator::replica_index_from_env() {
        let status = build.run_replica(index);
        log::logger().flush();
        return Ok(status);
    }

    build.run()?;
    Ok(EXIT_SUCCESS)
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}
