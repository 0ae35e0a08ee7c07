mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, DecideArgs, GroupArgs, RunArgs};
use stackdealer_core::{
    decide, group_folder, print_summary, progress, run, write_json, Collaborators,
    CommandFetcher, ExifTimestampReader, GroupOutcome, ImageProcessor, PhotoFetcher, Processing,
    ScriptBridgeProcessor, Settings, EXIT_FAILURE,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Run(args) => run_pipeline(&cli, args),
        Command::Group(args) => run_group(&cli, args),
        Command::Decide(args) => run_decide(&cli, args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {:#}", error);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Settings::load_or_default().context("loading settings"),
    }
}

fn with_storage_root(mut settings: Settings, storage_root: Option<&PathBuf>) -> Settings {
    if let Some(root) = storage_root {
        settings.storage_root = Some(root.clone());
    }
    settings
}

fn run_group(cli: &Cli, args: &GroupArgs) -> Result<i32> {
    let settings = args.grouping.apply(load_settings(cli.config.as_deref())?)?;
    let progress_bar = progress::folder_progress(cli.quiet);

    let outcome = group_folder(&args.folder, &settings, &ExifTimestampReader, &progress_bar)
        .with_context(|| format!("grouping {}", args.folder.display()))?;
    progress_bar.finish_and_clear();

    print_summary(&outcome);
    if let Some(path) = &args.report {
        write_report(&outcome, path)?;
    }
    Ok(outcome.exit_code())
}

fn run_pipeline(cli: &Cli, args: &RunArgs) -> Result<i32> {
    let settings = args.grouping.apply(with_storage_root(
        load_settings(cli.config.as_deref())?,
        args.storage_root.as_ref(),
    ))?;

    let fetcher = settings.fetcher.as_ref().map(CommandFetcher::from);
    let processor = settings
        .processor
        .as_ref()
        .map(|processor| (ScriptBridgeProcessor::from(processor), processor.script.clone()));
    let collaborators = Collaborators {
        reader: &ExifTimestampReader,
        fetcher: fetcher.as_ref().map(|fetcher| fetcher as &dyn PhotoFetcher),
        processing: processor.as_ref().map(|(processor, script)| Processing {
            processor: processor as &dyn ImageProcessor,
            script: script.clone(),
        }),
    };

    let progress_bar = progress::folder_progress(cli.quiet);
    let report = run(&settings, &collaborators, &progress_bar).context("pipeline run failed")?;
    progress_bar.finish_and_clear();

    println!("{} in {}", report.action, report.folder.path.display());
    print_summary(&report.outcome);
    if let Some(path) = &args.report {
        write_report(&report.outcome, path)?;
    }
    if report.processed {
        println!("Processing finished.");
    }
    debug!(exit_code = report.outcome.exit_code(), "pipeline cycle done");
    // Empty or sparse folders are a normal end of a cycle here.
    Ok(0)
}

fn run_decide(cli: &Cli, args: &DecideArgs) -> Result<i32> {
    let settings = with_storage_root(
        load_settings(cli.config.as_deref())?,
        args.storage_root.as_ref(),
    );
    let storage_root = settings.storage_root()?;
    let (action, folder) = decide(
        storage_root,
        &settings.folder_base_pattern,
        &settings.grouped_folder_name,
        &settings.supported_extensions,
    )
    .with_context(|| format!("inspecting {}", storage_root.display()))?;
    println!("{}: {}", action, folder.path.display());
    Ok(0)
}

fn write_report(outcome: &GroupOutcome, path: &Path) -> Result<()> {
    write_json(outcome, path)?;
    info!(path = %path.display(), "grouping report written");
    Ok(())
}
