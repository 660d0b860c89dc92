use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use plugindoc_core::config::{ConfigOverrides, DEFAULT_CONFIG_PATH, load_config};
use plugindoc_core::confluence::ConfluenceClient;
use plugindoc_core::descriptor::{load_descriptor, validate_descriptor};
use plugindoc_core::sync::{SyncReport, publish, render_to_directory};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "plugindoc",
    version,
    about = "Publish build-plugin descriptor documentation to Confluence"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create or update the plugin page tree")]
    Publish(PublishArgs),
    #[command(about = "Write rendered pages as wiki markup files")]
    Render(RenderArgs),
    #[command(about = "Check a descriptor without contacting Confluence")]
    Validate(DescriptorArgs),
}

#[derive(Debug, Args)]
struct DescriptorArgs {
    #[arg(long, value_name = "PATH", help = "Plugin descriptor (JSON or YAML)")]
    descriptor: PathBuf,
}

#[derive(Debug, Args)]
struct PublishArgs {
    #[command(flatten)]
    input: DescriptorArgs,
    #[arg(long, value_name = "KEY", help = "Target space key")]
    space: Option<String>,
    #[arg(long, value_name = "TITLE", help = "Existing page to publish under")]
    parent: Option<String>,
    #[arg(long, value_name = "URL", help = "Confluence base URL")]
    endpoint: Option<String>,
    #[arg(long, value_name = "NAME")]
    username: Option<String>,
    #[arg(long, help = "Look pages up but do not write anything")]
    dry_run: bool,
    #[arg(long, help = "With --dry-run, print a unified diff for every changed page")]
    diff: bool,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct RenderArgs {
    #[command(flatten)]
    input: DescriptorArgs,
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match cli.command {
        Some(Commands::Publish(args)) => run_publish(&config_path, args),
        Some(Commands::Render(args)) => run_render(&config_path, args),
        Some(Commands::Validate(args)) => run_validate(args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_publish(config_path: &Path, args: PublishArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let descriptor = load_descriptor(&args.input.descriptor)?;
    let mut settings = config.resolve(&ConfigOverrides {
        endpoint: args.endpoint,
        space_key: args.space,
        parent_page: args.parent,
        username: args.username,
    })?;
    settings.options.dry_run = args.dry_run;
    settings.options.show_diff = args.diff;
    debug!(
        endpoint = %settings.client.endpoint,
        space = %settings.options.space_key,
        "publishing"
    );

    let mut client = ConfluenceClient::new(settings.client)?;
    let report = publish(
        &mut client,
        &descriptor,
        &settings.credentials,
        &settings.options,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if !report.success {
        bail!("{} page(s) failed to synchronize", report.failed);
    }
    Ok(())
}

fn run_render(config_path: &Path, args: RenderArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let descriptor = load_descriptor(&args.input.descriptor)?;
    let written = render_to_directory(&descriptor, &config.messages, &args.output_dir)?;
    println!("rendered_pages: {}", written.len());
    for path in &written {
        println!("file: {}", normalize_path(path));
    }
    Ok(())
}

fn run_validate(args: DescriptorArgs) -> Result<()> {
    let descriptor = load_descriptor(&args.descriptor)?;
    validate_descriptor(&descriptor)?;
    println!("descriptor: {}", normalize_path(&args.descriptor));
    println!("plugin: {}", descriptor.root_title());
    println!("coordinates: {}", descriptor.coordinates());
    println!("goal_prefix: {}", descriptor.goal_prefix());
    println!("goals: {}", descriptor.goals.len());
    println!("valid: yes");
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("publish report");
    println!("space: {}", report.space_key);
    println!("dry_run: {}", format_flag(report.dry_run));
    for page in &report.pages {
        match &page.cause {
            Some(cause) => println!("page.{}: {} ({cause})", page.title, page.outcome.as_str()),
            None => println!("page.{}: {}", page.title, page.outcome.as_str()),
        }
        if let Some(diff) = &page.diff {
            print!("{diff}");
        }
    }
    println!("created: {}", report.created);
    println!("updated: {}", report.updated);
    println!("unchanged: {}", report.unchanged);
    println!("failed: {}", report.failed);
    println!("requests: {}", report.request_count);
    println!("success: {}", format_flag(report.success));
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
