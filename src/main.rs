use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    command: FlatpageCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the site in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// The port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Path to serve the site under
    #[arg(short, long, default_value = "/")]
    mount: String,

    /// Open the site in the default browser
    #[arg(short, long, default_value = "false")]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = "flatpage.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
struct RenderArgs {
    /// The request path to render, e.g. `/blog/first-post`
    path: String,

    /// Path the site is mounted under
    #[arg(short, long, default_value = "/")]
    mount: String,

    /// Base URL used when the config sets none
    #[arg(short, long, default_value = "")]
    base_url: String,

    /// The path to the configuration file
    #[arg(short, long, default_value = "flatpage.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum FlatpageCommand {
    /// Initialize a new flatpage site
    Init(InitArgs),

    /// Serve the site on a local port
    Serve(ServeArgs),

    /// Render a single page to stdout
    Render(RenderArgs),
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so `render` output stays clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match args.command {
        FlatpageCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        FlatpageCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
        FlatpageCommand::Render(args) => {
            commands::render::run(&args).await?;
        }
    }

    Ok(())
}
