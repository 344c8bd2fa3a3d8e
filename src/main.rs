use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repodiagram::cli::commands::generate::GenerateOptions;
use repodiagram::config::{Config, ConfigLoader};

/// Architecture diagrams for GitHub repositories, streamed from an LLM
#[derive(Parser)]
#[command(name = "repodiagram")]
#[command(version, about = "Generate architecture diagrams for GitHub repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load configuration from this file instead of the global/project files
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, help = "Address to bind (default from config)")]
        bind: Option<String>,
    },

    /// Estimate the cost of generating a diagram
    Cost {
        #[arg(help = "Repository as owner/repo or GitHub URL")]
        repository: String,
        #[arg(long, env = "GITHUB_PAT", hide_env_values = true, help = "GitHub personal access token")]
        github_pat: Option<String>,
    },

    /// Generate a diagram and print events as they arrive
    Generate {
        #[arg(help = "Repository as owner/repo or GitHub URL")]
        repository: String,
        #[arg(long, short, help = "Extra instructions for the diagram (max 1000 chars)")]
        instructions: Option<String>,
        #[arg(long, hide_env_values = true, help = "Your own completion API key")]
        api_key: Option<String>,
        #[arg(long, env = "GITHUB_PAT", hide_env_values = true, help = "GitHub personal access token")]
        github_pat: Option<String>,
        #[arg(long, help = "Print raw event-stream frames")]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        #[arg(short = 'f', long, default_value = "toml", help = "Output format: toml, json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mrepodiagram encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(config)
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { bind } => {
            let rt = Runtime::new()?;
            rt.block_on(repodiagram::cli::commands::serve::run(
                &config,
                bind.as_deref(),
            ))?;
        }
        Commands::Cost {
            repository,
            github_pat,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(repodiagram::cli::commands::cost::run(
                &config,
                &repository,
                github_pat,
            ))?;
        }
        Commands::Generate {
            repository,
            instructions,
            api_key,
            github_pat,
            json,
        } => {
            let rt = Runtime::new()?;
            let completed = rt.block_on(repodiagram::cli::commands::generate::run(
                &config,
                GenerateOptions {
                    target: repository,
                    instructions,
                    api_key,
                    github_pat,
                    json,
                    quiet: cli.quiet,
                },
            ))?;
            if !completed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                repodiagram::cli::commands::config::show(&config, &format)?;
            }
            ConfigAction::Path => {
                repodiagram::cli::commands::config::path()?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
