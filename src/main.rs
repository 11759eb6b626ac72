use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::{Input, theme::ColorfulTheme};
use tracing_subscriber::EnvFilter;

use essaychat::Config;
use essaychat::Services;
use essaychat::terminal::TerminalSurface;

mod exports_cmd;

#[derive(Parser)]
#[command(name = "essaychat", version, about = "Essay writing assistant with chat log export")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and start chatting
    #[command(name = "chat")]
    Chat {
        /// Account email (prompted for when omitted)
        #[arg(long)]
        email: Option<String>,
    },

    /// Published chat logs
    #[command(name = "exports")]
    Exports {
        #[command(subcommand)]
        action: Option<ExportsAction>,
    },

    /// View or modify config ($ESSAYCHAT_HOME/config.toml)
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ExportsAction {
    /// List every published chat log
    List,
    /// Print the rows of a local chat log CSV
    Show {
        path: std::path::PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current config
    Show,
    /// Set a config value
    Set {
        /// Key to set (backend, project_id, storage_bucket, model, timezone, ...)
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("essaychat=debug")
    } else {
        EnvFilter::try_from_env("ESSAYCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Chat { email } => run_chat(email)?,
        Commands::Exports { action } => exports_cmd::run(action)?,
        Commands::Config { action } => handle_config(action)?,
    }
    Ok(())
}

fn run_chat(email: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let services = Services::from_config(&config)?;

    let email = match email {
        Some(email) => email,
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Email")
            .interact_text()?,
    };
    let mut ctx = services.login(&email)?;
    let heartbeat = ctx.spawn_heartbeat(config.heartbeat_interval());

    println!("\x1b[1mEssay Writing Assistant\x1b[0m  (type /quit to leave)");
    println!();
    let mut surface = TerminalSurface::new();
    let result = services.run(&mut ctx, &mut surface);

    ctx.logout();
    heartbeat.join();
    result
}

fn handle_config(action: Option<ConfigAction>) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let config = Config::load().unwrap_or_default();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut config = Config::load().unwrap_or_default();
            config.set(&key, &value)?;
            let path = config.save()?;
            println!("saved to {}", path.display());
        }
        Some(ConfigAction::Reset) => {
            let config = Config::default();
            let path = config.save()?;
            println!("reset to defaults at {}", path.display());
        }
    }
    Ok(())
}
