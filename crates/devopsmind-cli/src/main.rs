mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::profile::ProfileSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "devopsmind",
    about = "Gamified DevOps trainer: solve challenges offline, earn XP, climb the leaderboard",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory for profiles, queue and caches (default: ~/.devopsmind)
    #[arg(long, global = true, env = "DEVOPSMIND_HOME")]
    data_dir: Option<PathBuf>,

    /// Root for per-challenge workspaces (default: ~/DevOpsMind/workspace)
    #[arg(long, global = true, env = "DEVOPSMIND_WORKSPACE")]
    workspace_root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log progress details (repeat for more)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available challenges
    List {
        /// Only show one stack (e.g. git, 03-git)
        #[arg(long)]
        stack: Option<String>,
    },

    /// Refresh a challenge workspace and validate it
    Play { id: String },

    /// Validate a workspace without refreshing challenge files
    Validate {
        id: String,
        /// Extra validator context as a JSON object
        #[arg(long)]
        context: Option<String>,
    },

    /// Show XP, rank and completed challenges
    Stats,

    /// Show the local and global leaderboards
    Leaderboard,

    /// Merge pending progress, install bundled challenges and rebuild caches
    Sync,

    /// Submit queued progress snapshots to the relay
    Submit,

    /// Check the local environment
    Doctor,

    /// Print a challenge hint
    Hint { id: String },

    /// Show challenge details and requirements
    Describe { id: String },

    /// Manage player profiles
    Profile {
        #[command(subcommand)]
        subcommand: ProfileSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = root::resolve_layout(cli.data_dir.as_deref(), cli.workspace_root.as_deref())
        .and_then(|layout| {
            let json = cli.json;
            match cli.command.unwrap_or(Commands::List { stack: None }) {
                Commands::List { stack } => cmd::list::run(&layout, stack.as_deref(), json),
                Commands::Play { id } => cmd::play::run(&layout, &id, json),
                Commands::Validate { id, context } => {
                    cmd::play::validate(&layout, &id, context.as_deref(), json)
                }
                Commands::Stats => cmd::stats::run(&layout, json),
                Commands::Leaderboard => cmd::leaderboard::run(&layout, json),
                Commands::Sync => cmd::sync::run(&layout, json),
                Commands::Submit => cmd::submit::run(&layout, json),
                Commands::Doctor => cmd::doctor::run(&layout, json),
                Commands::Hint { id } => cmd::describe::hint(&layout, &id, json),
                Commands::Describe { id } => cmd::describe::run(&layout, &id, json),
                Commands::Profile { subcommand } => cmd::profile::run(&layout, subcommand, json),
            }
        });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
