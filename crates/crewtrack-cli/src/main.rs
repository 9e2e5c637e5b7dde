mod cmd;
mod output;
mod root;
mod session;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, history::HistorySubcommand, project::ProjectSubcommand,
    subtask::SubtaskSubcommand, task::TaskSubcommand, user::UserSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "crewtrack",
    about = "Track projects, tasks and subtasks with role-gated changes and a full history",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .crewtrack/)
    #[arg(long, global = true, env = "CREWTRACK_ROOT")]
    root: Option<PathBuf>,

    /// Username to act as
    #[arg(long = "as", global = true, env = "CREWTRACK_USER", value_name = "USER")]
    user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a crewtrack workspace in the current directory
    Init {
        /// Workspace name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Register and list users
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Manage projects and their members
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Manage tasks within a project
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Manage subtasks and change their status
    Subtask {
        #[command(subcommand)]
        subcommand: SubtaskSubcommand,
    },

    /// Show the audit history
    History {
        #[command(subcommand)]
        subcommand: Option<HistorySubcommand>,

        /// Only entries for this project
        #[arg(long)]
        project: Option<String>,
        /// Only entries for this task
        #[arg(long)]
        task: Option<String>,
        /// Only entries for this subtask
        #[arg(long)]
        subtask: Option<String>,
        /// Maximum number of entries (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the projects, tasks and subtasks assigned to you
    Mine,

    /// Inspect the workspace config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let user = cli.user.as_deref();

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::User { subcommand } => cmd::user::run(&root, user, subcommand, cli.json),
        Commands::Project { subcommand } => cmd::project::run(&root, user, subcommand, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, user, subcommand, cli.json),
        Commands::Subtask { subcommand } => cmd::subtask::run(&root, user, subcommand, cli.json),
        Commands::History {
            subcommand,
            project,
            task,
            subtask,
            limit,
        } => {
            let filter = cmd::history::HistoryFilter {
                project,
                task,
                subtask,
                limit,
            };
            cmd::history::run(&root, user, subcommand, filter, cli.json)
        }
        Commands::Mine => cmd::mine::run(&root, user, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
