mod cmd;
mod output;
mod root;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, project::ProjectSubcommand};
use standup_core::types::ProjectId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "standup",
    about = "Scheduled team check-ins: dispatch reminders, collect updates, summarize the day",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root holding standup.yaml (default: search upward from cwd)
    #[arg(long, global = true, env = "STANDUP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default standup.yaml and create the database
    Init,

    /// Run the HTTP API and the hourly dispatch loop
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,

        /// Serve the API only; do not dispatch check-ins
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Dispatch every check-in due in the current hour, once
    Sweep {
        /// Pretend the sweep runs at this instant (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show the UTC days and time a local schedule fires at
    Convert {
        /// Weekdays, comma-separated (e.g. Monday,Thursday)
        #[arg(long, required = true)]
        days: Vec<String>,
        /// Local time of day, HH:MM
        #[arg(long)]
        time: String,
        /// Whole-hour UTC offset: +1, -5, UTC+3, 0
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: String,
    },

    /// Show the insight for a project and day, or why there is none yet
    Insight { project_id: ProjectId, date: NaiveDate },

    /// Generate the insight for a project and day now
    Generate {
        project_id: ProjectId,
        date: NaiveDate,
        /// Summarize even if not every member has answered
        #[arg(long)]
        force: bool,
    },

    /// Write behind-the-scenes content from several summarized days
    Content {
        project_id: ProjectId,
        /// Owner of the project
        #[arg(long)]
        owner: i64,
        /// Days to draw from, comma-separated (YYYY-MM-DD)
        #[arg(long, required = true, value_delimiter = ',')]
        dates: Vec<NaiveDate>,
    },

    /// Re-send a member's check-in link for a day already dispatched
    Remind {
        project_id: ProjectId,
        date: NaiveDate,
        email: String,
    },

    /// Updates and blockers per day over the last two weeks
    Trends {
        /// Owner whose projects are counted
        owner_id: i64,
    },

    /// Project statuses and this month's counts for an owner
    Dashboard {
        owner_id: i64,
    },

    /// Manage projects, schedules and members
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port, no_scheduler } => cmd::serve::run(&root, port, no_scheduler),
        Commands::Sweep { at } => cmd::sweep::run(&root, at, cli.json),
        Commands::Convert { days, time, offset } => {
            cmd::convert::run(&days, &time, &offset, cli.json)
        }
        Commands::Insight { project_id, date } => {
            cmd::insight::run(&root, project_id, date, cli.json)
        }
        Commands::Generate {
            project_id,
            date,
            force,
        } => cmd::generate::run(&root, project_id, date, force, cli.json),
        Commands::Remind {
            project_id,
            date,
            email,
        } => cmd::remind::run(&root, project_id, date, &email, cli.json),
        Commands::Content {
            project_id,
            owner,
            dates,
        } => cmd::content::run(&root, project_id, owner, &dates, cli.json),
        Commands::Trends { owner_id } => cmd::trends::run(&root, owner_id, cli.json),
        Commands::Dashboard { owner_id } => cmd::dashboard::run(&root, owner_id, cli.json),
        Commands::Project { subcommand } => cmd::project::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
