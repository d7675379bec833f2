pub mod day;
pub mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use day::parse_day;
use tracing::{error, info, level_filters::LevelFilter};

use crate::{
    cache::FileTaskCache,
    clickup::{sync_tasks, ClickUpClient},
    config::Configuration,
    reconcile::{error::ReconcileError, prompt::StdConsole, Reconciler},
    storage::{sqlite::SqliteStorage, SessionLog},
    tasks::set_task,
    timer::{listen_for_enter, SessionTimer, TimerConfig},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

const DAY_HELP: &str =
    "Day to use. Either days back from today (0 is today) or a date like \"yesterday\" or \"15/03/2025\"";

#[derive(Parser, Debug)]
#[command(name = "Pomolog", version, long_about = None)]
#[command(about = "Pomodoro timer that keeps a complete timeline of your day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Configuration file. By default config.toml is searched in ., ./config and $HOME/.config/pomo"
    )]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Default)]
#[command(version, about, long_about = None)]
enum Commands {
    #[default]
    #[command(about = "Run a focus session for the selected task. Press Enter to stop early")]
    Run,
    #[command(about = "Select the task focus sessions are logged against")]
    Set,
    #[command(about = "Fetch tasks from ClickUp")]
    Sync,
    #[command(about = "Show total focus time per task")]
    Total,
    #[command(about = "Show focus sessions of a day")]
    Sessions {
        #[arg(help = DAY_HELP)]
        day: Option<String>,
    },
    #[command(about = "Complete the timeline of a day: close open activities, add focus sessions, breaks and distractions, then ask for whatever is still missing")]
    Complete {
        #[arg(help = DAY_HELP)]
        day: Option<String>,
    },
    #[command(about = "Show activities of a day")]
    Log {
        #[arg(help = DAY_HELP)]
        day: Option<String>,
    },
    #[command(about = "Start an activity now. It stays open until the day is completed")]
    Start,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = create_application_default_path()?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let config = Configuration::load(args.config.as_deref())?;
    let storage = SqliteStorage::open(&config.database_path(&app_dir))
        .context("Failed to open the database")?;
    let cache = FileTaskCache::new(config.cache_path(&app_dir));
    let clock = DefaultClock;
    let mut console = StdConsole;
    let reconciler = Reconciler::new(&storage, &storage, &clock, &config.labels);

    match args.commands.unwrap_or_default() {
        Commands::Run => {
            let timer = SessionTimer::new(&clock, &storage, &cache, TimerConfig::from(&config));
            let outcome = timer
                .run(&mut console, &reconciler, listen_for_enter)
                .await?;
            info!("Session ended with {outcome:?}");
        }
        Commands::Set => {
            set_task(&mut console, &storage, &cache).await?;
        }
        Commands::Sync => {
            let token = config
                .auth_key
                .as_deref()
                .context("auth_key has to be configured to sync tasks")?;
            let team = config
                .team_id
                .as_deref()
                .context("team_id has to be configured to sync tasks")?;
            let synced = sync_tasks(&ClickUpClient::new(token, team), &storage).await?;
            println!("Synced {synced} task(s)");
        }
        Commands::Total => {
            print!("{}", report::render_totals(&storage.total_by_task()?));
        }
        Commands::Sessions { day } => {
            let day = parse_day(day.as_deref(), Local::now())?;
            print!(
                "{}",
                report::render_sessions(day, &storage.sessions_for_day(day)?)
            );
        }
        Commands::Complete { day } => {
            let day = parse_day(day.as_deref(), Local::now())?;
            recoverable(reconciler.complete_day(&mut console, day))?;
        }
        Commands::Log { day } => {
            let day = parse_day(day.as_deref(), Local::now())?;
            recoverable(reconciler.report_day(&mut console, day))?;
        }
        Commands::Start => {
            if let Some(interval) = recoverable(reconciler.start_activity(&mut console))? {
                println!(
                    "Started {} at {}",
                    interval.label,
                    interval.start.format("%H:%M")
                );
            }
        }
    }
    Ok(())
}

/// Storage failures end the command without failing the process, the operation can simply be run
/// again. Everything else is passed on.
fn recoverable<T>(result: Result<T, ReconcileError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if !e.is_fatal() => {
            error!("Storage failure {e:?}");
            eprintln!("{e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
