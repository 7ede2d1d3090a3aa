use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use daybook_core::app::{LoadOutcome, MutationOutcome, ReorderOutcome, Synchronizer};
use daybook_core::domain::{Subtask, SubtaskId, Task, TaskId, Title, ValidationError, parse_day};
use daybook_core::impls::{HttpRemote, InMemoryRemote, MemoryEventSink};
use daybook_core::ports::{Clock, RemoteTaskService, SystemClock};
use daybook_core::store::{Progress, StatusFilter, TaskFilter};
use daybook_core::{SyncConfig, SynchronizerBuilder};

#[derive(Parser)]
#[command(name = "daybook", version, about = "Day-planner task list with optimistic sync")]
struct Cli {
    /// TOML config file (env DAYBOOK_* still wins)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Talk to an in-process service seeded with sample tasks
    #[arg(long, global = true)]
    offline: bool,

    /// Print tasks as JSON
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Task(TaskCommand),

    /// Walk through create → toggle → subtask → failure → delete in-process
    Demo,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks, optionally for one day and completion state
    List {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },
    /// Add a task (defaults to today)
    Add {
        title: String,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    Toggle {
        id: String,
    },
    Rm {
        id: String,
    },
    /// Subtask operations
    #[command(subcommand)]
    Sub(SubCommand),
    /// Move ACTIVE to the slot currently held by OVER
    Move {
        active: String,
        over: String,
    },
    /// Completion percentage, overall and for a day
    Progress {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SubCommand {
    Add { task: String, title: String },
    Toggle { task: String, subtask: String },
    Rm { task: String, subtask: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config, cli.verbose);
    debug!(api = %config.api_base_url, timeout_ms = config.request_timeout_ms, "configuration loaded");

    match dispatch(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &SyncConfig, verbose: bool) {
    let fallback = if verbose {
        "info,daybook_core=debug".to_string()
    } else {
        config.log_filter.clone()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn dispatch(cli: Cli, config: SyncConfig) -> Result<ExitCode, Box<dyn Error>> {
    let command = match cli.command {
        Command::Demo => return demo().await,
        Command::Task(command) => command,
    };
    let events = Arc::new(MemoryEventSink::new());

    if cli.offline {
        let remote = Arc::new(InMemoryRemote::with_tasks(sample_tasks(SystemClock.today())?));
        let sync = SynchronizerBuilder::new(remote)
            .event_sink(events.clone())
            .build();
        run(&sync, command, &events, cli.json).await
    } else {
        let remote = Arc::new(HttpRemote::from_config(&config)?);
        let sync = SynchronizerBuilder::new(remote)
            .event_sink(events.clone())
            .build();
        run(&sync, command, &events, cli.json).await
    }
}

async fn run<R: RemoteTaskService>(
    sync: &Synchronizer<R>,
    command: TaskCommand,
    events: &MemoryEventSink,
    json: bool,
) -> Result<ExitCode, Box<dyn Error>> {
    match sync.load().await {
        LoadOutcome::Loaded { .. } => {}
        LoadOutcome::Ignored => eprintln!("warning: task list response was not understood"),
        LoadOutcome::Failed { reason } => {
            eprintln!("error: could not load tasks: {reason}");
            return Ok(ExitCode::FAILURE);
        }
    }

    let outcome = match command {
        TaskCommand::List { date, status } => {
            let tasks = sync.store().filtered(&TaskFilter::new(date, status)).await;
            print_tasks(&tasks, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        TaskCommand::Progress { date } => {
            let tasks = sync.store().tasks().await;
            let progress = Progress::of(&tasks, date);
            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                println!("overall: {}%", progress.total);
                if let Some(day) = date {
                    println!("{day}: {}%", progress.selected_date);
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
        TaskCommand::Move { active, over } => {
            let outcome = sync.move_task(&task_id(&active), &task_id(&over)).await?;
            report_reorder(&outcome);
            print_tasks(&sync.store().tasks().await, json)?;
            return Ok(ExitCode::SUCCESS);
        }
        TaskCommand::Add { title, date } => sync.create_task(&title, date).await?,
        TaskCommand::Toggle { id } => sync.toggle_task(&task_id(&id)).await?,
        TaskCommand::Rm { id } => sync.delete_task(&task_id(&id)).await?,
        TaskCommand::Sub(SubCommand::Add { task, title }) => {
            sync.create_subtask(&task_id(&task), &title).await?
        }
        TaskCommand::Sub(SubCommand::Toggle { task, subtask }) => {
            sync.toggle_subtask(&task_id(&task), &subtask_id(&subtask))
                .await?
        }
        TaskCommand::Sub(SubCommand::Rm { task, subtask }) => {
            sync.delete_subtask(&task_id(&task), &subtask_id(&subtask))
                .await?
        }
    };

    println!("{}", describe(&outcome));
    for notice in events.failures() {
        eprintln!("notice: {notice}");
    }
    print_tasks(&sync.store().tasks().await, json)?;

    Ok(match outcome {
        MutationOutcome::RolledBack { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// The scenario a user walks through on a fresh list, with the optimistic
/// state printed before each confirmation lands.
async fn demo() -> Result<ExitCode, Box<dyn Error>> {
    let remote = Arc::new(InMemoryRemote::new());
    let events = Arc::new(MemoryEventSink::new());
    let sync = SynchronizerBuilder::new(remote.clone())
        .event_sink(events.clone())
        .build();
    sync.load().await;

    println!("== create \"Buy milk\"");
    remote.hold_requests();
    let pending = tokio::spawn({
        let sync = sync.clone();
        async move { sync.create_task("Buy milk", None).await }
    });
    remote.wait_for_pending(1).await;
    println!("-- before the service answers");
    print_tasks(&sync.store().tasks().await, false)?;
    remote.resume();
    println!("{}", describe(&pending.await??));
    print_tasks(&sync.store().tasks().await, false)?;

    let id = sync
        .store()
        .tasks()
        .await
        .first()
        .map(|task| task.id.clone())
        .ok_or("the created task is missing from the list")?;

    println!("== toggle {id}");
    println!("{}", describe(&sync.toggle_task(&id).await?));

    println!("== add subtask \"2 L\"");
    println!("{}", describe(&sync.create_subtask(&id, "2 L").await?));
    print_tasks(&sync.store().tasks().await, false)?;

    println!("== toggle {id} while the service fails");
    remote.fail_next(1);
    println!("{}", describe(&sync.toggle_task(&id).await?));
    for notice in events.failures() {
        println!("notice: {notice}");
    }
    print_tasks(&sync.store().tasks().await, false)?;

    println!("== progress");
    println!("overall: {}%", Progress::of(&sync.store().tasks().await, None).total);

    println!("== delete {id}");
    println!("{}", describe(&sync.delete_task(&id).await?));
    print_tasks(&sync.store().tasks().await, false)?;

    Ok(ExitCode::SUCCESS)
}

fn describe(outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Confirmed => "saved".to_string(),
        MutationOutcome::Unconfirmed => {
            "sent, but the service returned no data; showing the local version".to_string()
        }
        MutationOutcome::RolledBack { reason } => format!("failed and reverted: {reason}"),
        MutationOutcome::Skipped => "nothing to do: not in the list".to_string(),
    }
}

fn report_reorder(outcome: &ReorderOutcome) {
    match outcome {
        ReorderOutcome::Persisted => println!("order saved"),
        ReorderOutcome::Unchanged => println!("order unchanged"),
        ReorderOutcome::NotPersisted { reason } => {
            eprintln!("notice: new order is shown but was not saved: {reason}")
        }
    }
}

fn print_tasks(tasks: &[Task], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("(no tasks)");
    }
    for task in tasks {
        println!(
            "{} {:<16} {}  {}",
            mark(task.completed),
            task.id.to_string(),
            task.date,
            task.title
        );
        for subtask in &task.subtasks {
            println!(
                "    {} {:<12} {}",
                mark(subtask.completed),
                subtask.id.to_string(),
                subtask.title
            );
        }
    }
    Ok(())
}

fn mark(completed: bool) -> &'static str {
    if completed { "[x]" } else { "[ ]" }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    parse_day(raw).ok_or_else(|| format!("`{raw}` is not a date (expected YYYY-MM-DD)"))
}

/// `42`, `task-42` and non-numeric keys are all accepted.
fn task_id(raw: &str) -> TaskId {
    let raw = raw.trim().trim_start_matches("task-");
    match raw.parse::<i64>() {
        Ok(n) => TaskId::server(n),
        Err(_) => TaskId::server(raw),
    }
}

fn subtask_id(raw: &str) -> SubtaskId {
    let raw = raw.trim().trim_start_matches("subtask-");
    match raw.parse::<i64>() {
        Ok(n) => SubtaskId::server(n),
        Err(_) => SubtaskId::server(raw),
    }
}

fn sample_tasks(today: NaiveDate) -> Result<Vec<Task>, ValidationError> {
    let mut groceries = Task::draft(TaskId::server(1), &Title::parse("Groceries")?, today);
    groceries.subtasks = vec![
        Subtask::draft(SubtaskId::server(1), &Title::parse("Milk")?),
        Subtask::draft(SubtaskId::server(2), &Title::parse("Bread")?),
    ];
    let mut report = Task::draft(TaskId::server(2), &Title::parse("Send weekly report")?, today);
    report.completed = true;
    let call = Task::draft(
        TaskId::server(3),
        &Title::parse("Call the dentist")?,
        today.succ_opt().unwrap_or(today),
    );
    Ok(vec![groceries, report, call])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_prefixed_and_bare_forms() {
        assert_eq!(task_id("42"), TaskId::server(42));
        assert_eq!(task_id("task-42"), TaskId::server(42));
        assert_eq!(task_id("abc"), TaskId::server("abc"));
        assert_eq!(subtask_id("subtask-7"), SubtaskId::server(7));
    }

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["daybook", "--offline", "sub", "toggle", "1", "2"]).unwrap();
        assert!(cli.offline);
        assert!(matches!(
            cli.command,
            Command::Task(TaskCommand::Sub(SubCommand::Toggle { .. }))
        ));

        let cli = Cli::try_parse_from(["daybook", "list", "--status", "active"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Task(TaskCommand::List {
                status: StatusFilter::Active,
                date: None
            })
        ));
    }

    #[test]
    fn bad_dates_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["daybook", "add", "x", "--date", "soon"]).is_err());
    }

    #[tokio::test]
    async fn offline_samples_load() {
        let remote = Arc::new(InMemoryRemote::with_tasks(
            sample_tasks(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()).unwrap(),
        ));
        let sync = SynchronizerBuilder::new(remote).build();
        assert_eq!(sync.load().await, LoadOutcome::Loaded { count: 3 });
        assert_eq!(Progress::of(&sync.store().tasks().await, None).total, 20);
    }

    #[tokio::test]
    async fn demo_walkthrough_completes() {
        assert_eq!(demo().await.unwrap(), ExitCode::SUCCESS);
    }
}
