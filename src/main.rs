//! Command-line front end for a remote task collection.
//!
//! # Environment Variables
//!
//! - `TASKBOARD_API_URL`: task collection endpoint (default: `http://localhost:8080/api/tasks`)
//! - `TASKBOARD_TIMEOUT_MS`: transport timeout in milliseconds (default: none)
//! - `TASKBOARD_PREFERENCES`: preference file (default: `taskboard-preferences.json`)
//! - `TASKBOARD_REFETCH`: `always` (default) | `success` | `never`
//! - `TASKBOARD_LATEST_WINS`: `true` | `false` (default)
//! - `RUST_LOG`: logging level (default: `taskboard=info`)

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard::cache::CollectionStore;
use taskboard::config::ClientConfig;
use taskboard::coordinator::MutationCoordinator;
use taskboard::domain::{
    CompletionFilter, CompletionStats, FilterSpec, NewTask, Priority, PriorityFilter, SortOrder,
    Task, TaskId, TaskPatch, TaskStatus, parse_due_date,
};
use taskboard::preferences::{JsonFileStore, Preferences, Theme};
use taskboard::remote::HttpTaskRemote;
use taskboard::view::{compute, format_due_date};

#[derive(Debug, Parser)]
#[command(name = "taskboard", version, about = "Track tasks on a remote task server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List tasks through the saved filters.
    List {
        /// Completion filter: all, completed or incomplete.
        #[arg(long)]
        completion: Option<CompletionFilter>,
        /// Priority filter: all, low, medium or high.
        #[arg(long)]
        priority: Option<PriorityFilter>,
        /// Sort order: none, due-asc or due-desc.
        #[arg(long)]
        sort: Option<SortOrder>,
        /// Reset all filters before applying the others.
        #[arg(long)]
        clear: bool,
    },
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
        /// Priority: low, medium or high.
        #[arg(long, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// Change fields of a task.
    Edit {
        /// Task identifier.
        id: i64,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New due date as YYYY-MM-DD.
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date.
        #[arg(long)]
        clear_due: bool,
        /// New priority.
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Mark a task as completed.
    Done {
        /// Task identifier.
        id: i64,
    },
    /// Mark a task as in progress again.
    Reopen {
        /// Task identifier.
        id: i64,
    },
    /// Delete a task.
    Delete {
        /// Task identifier.
        id: i64,
    },
    /// Show completed tasks per priority.
    Stats,
    /// Show or change the color theme.
    Theme {
        /// `light`, `dark` or `toggle`. Prints the current theme when omitted.
        choice: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Invalid configuration")?;
    let preferences = Preferences::new(
        JsonFileStore::open(&config.preferences_path).context("Cannot open preferences")?,
    );

    if let Command::Theme { choice } = &cli.command {
        return run_theme(&preferences, choice.as_deref());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    runtime.block_on(async_main(cli.command, &config, &preferences))
}

async fn async_main(
    command: Command,
    config: &ClientConfig,
    preferences: &Preferences<JsonFileStore>,
) -> anyhow::Result<()> {
    let store = Arc::new(CollectionStore::new());
    let remote = Arc::new(HttpTaskRemote::new(config.api_url.clone(), config.timeout));
    let coordinator = MutationCoordinator::new(Arc::clone(&store), remote, config.coordinator);
    let _subscription = store.subscribe(|snapshot| {
        tracing::debug!(
            revision = snapshot.revision(),
            tasks = snapshot.len(),
            loading = snapshot.is_loading(),
            "Task cache updated"
        );
    });

    tracing::info!(url = %config.api_url, "Loading tasks");
    if coordinator.refresh().await.is_err() {
        let message = store.get().error_message().unwrap_or_default().to_string();
        bail!("{message}");
    }

    let today = Local::now().date_naive();
    match command {
        Command::List {
            completion,
            priority,
            sort,
            clear,
        } => {
            let mut filters = if clear {
                FilterSpec::cleared()
            } else {
                preferences.load_filters()
            };
            filters = FilterSpec {
                completion: completion.unwrap_or(filters.completion),
                priority: priority.unwrap_or(filters.priority),
                sort: sort.unwrap_or(filters.sort),
            };
            preferences.save_filters(&filters)?;
            print_view(store.get().entries(), &filters, today);
        }
        Command::Add {
            title,
            due,
            priority,
        } => {
            let task = NewTask::new(title.trim())
                .with_due_date(due.as_deref().map(parse_date).transpose()?)
                .with_priority(priority);
            task.validate(today)?;
            let created = coordinator.create(task).await?;
            println!("Created task {}: {}", created.id, created.title);
        }
        Command::Edit {
            id,
            title,
            due,
            clear_due,
            priority,
        } => {
            let mut patch = TaskPatch::new();
            if let Some(title) = title {
                patch = patch.with_title(title.trim());
            }
            if let Some(due) = due {
                patch = patch.with_due_date(Some(parse_date(&due)?));
            } else if clear_due {
                patch = patch.with_due_date(None);
            }
            if let Some(priority) = priority {
                patch = patch.with_priority(priority);
            }
            if patch.is_empty() {
                bail!("Nothing to change");
            }
            patch.validate(today)?;
            let updated = coordinator.update(TaskId::new(id), patch).await?;
            println!("Updated task {}", updated.id);
        }
        Command::Done { id } => {
            set_status(&coordinator, id, TaskStatus::Completed).await?;
        }
        Command::Reopen { id } => {
            set_status(&coordinator, id, TaskStatus::InProgress).await?;
        }
        Command::Delete { id } => {
            coordinator.delete(TaskId::new(id)).await?;
            println!("Deleted task {id}");
        }
        Command::Stats => print_stats(&CompletionStats::from_tasks(store.get().entries())),
        Command::Theme { .. } => {}
    }
    Ok(())
}

async fn set_status(
    coordinator: &MutationCoordinator,
    id: i64,
    status: TaskStatus,
) -> anyhow::Result<()> {
    let updated = coordinator
        .update(TaskId::new(id), TaskPatch::status(status))
        .await?;
    println!("Task {} is now {}", updated.id, updated.status);
    Ok(())
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    parse_due_date(raw).with_context(|| format!("Invalid due date '{raw}', expected YYYY-MM-DD"))
}

fn run_theme(preferences: &Preferences<JsonFileStore>, choice: Option<&str>) -> anyhow::Result<()> {
    let theme = match choice {
        None => preferences.load_theme(),
        Some(choice) if choice.eq_ignore_ascii_case("toggle") => preferences.toggle_theme()?,
        Some(choice) => {
            let theme: Theme = choice.parse()?;
            preferences.save_theme(theme)?;
            theme
        }
    };
    println!("Theme: {theme}");
    Ok(())
}

fn print_view(entries: &[Task], filters: &FilterSpec, today: NaiveDate) {
    let view = compute(entries, filters);
    if view.is_empty() {
        if entries.is_empty() {
            println!("No tasks yet.");
        } else {
            println!("No tasks match the current filters.");
        }
        return;
    }
    for task in view {
        let mark = if task.is_completed() { 'x' } else { ' ' };
        let overdue = if task.is_overdue(today) { " (overdue)" } else { "" };
        println!(
            "{:>5} [{mark}] {:<40} {:<6} {}{overdue}",
            task.id.get(),
            task.title,
            task.priority.as_str(),
            format_due_date(task.due_date),
        );
    }
}

fn print_stats(stats: &CompletionStats) {
    if !stats.has_completed() {
        println!("No completed tasks yet.");
        return;
    }
    println!("Completed tasks by priority:");
    for (priority, count) in stats.rows() {
        println!("  {:<6} {count}", priority.as_str());
    }
}
