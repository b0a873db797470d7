//! fieldlog CLI: record, browse, export, summarize, and ask the assistant.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use fieldlog::assistant::{Assistant, ReplySource};
use fieldlog::auth::Session;
use fieldlog::collector::Collector;
use fieldlog::config::Config;
use fieldlog::config::secrets::ExposeSecret;
use fieldlog::export::{self, ExportFormat};
use fieldlog::filter::FilterCriteria;
use fieldlog::llm::GeminiClient;
use fieldlog::model::{NewFieldRecord, RecordId};
use fieldlog::store::{PgStore, RecordStore};
use fieldlog::telemetry::{TelemetryConfig, init_telemetry};
use tokio::io::AsyncBufReadExt as _;

type App = Collector<PgStore, GeminiClient>;

#[derive(Parser)]
#[command(name = "fieldlog", about = "Field observation log")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Field record operations
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// Export filtered records to a dated CSV or JSON file
    Export {
        /// Output format: csv or json
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        #[command(flatten)]
        filters: FilterArgs,
        /// Directory to write the file into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Summarize the most recent records
    Dashboard {
        /// Maximum number of fields to show
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show the activity log
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Ask the field assistant; without a message, start an interactive session
    Chat { message: Option<String> },
}

#[derive(Subcommand)]
enum RecordAction {
    /// Record a new observation
    Add {
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
        #[arg(long)]
        location: String,
        /// Observation time (RFC 3339); defaults to now
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// List records
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Maximum rows to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Delete a record
    Delete {
        /// Record ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Match field, value, or location
    #[arg(long)]
    search: Option<String>,
    /// Match field name
    #[arg(long)]
    field: Option<String>,
    /// Match location
    #[arg(long)]
    location: Option<String>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,
}

impl From<FilterArgs> for FilterCriteria {
    fn from(args: FilterArgs) -> Self {
        FilterCriteria {
            search_term: args.search,
            field: args.field,
            location: args.location,
            date_from: args.from,
            date_to: args.to,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "fieldlog".to_string(),
        default_level: config.log_level.clone(),
    })?;

    let user_id = config
        .user_id
        .context("FIELDLOG_USER_ID must be set to act as a user")?;
    let session = Session::for_user(user_id, &config.user_email);

    let store = PgStore::connect(config.database_url.expose_secret()).await?;
    store.migrate().await?;

    let assistant = Assistant::from_config(&config.gemini)?;
    let mut app = Collector::new(session, store, assistant);

    match cli.command {
        Command::Record { action } => match action {
            RecordAction::Add {
                field,
                value,
                location,
                timestamp,
            } => cmd_record_add(&mut app, field, value, location, timestamp).await,
            RecordAction::List { filters, limit } => {
                cmd_record_list(&mut app, filters.into(), limit).await
            }
            RecordAction::Delete { id } => cmd_record_delete(&mut app, id).await,
        },
        Command::Export {
            format,
            filters,
            out,
        } => cmd_export(&mut app, format, filters.into(), out).await,
        Command::Dashboard { limit } => cmd_dashboard(&mut app, limit).await,
        Command::Activity { limit } => cmd_activity(&app, limit).await,
        Command::Chat { message } => match message {
            Some(message) => cmd_chat_once(&mut app, &message).await,
            None => cmd_chat_interactive(&mut app).await,
        },
    }
}

async fn cmd_record_add(
    app: &mut App,
    field: String,
    value: String,
    location: String,
    timestamp: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let mut new = NewFieldRecord::new(field, value, location);
    if let Some(at) = timestamp {
        new = new.timestamp(at);
    }
    let record = app.submit(new).await?;
    println!(
        "Recorded: {} {} = {} at {} ({})",
        record.id.short(),
        record.field,
        record.value,
        record.location,
        record.timestamp.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

async fn cmd_record_list(
    app: &mut App,
    criteria: FilterCriteria,
    limit: usize,
) -> anyhow::Result<()> {
    app.refresh().await?;
    let visible = app.visible(&criteria)?;

    if visible.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<20}  {:<14}  {:<24}  TIMESTAMP",
        "ID", "FIELD", "VALUE", "LOCATION"
    );
    println!("{}", "-".repeat(90));

    for record in visible.iter().take(limit) {
        println!(
            "{:<8}  {:<20}  {:<14}  {:<24}  {}",
            record.id.short(),
            clip(&record.field, 20),
            clip(&record.value, 14),
            clip(&record.location, 24),
            record.timestamp.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n{} of {} record(s)", visible.len().min(limit), visible.len());
    Ok(())
}

async fn cmd_record_delete(app: &mut App, id_str: String) -> anyhow::Result<()> {
    // Support prefix matching against the user's records
    let id = if id_str.len() < 36 {
        app.refresh().await?;
        let matches: Vec<_> = app
            .records()
            .iter()
            .filter(|r| r.id.to_string().starts_with(&id_str))
            .collect();
        match matches.len() {
            0 => anyhow::bail!("no record matching prefix '{id_str}'"),
            1 => matches[0].id,
            n => anyhow::bail!("{n} records match prefix '{id_str}', be more specific"),
        }
    } else {
        id_str.parse::<RecordId>()?
    };

    app.delete(id).await?;
    println!("Deleted: {id}");
    Ok(())
}

async fn cmd_export(
    app: &mut App,
    format: ExportFormat,
    criteria: FilterCriteria,
    out: PathBuf,
) -> anyhow::Result<()> {
    app.refresh().await?;
    let today = Utc::now().date_naive();
    let rendered = app.export(&criteria, format, today).await?;
    let path = export::write_export(&out, format, today, &rendered.body)?;
    println!(
        "Exported {} record(s) to {}",
        rendered.record_count,
        path.display()
    );
    Ok(())
}

async fn cmd_dashboard(app: &mut App, limit: usize) -> anyhow::Result<()> {
    app.refresh().await?;
    let summary = app.dashboard(limit).await?;

    println!("Total records: {}", summary.total_records);
    if summary.fields.is_empty() {
        println!("No recent records.");
        return Ok(());
    }
    println!();
    println!("{:<24}  {:<6}  LATEST", "FIELD", "COUNT");
    println!("{}", "-".repeat(50));
    for field in &summary.fields {
        println!(
            "{:<24}  {:<6}  {}",
            clip(&field.field, 24),
            field.count,
            field.last_value
        );
    }
    Ok(())
}

async fn cmd_activity(app: &App, limit: i64) -> anyhow::Result<()> {
    let entries = app.store().list_activity(app.session(), limit).await?;
    if entries.is_empty() {
        println!("No activity yet.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {:<12}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.action,
            entry.details
        );
    }
    Ok(())
}

async fn cmd_chat_once(app: &mut App, message: &str) -> anyhow::Result<()> {
    let reply = app.chat(message).await?;
    print_reply(&reply.text, &reply.source);
    Ok(())
}

async fn cmd_chat_interactive(app: &mut App) -> anyhow::Result<()> {
    println!("Field assistant. Type /quit to exit.");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let reply = app.chat(line).await?;
        print_reply(&reply.text, &reply.source);
    }
    Ok(())
}

fn print_reply(text: &str, source: &ReplySource) {
    println!("{text}");
    if let ReplySource::Fallback { topic, .. } = source {
        println!("  [offline guidance: {topic}]");
    }
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut clipped: String = s.chars().take(width.saturating_sub(1)).collect();
        clipped.push('~');
        clipped
    }
}
