// icsync - mirrors webcal (.ics) feed subscriptions into a local calendar store

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use env_logger::Env;

use icsync::database::StoredEvent;
use icsync::fetch::HttpTransport;
use icsync::models::{Credential, Subscription, SyncResult};
use icsync::parser::parse_css_color;
use icsync::{AppConfig, Database, SyncEngine};

#[derive(Parser)]
#[command(name = "icsync")]
#[command(about = "Subscribe to webcal (.ics) feeds and keep a local calendar in sync")]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a feed
    Add {
        /// http(s) URL, file:// URL or a local path
        url: String,

        /// Calendar name (the feed's own name is used when omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Calendar color, e.g. "#2962FF"
        #[arg(long)]
        color: Option<String>,

        /// HTTP Basic auth user
        #[arg(long)]
        username: Option<String>,

        /// HTTP Basic auth password
        #[arg(long)]
        password: Option<String>,

        /// Drop the alarms embedded in the feed
        #[arg(long)]
        ignore_alerts: bool,

        /// Add a default alarm this many minutes before every event
        #[arg(long, value_name = "MINUTES")]
        default_alarm: Option<i64>,

        /// Default alarm for all-day events, minutes before midnight
        #[arg(long, value_name = "MINUTES")]
        default_all_day_alarm: Option<i64>,

        /// Drop event descriptions
        #[arg(long)]
        ignore_description: bool,
    },

    /// Fetch and parse a feed once without subscribing to it
    Check {
        url: String,

        /// HTTP Basic auth user
        #[arg(long)]
        username: Option<String>,

        /// HTTP Basic auth password
        #[arg(long)]
        password: Option<String>,
    },

    /// Change a subscription's name, color or event preferences
    Edit {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        /// Calendar color, e.g. "#2962FF"
        #[arg(long)]
        color: Option<String>,

        /// Drop the alarms embedded in the feed (true/false)
        #[arg(long)]
        ignore_alerts: Option<bool>,

        /// Default alarm minutes before every event; 0 removes it
        #[arg(long, value_name = "MINUTES")]
        default_alarm: Option<i64>,

        /// Default alarm for all-day events; 0 removes it
        #[arg(long, value_name = "MINUTES")]
        default_all_day_alarm: Option<i64>,

        /// Drop event descriptions (true/false)
        #[arg(long)]
        ignore_description: Option<bool>,
    },

    /// List subscriptions and their sync status
    List,

    /// Remove a subscription and its local calendar
    Remove { id: i64 },

    /// Sync subscriptions
    Sync {
        /// Sync only this subscription
        id: Option<i64>,

        /// Ignore cached state and rewrite every event
        #[arg(short, long)]
        force: bool,
    },

    /// Show the events of a subscription's local calendar
    Show { id: i64 },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.database {
        Some(path) => AppConfig::with_database_path(path.clone()),
        None => AppConfig::new(),
    };
    let db = Database::open(&config.database_path)
        .with_context(|| format!("couldn't open database {}", config.database_path.display()))?;

    match cli.command {
        Commands::Add {
            url,
            name,
            color,
            username,
            password,
            ignore_alerts,
            default_alarm,
            default_all_day_alarm,
            ignore_description,
        } => add(
            &db,
            url,
            name,
            color,
            username,
            password,
            ignore_alerts,
            default_alarm,
            default_all_day_alarm,
            ignore_description,
        ),
        Commands::Check {
            url,
            username,
            password,
        } => check(&config, url, username, password),
        Commands::Edit {
            id,
            name,
            color,
            ignore_alerts,
            default_alarm,
            default_all_day_alarm,
            ignore_description,
        } => edit(
            &db,
            id,
            name,
            color,
            ignore_alerts,
            default_alarm,
            default_all_day_alarm,
            ignore_description,
        ),
        Commands::List => list(&db),
        Commands::Remove { id } => remove(&db, id),
        Commands::Sync { id, force } => sync(&db, &config, id, force),
        Commands::Show { id } => show(&db, id),
    }
}

#[allow(clippy::too_many_arguments)]
fn add(
    db: &Database,
    url: String,
    name: Option<String>,
    color: Option<String>,
    username: Option<String>,
    password: Option<String>,
    ignore_alerts: bool,
    default_alarm: Option<i64>,
    default_all_day_alarm: Option<i64>,
    ignore_description: bool,
) -> Result<()> {
    let mut subscription = Subscription::new(url, name.unwrap_or_default());
    if let Some(value) = &color {
        subscription.color =
            Some(parse_css_color(value).with_context(|| format!("invalid color '{value}'"))?);
    }
    subscription.ignore_embedded_alerts = ignore_alerts;
    subscription.default_alarm_minutes = default_alarm;
    subscription.default_all_day_alarm_minutes = default_all_day_alarm;
    subscription.ignore_description = ignore_description;

    let id = db.add_subscription(&subscription)?;

    match (username, password) {
        (Some(username), Some(password)) => {
            db.set_credential(&Credential::new(id, username, password))?;
        }
        (None, None) => {}
        _ => bail!("--username and --password must be given together"),
    }

    println!("Added subscription {id} ({})", subscription.url);
    Ok(())
}

fn check(config: &AppConfig, url: String, username: Option<String>, password: Option<String>) -> Result<()> {
    let credential = match (username, password) {
        (Some(username), Some(password)) => Some(Credential::new(0, username, password)),
        (None, None) => None,
        _ => bail!("--username and --password must be given together"),
    };

    let transport = HttpTransport::new(config)?;
    let info = icsync::validate_feed(&transport, &url, credential.as_ref())?;

    println!("Feed OK: {} event(s)", info.event_count);
    if let Some(name) = &info.name {
        println!("Name:  {name}");
    }
    if let Some(color) = info.color {
        println!("Color: #{:08X}", color as u32);
    }
    if info.url != url {
        println!("Canonical URL: {}", info.url);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edit(
    db: &Database,
    id: i64,
    name: Option<String>,
    color: Option<String>,
    ignore_alerts: Option<bool>,
    default_alarm: Option<i64>,
    default_all_day_alarm: Option<i64>,
    ignore_description: Option<bool>,
) -> Result<()> {
    let mut subscription = db
        .get_subscription(id)?
        .with_context(|| format!("no subscription with id {id}"))?;

    if let Some(name) = name {
        subscription.display_name = name;
    }
    if let Some(value) = &color {
        subscription.color =
            Some(parse_css_color(value).with_context(|| format!("invalid color '{value}'"))?);
    }
    if let Some(ignore) = ignore_alerts {
        subscription.ignore_embedded_alerts = ignore;
    }
    if let Some(minutes) = default_alarm {
        subscription.default_alarm_minutes = (minutes > 0).then_some(minutes);
    }
    if let Some(minutes) = default_all_day_alarm {
        subscription.default_all_day_alarm_minutes = (minutes > 0).then_some(minutes);
    }
    if let Some(ignore) = ignore_description {
        subscription.ignore_description = ignore;
    }

    db.update_subscription_settings(&subscription)?;
    println!("Updated subscription {id}");
    Ok(())
}

fn list(db: &Database) -> Result<()> {
    let subscriptions = db.get_subscriptions()?;
    if subscriptions.is_empty() {
        println!("No subscriptions. Add one with `icsync add <url>`.");
        return Ok(());
    }

    for subscription in subscriptions {
        let status = match (&subscription.error_message, subscription.last_sync) {
            (Some(error), _) => format!("error: {error}"),
            (None, 0) => "never synced".to_string(),
            (None, last_sync) => format!("last sync {}", format_millis(last_sync)),
        };
        let name = if subscription.display_name.is_empty() {
            "(unnamed)"
        } else {
            &subscription.display_name
        };
        println!(
            "{:>4}  {}  {}  [{status}]",
            subscription.id, name, subscription.url
        );
    }
    Ok(())
}

fn remove(db: &Database, id: i64) -> Result<()> {
    if !db.remove_subscription(id)? {
        bail!("no subscription with id {id}");
    }
    println!("Removed subscription {id}");
    Ok(())
}

fn sync(db: &Database, config: &AppConfig, id: Option<i64>, force: bool) -> Result<()> {
    let transport = HttpTransport::new(config)?;
    let engine = SyncEngine::new(db, &transport);

    let results = match id {
        Some(id) => {
            let subscription = db
                .get_subscription(id)?
                .with_context(|| format!("no subscription with id {id}"))?;
            vec![engine.sync_subscription(&subscription, force)]
        }
        None => engine.sync_all(force, &AtomicBool::new(false))?.results,
    };

    let mut failures = 0;
    for result in &results {
        print_result(result);
        if !result.success {
            failures += 1;
        }
    }
    if failures > 0 {
        bail!("{failures} subscription(s) failed to sync");
    }
    Ok(())
}

fn print_result(result: &SyncResult) {
    match (&result.stats, &result.error_message) {
        (Some(stats), _) => println!(
            "subscription {}: {} added, {} updated, {} skipped, {} deleted",
            result.subscription_id, stats.inserted, stats.updated, stats.skipped, stats.deleted
        ),
        (None, None) => println!("subscription {}: not modified", result.subscription_id),
        (None, Some(error)) => println!("subscription {}: {error}", result.subscription_id),
    }
}

fn show(db: &Database, id: i64) -> Result<()> {
    let subscription = db
        .get_subscription(id)?
        .with_context(|| format!("no subscription with id {id}"))?;
    let Some(calendar_id) = subscription.calendar_id else {
        println!("Subscription {id} has never been synced.");
        return Ok(());
    };

    let (name, _) = db.calendar_name_and_color(calendar_id)?;
    let events = db.events_for_calendar(calendar_id)?;
    println!("{name}: {} event(s)", events.len());
    for event in events {
        print_event(&event);
    }
    Ok(())
}

fn print_event(event: &StoredEvent) {
    let start = match event.dtstart {
        Some(millis) if event.all_day => format_date(millis),
        Some(millis) => format_millis(millis),
        None => "          ".to_string(),
    };
    let marker = if event.recurrence_id.is_some() {
        "  ~ "
    } else if event.rrule.is_some() {
        "  * "
    } else {
        "    "
    };
    println!(
        "{marker}{start}  {}",
        event.summary.as_deref().unwrap_or("(no title)")
    );
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn format_date(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| millis.to_string())
}
