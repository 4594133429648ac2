//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use davcal_core::{CalendarTime, Priority};

use crate::config::Overrides;

/// davcal - events and todos on a CalDAV server
#[derive(Debug, Parser)]
#[command(name = "davcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "DAVCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    // --- Connection flags ---
    /// CalDAV base URL
    #[arg(long, global = true, env = "CALDAV_BASE_URL")]
    pub url: Option<String>,

    /// CalDAV username
    #[arg(long, global = true, env = "CALDAV_USERNAME")]
    pub username: Option<String>,

    /// CalDAV password
    #[arg(long, global = true, env = "CALDAV_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "CALDAV_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Calendar to work on (display name or path name)
    #[arg(long, global = true, env = "CALDAV_CALENDAR")]
    pub calendar: Option<String>,

    // --- Logging flags ---
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true, env = "LOG_FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Settings given on the command line or through the environment.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout,
            calendar: self.calendar.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List calendar collections
    Calendars,

    /// List events in the calendar
    Events,

    /// List todos in the calendar
    Todos,

    /// Show an event or todo by uid
    Show {
        /// Object uid
        uid: String,
    },

    /// Create an event
    AddEvent(NewEvent),

    /// Create a todo
    AddTodo(NewTodo),

    /// Change fields of an existing event
    UpdateEvent {
        /// Event uid
        uid: String,

        #[command(flatten)]
        changes: EventChanges,
    },

    /// Mark a todo as completed
    Complete {
        /// Todo uid
        uid: String,
    },

    /// Delete an event or todo
    Delete {
        /// Object uid
        uid: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Fields of a new event.
#[derive(Debug, Args)]
pub struct NewEvent {
    /// Event title
    pub summary: String,

    /// Start (2024-06-01, 2024-06-01T09:00, 2024-06-01T09:00:00Z).
    /// A numeric offset such as +08:00 is converted to UTC.
    #[arg(long, value_parser = parse_time)]
    pub start: Option<CalendarTime>,

    /// End, same forms as --start
    #[arg(long, value_parser = parse_time)]
    pub end: Option<CalendarTime>,

    /// Description
    #[arg(long)]
    pub description: Option<String>,

    /// Location
    #[arg(long)]
    pub location: Option<String>,

    /// Use this uid instead of a generated one
    #[arg(long)]
    pub uid: Option<String>,
}

/// Fields of a new todo.
#[derive(Debug, Args)]
pub struct NewTodo {
    /// Todo title
    pub summary: String,

    /// Due date or time, same forms as add-event --start
    #[arg(long, value_parser = parse_time)]
    pub due: Option<CalendarTime>,

    /// Priority from 1 (highest) to 9 (lowest)
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// Use this uid instead of a generated one
    #[arg(long)]
    pub uid: Option<String>,
}

/// Event fields to replace; unset flags keep the server value.
#[derive(Debug, Default, Args)]
pub struct EventChanges {
    /// New title
    #[arg(long)]
    pub summary: Option<String>,

    /// New start, same forms as add-event --start
    #[arg(long, value_parser = parse_time)]
    pub start: Option<CalendarTime>,

    /// New end
    #[arg(long, value_parser = parse_time)]
    pub end: Option<CalendarTime>,

    /// New description
    #[arg(long)]
    pub description: Option<String>,

    /// New location
    #[arg(long)]
    pub location: Option<String>,
}

impl EventChanges {
    /// Returns true when no field would change.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

fn parse_time(value: &str) -> Result<CalendarTime, String> {
    CalendarTime::parse_iso(value).ok_or_else(|| {
        format!(
            "`{}` is not a date (YYYY-MM-DD) or date-time (YYYY-MM-DDTHH:MM[:SS][Z|+HH:MM])",
            value
        )
    })
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    let number: u8 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    Priority::new(number).map_err(|e| e.to_string())
}
