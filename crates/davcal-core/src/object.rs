//! Calendar object types.
//!
//! A [`CalendarObject`] is one event or one todo. Values are created by the
//! codec on decode or by the caller before an encode, and are never mutated
//! in place on the server side: an update builds a new value and sends it.
//!
//! Objects that came back from a session call additionally carry an
//! [`ObjectOrigin`] (the object URL and the version token seen at fetch time).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::CalendarTime;

/// The component kind of a calendar object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A VEVENT component.
    Event,
    /// A VTODO component.
    Todo,
}

impl ObjectKind {
    /// The iCalendar component name (`VEVENT` / `VTODO`).
    pub fn component_name(&self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
        }
    }

    /// Lowercase name used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Todo => "todo",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a materialized object lives on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectOrigin {
    /// Absolute URL of the object resource.
    pub url: String,
    /// Entity tag from the fetch, quotes stripped.
    pub version_token: Option<String>,
}

impl ObjectOrigin {
    /// Creates an origin for the given URL and token.
    pub fn new(url: impl Into<String>, version_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            version_token,
        }
    }
}

/// Returned when a priority is outside the 1–9 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("priority must be between 1 and 9, got {0}")]
pub struct PriorityError(pub u8);

/// A todo priority, 1 (highest) to 9 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Highest priority.
    pub const HIGHEST: Priority = Priority(1);
    /// Lowest priority.
    pub const LOWEST: Priority = Priority(9);

    /// Creates a priority, rejecting values outside 1–9.
    pub fn new(value: u8) -> Result<Self, PriorityError> {
        if (1..=9).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PriorityError(value))
        }
    }

    /// Returns the numeric value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = PriorityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Todo status (RFC 5545 STATUS values for VTODO).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum TodoStatus {
    /// Needs action.
    #[default]
    NeedsAction,
    /// In process.
    InProcess,
    /// Completed.
    Completed,
    /// Cancelled.
    Cancelled,
}

impl TodoStatus {
    /// Parses a STATUS value.
    ///
    /// Unknown values fall back to [`TodoStatus::NeedsAction`].
    pub fn from_ical(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "IN-PROCESS" | "IN-PROGRESS" => Self::InProcess,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::NeedsAction,
        }
    }

    /// The STATUS value written on the wire.
    pub fn as_ical(&self) -> &'static str {
        match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::InProcess => "IN-PROCESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` once the todo needs no further work.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ical())
    }
}

fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A calendar event (VEVENT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier within the collection.
    pub uid: String,
    /// Title.
    pub summary: String,
    /// Start time.
    pub start: Option<CalendarTime>,
    /// End time.
    pub end: Option<CalendarTime>,
    /// Free-form description.
    pub description: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Server location, set on objects returned by a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ObjectOrigin>,
}

impl Event {
    /// Creates an event with a freshly generated UUID.
    pub fn new(summary: impl Into<String>) -> Self {
        Self::with_uid(new_uid(), summary)
    }

    /// Creates an event with the given uid.
    pub fn with_uid(uid: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            summary: summary.into(),
            start: None,
            end: None,
            description: None,
            location: None,
            origin: None,
        }
    }

    /// Builder: set the start time.
    pub fn with_start(mut self, start: impl Into<CalendarTime>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Builder: set the end time.
    pub fn with_end(mut self, end: impl Into<CalendarTime>) -> Self {
        self.end = Some(end.into());
        self
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A todo item (VTODO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier within the collection.
    pub uid: String,
    /// Title.
    pub summary: String,
    /// Progress status.
    #[serde(default)]
    pub status: TodoStatus,
    /// Due time.
    pub due: Option<CalendarTime>,
    /// Priority, 1 (highest) to 9 (lowest).
    pub priority: Option<Priority>,
    /// Server location, set on objects returned by a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ObjectOrigin>,
}

impl Todo {
    /// Creates a todo with a freshly generated UUID.
    pub fn new(summary: impl Into<String>) -> Self {
        Self::with_uid(new_uid(), summary)
    }

    /// Creates a todo with the given uid.
    pub fn with_uid(uid: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            summary: summary.into(),
            status: TodoStatus::default(),
            due: None,
            priority: None,
            origin: None,
        }
    }

    /// Builder: set the status.
    pub fn with_status(mut self, status: TodoStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set the due time.
    pub fn with_due(mut self, due: impl Into<CalendarTime>) -> Self {
        self.due = Some(due.into());
        self
    }

    /// Builder: set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// One calendar object: an event or a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalendarObject {
    /// A VEVENT.
    Event(Event),
    /// A VTODO.
    Todo(Todo),
}

impl CalendarObject {
    /// The component kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Event(_) => ObjectKind::Event,
            Self::Todo(_) => ObjectKind::Todo,
        }
    }

    /// The object's uid.
    pub fn uid(&self) -> &str {
        match self {
            Self::Event(event) => &event.uid,
            Self::Todo(todo) => &todo.uid,
        }
    }

    /// The object's summary.
    pub fn summary(&self) -> &str {
        match self {
            Self::Event(event) => &event.summary,
            Self::Todo(todo) => &todo.summary,
        }
    }

    /// Server location, if this object was materialized by a session.
    pub fn origin(&self) -> Option<&ObjectOrigin> {
        match self {
            Self::Event(event) => event.origin.as_ref(),
            Self::Todo(todo) => todo.origin.as_ref(),
        }
    }

    /// Object URL, if known.
    pub fn url(&self) -> Option<&str> {
        self.origin().map(|o| o.url.as_str())
    }

    /// Version token seen at fetch time, if known.
    pub fn version_token(&self) -> Option<&str> {
        self.origin().and_then(|o| o.version_token.as_deref())
    }

    /// Returns this object with the given origin attached.
    pub fn with_origin(mut self, origin: ObjectOrigin) -> Self {
        match &mut self {
            Self::Event(event) => event.origin = Some(origin),
            Self::Todo(todo) => todo.origin = Some(origin),
        }
        self
    }

    /// Returns the event, if this is one.
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Todo(_) => None,
        }
    }

    /// Returns the todo, if this is one.
    pub fn as_todo(&self) -> Option<&Todo> {
        match self {
            Self::Todo(todo) => Some(todo),
            Self::Event(_) => None,
        }
    }
}

impl From<Event> for CalendarObject {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<Todo> for CalendarObject {
    fn from(todo: Todo) -> Self {
        Self::Todo(todo)
    }
}
