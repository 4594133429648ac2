//! iCalendar codec for single-component calendar objects.
//!
//! Every object this crate writes is a `VCALENDAR` holding exactly one
//! `VEVENT` or `VTODO`. Decoding is permissive: missing text properties
//! come back empty and missing times or priorities come back absent, so a
//! partially populated object never fails to decode. Times keep the form
//! they were written in; nothing is converted between timezones.

use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, EventLike,
    Property,
};
use tracing::debug;

use davcal_core::{CalendarObject, CalendarTime, Event, ObjectKind, Priority, Todo, TodoStatus};

use crate::error::{CalDavError, CalDavResult};

/// Product identifier written into every encoded calendar.
pub const PRODID: &str = "-//davcal//CalDAV Client//EN";

/// File extension of calendar object resources.
pub const OBJECT_EXTENSION: &str = "ics";

/// Encodes a calendar object as iCalendar text.
///
/// Only populated fields are written; absent optional fields are omitted.
pub fn encode(object: &CalendarObject) -> String {
    let mut calendar = Calendar::empty();
    calendar.append_property(Property::new("PRODID", PRODID));
    calendar.append_property(Property::new("VERSION", "2.0"));

    match object {
        CalendarObject::Event(event) => {
            calendar.push(encode_event(event));
        }
        CalendarObject::Todo(todo) => {
            calendar.push(encode_todo(todo));
        }
    }

    calendar.to_string()
}

fn encode_event(event: &Event) -> icalendar::Event {
    let mut vevent = icalendar::Event::new();
    vevent.uid(&event.uid);
    vevent.summary(&event.summary);

    if let Some(start) = &event.start {
        vevent.starts(to_ical_time(start));
    }
    if let Some(end) = &event.end {
        vevent.ends(to_ical_time(end));
    }
    if let Some(description) = non_empty(&event.description) {
        vevent.description(description);
    }
    if let Some(location) = non_empty(&event.location) {
        vevent.location(location);
    }

    vevent.done()
}

fn encode_todo(todo: &Todo) -> icalendar::Todo {
    let mut vtodo = icalendar::Todo::new();
    vtodo.uid(&todo.uid);
    vtodo.summary(&todo.summary);
    vtodo.add_property("STATUS", todo.status.as_ical());

    if let Some(due) = &todo.due {
        vtodo.due(to_ical_time(due));
    }
    if let Some(priority) = todo.priority {
        vtodo.add_property("PRIORITY", priority.get().to_string());
    }

    vtodo.done()
}

/// Decodes the first `VEVENT` in the payload.
///
/// # Errors
///
/// Returns `MalformedObject` if the text is not iCalendar or holds no event.
pub fn decode_event(text: &str) -> CalDavResult<Event> {
    let calendar = parse_calendar(text)?;
    calendar
        .iter()
        .find_map(|component| match component {
            CalendarComponent::Event(vevent) => {
                Some(event_from_component(vevent, &RawText::scan(text, "VEVENT")))
            }
            _ => None,
        })
        .ok_or_else(|| CalDavError::malformed_object("payload contains no VEVENT"))
}

/// Decodes the first `VTODO` in the payload.
///
/// # Errors
///
/// Returns `MalformedObject` if the text is not iCalendar or holds no todo.
pub fn decode_todo(text: &str) -> CalDavResult<Todo> {
    let calendar = parse_calendar(text)?;
    calendar
        .iter()
        .find_map(|component| match component {
            CalendarComponent::Todo(vtodo) => {
                Some(todo_from_component(vtodo, &RawText::scan(text, "VTODO")))
            }
            _ => None,
        })
        .ok_or_else(|| CalDavError::malformed_object("payload contains no VTODO"))
}

/// Decodes the first component of the requested kind.
pub fn decode(text: &str, kind: ObjectKind) -> CalDavResult<CalendarObject> {
    match kind {
        ObjectKind::Event => decode_event(text).map(CalendarObject::Event),
        ObjectKind::Todo => decode_todo(text).map(CalendarObject::Todo),
    }
}

/// Tries an event decode, then a todo decode.
pub fn decode_any(text: &str) -> CalDavResult<CalendarObject> {
    decode_event(text)
        .map(CalendarObject::Event)
        .or_else(|_| decode_todo(text).map(CalendarObject::Todo))
}

fn parse_calendar(text: &str) -> CalDavResult<Calendar> {
    text.parse::<Calendar>().map_err(|e| {
        debug!(error = %e, "Failed to parse iCalendar payload");
        CalDavError::malformed_object(format!("invalid iCalendar payload: {}", e))
    })
}

fn event_from_component(vevent: &icalendar::Event, raw: &RawText) -> Event {
    let mut event = Event::with_uid(
        raw.text(vevent, "UID").unwrap_or_default(),
        raw.text(vevent, "SUMMARY").unwrap_or_default(),
    );
    event.start = vevent.get_start().map(from_ical_time);
    event.end = vevent.get_end().map(from_ical_time);
    event.description = raw.text(vevent, "DESCRIPTION").filter(|v| !v.is_empty());
    event.location = raw.text(vevent, "LOCATION").filter(|v| !v.is_empty());
    event
}

fn todo_from_component(vtodo: &icalendar::Todo, raw: &RawText) -> Todo {
    let mut todo = Todo::with_uid(
        raw.text(vtodo, "UID").unwrap_or_default(),
        raw.text(vtodo, "SUMMARY").unwrap_or_default(),
    );
    todo.status = vtodo
        .property_value("STATUS")
        .map(TodoStatus::from_ical)
        .unwrap_or_default();
    todo.due = vtodo.get_due().map(from_ical_time);
    todo.priority = vtodo
        .property_value("PRIORITY")
        .and_then(|value| value.trim().parse::<u8>().ok())
        .and_then(|value| Priority::new(value).ok());
    todo
}

/// Still-escaped TEXT values of the first component of one kind.
///
/// The icalendar parser unescapes `\\` before `\n`, so an escaped
/// backslash followed by `n` comes back as a line break. Text fields are
/// read from the raw payload and unescaped here in one pass.
struct RawText(Vec<(String, String)>);

impl RawText {
    fn scan(text: &str, component: &str) -> Self {
        let unfolded = icalendar::parser::unfold(text);
        let mut properties = Vec::new();
        let mut inside = false;
        let mut nested = 0usize;

        for line in unfolded.lines() {
            if !inside {
                inside = line
                    .strip_prefix("BEGIN:")
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case(component));
                continue;
            }
            if line.starts_with("BEGIN:") {
                nested += 1;
            } else if line.starts_with("END:") {
                if nested == 0 {
                    break;
                }
                nested -= 1;
            } else if nested == 0 {
                if let Some((name, value)) = split_property(line) {
                    properties.push((name.to_ascii_uppercase(), value.to_string()));
                }
            }
        }
        Self(properties)
    }

    /// The unescaped value of `key`, falling back to the parsed component.
    fn text(&self, component: &impl Component, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| unescape_text(value))
            .or_else(|| component.property_value(key).map(ToString::to_string))
    }
}

/// Splits `NAME;PARAM="a:b":value` into name and raw value.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let name_end = line.find([';', ':'])?;
    let mut quoted = false;
    for (index, ch) in line.char_indices().skip_while(|(i, _)| *i < name_end) {
        match ch {
            '"' => quoted = !quoted,
            ':' if !quoted => return Some((&line[..name_end], &line[index + 1..])),
            _ => {}
        }
    }
    None
}

/// RFC 5545 TEXT unescape: `\\`, `\,`, `\;`, `\:` and `\n` / `\N`.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn to_ical_time(time: &CalendarTime) -> DatePerhapsTime {
    match time {
        CalendarTime::Date(date) => DatePerhapsTime::Date(*date),
        CalendarTime::Utc(dt) => DatePerhapsTime::DateTime(CalendarDateTime::Utc(*dt)),
        CalendarTime::Floating(naive) => {
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(*naive))
        }
        CalendarTime::Zoned { date_time, tzid } => {
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone {
                date_time: *date_time,
                tzid: tzid.clone(),
            })
        }
    }
}

fn from_ical_time(value: DatePerhapsTime) -> CalendarTime {
    match value {
        DatePerhapsTime::Date(date) => CalendarTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => CalendarTime::Utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            CalendarTime::Floating(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            CalendarTime::Zoned { date_time, tzid }
        }
    }
}
