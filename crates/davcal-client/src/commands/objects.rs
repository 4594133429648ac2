//! Event and todo commands.
//!
//! Commands that address an object by uid locate it with a collection scan,
//! then write back conditionally on the version token seen at fetch time.

use std::io::Write;

use serde_json::json;
use tracing::info;

use davcal_caldav::{CalDavError, CalDavSession};
use davcal_core::{CalendarObject, Event, ObjectKind, Todo, TodoStatus};

use super::{warn_if_partial, write_json};
use crate::cli::{EventChanges, NewEvent, NewTodo};
use crate::error::{ClientError, ClientResult};

/// Lists the events or todos of a calendar.
pub async fn list<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    kind: ObjectKind,
    json: bool,
    out: &mut W,
) -> ClientResult<()> {
    let objects = session.list_objects(calendar_url, kind).await?;
    warn_if_partial(
        match kind {
            ObjectKind::Event => "events",
            ObjectKind::Todo => "todos",
        },
        &objects,
    );

    if json {
        return write_json(out, &objects);
    }
    if objects.is_empty() {
        writeln!(out, "No {}s.", kind)?;
    }
    for object in &objects {
        writeln!(out, "{}", render_line(object))?;
    }
    Ok(())
}

/// Shows one object in full.
pub async fn show<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    uid: &str,
    json: bool,
    out: &mut W,
) -> ClientResult<()> {
    let object = locate(session, calendar_url, uid).await?;
    if json {
        return write_json(out, &object);
    }
    write!(out, "{}", render_detail(&object))?;
    Ok(())
}

/// Creates an event and prints where it was stored.
pub async fn add_event<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    new: NewEvent,
    json: bool,
    out: &mut W,
) -> ClientResult<()> {
    let mut event = match new.uid {
        Some(uid) => Event::with_uid(uid, new.summary),
        None => Event::new(new.summary),
    };
    event.start = new.start;
    event.end = new.end;
    event.description = new.description;
    event.location = new.location;

    create(session, calendar_url, event.into(), json, out).await
}

/// Creates a todo and prints where it was stored.
pub async fn add_todo<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    new: NewTodo,
    json: bool,
    out: &mut W,
) -> ClientResult<()> {
    let mut todo = match new.uid {
        Some(uid) => Todo::with_uid(uid, new.summary),
        None => Todo::new(new.summary),
    };
    todo.due = new.due;
    todo.priority = new.priority;

    create(session, calendar_url, todo.into(), json, out).await
}

async fn create<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    object: CalendarObject,
    json: bool,
    out: &mut W,
) -> ClientResult<()> {
    let url = session.create_object(calendar_url, &object).await?;
    if json {
        return write_json(
            out,
            &json!({ "uid": object.uid(), "kind": object.kind(), "url": url }),
        );
    }
    writeln!(out, "Created {} {} at {}", object.kind(), object.uid(), url)?;
    Ok(())
}

/// Replaces the given fields of an event.
pub async fn update_event<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    uid: &str,
    changes: EventChanges,
    out: &mut W,
) -> ClientResult<()> {
    if changes.is_empty() {
        return Err(ClientError::Input(
            "nothing to update; pass at least one field".to_string(),
        ));
    }

    let object = locate(session, calendar_url, uid).await?;
    let mut event = object
        .as_event()
        .cloned()
        .ok_or_else(|| ClientError::Input(format!("`{}` is a todo, not an event", uid)))?;
    apply_changes(&mut event, changes);

    let (url, version) = write_target(&object)?;
    session
        .update_object(&url, &CalendarObject::Event(event), &version)
        .await?;
    info!(uid, url = %url, "Event updated");
    writeln!(out, "Updated event {}", uid)?;
    Ok(())
}

/// Marks a todo completed.
pub async fn complete<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    uid: &str,
    out: &mut W,
) -> ClientResult<()> {
    let object = locate(session, calendar_url, uid).await?;
    let todo = object
        .as_todo()
        .ok_or_else(|| ClientError::Input(format!("`{}` is an event, not a todo", uid)))?;
    if todo.status == TodoStatus::Completed {
        writeln!(out, "Todo {} is already completed", uid)?;
        return Ok(());
    }
    let todo = todo.clone().with_status(TodoStatus::Completed);

    let (url, version) = write_target(&object)?;
    session
        .update_object(&url, &CalendarObject::Todo(todo), &version)
        .await?;
    writeln!(out, "Completed todo {}", uid)?;
    Ok(())
}

/// Deletes an event or todo.
pub async fn delete<W: Write>(
    session: &CalDavSession,
    calendar_url: &str,
    uid: &str,
    out: &mut W,
) -> ClientResult<()> {
    let object = locate(session, calendar_url, uid).await?;
    let (url, version) = write_target(&object)?;
    session.delete_object(&url, &version).await?;
    writeln!(out, "Deleted {} {}", object.kind(), uid)?;
    Ok(())
}

async fn locate(
    session: &CalDavSession,
    calendar_url: &str,
    uid: &str,
) -> ClientResult<CalendarObject> {
    let found = session.find_by_uid(calendar_url, uid).await?;
    Ok(session.get_object(&found.url).await?)
}

/// URL and version token for a conditional write of a fetched object.
fn write_target(object: &CalendarObject) -> ClientResult<(String, String)> {
    let url = object
        .url()
        .ok_or_else(|| ClientError::Input(format!("`{}` has no server location", object.uid())))?;
    let version = object.version_token().ok_or_else(|| {
        CalDavError::precondition_failed(format!(
            "server sent no version token for {}; refusing an unconditional write",
            url
        ))
    })?;
    Ok((url.to_string(), version.to_string()))
}

fn apply_changes(event: &mut Event, changes: EventChanges) {
    if let Some(summary) = changes.summary {
        event.summary = summary;
    }
    if changes.start.is_some() {
        event.start = changes.start;
    }
    if changes.end.is_some() {
        event.end = changes.end;
    }
    if changes.description.is_some() {
        event.description = changes.description;
    }
    if changes.location.is_some() {
        event.location = changes.location;
    }
}

fn render_line(object: &CalendarObject) -> String {
    match object {
        CalendarObject::Event(event) => {
            let start = event
                .start
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let mut line = format!("{}  {}", start, event.summary);
            if let Some(location) = &event.location {
                line.push_str(&format!(" @ {}", location));
            }
            line.push_str(&format!("  [{}]", event.uid));
            line
        }
        CalendarObject::Todo(todo) => {
            let mark = if todo.status.is_done() { 'x' } else { ' ' };
            let mut line = format!("[{}] {}", mark, todo.summary);
            if let Some(due) = &todo.due {
                line.push_str(&format!("  due {}", due));
            }
            if let Some(priority) = todo.priority {
                line.push_str(&format!("  p{}", priority));
            }
            line.push_str(&format!("  [{}]", todo.uid));
            line
        }
    }
}

fn render_detail(object: &CalendarObject) -> String {
    let mut fields: Vec<(&str, String)> = vec![
        ("kind", object.kind().to_string()),
        ("uid", object.uid().to_string()),
        ("summary", object.summary().to_string()),
    ];
    match object {
        CalendarObject::Event(event) => {
            if let Some(start) = &event.start {
                fields.push(("start", start.to_string()));
            }
            if let Some(end) = &event.end {
                fields.push(("end", end.to_string()));
            }
            if let Some(location) = &event.location {
                fields.push(("location", location.clone()));
            }
            if let Some(description) = &event.description {
                fields.push(("description", description.clone()));
            }
        }
        CalendarObject::Todo(todo) => {
            fields.push(("status", todo.status.to_string()));
            if let Some(due) = &todo.due {
                fields.push(("due", due.to_string()));
            }
            if let Some(priority) = todo.priority {
                fields.push(("priority", priority.to_string()));
            }
        }
    }
    if let Some(url) = object.url() {
        fields.push(("url", url.to_string()));
    }
    if let Some(version) = object.version_token() {
        fields.push(("etag", version.to_string()));
    }

    fields
        .into_iter()
        .map(|(name, value)| format!("{:<12}{}\n", format!("{}:", name), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use davcal_core::{CalendarTime, ObjectOrigin, Priority};

    fn day(d: u32) -> CalendarTime {
        CalendarTime::from_date(NaiveDate::from_ymd_opt(2024, 6, d).unwrap())
    }

    #[test]
    fn event_line() {
        let event = Event::with_uid("e1", "Standup")
            .with_start(day(3))
            .with_location("Room 4");
        assert_eq!(
            render_line(&event.into()),
            "2024-06-03  Standup @ Room 4  [e1]"
        );
        assert_eq!(
            render_line(&Event::with_uid("e2", "Someday").into()),
            "-  Someday  [e2]"
        );
    }

    #[test]
    fn todo_line() {
        let todo = Todo::with_uid("t1", "Pay rent")
            .with_due(day(1))
            .with_priority(Priority::HIGHEST);
        assert_eq!(render_line(&todo.into()), "[ ] Pay rent  due 2024-06-01  p1  [t1]");

        let done = Todo::with_uid("t2", "File taxes").with_status(TodoStatus::Completed);
        assert_eq!(render_line(&done.into()), "[x] File taxes  [t2]");
    }

    #[test]
    fn detail_includes_origin() {
        let object = CalendarObject::from(Todo::with_uid("t1", "Pay rent")).with_origin(
            ObjectOrigin::new("https://dav.example.com/cal/t1.ics", Some("v3".to_string())),
        );
        let detail = render_detail(&object);
        assert!(detail.starts_with("kind:       todo\nuid:        t1\n"));
        assert!(detail.contains("status:     NEEDS-ACTION\n"));
        assert!(detail.contains("url:        https://dav.example.com/cal/t1.ics\n"));
        assert!(detail.ends_with("etag:       v3\n"));
    }

    #[test]
    fn changes_replace_only_given_fields() {
        let mut event = Event::with_uid("e1", "Standup")
            .with_start(day(3))
            .with_description("daily");
        apply_changes(
            &mut event,
            EventChanges {
                summary: Some("Sync".to_string()),
                end: Some(day(4)),
                ..EventChanges::default()
            },
        );
        assert_eq!(event.summary, "Sync");
        assert_eq!(event.start, Some(day(3)));
        assert_eq!(event.end, Some(day(4)));
        assert_eq!(event.description.as_deref(), Some("daily"));
    }

    #[test]
    fn write_target_requires_version_token() {
        let object = CalendarObject::from(Event::with_uid("e1", "x"))
            .with_origin(ObjectOrigin::new("https://dav.example.com/cal/e1.ics", None));
        let err = write_target(&object).unwrap_err();
        assert!(matches!(err, ClientError::CalDav(e) if e.is_precondition_failed()));

        let detached = CalendarObject::from(Event::with_uid("e1", "x"));
        assert!(matches!(write_target(&detached), Err(ClientError::Input(_))));
    }
}
