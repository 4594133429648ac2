//! `davcal calendars`

use std::io::Write;

use davcal_caldav::{CalDavSession, CalendarDescriptor};

use super::{warn_if_partial, write_json};
use crate::error::ClientResult;

/// Lists the calendar collections of the account.
pub async fn list<W: Write>(session: &CalDavSession, json: bool, out: &mut W) -> ClientResult<()> {
    let calendars = session.list_calendars().await?;
    warn_if_partial("calendars", &calendars);

    if json {
        return write_json(out, &calendars);
    }
    if calendars.is_empty() {
        writeln!(out, "No calendars found.")?;
    }
    for calendar in &calendars {
        writeln!(out, "{}", render(calendar))?;
    }
    Ok(())
}

fn render(calendar: &CalendarDescriptor) -> String {
    let mut line = format!("{:<24} {}", calendar.display_name, calendar.url);
    if let Some(description) = &calendar.description {
        line.push_str(&format!("  ({})", description));
    }
    line
}
