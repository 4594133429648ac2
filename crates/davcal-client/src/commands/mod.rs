//! Command implementations.
//!
//! Session commands write their result to the given writer, as text or as
//! pretty JSON. Skipped failures in fail-open listings are reported as a
//! warning on the log and through the `partial` field in JSON output.

pub mod calendars;
pub mod config;
pub mod objects;

use std::io::Write;

use serde::Serialize;
use tracing::{debug, warn};

use davcal_caldav::{CalDavSession, CalendarDescriptor, Listing};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Opens a session against the configured server.
pub fn open_session(config: &ClientConfig) -> ClientResult<CalDavSession> {
    Ok(CalDavSession::connect(config.to_caldav_config()?)?)
}

/// Picks the calendar to work on: the named one, else the first discovered.
pub async fn target_calendar(
    session: &CalDavSession,
    name: Option<&str>,
) -> ClientResult<CalendarDescriptor> {
    let calendar = match name {
        Some(name) => session.find_calendar(name).await?,
        None => session.primary_calendar().await?,
    };
    debug!(url = %calendar.url, name = %calendar.display_name, "Using calendar");
    Ok(calendar)
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> ClientResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn warn_if_partial<T>(what: &str, listing: &Listing<T>) {
    if listing.is_partial() {
        warn!(
            count = listing.len(),
            "Some {} could not be read; the list may be incomplete", what
        );
    }
}
