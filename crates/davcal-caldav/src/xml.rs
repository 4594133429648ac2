//! WebDAV XML: PROPFIND request bodies and multistatus responses.
//!
//! Both request bodies are fixed byte sequences: the XML declaration, then
//! the `propfind` element with no whitespace between tags.

use std::fmt::Display;
use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{CalDavError, CalDavResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>"#;

/// Properties requested when discovering calendar collections.
const COLLECTION_PROPS: &[&str] = &["D:resourcetype", "D:displayname", "C:calendar-description"];

/// Properties requested when listing the objects of a collection.
const OBJECT_PROPS: &[&str] = &["D:resourcetype", "D:getcontenttype", "D:getetag"];

/// PROPFIND body asking for resource type, display name and description.
pub fn propfind_collections_body() -> CalDavResult<String> {
    propfind_body(COLLECTION_PROPS)
}

/// PROPFIND body asking for resource type, content type and entity tag.
pub fn propfind_objects_body() -> CalDavResult<String> {
    propfind_body(OBJECT_PROPS)
}

fn propfind_body(props: &[&str]) -> CalDavResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut propfind = BytesStart::new("D:propfind");
    propfind.push_attribute(("xmlns:D", DAV_NS));
    propfind.push_attribute(("xmlns:C", CALDAV_NS));
    writer
        .write_event(Event::Start(propfind))
        .map_err(write_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("D:prop")))
        .map_err(write_error)?;

    for prop in props {
        writer
            .write_event(Event::Empty(BytesStart::new(*prop)))
            .map_err(write_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("D:prop")))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("D:propfind")))
        .map_err(write_error)?;

    let body = String::from_utf8(writer.into_inner().into_inner()).map_err(write_error)?;
    Ok(format!("{}{}", XML_DECLARATION, body))
}

fn write_error(err: impl Display) -> CalDavError {
    CalDavError::transport(format!("failed to build PROPFIND body: {}", err))
}

/// The properties of one `propstat` block that this crate looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavProps {
    /// Local names of the children of `resourcetype` (e.g. `collection`, `calendar`).
    pub resource_types: Vec<String>,
    /// `displayname`
    pub display_name: Option<String>,
    /// `calendar-description`
    pub description: Option<String>,
    /// `getcontenttype`
    pub content_type: Option<String>,
    /// `getetag`, raw (still quoted).
    pub etag: Option<String>,
}

impl DavProps {
    /// Whether the resource type carries the calendar-collection marker.
    pub fn is_calendar(&self) -> bool {
        self.resource_types.iter().any(|t| t == "calendar")
    }

    /// Whether the resource type marks a plain collection.
    pub fn is_collection(&self) -> bool {
        self.resource_types.iter().any(|t| t == "collection")
    }
}

/// One `propstat` block: a status line and the properties it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropStat {
    /// The raw status line, e.g. `HTTP/1.1 200 OK`.
    pub status: Option<String>,
    /// Properties reported under that status.
    pub props: DavProps,
}

impl PropStat {
    /// True when the status line carries a 2xx code.
    pub fn is_success(&self) -> bool {
        self.status
            .as_deref()
            .and_then(status_code)
            .is_some_and(|code| (200..300).contains(&code))
    }
}

/// One `response` block of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavEntry {
    /// The entry's href, trimmed; empty if the block had none.
    pub href: String,
    /// Property results in document order.
    pub propstats: Vec<PropStat>,
}

impl DavEntry {
    /// The properties of the first successful `propstat`, if any.
    pub fn success_props(&self) -> Option<&DavProps> {
        self.propstats
            .iter()
            .find(|p| p.is_success())
            .map(|p| &p.props)
    }
}

/// Extracts the numeric code from a status line such as `HTTP/1.1 200 OK`.
pub fn status_code(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Parses a multistatus response into its entries.
///
/// Namespace prefixes are ignored; elements are matched by local name.
///
/// # Errors
///
/// Returns a transport error if the document is not well-formed XML.
pub fn parse_multistatus(xml: &str) -> CalDavResult<Vec<DavEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut entry: Option<DavEntry> = None;
    let mut propstat: Option<PropStat> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            CalDavError::transport(format!(
                "invalid multistatus XML at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let local = local_name(e.local_name().as_ref());
                match local.as_str() {
                    "response" => entry = Some(DavEntry::default()),
                    "propstat" if entry.is_some() => propstat = Some(PropStat::default()),
                    _ => record_resource_type(&stack, &local, propstat.as_mut()),
                }
                stack.push(local);
            }
            Event::Empty(e) => {
                let local = local_name(e.local_name().as_ref());
                record_resource_type(&stack, &local, propstat.as_mut());
            }
            Event::End(e) => {
                let local = local_name(e.local_name().as_ref());
                stack.pop();
                match local.as_str() {
                    "propstat" => {
                        if let (Some(entry), Some(done)) = (entry.as_mut(), propstat.take()) {
                            entry.propstats.push(done);
                        }
                    }
                    "response" => {
                        if let Some(mut done) = entry.take() {
                            done.href = done.href.trim().to_string();
                            entries.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| CalDavError::transport(format!("invalid XML text: {}", err)))?;
                record_text(&stack, &text, entry.as_mut(), propstat.as_mut());
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).to_string();
                record_text(&stack, &text, entry.as_mut(), propstat.as_mut());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn parent(stack: &[String]) -> Option<&str> {
    stack.last().map(String::as_str)
}

fn record_resource_type(stack: &[String], local: &str, propstat: Option<&mut PropStat>) {
    if parent(stack) == Some("resourcetype") {
        if let Some(propstat) = propstat {
            propstat.props.resource_types.push(local.to_string());
        }
    }
}

fn record_text(
    stack: &[String],
    text: &str,
    entry: Option<&mut DavEntry>,
    propstat: Option<&mut PropStat>,
) {
    let Some(current) = parent(stack) else {
        return;
    };
    let grandparent = stack.len().checked_sub(2).map(|i| stack[i].as_str());

    match (current, grandparent) {
        ("href", Some("response")) => {
            if let Some(entry) = entry {
                entry.href.push_str(text);
            }
        }
        ("status", Some("propstat")) => {
            if let Some(propstat) = propstat {
                append(&mut propstat.status, text);
            }
        }
        (name, Some("prop")) => {
            let Some(propstat) = propstat else {
                return;
            };
            let props = &mut propstat.props;
            match name {
                "displayname" => append(&mut props.display_name, text),
                "calendar-description" => append(&mut props.description, text),
                "getcontenttype" => append(&mut props.content_type, text),
                "getetag" => append(&mut props.etag, text),
                _ => {}
            }
        }
        _ => {}
    }
}

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}
