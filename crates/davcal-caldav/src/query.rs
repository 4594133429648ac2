//! Collection queries: PROPFIND against one URL, multistatus in, descriptors out.
//!
//! Both queries fail open. A failed request or an unparseable response is
//! logged and yields an empty [`Listing`] with `partial` set, so callers can
//! tell "no calendars" from "query failed" without the listing pass erroring.

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use davcal_core::ObjectKind;

use crate::error::CalDavResult;
use crate::transport::{DavRequest, Transport, normalize_etag};
use crate::xml::{self, DavEntry};

/// Media type marking a calendar object resource.
pub const CALENDAR_MEDIA_TYPE: &str = "text/calendar";

/// Items from a fail-open operation.
///
/// `partial` is set when something was swallowed along the way (the query
/// failed, or some entries could not be fetched or decoded); details are in
/// the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing<T> {
    /// The items that were recovered.
    pub items: Vec<T>,
    /// Whether failures were skipped to produce `items`.
    pub partial: bool,
}

impl<T> Listing<T> {
    /// A listing with nothing skipped.
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            partial: false,
        }
    }

    /// A listing produced despite skipped failures.
    pub fn partial(items: Vec<T>) -> Self {
        Self {
            items,
            partial: true,
        }
    }

    /// An empty listing standing in for a failed query.
    pub fn failed() -> Self {
        Self::partial(Vec::new())
    }

    /// Returns true if failures were skipped.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Consumes the listing, returning the items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for Listing<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Listing<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A calendar collection found by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDescriptor {
    /// Absolute URL of the collection.
    pub url: String,
    /// Last path segment of the href, percent-decoded.
    pub name: String,
    /// The display name, or `name` when the server sends none.
    pub display_name: String,
    /// `calendar-description`, if set.
    pub description: Option<String>,
}

/// One calendar object resource reported by a collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// The href as reported by the server.
    pub href: String,
    /// `getcontenttype`
    pub content_type: String,
    /// `getetag`, quotes stripped. May be stale; the fetch-time tag wins.
    pub version_token: Option<String>,
}

impl ObjectDescriptor {
    /// Whether the content type names the given component kind.
    ///
    /// `None` when the content type carries no `component=` parameter.
    pub fn component_matches(&self, kind: ObjectKind) -> Option<bool> {
        self.content_type
            .split(';')
            .skip(1)
            .filter_map(|param| param.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("component"))
            .map(|(_, value)| {
                value
                    .trim()
                    .trim_matches('"')
                    .eq_ignore_ascii_case(kind.component_name())
            })
    }
}

/// Discovers calendar collections one level below `base_url`.
pub async fn query_collections(
    transport: &dyn Transport,
    base_url: &Url,
) -> Listing<CalendarDescriptor> {
    let Some(entries) = propfind(transport, base_url.as_str(), xml::propfind_collections_body()).await
    else {
        return Listing::failed();
    };

    let calendars = collections_from_entries(base_url, &entries);
    info!(url = %base_url, count = calendars.len(), "Discovered calendars");
    Listing::complete(calendars)
}

/// Lists the calendar object resources one level below `collection_url`.
pub async fn query_objects(
    transport: &dyn Transport,
    collection_url: &str,
) -> Listing<ObjectDescriptor> {
    let Some(entries) = propfind(transport, collection_url, xml::propfind_objects_body()).await
    else {
        return Listing::failed();
    };

    let objects = objects_from_entries(&entries);
    debug!(url = %collection_url, count = objects.len(), "Listed calendar objects");
    Listing::complete(objects)
}

async fn propfind(
    transport: &dyn Transport,
    url: &str,
    body: CalDavResult<String>,
) -> Option<Vec<DavEntry>> {
    let result: CalDavResult<Vec<DavEntry>> = async {
        let request = DavRequest::propfind(url, body?);
        let response = transport.send(request).await?.error_for_status("PROPFIND")?;
        xml::parse_multistatus(&response.body)
    }
    .await;

    match result {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(url = %url, error = %e, "PROPFIND failed; returning empty listing");
            None
        }
    }
}

/// Turns multistatus entries into calendar descriptors.
///
/// Entries are skipped when the href is empty, `/`, or not an absolute path,
/// when no propstat succeeded, or when the resource type lacks the calendar
/// marker.
pub fn collections_from_entries(base_url: &Url, entries: &[DavEntry]) -> Vec<CalendarDescriptor> {
    let origin = origin_of(base_url);

    entries
        .iter()
        .filter_map(|entry| {
            let href = entry.href.as_str();
            if href.is_empty() || href == "/" {
                debug!(href, "Skipping root entry");
                return None;
            }
            if !href.starts_with('/') {
                debug!(href, "Skipping entry whose href is not an absolute path");
                return None;
            }
            let Some(props) = entry.success_props() else {
                debug!(href, "Skipping entry without a successful propstat");
                return None;
            };
            if !props.is_calendar() {
                debug!(href, "Skipping entry that is not a calendar collection");
                return None;
            }

            let name = last_segment(href);
            let display_name = props
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| name.clone());
            let description = props
                .description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string);

            Some(CalendarDescriptor {
                url: format!("{}{}", origin, href),
                name,
                display_name,
                description,
            })
        })
        .collect()
}

/// Turns multistatus entries into object descriptors.
///
/// Entries are skipped when the href is empty or ends in `/` (collections),
/// when no propstat succeeded, or when the content type is absent or not
/// `text/calendar`.
pub fn objects_from_entries(entries: &[DavEntry]) -> Vec<ObjectDescriptor> {
    entries
        .iter()
        .filter_map(|entry| {
            let href = entry.href.as_str();
            if href.is_empty() || href.ends_with('/') {
                return None;
            }
            let props = entry.success_props()?;
            let content_type = props.content_type.as_deref()?.trim();
            if !content_type.contains(CALENDAR_MEDIA_TYPE) {
                debug!(href, content_type, "Skipping non-calendar resource");
                return None;
            }

            Some(ObjectDescriptor {
                href: href.to_string(),
                content_type: content_type.to_string(),
                version_token: props
                    .etag
                    .as_deref()
                    .map(normalize_etag)
                    .filter(|t| !t.is_empty()),
            })
        })
        .collect()
}

/// `scheme://host[:port]` of a URL.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Resolves a server href against the URL that was queried.
pub fn resolve_href(base_url: &str, href: &str) -> String {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

fn last_segment(href: &str) -> String {
    let segment = href
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
