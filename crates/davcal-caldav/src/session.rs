//! The CalDAV session: transport ownership, discovery, listing and mutation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use davcal_core::{CalendarObject, ObjectKind, ObjectOrigin};

use crate::client::HttpTransport;
use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavErrorCode, CalDavResult};
use crate::ics;
use crate::query::{self, CalendarDescriptor, Listing, ObjectDescriptor};
use crate::transport::{DavRequest, Transport};

/// Location and version of an object found by uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    /// Absolute URL of the object.
    pub url: String,
    /// Version token from the fetch.
    pub version_token: Option<String>,
}

enum SessionState {
    Uninitialized,
    Active(Arc<dyn Transport>),
}

/// A CalDAV session against one server.
///
/// A new session is uninitialized; [`open`](Self::open) builds the transport
/// and every other operation fails with `NotInitialized` until it has run.
/// [`close`](Self::close) drops the transport and may be called any number
/// of times. There is no reconnection: after a transport error the caller
/// closes and reopens.
///
/// Operations take `&self` and may run concurrently. Nothing here locks
/// objects; concurrent writes to the same URL are settled by their version
/// token preconditions.
pub struct CalDavSession {
    config: CalDavConfig,
    state: SessionState,
    calendars: Mutex<Option<Vec<CalendarDescriptor>>>,
}

impl CalDavSession {
    /// Creates an uninitialized session.
    pub fn new(config: CalDavConfig) -> Self {
        Self {
            config,
            state: SessionState::Uninitialized,
            calendars: Mutex::new(None),
        }
    }

    /// Creates a session and opens it with the HTTP transport.
    pub fn connect(config: CalDavConfig) -> CalDavResult<Self> {
        let mut session = Self::new(config);
        session.open()?;
        Ok(session)
    }

    /// Opens the session with the HTTP transport.
    ///
    /// Opening an active session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if credentials are missing.
    pub fn open(&mut self) -> CalDavResult<()> {
        if self.is_active() {
            return Ok(());
        }
        let transport = HttpTransport::new(&self.config)?;
        self.activate(Arc::new(transport));
        Ok(())
    }

    /// Opens the session with a caller-supplied transport.
    ///
    /// The configuration is validated all the same. Replaces the transport
    /// of an already active session.
    pub fn open_with(&mut self, transport: Arc<dyn Transport>) -> CalDavResult<()> {
        self.config.validate()?;
        self.activate(transport);
        Ok(())
    }

    fn activate(&mut self, transport: Arc<dyn Transport>) {
        info!(url = %self.config.url, "CalDAV session opened");
        self.state = SessionState::Active(transport);
    }

    /// Releases the transport and forgets cached calendars.
    pub fn close(&mut self) {
        if let SessionState::Active(_) = std::mem::replace(&mut self.state, SessionState::Uninitialized)
        {
            info!(url = %self.config.url, "CalDAV session closed");
        }
        self.calendars.get_mut().take();
    }

    /// Returns true between `open` and `close`.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    /// The session configuration.
    pub fn config(&self) -> &CalDavConfig {
        &self.config
    }

    fn transport(&self) -> CalDavResult<Arc<dyn Transport>> {
        match &self.state {
            SessionState::Active(transport) => Ok(Arc::clone(transport)),
            SessionState::Uninitialized => Err(CalDavError::not_initialized()),
        }
    }

    /// Discovers the calendar collections under the base URL.
    ///
    /// Fails open. The first complete, non-empty discovery is cached for the
    /// life of the session.
    pub async fn list_calendars(&self) -> CalDavResult<Listing<CalendarDescriptor>> {
        let transport = self.transport()?;

        if let Some(cached) = self.calendars.lock().await.as_ref() {
            debug!(count = cached.len(), "Using cached calendar list");
            return Ok(Listing::complete(cached.clone()));
        }

        let listing = query::query_collections(transport.as_ref(), &self.config.url).await;
        if !listing.is_partial() && !listing.is_empty() {
            *self.calendars.lock().await = Some(listing.items.clone());
        }
        Ok(listing)
    }

    /// Finds a calendar by display name or path name.
    ///
    /// # Errors
    ///
    /// `NotFound` lists the display names that do exist.
    pub async fn find_calendar(&self, name: &str) -> CalDavResult<CalendarDescriptor> {
        let listing = self.list_calendars().await?;
        if let Some(found) = listing
            .iter()
            .find(|c| c.display_name == name || c.name == name)
        {
            return Ok(found.clone());
        }

        let available: Vec<&str> = listing.iter().map(|c| c.display_name.as_str()).collect();
        Err(CalDavError::not_found(format!(
            "no calendar named `{}` (available: {})",
            name,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        )))
    }

    /// The first discovered calendar.
    pub async fn primary_calendar(&self) -> CalDavResult<CalendarDescriptor> {
        self.list_calendars()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CalDavError::not_found("no calendars discovered"))
    }

    /// Lists and fetches every object of the given kind in a collection.
    ///
    /// Fails open: objects that cannot be fetched or decoded are skipped
    /// and the listing is marked partial. Each object carries its URL and
    /// the entity tag of its own fetch.
    pub async fn list_objects(
        &self,
        collection_url: &str,
        kind: ObjectKind,
    ) -> CalDavResult<Listing<CalendarObject>> {
        let transport = self.transport()?;
        let descriptors = query::query_objects(transport.as_ref(), collection_url).await;
        let mut partial = descriptors.is_partial();
        let mut objects = Vec::new();

        for descriptor in &descriptors {
            if descriptor.component_matches(kind) == Some(false) {
                continue;
            }

            let url = query::resolve_href(collection_url, &descriptor.href);
            match fetch_decoded(transport.as_ref(), &url, kind).await {
                Ok(Some(object)) => objects.push(object),
                Ok(None) => debug!(url = %url, kind = %kind, "Skipping object of another kind"),
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping object that failed to load");
                    partial = true;
                }
            }
        }

        info!(
            url = %collection_url,
            kind = %kind,
            count = objects.len(),
            partial,
            "Listed calendar objects"
        );
        Ok(if partial {
            Listing::partial(objects)
        } else {
            Listing::complete(objects)
        })
    }

    /// Fetches and decodes one object.
    ///
    /// # Errors
    ///
    /// `NotFound` on 404/410, `MalformedObject` if the body holds no event or
    /// todo, `Transport` for anything else.
    pub async fn get_object(&self, url: &str) -> CalDavResult<CalendarObject> {
        let transport = self.transport()?;
        let (body, version_token) = fetch(transport.as_ref(), url).await?;
        let object = ics::decode_any(&body)?;
        Ok(object.with_origin(ObjectOrigin::new(url, version_token)))
    }

    /// Fetches `{collection}/{uid}.ics` directly, without scanning.
    ///
    /// # Errors
    ///
    /// `NotFound` if the resource is missing or holds no component of `kind`.
    pub async fn get_object_by_uid(
        &self,
        collection_url: &str,
        uid: &str,
        kind: ObjectKind,
    ) -> CalDavResult<CalendarObject> {
        let transport = self.transport()?;
        let url = object_url(collection_url, uid);
        let (body, version_token) = fetch(transport.as_ref(), &url).await?;
        let object = ics::decode(&body, kind).map_err(|e| {
            CalDavError::not_found(format!("no {} with uid `{}`: {}", kind, uid, e.message()))
        })?;
        Ok(object.with_origin(ObjectOrigin::new(url, version_token)))
    }

    /// Writes a new object to `{collection}/{uid}.ics`.
    ///
    /// The write is unconditional: an existing object with the same uid is
    /// replaced. Returns the server's `Location` when it sends one, else the
    /// computed URL.
    ///
    /// # Errors
    ///
    /// `MalformedObject` if the uid is empty or contains `/`, `#` or `?`,
    /// which would put the object at a different URL.
    pub async fn create_object(
        &self,
        collection_url: &str,
        object: &CalendarObject,
    ) -> CalDavResult<String> {
        let transport = self.transport()?;
        let uid = object.uid();
        if uid.trim().is_empty() {
            return Err(CalDavError::malformed_object("object uid must not be empty"));
        }
        if uid.contains(['/', '#', '?']) {
            return Err(CalDavError::malformed_object(format!(
                "object uid `{}` must not contain '/', '#' or '?'",
                uid
            )));
        }

        let url = object_url(collection_url, object.uid());
        let response = transport
            .send(DavRequest::put(&url, ics::encode(object)))
            .await?
            .error_for_status("create")?;

        let location = response
            .location()
            .map(|location| query::resolve_href(&url, location))
            .unwrap_or(url);
        info!(url = %location, uid = %object.uid(), kind = %object.kind(), "Created object");
        Ok(location)
    }

    /// Replaces an object if its version token still matches.
    ///
    /// Returns the new version token when the server reports one.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` if the token is stale. The server copy is left
    /// untouched and nothing is retried.
    pub async fn update_object(
        &self,
        url: &str,
        object: &CalendarObject,
        expected_version: &str,
    ) -> CalDavResult<Option<String>> {
        let transport = self.transport()?;
        let request = DavRequest::put(url, ics::encode(object)).if_match(expected_version)?;
        let response = transport
            .send(request)
            .await?
            .error_for_status("update")?;

        info!(url = %url, uid = %object.uid(), "Updated object");
        Ok(response.version_token())
    }

    /// Deletes an object if its version token still matches.
    ///
    /// # Errors
    ///
    /// `PreconditionFailed` if the token is stale, `NotFound` if the object
    /// is already gone.
    pub async fn delete_object(&self, url: &str, expected_version: &str) -> CalDavResult<()> {
        let transport = self.transport()?;
        let request = DavRequest::delete(url).if_match(expected_version)?;
        transport
            .send(request)
            .await?
            .error_for_status("delete")?;

        info!(url = %url, "Deleted object");
        Ok(())
    }

    /// Scans a collection for the object with the given uid.
    ///
    /// Every object is fetched and decoded in turn (event first, then todo)
    /// until one matches, so the cost grows with the collection.
    ///
    /// # Errors
    ///
    /// `NotFound` once the scan is exhausted.
    pub async fn find_by_uid(&self, collection_url: &str, uid: &str) -> CalDavResult<ObjectRef> {
        let transport = self.transport()?;
        let descriptors = query::query_objects(transport.as_ref(), collection_url).await;

        for descriptor in &descriptors {
            if let Some(found) = probe_uid(transport.as_ref(), collection_url, descriptor, uid).await
            {
                debug!(url = %found.url, uid, "Found object by uid");
                return Ok(found);
            }
        }

        Err(CalDavError::not_found(format!(
            "no object with uid `{}` in {}",
            uid, collection_url
        )))
    }
}

impl std::fmt::Debug for CalDavSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavSession")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .finish()
    }
}

/// URL of the object resource for `uid` in a collection.
pub fn object_url(collection_url: &str, uid: &str) -> String {
    format!(
        "{}/{}.{}",
        collection_url.trim_end_matches('/'),
        uid,
        ics::OBJECT_EXTENSION
    )
}

async fn fetch(transport: &dyn Transport, url: &str) -> CalDavResult<(String, Option<String>)> {
    let response = transport
        .send(DavRequest::get(url))
        .await?
        .error_for_status("fetch")?;
    let version_token = response.version_token();
    Ok((response.body, version_token))
}

/// Fetches and decodes one object of `kind`.
///
/// `Ok(None)` means the body decoded fine as the other kind.
async fn fetch_decoded(
    transport: &dyn Transport,
    url: &str,
    kind: ObjectKind,
) -> CalDavResult<Option<CalendarObject>> {
    let (body, version_token) = fetch(transport, url).await?;
    match ics::decode(&body, kind) {
        Ok(object) => Ok(Some(object.with_origin(ObjectOrigin::new(url, version_token)))),
        Err(e) if e.code() == CalDavErrorCode::MalformedObject => match ics::decode_any(&body) {
            Ok(_) => Ok(None),
            Err(_) => Err(e),
        },
        Err(e) => Err(e),
    }
}

async fn probe_uid(
    transport: &dyn Transport,
    collection_url: &str,
    descriptor: &ObjectDescriptor,
    uid: &str,
) -> Option<ObjectRef> {
    let url = query::resolve_href(collection_url, &descriptor.href);
    let (body, version_token) = match fetch(transport, &url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(url = %url, error = %e, "Skipping object during uid scan");
            return None;
        }
    };

    match ics::decode_any(&body) {
        Ok(object) if object.uid() == uid => Some(ObjectRef { url, version_token }),
        Ok(_) => None,
        Err(e) => {
            debug!(url = %url, error = %e, "Skipping undecodable object during uid scan");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BoxFuture, DavResponse};
    use chrono::{TimeZone, Utc};
    use davcal_core::{CalendarTime, Event, Todo, TodoStatus};
    use reqwest::header::{ETAG, IF_MATCH, LOCATION};
    use reqwest::{Method, StatusCode};
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://cal.example.com/dav/u1/";
    const COLLECTION: &str = "https://cal.example.com/dav/u1/primary/";

    const CALENDARS_XML: &str = r#"<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
<D:response><D:href>/dav/u1/</D:href><D:propstat><D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>
<D:response><D:href>/dav/u1/primary/</D:href><D:propstat><D:prop><D:resourcetype><D:collection/><C:calendar/></D:resourcetype><D:displayname>Primary</D:displayname></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>
<D:response><D:href>/dav/u1/work/</D:href><D:propstat><D:prop><D:resourcetype><D:collection/><C:calendar/></D:resourcetype><D:displayname>Work</D:displayname></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>
</D:multistatus>"#;

    #[derive(Default)]
    struct Store {
        objects: BTreeMap<String, (String, u32)>,
        failing: HashSet<String>,
        version: u32,
    }

    /// In-memory CalDAV server with ETag/If-Match semantics.
    #[derive(Default)]
    struct FakeTransport {
        store: StdMutex<Store>,
        propfinds: AtomicUsize,
        requests: StdMutex<Vec<DavRequest>>,
    }

    impl FakeTransport {
        fn insert_raw(&self, url: &str, body: &str) {
            let mut store = self.store.lock().unwrap();
            store.version += 1;
            let version = store.version;
            store
                .objects
                .insert(url.to_string(), (body.to_string(), version));
        }

        fn insert(&self, object: CalendarObject) -> String {
            let url = object_url(COLLECTION, object.uid());
            self.insert_raw(&url, &ics::encode(&object));
            url
        }

        fn fail_fetch(&self, url: &str) {
            self.store.lock().unwrap().failing.insert(url.to_string());
        }

        fn body(&self, url: &str) -> Option<String> {
            self.store
                .lock()
                .unwrap()
                .objects
                .get(url)
                .map(|(body, _)| body.clone())
        }

        fn etag(version: u32) -> String {
            format!("\"v{}\"", version)
        }

        fn listing_xml(&self, collection: &str) -> String {
            let store = self.store.lock().unwrap();
            let path = url::Url::parse(collection).unwrap().path().to_string();
            let mut xml = String::from(r#"<D:multistatus xmlns:D="DAV:">"#);
            xml.push_str(&format!(
                "<D:response><D:href>{}</D:href><D:propstat><D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>",
                path
            ));
            for (url, (_, version)) in &store.objects {
                let href = url::Url::parse(url).unwrap().path().to_string();
                xml.push_str(&format!(
                    "<D:response><D:href>{}</D:href><D:propstat><D:prop><D:resourcetype/><D:getcontenttype>text/calendar; charset=utf-8</D:getcontenttype><D:getetag>{}</D:getetag></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>",
                    href,
                    Self::etag(*version)
                ));
            }
            xml.push_str("</D:multistatus>");
            xml
        }

        fn handle(&self, request: &DavRequest) -> DavResponse {
            let if_match = request.header(IF_MATCH).map(str::to_string);
            let method = request.method.as_str();

            if method == "PROPFIND" {
                self.propfinds.fetch_add(1, Ordering::SeqCst);
                let body = if request.url == BASE {
                    CALENDARS_XML.to_string()
                } else {
                    self.listing_xml(&request.url)
                };
                return DavResponse::new(StatusCode::MULTI_STATUS, body);
            }

            let mut store = self.store.lock().unwrap();
            let current = store.objects.get(&request.url).cloned();
            let precondition_ok = match (&if_match, &current) {
                (None, _) => true,
                (Some(expected), Some((_, version))) => *expected == Self::etag(*version),
                (Some(_), None) => false,
            };

            match request.method.clone() {
                Method::GET => {
                    if store.failing.contains(&request.url) {
                        return DavResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "broken");
                    }
                    match current {
                        Some((body, version)) => DavResponse::new(StatusCode::OK, body)
                            .with_header(ETAG, &Self::etag(version)),
                        None => DavResponse::new(StatusCode::NOT_FOUND, ""),
                    }
                }
                Method::PUT => {
                    if !precondition_ok {
                        return DavResponse::new(StatusCode::PRECONDITION_FAILED, "");
                    }
                    store.version += 1;
                    let version = store.version;
                    let created = current.is_none();
                    store.objects.insert(
                        request.url.clone(),
                        (request.body.clone().unwrap_or_default(), version),
                    );
                    let status = if created {
                        StatusCode::CREATED
                    } else {
                        StatusCode::NO_CONTENT
                    };
                    DavResponse::new(status, "").with_header(ETAG, &Self::etag(version))
                }
                Method::DELETE => {
                    if current.is_none() {
                        return DavResponse::new(StatusCode::NOT_FOUND, "");
                    }
                    if !precondition_ok {
                        return DavResponse::new(StatusCode::PRECONDITION_FAILED, "");
                    }
                    store.objects.remove(&request.url);
                    DavResponse::new(StatusCode::NO_CONTENT, "")
                }
                _ => DavResponse::new(StatusCode::METHOD_NOT_ALLOWED, ""),
            }
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
            let response = self.handle(&request);
            self.requests.lock().unwrap().push(request);
            Box::pin(async move { Ok(response) })
        }
    }

    /// A transport whose every request fails at the connection level.
    struct DownTransport;

    impl Transport for DownTransport {
        fn send(&self, _request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
            Box::pin(async { Err(CalDavError::transport("connection refused")) })
        }
    }

    fn config() -> CalDavConfig {
        CalDavConfig::new(BASE)
            .unwrap()
            .with_credentials("user", "secret")
    }

    fn open_session() -> (CalDavSession, Arc<FakeTransport>) {
        let fake = Arc::new(FakeTransport::default());
        let mut session = CalDavSession::new(config());
        session.open_with(fake.clone()).unwrap();
        (session, fake)
    }

    #[tokio::test]
    async fn operations_require_open_session() {
        let session = CalDavSession::new(config());
        assert!(!session.is_active());

        let err = session.list_calendars().await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
        let err = session
            .list_objects(COLLECTION, ObjectKind::Event)
            .await
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
        let err = session.get_object("https://x/y.ics").await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
        let err = session
            .delete_object("https://x/y.ics", "v1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
        let err = session.find_by_uid(COLLECTION, "a").await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_deactivates() {
        let (mut session, _fake) = open_session();
        assert!(session.is_active());

        session.close();
        session.close();
        assert!(!session.is_active());

        let err = session.list_calendars().await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotInitialized);
    }

    #[test]
    fn open_fails_fast_without_credentials() {
        let mut session = CalDavSession::new(CalDavConfig::new(BASE).unwrap());
        let err = session.open().unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::Configuration);
        assert!(!session.is_active());

        let err = session
            .open_with(Arc::new(FakeTransport::default()))
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::Configuration);
    }

    #[test]
    fn connect_opens_http_session() {
        let session = CalDavSession::connect(config()).unwrap();
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn list_calendars_is_cached() {
        let (session, fake) = open_session();

        let first = session.list_calendars().await.unwrap();
        let second = session.list_calendars().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(fake.propfinds.load(Ordering::SeqCst), 1);
        assert_eq!(first.items[0].url, "https://cal.example.com/dav/u1/primary/");
    }

    #[tokio::test]
    async fn calendar_lookup() {
        let (session, _fake) = open_session();

        assert_eq!(session.find_calendar("Work").await.unwrap().name, "work");
        assert_eq!(
            session.find_calendar("primary").await.unwrap().display_name,
            "Primary"
        );
        let err = session.find_calendar("Nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains("Primary, Work"));

        assert_eq!(session.primary_calendar().await.unwrap().name, "primary");
    }

    #[tokio::test]
    async fn discovery_fails_open_on_transport_error() {
        let mut session = CalDavSession::new(config());
        session.open_with(Arc::new(DownTransport)).unwrap();

        let listing = session.list_calendars().await.unwrap();
        assert!(listing.is_empty());
        assert!(listing.is_partial());

        let err = session.primary_calendar().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_objects_filters_kind_and_attaches_origin() {
        let (session, fake) = open_session();
        let event_url = fake.insert(Event::with_uid("e1", "Standup").into());
        fake.insert(Todo::with_uid("t1", "Chores").into());

        let events = session
            .list_objects(COLLECTION, ObjectKind::Event)
            .await
            .unwrap();
        assert!(!events.is_partial());
        assert_eq!(events.len(), 1);
        let event = &events.items[0];
        assert_eq!(event.uid(), "e1");
        assert_eq!(event.url(), Some(event_url.as_str()));
        assert_eq!(event.version_token(), Some("v1"));

        let todos = session
            .list_objects(COLLECTION, ObjectKind::Todo)
            .await
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos.items[0].uid(), "t1");
    }

    #[tokio::test]
    async fn list_objects_isolates_failures() {
        let (session, fake) = open_session();
        fake.insert(Event::with_uid("a", "A").into());
        fake.insert(Event::with_uid("b", "B").into());
        let broken = object_url(COLLECTION, "c");
        fake.insert_raw(&broken, "BEGIN:VCALENDAR\r\nthis is not ical");

        let listing = session
            .list_objects(COLLECTION, ObjectKind::Event)
            .await
            .unwrap();
        let uids: Vec<&str> = listing.iter().map(CalendarObject::uid).collect();
        assert_eq!(uids, vec!["a", "b"]);
        assert!(listing.is_partial());
    }

    #[tokio::test]
    async fn list_objects_skips_failed_fetch() {
        let (session, fake) = open_session();
        fake.insert(Event::with_uid("a", "A").into());
        let url = fake.insert(Event::with_uid("b", "B").into());
        fake.insert(Event::with_uid("c", "C").into());
        fake.fail_fetch(&url);

        let listing = session
            .list_objects(COLLECTION, ObjectKind::Event)
            .await
            .unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.is_partial());
    }

    #[tokio::test]
    async fn get_object_maps_not_found() {
        let (session, _fake) = open_session();
        let err = session
            .get_object(&object_url(COLLECTION, "missing"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotFound);
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn get_object_surfaces_transport_errors() {
        let mut session = CalDavSession::new(config());
        session.open_with(Arc::new(DownTransport)).unwrap();
        let err = session.get_object("https://x/y.ics").await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::Transport);
    }

    #[tokio::test]
    async fn get_object_by_uid_checks_kind() {
        let (session, fake) = open_session();
        fake.insert(Todo::with_uid("t1", "Chores").into());

        let todo = session
            .get_object_by_uid(COLLECTION, "t1", ObjectKind::Todo)
            .await
            .unwrap();
        assert_eq!(todo.summary(), "Chores");

        let err = session
            .get_object_by_uid(COLLECTION, "t1", ObjectKind::Event)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = session
            .get_object_by_uid(COLLECTION, "nope", ObjectKind::Todo)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_rejects_empty_uid() {
        let (session, _fake) = open_session();
        let err = session
            .create_object(COLLECTION, &Event::with_uid("", "x").into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::MalformedObject);
    }

    #[tokio::test]
    async fn create_rejects_uid_that_changes_the_url() {
        let (session, fake) = open_session();
        for uid in ["a#b", "a?b", "../other/x"] {
            let err = session
                .create_object(COLLECTION, &Event::with_uid(uid, "x").into())
                .await
                .unwrap_err();
            assert_eq!(err.code(), CalDavErrorCode::MalformedObject);
        }
        assert!(fake.requests.lock().unwrap().is_empty());

        let url = session
            .create_object(COLLECTION, &Event::with_uid("a.b-c_d@host", "x").into())
            .await
            .unwrap();
        assert_eq!(url, "https://cal.example.com/dav/u1/primary/a.b-c_d@host.ics");
    }

    #[tokio::test]
    async fn create_is_unconditional() {
        let (session, fake) = open_session();
        session
            .create_object(COLLECTION, &Event::with_uid("dup", "First").into())
            .await
            .unwrap();
        let url = session
            .create_object(COLLECTION, &Event::with_uid("dup", "Second").into())
            .await
            .unwrap();

        assert_eq!(url, "https://cal.example.com/dav/u1/primary/dup.ics");
        assert!(fake.body(&url).unwrap().contains("SUMMARY:Second"));
        let requests = fake.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.header(IF_MATCH).is_none()));
    }

    #[tokio::test]
    async fn create_prefers_location_header() {
        struct Located;
        impl Transport for Located {
            fn send(&self, _request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
                Box::pin(async {
                    Ok(DavResponse::new(StatusCode::CREATED, "")
                        .with_header(LOCATION, "/dav/u1/primary/server-name.ics"))
                })
            }
        }

        let mut session = CalDavSession::new(config());
        session.open_with(Arc::new(Located)).unwrap();
        let url = session
            .create_object(COLLECTION, &Event::with_uid("e9", "x").into())
            .await
            .unwrap();
        assert_eq!(url, "https://cal.example.com/dav/u1/primary/server-name.ics");
    }

    #[tokio::test]
    async fn stale_update_fails_and_leaves_resource() {
        let (session, fake) = open_session();
        let url = fake.insert(Event::with_uid("e1", "Original").into());

        let err = session
            .update_object(&url, &Event::with_uid("e1", "Changed").into(), "stale")
            .await
            .unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::PreconditionFailed);
        assert!(fake.body(&url).unwrap().contains("SUMMARY:Original"));
    }

    #[tokio::test]
    async fn delete_honours_precondition() {
        let (session, fake) = open_session();
        let url = fake.insert(Event::with_uid("e1", "Doomed").into());

        let err = session.delete_object(&url, "v999").await.unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(fake.body(&url).is_some());

        session.delete_object(&url, "v1").await.unwrap();
        assert!(fake.body(&url).is_none());

        let err = session.delete_object(&url, "v1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn find_by_uid_scans_collection() {
        let (session, fake) = open_session();
        fake.insert(Event::with_uid("a", "A").into());
        let b_url = fake.insert(Todo::with_uid("b", "B").into());
        fake.insert(Event::with_uid("c", "C").into());

        let found = session.find_by_uid(COLLECTION, "b").await.unwrap();
        assert_eq!(found.url, b_url);
        assert_eq!(found.version_token.as_deref(), Some("v2"));

        let err = session.find_by_uid(COLLECTION, "z").await.unwrap_err();
        assert_eq!(err.code(), CalDavErrorCode::NotFound);
    }

    #[tokio::test]
    async fn create_get_update_roundtrip() {
        let (session, _fake) = open_session();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 9, 15, 0).unwrap();
        let event = Event::with_uid("e1", "Standup")
            .with_start(start)
            .with_end(end);

        let url = session
            .create_object(COLLECTION, &event.clone().into())
            .await
            .unwrap();

        let fetched = session.get_object(&url).await.unwrap();
        let fetched_event = fetched.as_event().unwrap();
        assert_eq!(fetched_event.uid, "e1");
        assert_eq!(fetched_event.summary, "Standup");
        assert_eq!(fetched_event.start, Some(CalendarTime::from_utc(start)));
        assert_eq!(fetched_event.end, Some(CalendarTime::from_utc(end)));
        let token = fetched.version_token().unwrap().to_string();
        assert!(!token.is_empty());

        let mut moved = fetched_event.clone();
        moved.summary = "Standup (moved)".to_string();
        let moved: CalendarObject = moved.into();

        let err = session
            .update_object(&url, &moved, "wrong-token")
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());

        let new_token = session.update_object(&url, &moved, &token).await.unwrap();
        assert!(new_token.is_some());

        let refetched = session.get_object(&url).await.unwrap();
        assert_eq!(refetched.summary(), "Standup (moved)");
        assert_ne!(refetched.version_token(), Some(token.as_str()));
        assert_eq!(refetched.version_token(), new_token.as_deref());
    }

    #[tokio::test]
    async fn todo_update_roundtrip() {
        let (session, _fake) = open_session();
        let url = session
            .create_object(COLLECTION, &Todo::with_uid("t1", "File taxes").into())
            .await
            .unwrap();

        let fetched = session.get_object(&url).await.unwrap();
        let token = fetched.version_token().unwrap().to_string();
        let done = fetched
            .as_todo()
            .unwrap()
            .clone()
            .with_status(TodoStatus::Completed);
        session
            .update_object(&url, &done.into(), &token)
            .await
            .unwrap();

        let refetched = session.get_object(&url).await.unwrap();
        assert_eq!(refetched.as_todo().unwrap().status, TodoStatus::Completed);
    }
}
