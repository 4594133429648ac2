//! CalDAV synchronization and calendar object mapping.
//!
//! This crate provides the pieces a calendar front end needs to talk to a
//! CalDAV server:
//!
//! - [`ics`] - encode/decode single-component iCalendar objects
//! - [`query`] - PROPFIND collection and object listings
//! - [`CalDavSession`] - owns the transport; discovery, listing, fetch and
//!   conditional writes
//! - [`Transport`] - the seam between the session and the network, with
//!   [`HttpTransport`] as the reqwest implementation
//!
//! # Architecture
//!
//! ```text
//!  CalDavSession ──► query (PROPFIND + multistatus) ──► Transport
//!        │                                                 ▲
//!        ├──► GET each object ─────────────────────────────┤
//!        │         │                                       │
//!        │         ▼                                       │
//!        │     ics::decode                                 │
//!        │                                                 │
//!        └──► ics::encode ──► PUT / DELETE + If-Match ─────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use davcal_caldav::{CalDavConfig, CalDavSession};
//! use davcal_core::ObjectKind;
//!
//! let config = CalDavConfig::new("https://calendar.example.com/dav/user/")?
//!     .with_credentials("user", "password");
//! let session = CalDavSession::connect(config)?;
//!
//! let calendar = session.primary_calendar().await?;
//! let events = session.list_objects(&calendar.url, ObjectKind::Event).await?;
//! ```

mod client;
mod config;
mod error;
pub mod ics;
pub mod query;
mod session;
pub mod transport;
pub mod xml;

pub use client::{HttpTransport, basic_auth};
pub use config::CalDavConfig;
pub use error::{CalDavError, CalDavErrorCode, CalDavResult};
pub use query::{CalendarDescriptor, Listing, ObjectDescriptor};
pub use session::{CalDavSession, ObjectRef, object_url};
pub use transport::{BoxFuture, DavRequest, DavResponse, Transport};
