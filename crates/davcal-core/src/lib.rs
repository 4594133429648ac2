//! Core types: calendar objects, calendar times, tracing setup

pub mod object;
pub mod time;
pub mod tracing;

pub use object::{
    CalendarObject, Event, ObjectKind, ObjectOrigin, Priority, PriorityError, Todo, TodoStatus,
};
pub use time::CalendarTime;
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing, parse_level};
