//! This crate implements an iCalendar feed of upcoming German cinema release dates.
//! It also implements a CLI to just get a single iCalendar file.
//!
//! The dates are read from <https://www.insidekino.com/DStarts/DStartplan.htm>.

pub use ical;

pub mod startplan_client;
