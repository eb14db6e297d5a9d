//! rollcalld — attendance daemon library.
//!
//! Hosts the [`service::AttendanceService`] facade that transports (and the
//! operator CLI) drive, plus daemon configuration.

pub mod config;
pub mod service;

pub use config::Config;
pub use service::{AttendanceService, ServiceError};
