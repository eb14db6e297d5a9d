//! rollcall-store — durable state for the attendance core.
//!
//! Two stores share one SQLite database: the template store (write-through
//! persistence behind the in-memory gallery) and the attendance ledger
//! (the per-identity, per-day state machine).

mod db;
pub mod ledger;
pub mod templates;

pub use db::{open_db, open_in_memory, Db, StoreError};
pub use ledger::{
    AttendanceLedger, AttendanceRecord, AttendanceSummary, LedgerError, Status,
};
pub use templates::TemplateStore;
