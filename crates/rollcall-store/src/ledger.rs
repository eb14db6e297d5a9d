//! Attendance ledger — the per-identity, per-day state machine.
//!
//! Every transition runs inside a single transaction on the shared
//! connection, so two concurrent recognitions of the same person cannot
//! both observe "no record" for the day. `UNIQUE (identity_id, date)`
//! backs the one-record-per-day invariant at the schema level.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Db, StoreError};

/// Daily attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("invalid status: {0}")]
pub struct InvalidStatus(String);

impl std::str::FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Status::Present),
            "absent" => Ok(Status::Absent),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// One identity's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub identity_id: String,
    pub date: NaiveDate,
    pub status: Status,
    pub time_in: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
}

/// Present/absent tallies for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub total: u32,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    /// The day is already Present; re-marking is a no-op failure so that
    /// repeated scans cannot churn `time_in`. Carries the existing record
    /// fields so the caller can decide to accept it.
    #[error("attendance already marked as {status}")]
    AlreadyMarked {
        status: Status,
        time_in: Option<NaiveTime>,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AttendanceLedger {
    db: Db,
}

impl AttendanceLedger {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Recognition-driven transition: NoRecord→Present or Absent→Present.
    ///
    /// A recognized face always overrides an administrative absent mark,
    /// never the reverse. A day already Present is left untouched and the
    /// existing record is reported back as [`LedgerError::AlreadyMarked`].
    pub fn mark_present(
        &self,
        identity_id: &str,
        now: NaiveDateTime,
    ) -> Result<AttendanceRecord, LedgerError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let date = now.date();

        let record = match query_record(&tx, identity_id, date)? {
            Some(existing) if existing.status == Status::Present => {
                return Err(LedgerError::AlreadyMarked {
                    status: existing.status,
                    time_in: existing.time_in,
                });
            }
            Some(mut existing) => {
                // Marked absent earlier (admin sweep): override with a
                // fresh time_in.
                tx.execute(
                    "UPDATE attendance SET status = ?1, time_in = ?2 WHERE id = ?3",
                    params![
                        Status::Present.as_str(),
                        now.time().to_string(),
                        existing.id.to_string()
                    ],
                )?;
                existing.status = Status::Present;
                existing.time_in = Some(now.time());
                existing
            }
            None => {
                let record = AttendanceRecord {
                    id: Uuid::new_v4(),
                    identity_id: identity_id.to_string(),
                    date,
                    status: Status::Present,
                    time_in: Some(now.time()),
                    created_at: Utc::now(),
                };
                insert_record(&tx, &record)?;
                record
            }
        };

        tx.commit()?;
        tracing::info!(identity = %identity_id, date = %date, "marked present");
        Ok(record)
    }

    /// End-of-day sweep: every known identity without a record for `date`
    /// gets an Absent record; existing records are left untouched.
    ///
    /// The existing-record snapshot and the inserts run in one transaction,
    /// and each insert is itself insert-if-absent, so a record created
    /// mid-sweep is never overwritten. Returns the number created.
    pub fn sweep_absent(
        &self,
        date: NaiveDate,
        known_ids: &[String],
    ) -> Result<usize, LedgerError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT identity_id FROM attendance WHERE date = ?1")?;
            let rows = stmt.query_map(params![date.to_string()], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut created = 0usize;
        for identity_id in known_ids {
            if existing.contains(identity_id) {
                continue;
            }
            created += tx.execute(
                "INSERT OR IGNORE INTO attendance (id, identity_id, date, status, time_in, created_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    identity_id,
                    date.to_string(),
                    Status::Absent.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        tracing::info!(date = %date, created, "absence sweep complete");
        Ok(created)
    }

    /// Administrative overwrite, used for manual correction. Applies
    /// unconditionally; Absent always clears `time_in`.
    pub fn set_status(
        &self,
        identity_id: &str,
        date: NaiveDate,
        status: Status,
        time_in: Option<NaiveTime>,
    ) -> Result<AttendanceRecord, LedgerError> {
        let time_in = match status {
            Status::Present => time_in,
            Status::Absent => None,
        };

        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let record = match query_record(&tx, identity_id, date)? {
            Some(mut existing) => {
                tx.execute(
                    "UPDATE attendance SET status = ?1, time_in = ?2 WHERE id = ?3",
                    params![
                        status.as_str(),
                        time_in.map(|t| t.to_string()),
                        existing.id.to_string()
                    ],
                )?;
                existing.status = status;
                existing.time_in = time_in;
                existing
            }
            None => {
                let record = AttendanceRecord {
                    id: Uuid::new_v4(),
                    identity_id: identity_id.to_string(),
                    date,
                    status,
                    time_in,
                    created_at: Utc::now(),
                };
                insert_record(&tx, &record)?;
                record
            }
        };

        tx.commit()?;
        tracing::info!(identity = %identity_id, date = %date, status = %status, "status set administratively");
        Ok(record)
    }

    pub fn record_for(
        &self,
        identity_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        let conn = self.db.lock();
        query_record(&conn, identity_id, date)
    }

    /// All records for a date, ascending by identity id.
    pub fn records_on(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, identity_id, date, status, time_in, created_at
             FROM attendance WHERE date = ?1 ORDER BY identity_id",
        )?;
        let rows = stmt
            .query_map(params![date.to_string()], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_record).collect()
    }

    /// One identity's full history, ascending by date.
    pub fn records_for(&self, identity_id: &str) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, identity_id, date, status, time_in, created_at
             FROM attendance WHERE identity_id = ?1 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![identity_id], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_record).collect()
    }

    pub fn summary_for(&self, identity_id: &str) -> Result<AttendanceSummary, LedgerError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM attendance WHERE identity_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![identity_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        let mut summary = AttendanceSummary {
            present: 0,
            absent: 0,
            total: 0,
        };
        for row in rows {
            let (status, count) = row?;
            match status.as_str() {
                "present" => summary.present = count,
                "absent" => summary.absent = count,
                _ => {}
            }
            summary.total += count;
        }
        Ok(summary)
    }
}

fn query_record(
    conn: &Connection,
    identity_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, LedgerError> {
    let row = conn
        .query_row(
            "SELECT id, identity_id, date, status, time_in, created_at
             FROM attendance WHERE identity_id = ?1 AND date = ?2",
            params![identity_id, date.to_string()],
            raw_row,
        )
        .optional()?;
    row.map(decode_record).transpose()
}

fn insert_record(conn: &Connection, record: &AttendanceRecord) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT INTO attendance (id, identity_id, date, status, time_in, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.identity_id,
            record.date.to_string(),
            record.status.as_str(),
            record.time_in.map(|t| t.to_string()),
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

type RawAttendanceRow = (String, String, String, String, Option<String>, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAttendanceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_record(raw: RawAttendanceRow) -> Result<AttendanceRecord, LedgerError> {
    let (id, identity_id, date, status, time_in, created_at) = raw;
    let corrupt = |reason: String| StoreError::Corrupt {
        identity_id: identity_id.clone(),
        reason,
    };

    let id = Uuid::parse_str(&id).map_err(|e| corrupt(format!("bad record id: {e}")))?;
    let date: NaiveDate = date
        .parse()
        .map_err(|e| corrupt(format!("bad date: {e}")))?;
    let status: Status = status
        .parse()
        .map_err(|e| corrupt(format!("{e}")))?;
    let time_in = time_in
        .map(|t| t.parse::<NaiveTime>())
        .transpose()
        .map_err(|e| corrupt(format!("bad time_in: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| corrupt(format!("bad created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(AttendanceRecord {
        id,
        identity_id,
        date,
        status,
        time_in,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn ledger() -> AttendanceLedger {
        AttendanceLedger::new(open_in_memory().unwrap())
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        format!("{date}T{time}").parse().unwrap()
    }

    #[test]
    fn test_first_mark_creates_present_record() {
        let ledger = ledger();
        let record = ledger
            .mark_present("emp-01", at("2026-08-06", "08:45:10"))
            .unwrap();
        assert_eq!(record.status, Status::Present);
        assert_eq!(record.date, day("2026-08-06"));
        assert_eq!(record.time_in, Some("08:45:10".parse().unwrap()));
    }

    #[test]
    fn test_second_mark_same_day_is_already_marked() {
        let ledger = ledger();
        let first = ledger
            .mark_present("emp-01", at("2026-08-06", "08:45:10"))
            .unwrap();

        let err = ledger
            .mark_present("emp-01", at("2026-08-06", "12:01:00"))
            .unwrap_err();
        match err {
            LedgerError::AlreadyMarked { status, time_in } => {
                assert_eq!(status, Status::Present);
                assert_eq!(time_in, first.time_in);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The stored record is unchanged, including time_in.
        let stored = ledger.record_for("emp-01", day("2026-08-06")).unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[test]
    fn test_mark_next_day_creates_new_record() {
        let ledger = ledger();
        ledger.mark_present("emp-01", at("2026-08-06", "08:00:00")).unwrap();
        ledger.mark_present("emp-01", at("2026-08-07", "08:30:00")).unwrap();
        assert_eq!(ledger.records_for("emp-01").unwrap().len(), 2);
    }

    #[test]
    fn test_recognition_overrides_absent() {
        let ledger = ledger();
        ledger
            .set_status("emp-01", day("2026-08-06"), Status::Absent, None)
            .unwrap();

        let record = ledger
            .mark_present("emp-01", at("2026-08-06", "10:15:00"))
            .unwrap();
        assert_eq!(record.status, Status::Present);
        assert_eq!(record.time_in, Some("10:15:00".parse().unwrap()));

        // Still exactly one record for the day.
        assert_eq!(ledger.records_on(day("2026-08-06")).unwrap().len(), 1);
    }

    #[test]
    fn test_sweep_fills_only_missing_records() {
        let ledger = ledger();
        let date = day("2026-08-06");
        let ids: Vec<String> = (1..=10).map(|i| format!("emp-{i:02}")).collect();

        // 6 of 10 already have a record (any status).
        for id in &ids[..4] {
            ledger.mark_present(id, at("2026-08-06", "08:00:00")).unwrap();
        }
        for id in &ids[4..6] {
            ledger.set_status(id, date, Status::Absent, None).unwrap();
        }

        let created = ledger.sweep_absent(date, &ids).unwrap();
        assert_eq!(created, 4);

        let records = ledger.records_on(date).unwrap();
        assert_eq!(records.len(), 10);
        let absent = records.iter().filter(|r| r.status == Status::Absent).count();
        assert_eq!(absent, 6);
        // Present records untouched by the sweep.
        for record in records.iter().filter(|r| r.status == Status::Present) {
            assert_eq!(record.time_in, Some("08:00:00".parse().unwrap()));
        }
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let ledger = ledger();
        let date = day("2026-08-06");
        let ids = vec!["emp-01".to_string(), "emp-02".to_string()];
        assert_eq!(ledger.sweep_absent(date, &ids).unwrap(), 2);
        assert_eq!(ledger.sweep_absent(date, &ids).unwrap(), 0);
    }

    #[test]
    fn test_set_status_absent_clears_time_in() {
        let ledger = ledger();
        let date = day("2026-08-06");
        ledger.mark_present("emp-01", at("2026-08-06", "08:00:00")).unwrap();

        // Supplied time_in is ignored for an absent mark.
        let record = ledger
            .set_status("emp-01", date, Status::Absent, Some("09:00:00".parse().unwrap()))
            .unwrap();
        assert_eq!(record.status, Status::Absent);
        assert_eq!(record.time_in, None);
    }

    #[test]
    fn test_set_status_present_with_explicit_time() {
        let ledger = ledger();
        let date = day("2026-08-06");
        let record = ledger
            .set_status("emp-01", date, Status::Present, Some("07:55:00".parse().unwrap()))
            .unwrap();
        assert_eq!(record.status, Status::Present);
        assert_eq!(record.time_in, Some("07:55:00".parse().unwrap()));

        // Overwrite path keeps a single record per day.
        ledger.set_status("emp-01", date, Status::Present, None).unwrap();
        assert_eq!(ledger.records_on(date).unwrap().len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let ledger = ledger();
        ledger.mark_present("emp-01", at("2026-08-04", "08:00:00")).unwrap();
        ledger.mark_present("emp-01", at("2026-08-05", "08:00:00")).unwrap();
        ledger
            .set_status("emp-01", day("2026-08-06"), Status::Absent, None)
            .unwrap();

        let summary = ledger.summary_for("emp-01").unwrap();
        assert_eq!(summary.present, 2);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn test_records_round_trip_time() {
        let ledger = ledger();
        let record = ledger
            .mark_present("emp-01", at("2026-08-06", "08:45:10"))
            .unwrap();
        let stored = ledger.record_for("emp-01", day("2026-08-06")).unwrap().unwrap();
        assert_eq!(stored.id, record.id);
        assert_eq!(stored.time_in, record.time_in);
        assert_eq!(stored.created_at, record.created_at);
    }
}
