//! Durable template store.
//!
//! Vectors are stored as little-endian f32 blobs so the full precision of
//! the embedding round-trips exactly. Anything human-readable is derived
//! output for inspection and is never read back.

use chrono::{DateTime, Utc};
use rollcall_core::{Embedding, Template};
use rusqlite::{params, OptionalExtension};

use crate::db::{Db, StoreError};

pub struct TemplateStore {
    db: Db,
}

impl TemplateStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert or replace the stored template for an identity.
    pub fn upsert(&self, template: &Template) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO templates (identity_id, vector, sample_count, model_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (identity_id) DO UPDATE SET
                 vector = excluded.vector,
                 sample_count = excluded.sample_count,
                 model_version = excluded.model_version,
                 created_at = excluded.created_at",
            params![
                template.identity_id,
                encode_vector(&template.vector.values),
                template.sample_count,
                template.vector.model_version,
                template.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Remove an identity's template. Removing an absent identity is a
    /// no-op; returns whether a row was deleted.
    pub fn remove(&self, identity_id: &str) -> Result<bool, StoreError> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM templates WHERE identity_id = ?1",
            params![identity_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn get(&self, identity_id: &str) -> Result<Option<Template>, StoreError> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                "SELECT identity_id, vector, sample_count, model_version, created_at
                 FROM templates WHERE identity_id = ?1",
                params![identity_id],
                raw_row,
            )
            .optional()?;
        row.map(decode_template).transpose()
    }

    /// Load every stored template, ascending by identity id.
    pub fn load_all(&self) -> Result<Vec<Template>, StoreError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT identity_id, vector, sample_count, model_version, created_at
             FROM templates ORDER BY identity_id",
        )?;
        let rows = stmt
            .query_map([], raw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_template).collect()
    }
}

type RawTemplateRow = (String, Vec<u8>, u32, Option<String>, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTemplateRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode_template(raw: RawTemplateRow) -> Result<Template, StoreError> {
    let (identity_id, blob, sample_count, model_version, created_at) = raw;
    let values = decode_vector(&identity_id, &blob)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Corrupt {
            identity_id: identity_id.clone(),
            reason: format!("bad created_at: {e}"),
        })?
        .with_timezone(&Utc);
    Ok(Template {
        identity_id,
        vector: Embedding {
            values,
            model_version,
        },
        sample_count,
        created_at,
    })
}

fn encode_vector(values: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

fn decode_vector(identity_id: &str, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            identity_id: identity_id.to_string(),
            reason: format!("vector blob length {} is not a multiple of 4", blob.len()),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn template(id: &str, values: Vec<f32>) -> Template {
        Template {
            identity_id: id.to_string(),
            vector: Embedding {
                values,
                model_version: Some("dlib-128".into()),
            },
            sample_count: 7,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let store = TemplateStore::new(open_in_memory().unwrap());
        // Values chosen to expose any lossy text formatting.
        let values = vec![0.1f32, -1e-38, f32::MIN_POSITIVE, 0.30000001, -123.456];
        store.upsert(&template("emp-01", values.clone())).unwrap();

        let loaded = store.get("emp-01").unwrap().unwrap();
        for (stored, original) in loaded.vector.values.iter().zip(values.iter()) {
            assert_eq!(stored.to_bits(), original.to_bits());
        }
        assert_eq!(loaded.sample_count, 7);
        assert_eq!(loaded.vector.model_version.as_deref(), Some("dlib-128"));
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let store = TemplateStore::new(open_in_memory().unwrap());
        store.upsert(&template("emp-01", vec![1.0])).unwrap();
        store.upsert(&template("emp-01", vec![2.0, 3.0])).unwrap();

        let loaded = store.get("emp-01").unwrap().unwrap();
        assert_eq!(loaded.vector.values, vec![2.0, 3.0]);
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = TemplateStore::new(open_in_memory().unwrap());
        store.upsert(&template("emp-01", vec![1.0])).unwrap();
        assert!(store.remove("emp-01").unwrap());
        assert!(!store.remove("emp-01").unwrap());
        assert!(store.get("emp-01").unwrap().is_none());
    }

    #[test]
    fn test_load_all_ascending() {
        let store = TemplateStore::new(open_in_memory().unwrap());
        for id in ["zed", "amy", "mia"] {
            store.upsert(&template(id, vec![1.0])).unwrap();
        }
        let ids: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|t| t.identity_id)
            .collect();
        assert_eq!(ids, vec!["amy", "mia", "zed"]);
    }
}
