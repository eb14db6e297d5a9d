//! Attendance service — wires the matcher, gallery, and ledger together.
//!
//! Synchronous facade invoked per request by whatever transport sits above.
//! Gallery scans run under a read lock; enrollment and removal hold the
//! write lock across the durable write, so index and store cannot diverge
//! and a failed write leaves the previous template untouched in both.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rollcall_core::enroll::usable_samples;
use rollcall_core::extractor::encode_first;
use rollcall_core::{
    AccuracyMode, Embedding, EnrollError, EnrollmentAggregator, ExtractError, FaceExtractor,
    Gallery, MatchVerdict, Matcher, NearestMatcher, Template,
};
use rollcall_store::{
    AttendanceLedger, AttendanceRecord, AttendanceSummary, Db, LedgerError, Status, StoreError,
    TemplateStore,
};
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("enrollment failed: {0}")]
    Enroll(#[from] EnrollError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("face not recognized")]
    NotRecognized,
    #[error("unknown identity: {0}")]
    IdentityNotFound(String),
}

pub struct AttendanceService {
    gallery: RwLock<Gallery>,
    templates: TemplateStore,
    ledger: AttendanceLedger,
    matcher: NearestMatcher,
    aggregator: EnrollmentAggregator,
    /// Extractor effort handed to every capture; transparent to matching.
    mode: AccuracyMode,
}

impl AttendanceService {
    /// Open the database and load the gallery index.
    pub fn open(config: &Config) -> Result<Self, ServiceError> {
        let db = rollcall_store::open_db(&config.db_path)?;
        Self::with_db(db, config.tolerance, config.min_samples, config.accuracy_mode)
    }

    pub fn with_db(
        db: Db,
        tolerance: f32,
        min_samples: usize,
        mode: AccuracyMode,
    ) -> Result<Self, ServiceError> {
        let templates = TemplateStore::new(db.clone());
        let ledger = AttendanceLedger::new(db);
        let loaded = templates.load_all()?;
        tracing::info!(templates = loaded.len(), "gallery index loaded");

        Ok(Self {
            gallery: RwLock::new(Gallery::from_templates(loaded)),
            templates,
            ledger,
            matcher: NearestMatcher::new(tolerance),
            aggregator: EnrollmentAggregator::new(min_samples),
            mode,
        })
    }

    /// Enroll (or destructively re-enroll) an identity from usable samples.
    pub fn enroll(
        &self,
        identity_id: &str,
        samples: &[Embedding],
    ) -> Result<Template, ServiceError> {
        let vector = self.aggregator.aggregate(samples)?;
        let template = Template {
            identity_id: identity_id.to_string(),
            vector,
            sample_count: samples.len() as u32,
            created_at: Utc::now(),
        };

        let mut gallery = self.gallery_write();
        self.templates.upsert(&template)?;
        gallery.insert(template.clone());
        tracing::info!(identity = %identity_id, samples = samples.len(), "identity enrolled");
        Ok(template)
    }

    /// Enroll from raw images: extract one embedding per image, skip the
    /// unusable ones, then aggregate. Fails only if too few usable samples
    /// remain.
    pub fn enroll_from_images<E: FaceExtractor + ?Sized>(
        &self,
        identity_id: &str,
        extractor: &E,
        images: &[Vec<u8>],
    ) -> Result<Template, ServiceError> {
        let outcomes = images
            .iter()
            .map(|image| encode_first(extractor, image, self.mode))
            .collect();
        let (usable, skipped) = usable_samples(outcomes);
        if skipped > 0 {
            tracing::warn!(
                identity = %identity_id,
                skipped,
                usable = usable.len(),
                "some enrollment images were unusable"
            );
        }
        self.enroll(identity_id, &usable)
    }

    /// Compare a probe embedding against every enrolled template.
    pub fn recognize(&self, probe: &Embedding) -> MatchVerdict {
        let gallery = self.gallery_read();
        let verdict = self.matcher.match_probe(probe, &gallery);
        tracing::debug!(
            matched = verdict.matched,
            distance = verdict.distance,
            confidence = verdict.confidence,
            "probe compared against gallery"
        );
        verdict
    }

    /// Extract a single face from an image and recognize it.
    pub fn recognize_image<E: FaceExtractor + ?Sized>(
        &self,
        extractor: &E,
        image: &[u8],
    ) -> Result<MatchVerdict, ServiceError> {
        let probe = encode_first(extractor, image, self.mode)?;
        Ok(self.recognize(&probe))
    }

    /// Apply a recognition verdict to the ledger for the day of `now`.
    pub fn mark_attendance(
        &self,
        verdict: &MatchVerdict,
        now: NaiveDateTime,
    ) -> Result<AttendanceRecord, ServiceError> {
        let Some(identity_id) = verdict.identity_id.as_deref().filter(|_| verdict.matched)
        else {
            return Err(ServiceError::NotRecognized);
        };
        let record = self.ledger.mark_present(identity_id, now)?;
        tracing::info!(
            identity = %identity_id,
            date = %record.date,
            confidence = verdict.confidence,
            "attendance marked present"
        );
        Ok(record)
    }

    /// Backfill an Absent record for every known identity with no record
    /// on `date`. Returns the number of records created.
    pub fn sweep_absences(
        &self,
        date: NaiveDate,
        known_ids: &[String],
    ) -> Result<usize, ServiceError> {
        Ok(self.ledger.sweep_absent(date, known_ids)?)
    }

    /// Administrative correction: unconditional overwrite of one day's
    /// record. The identity must be enrolled.
    pub fn admin_set_status(
        &self,
        identity_id: &str,
        date: NaiveDate,
        status: Status,
        time_in: Option<NaiveTime>,
    ) -> Result<AttendanceRecord, ServiceError> {
        if !self.gallery_read().contains(identity_id) {
            return Err(ServiceError::IdentityNotFound(identity_id.to_string()));
        }
        Ok(self.ledger.set_status(identity_id, date, status, time_in)?)
    }

    /// Remove an identity's template. Attendance history is retained.
    pub fn remove_identity(&self, identity_id: &str) -> Result<bool, ServiceError> {
        let mut gallery = self.gallery_write();
        let removed = self.templates.remove(identity_id)?;
        gallery.remove(identity_id);
        if removed {
            tracing::info!(identity = %identity_id, "identity removed from gallery");
        }
        Ok(removed)
    }

    /// Snapshot of all enrolled templates, ascending by identity id.
    pub fn templates(&self) -> Vec<Template> {
        self.gallery_read().scan().cloned().collect()
    }

    /// Enrolled identity ids, ascending.
    pub fn enrolled_identities(&self) -> Vec<String> {
        self.gallery_read().identities()
    }

    pub fn attendance_on(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, ServiceError> {
        Ok(self.ledger.records_on(date)?)
    }

    pub fn attendance_for(
        &self,
        identity_id: &str,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        Ok(self.ledger.records_for(identity_id)?)
    }

    pub fn summary_for(&self, identity_id: &str) -> Result<AttendanceSummary, ServiceError> {
        Ok(self.ledger.summary_for(identity_id)?)
    }

    fn gallery_read(&self) -> RwLockReadGuard<'_, Gallery> {
        self.gallery.read().expect("gallery lock poisoned")
    }

    fn gallery_write(&self) -> RwLockWriteGuard<'_, Gallery> {
        self.gallery.write().expect("gallery lock poisoned")
    }
}
