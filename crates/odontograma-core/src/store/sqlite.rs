//! SQLite-backed odontogram store.

use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{ClinicConfig, StorageLocation};
use crate::db::{Database, StoredDocument};
use crate::models::{
    validate_teeth, ChartUpdate, Dentition, Odontogram, OdontogramDocument, TeethMap,
};

use super::{
    charts_collection, check_id, ChartKey, OdontogramStore, SnapshotHub, StoreError, StoreResult,
    Subscription,
};

/// Odontogram store over the local document database.
///
/// Every write publishes a full snapshot to live subscribers of the written chart.
pub struct SqliteStore {
    db: Mutex<Database>,
    hub: SnapshotHub,
    validate_on_save: bool,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            hub: SnapshotHub::new(),
            validate_on_save: true,
        }
    }

    /// Open the database named by the configuration.
    pub fn open(config: &ClinicConfig) -> StoreResult<Self> {
        let db = match config.storage() {
            StorageLocation::File(path) => Database::open(path)?,
            StorageLocation::InMemory => Database::open_in_memory()?,
        };
        Ok(Self::new(db).validate_on_save(config.validates_on_save()))
    }

    /// Check tooth numbers against the stored dentition before writing.
    pub fn validate_on_save(mut self, enabled: bool) -> Self {
        self.validate_on_save = enabled;
        self
    }

    /// Live-subscription registry, for diagnostics.
    pub fn hub(&self) -> &SnapshotHub {
        &self.hub
    }

    fn read(db: &Database, patient_id: &str, odontogram_id: &str) -> StoreResult<Option<Odontogram>> {
        db.get_document(&charts_collection(patient_id), odontogram_id)?
            .map(|doc| decode(patient_id, doc))
            .transpose()
    }
}

fn decode(patient_id: &str, doc: StoredDocument) -> StoreResult<Odontogram> {
    let body: OdontogramDocument = serde_json::from_value(doc.body).map_err(StoreError::Decode)?;
    Ok(Odontogram::from_document(patient_id, &doc.doc_id, body))
}

fn to_fields<T: serde::Serialize>(value: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(value).map_err(crate::db::DbError::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidInput("update must encode to an object".into())),
    }
}

impl OdontogramStore for SqliteStore {
    fn create(&self, patient_id: &str, dentition: Dentition) -> StoreResult<Odontogram> {
        check_id("patient_id", patient_id)?;

        let chart = Odontogram::new(patient_id.to_string(), dentition);
        let body = serde_json::to_value(chart.to_document()).map_err(crate::db::DbError::from)?;

        let db = self.db.lock()?;
        db.insert_document_with_id(&charts_collection(patient_id), chart.id(), &body)?;
        self.hub
            .publish(&ChartKey::new(patient_id, chart.id()), Some(chart.clone()))?;

        info!(patient_id, odontogram_id = chart.id(), %dentition, "odontogram created");
        Ok(chart)
    }

    fn load(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Odontogram> {
        check_id("patient_id", patient_id)?;
        check_id("odontogram_id", odontogram_id)?;

        let db = self.db.lock()?;
        let chart = Self::read(&db, patient_id, odontogram_id)?
            .ok_or_else(|| StoreError::not_found(patient_id, odontogram_id))?;

        debug!(patient_id, odontogram_id, teeth = chart.teeth().len(), "odontogram loaded");
        Ok(chart)
    }

    fn save(
        &self,
        patient_id: &str,
        odontogram_id: &str,
        teeth: &TeethMap,
        notes: &str,
    ) -> StoreResult<()> {
        check_id("patient_id", patient_id)?;
        check_id("odontogram_id", odontogram_id)?;

        let db = self.db.lock()?;
        let mut chart = Self::read(&db, patient_id, odontogram_id)?
            .ok_or_else(|| StoreError::not_found(patient_id, odontogram_id))?;

        if self.validate_on_save {
            if let Err(e) = validate_teeth(chart.dentition(), teeth) {
                warn!(patient_id, odontogram_id, error = %e, "refusing to save invalid chart");
                return Err(e.into());
            }
        }

        let update = ChartUpdate {
            dientes: teeth.clone(),
            notas: notes.to_string(),
        };
        let merged =
            db.merge_document(&charts_collection(patient_id), odontogram_id, &to_fields(&update)?)?;
        if !merged {
            return Err(StoreError::not_found(patient_id, odontogram_id));
        }

        chart.apply_update(update.dientes, update.notas);
        self.hub
            .publish(&ChartKey::new(patient_id, odontogram_id), Some(chart))?;

        info!(patient_id, odontogram_id, teeth = teeth.len(), "odontogram saved");
        Ok(())
    }

    fn list(&self, patient_id: &str) -> StoreResult<Vec<Odontogram>> {
        check_id("patient_id", patient_id)?;

        let db = self.db.lock()?;
        let mut charts: Vec<Odontogram> = db
            .list_documents(&charts_collection(patient_id))?
            .into_iter()
            .filter_map(|doc| {
                let doc_id = doc.doc_id.clone();
                match decode(patient_id, doc) {
                    Ok(chart) => Some(chart),
                    Err(e) => {
                        warn!(
                            patient_id,
                            odontogram_id = %doc_id,
                            error = %e,
                            "skipping undecodable odontogram"
                        );
                        None
                    }
                }
            })
            .collect();

        charts.sort_by(|a, b| {
            b.charted_at()
                .cmp(a.charted_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(charts)
    }

    fn delete(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<bool> {
        check_id("patient_id", patient_id)?;
        check_id("odontogram_id", odontogram_id)?;

        let db = self.db.lock()?;
        let deleted = db.delete_document(&charts_collection(patient_id), odontogram_id)?;
        if deleted {
            self.hub
                .publish(&ChartKey::new(patient_id, odontogram_id), None)?;
            info!(patient_id, odontogram_id, "odontogram deleted");
        }
        Ok(deleted)
    }

    fn delete_all_for_patient(&self, patient_id: &str) -> StoreResult<usize> {
        check_id("patient_id", patient_id)?;

        let collection = charts_collection(patient_id);
        let db = self.db.lock()?;
        let ids: Vec<String> = db
            .list_documents(&collection)?
            .into_iter()
            .map(|doc| doc.doc_id)
            .collect();

        let removed = db.delete_collection(&collection)?;
        for id in &ids {
            self.hub.publish(&ChartKey::new(patient_id, id), None)?;
        }

        info!(patient_id, removed, "patient odontograms deleted");
        Ok(removed)
    }

    fn subscribe(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Subscription> {
        check_id("patient_id", patient_id)?;
        check_id("odontogram_id", odontogram_id)?;

        // Hold the database lock while seeding so no write can slip in between
        let db = self.db.lock()?;
        self.hub.subscribe(ChartKey::new(patient_id, odontogram_id), || {
            Self::read(&db, patient_id, odontogram_id)
        })
    }
}
