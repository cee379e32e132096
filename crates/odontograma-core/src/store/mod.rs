//! Persistence of odontograms in the document store.
//!
//! Charts live in the collection `pacientes/{patient_id}/odontograma` and are addressed by
//! the compound key `(patient_id, odontogram_id)`. Saves rewrite only `dientes` and `notas`;
//! there is no locking between editors, so the last save wins.

mod hub;
mod sqlite;

pub use hub::*;
pub use sqlite::*;

use thiserror::Error;

use crate::db::DbError;
use crate::models::{ChartError, Dentition, Odontogram, TeethMap};

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Odontogram not found: {patient_id}/{odontogram_id}")]
    NotFound {
        patient_id: String,
        odontogram_id: String,
    },

    #[error("Invalid chart: {0}")]
    Chart(#[from] ChartError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not decode stored odontogram: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(patient_id: &str, odontogram_id: &str) -> Self {
        StoreError::NotFound {
            patient_id: patient_id.to_string(),
            odontogram_id: odontogram_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::Unavailable(format!("Lock poisoned: {}", e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the editor and the patient record need from the document store.
pub trait OdontogramStore {
    /// Create an empty chart for a patient. The dentition cannot change afterwards.
    fn create(&self, patient_id: &str, dentition: Dentition) -> StoreResult<Odontogram>;

    /// Load one chart. Fails with `NotFound` if the key does not resolve.
    fn load(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Odontogram>;

    /// Rewrite the two mutable fields of a chart, leaving `tipo` and `fecha` untouched.
    fn save(
        &self,
        patient_id: &str,
        odontogram_id: &str,
        teeth: &TeethMap,
        notes: &str,
    ) -> StoreResult<()>;

    /// All charts of a patient, newest first.
    fn list(&self, patient_id: &str) -> StoreResult<Vec<Odontogram>>;

    /// Delete one chart. Returns `false` if it did not exist.
    fn delete(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<bool>;

    /// Delete every chart of a patient, as removing the patient's record does.
    fn delete_all_for_patient(&self, patient_id: &str) -> StoreResult<usize>;

    /// Live stream of full snapshots of one chart.
    fn subscribe(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Subscription>;
}

/// Collection holding a patient's charts.
pub fn charts_collection(patient_id: &str) -> String {
    format!("pacientes/{}/odontograma", patient_id)
}

/// Reject ids that are blank or would escape their collection path.
pub(crate) fn check_id(kind: &str, id: &str) -> StoreResult<()> {
    if id.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{} cannot be empty", kind)));
    }
    if id.contains('/') {
        return Err(StoreError::InvalidInput(format!("{} cannot contain '/': {}", kind, id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charts_collection() {
        assert_eq!(charts_collection("p-1"), "pacientes/p-1/odontograma");
    }

    #[test]
    fn test_check_id() {
        assert!(check_id("patient_id", "abc").is_ok());
        assert!(matches!(
            check_id("patient_id", "  "),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            check_id("patient_id", "a/b"),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("p1", "o1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Odontogram not found: p1/o1");
    }
}
