//! Odontograma Core Library
//!
//! Dental charting for patient records: one odontogram per visit, edited in a session and
//! persisted as a document under the patient.
//!
//! # Architecture
//!
//! ```text
//!   Patient record ──open──▶ EditorSession ──select / toggle / annotate──▶ local edits
//!                                 ▲                                           │
//!                          live snapshots                                   save
//!                                 │                                           ▼
//!                           SnapshotHub ◀──publish── SqliteStore ──▶ documents table
//!                                                   pacientes/{id}/odontograma/{id}
//! ```
//!
//! # Modules
//!
//! - [`models`]: Dentition layout, condition catalog, tooth state, the chart aggregate
//! - [`db`]: SQLite-backed document store
//! - [`store`]: Odontogram persistence and live subscriptions
//! - [`editor`]: Editor session state machine
//! - [`config`]: Startup configuration

pub mod config;
pub mod db;
pub mod editor;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::{ClinicConfig, StorageLocation};
pub use db::Database;
pub use editor::{CloseOutcome, EditorError, EditorPhase, EditorSession};
pub use models::{
    ChartError, Condition, Dentition, DisplayColor, Odontogram, Quadrant, Surface, TeethMap,
    ToothNumber, ToothState, CONDITIONS,
};
pub use store::{OdontogramStore, SqliteStore, StoreError, Subscription};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use editor::AbortReason;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum OdontogramaError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Editor not ready: {0}")]
    NotReady(String),

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for OdontogramaError {
    fn from(e: db::DbError) -> Self {
        OdontogramaError::DatabaseError(e.to_string())
    }
}

impl From<ChartError> for OdontogramaError {
    fn from(e: ChartError) -> Self {
        OdontogramaError::InvalidInput(e.to_string())
    }
}

impl From<StoreError> for OdontogramaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => OdontogramaError::NotFound(e.to_string()),
            StoreError::Chart(_) | StoreError::InvalidInput(_) => {
                OdontogramaError::InvalidInput(e.to_string())
            }
            _ => OdontogramaError::DatabaseError(e.to_string()),
        }
    }
}

impl From<EditorError> for OdontogramaError {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::NotFound { .. } => OdontogramaError::NotFound(e.to_string()),
            EditorError::NotReady(_) | EditorError::SaveInProgress => {
                OdontogramaError::NotReady(e.to_string())
            }
            EditorError::SaveFailed(_) => OdontogramaError::SaveFailed(e.to_string()),
            EditorError::Chart(_) => OdontogramaError::InvalidInput(e.to_string()),
        }
    }
}

impl From<config::ConfigError> for OdontogramaError {
    fn from(e: config::ConfigError) -> Self {
        OdontogramaError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for OdontogramaError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        OdontogramaError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_dentition(tipo: &str) -> Result<Dentition, OdontogramaError> {
    Ok(tipo.parse::<Dentition>()?)
}

fn parse_surface(surface: &str) -> Result<Surface, OdontogramaError> {
    surface.parse::<Surface>().map_err(OdontogramaError::InvalidInput)
}

fn tooth_number(tooth: u32) -> Result<ToothNumber, OdontogramaError> {
    ToothNumber::try_from(tooth)
        .map_err(|_| OdontogramaError::InvalidInput(format!("Invalid tooth number: {}", tooth)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a clinic database at the given path.
#[uniffi::export]
pub fn open_clinic(
    database_path: String,
    validate_on_save: bool,
) -> Result<Arc<ClinicCore>, OdontogramaError> {
    let config =
        ClinicConfig::with_database_path(database_path)?.validate_on_save(validate_on_save);
    ClinicCore::open(&config)
}

/// Create an in-memory clinic (for testing and previews).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, OdontogramaError> {
    ClinicCore::open(&ClinicConfig::in_memory())
}

/// The condition catalog in display order.
#[uniffi::export]
pub fn condition_catalog() -> Vec<FfiCondition> {
    CONDITIONS.iter().map(FfiCondition::from).collect()
}

/// Quadrant layout of a dentition type (`adulto` or `niño`).
#[uniffi::export]
pub fn dentition_layout(tipo: String) -> Result<Vec<FfiQuadrantLayout>, OdontogramaError> {
    let dentition = parse_dentition(&tipo)?;
    Ok(Quadrant::ALL
        .iter()
        .map(|&quadrant| FfiQuadrantLayout {
            quadrant: quadrant_name(quadrant).to_string(),
            teeth: dentition.quadrant(quadrant).to_vec(),
        })
        .collect())
}

fn quadrant_name(quadrant: Quadrant) -> &'static str {
    match quadrant {
        Quadrant::UpperRight => "superior_derecho",
        Quadrant::UpperLeft => "superior_izquierdo",
        Quadrant::LowerRight => "inferior_derecho",
        Quadrant::LowerLeft => "inferior_izquierdo",
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic handle for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    store: Arc<SqliteStore>,
}

impl ClinicCore {
    /// Open the store described by a resolved configuration.
    pub fn open(config: &ClinicConfig) -> Result<Arc<Self>, OdontogramaError> {
        let store = SqliteStore::open(config)?;
        Ok(Arc::new(Self {
            store: Arc::new(store),
        }))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Chart Operations
    // =========================================================================

    /// Create an empty chart for a patient.
    pub fn create_odontogram(
        &self,
        patient_id: String,
        tipo: String,
    ) -> Result<FfiOdontogram, OdontogramaError> {
        let dentition = parse_dentition(&tipo)?;
        let chart = self.store.create(&patient_id, dentition)?;
        Ok(chart.into())
    }

    /// Get a chart, or `None` if it does not exist.
    pub fn get_odontogram(
        &self,
        patient_id: String,
        odontogram_id: String,
    ) -> Result<Option<FfiOdontogram>, OdontogramaError> {
        match self.store.load(&patient_id, &odontogram_id) {
            Ok(chart) => Ok(Some(chart.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All charts of a patient, newest first.
    pub fn list_odontograms(
        &self,
        patient_id: String,
    ) -> Result<Vec<FfiOdontogram>, OdontogramaError> {
        let charts = self.store.list(&patient_id)?;
        Ok(charts.into_iter().map(|c| c.into()).collect())
    }

    /// Delete one chart. Returns `false` if it did not exist.
    pub fn delete_odontogram(
        &self,
        patient_id: String,
        odontogram_id: String,
    ) -> Result<bool, OdontogramaError> {
        Ok(self.store.delete(&patient_id, &odontogram_id)?)
    }

    /// Delete every chart of a patient.
    pub fn delete_patient_odontograms(&self, patient_id: String) -> Result<u32, OdontogramaError> {
        let removed = self.store.delete_all_for_patient(&patient_id)?;
        Ok(removed as u32)
    }

    // =========================================================================
    // Editor
    // =========================================================================

    /// Open an editor on a chart. Fails with `NotFound` when it cannot be opened.
    pub fn open_editor(
        &self,
        patient_id: String,
        odontogram_id: String,
    ) -> Result<Arc<OdontogramEditor>, OdontogramaError> {
        let session = EditorSession::attach(self.store.as_ref(), &patient_id, &odontogram_id);
        match session.phase() {
            EditorPhase::Aborted(AbortReason::NotFound) => {
                Err(EditorError::not_found(&session).into())
            }
            EditorPhase::Aborted(AbortReason::LoadFailed(e)) => {
                Err(OdontogramaError::DatabaseError(e.clone()))
            }
            _ => Ok(Arc::new(OdontogramEditor {
                session: Mutex::new(session),
                store: Arc::clone(&self.store),
            })),
        }
    }
}

/// One editing session, driven by the UI shell.
#[derive(uniffi::Object)]
pub struct OdontogramEditor {
    session: Mutex<EditorSession>,
    store: Arc<SqliteStore>,
}

#[uniffi::export]
impl OdontogramEditor {
    /// Current view of the session.
    pub fn state(&self) -> Result<FfiEditorState, OdontogramaError> {
        let session = self.session.lock()?;
        Ok(FfiEditorState::from(&*session))
    }

    /// Local state of one tooth.
    pub fn tooth_state(&self, tooth: u32) -> Result<FfiToothState, OdontogramaError> {
        let tooth = tooth_number(tooth)?;
        let session = self.session.lock()?;
        Ok(FfiToothState::new(tooth, &session.tooth_state(tooth)))
    }

    /// Select a tooth; `None` clears the selection.
    pub fn select_tooth(&self, tooth: Option<u32>) -> Result<(), OdontogramaError> {
        let tooth = tooth.map(tooth_number).transpose()?;
        let mut session = self.session.lock()?;
        session.select_tooth(tooth)?;
        Ok(())
    }

    /// Toggle a condition on the selected tooth.
    ///
    /// Returns the tooth's new state, or `None` when no tooth is selected.
    pub fn toggle_condition(
        &self,
        code: String,
        active: bool,
    ) -> Result<Option<FfiToothState>, OdontogramaError> {
        let mut session = self.session.lock()?;
        let state = session.toggle_condition(&code, active)?;
        Ok(selected_state(&session, state))
    }

    /// Set a surface note on the selected tooth. An empty note clears it.
    pub fn set_surface_note(
        &self,
        surface: String,
        note: String,
    ) -> Result<Option<FfiToothState>, OdontogramaError> {
        let surface = parse_surface(&surface)?;
        let mut session = self.session.lock()?;
        let state = session.set_surface_note(surface, &note)?;
        Ok(selected_state(&session, state))
    }

    /// Replace the chart notes.
    pub fn set_notas(&self, notas: String) -> Result<(), OdontogramaError> {
        let mut session = self.session.lock()?;
        session.set_notes(&notas)?;
        Ok(())
    }

    /// Persist local edits. On failure the edits stay and the save can be retried.
    pub fn save(&self) -> Result<(), OdontogramaError> {
        let mut session = self.session.lock()?;
        session.save(self.store.as_ref())?;
        Ok(())
    }

    /// Apply the newest stored snapshot, if one arrived. Returns whether anything changed.
    pub fn refresh(&self) -> Result<bool, OdontogramaError> {
        let mut session = self.session.lock()?;
        Ok(session.refresh())
    }

    /// Leave the editor. Returns `true` if unsaved edits were discarded.
    pub fn close(&self) -> Result<bool, OdontogramaError> {
        let mut session = self.session.lock()?;
        Ok(session.close() == CloseOutcome::DiscardedEdits)
    }
}

fn selected_state(session: &EditorSession, state: Option<ToothState>) -> Option<FfiToothState> {
    let tooth = session.selected_tooth()?;
    state.map(|s| FfiToothState::new(tooth, &s))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe condition catalog entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCondition {
    pub code: String,
    pub label: String,
    pub color: String,
}

impl From<&Condition> for FfiCondition {
    fn from(condition: &Condition) -> Self {
        Self {
            code: condition.code.to_string(),
            label: condition.label.to_string(),
            color: models::condition::display_color(condition.code).as_str().to_string(),
        }
    }
}

/// FFI-safe quadrant layout, teeth in display order.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQuadrantLayout {
    pub quadrant: String,
    pub teeth: Vec<u8>,
}

/// FFI-safe surface note.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSurfaceNote {
    pub surface: String,
    pub note: String,
}

/// FFI-safe tooth state with its derived display fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiToothState {
    pub tooth: u8,
    pub estados: Vec<String>,
    pub superficies: Vec<FfiSurfaceNote>,
    pub primary_code: String,
    pub color: String,
    pub summary: String,
}

impl FfiToothState {
    fn new(tooth: ToothNumber, state: &ToothState) -> Self {
        Self {
            tooth,
            estados: state.conditions().to_vec(),
            superficies: state
                .surfaces()
                .iter()
                .map(|(surface, note)| FfiSurfaceNote {
                    surface: surface.as_str().to_string(),
                    note: note.clone(),
                })
                .collect(),
            primary_code: state.primary_code().to_string(),
            color: state.display_color().as_str().to_string(),
            summary: state.summary(),
        }
    }
}

fn ffi_teeth(teeth: &TeethMap) -> Vec<FfiToothState> {
    teeth
        .iter()
        .map(|(&tooth, state)| FfiToothState::new(tooth, state))
        .collect()
}

/// FFI-safe odontogram. `dientes` holds only charted teeth.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOdontogram {
    pub id: String,
    pub patient_id: String,
    pub tipo: String,
    pub fecha: String,
    pub dientes: Vec<FfiToothState>,
    pub notas: String,
}

impl From<Odontogram> for FfiOdontogram {
    fn from(chart: Odontogram) -> Self {
        Self {
            id: chart.id().to_string(),
            patient_id: chart.patient_id().to_string(),
            tipo: chart.dentition().as_str().to_string(),
            fecha: chart.charted_at().to_string(),
            dientes: ffi_teeth(chart.teeth()),
            notas: chart.notes().to_string(),
        }
    }
}

/// FFI-safe snapshot of an editor session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEditorState {
    pub phase: String,
    pub patient_id: String,
    pub odontogram_id: String,
    pub tipo: Option<String>,
    pub selected_tooth: Option<u8>,
    pub dientes: Vec<FfiToothState>,
    pub notas: String,
    pub dirty: bool,
    pub last_error: Option<String>,
}

impl From<&EditorSession> for FfiEditorState {
    fn from(session: &EditorSession) -> Self {
        Self {
            phase: session.phase().to_string(),
            patient_id: session.patient_id().to_string(),
            odontogram_id: session.odontogram_id().to_string(),
            tipo: session.dentition().map(|d| d.as_str().to_string()),
            selected_tooth: session.selected_tooth(),
            dientes: ffi_teeth(session.teeth()),
            notas: session.notes().to_string(),
            dirty: session.is_dirty(),
            last_error: session.last_error().map(str::to_string),
        }
    }
}
