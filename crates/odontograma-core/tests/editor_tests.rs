//! Editor session integration tests against a real store.

use std::sync::atomic::{AtomicBool, Ordering};

use odontograma_core::db::Database;
use odontograma_core::editor::{AbortReason, CloseOutcome, EditorError, EditorPhase, EditorSession};
use odontograma_core::models::{Dentition, Odontogram, Surface, TeethMap};
use odontograma_core::store::{OdontogramStore, SqliteStore, StoreError, StoreResult, Subscription};

/// Store whose saves can be made to fail, as when the network drops.
struct FlakyStore {
    inner: SqliteStore,
    offline: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::new(Database::open_in_memory().unwrap()),
            offline: AtomicBool::new(false),
        }
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl OdontogramStore for FlakyStore {
    fn create(&self, patient_id: &str, dentition: Dentition) -> StoreResult<Odontogram> {
        self.inner.create(patient_id, dentition)
    }

    fn load(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Odontogram> {
        self.inner.load(patient_id, odontogram_id)
    }

    fn save(
        &self,
        patient_id: &str,
        odontogram_id: &str,
        teeth: &TeethMap,
        notes: &str,
    ) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network unreachable".into()));
        }
        self.inner.save(patient_id, odontogram_id, teeth, notes)
    }

    fn list(&self, patient_id: &str) -> StoreResult<Vec<Odontogram>> {
        self.inner.list(patient_id)
    }

    fn delete(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<bool> {
        self.inner.delete(patient_id, odontogram_id)
    }

    fn delete_all_for_patient(&self, patient_id: &str) -> StoreResult<usize> {
        self.inner.delete_all_for_patient(patient_id)
    }

    fn subscribe(&self, patient_id: &str, odontogram_id: &str) -> StoreResult<Subscription> {
        self.inner.subscribe(patient_id, odontogram_id)
    }
}

fn codes(session: &EditorSession, tooth: u8) -> Vec<String> {
    session.tooth_state(tooth).conditions().to_vec()
}

#[test]
fn test_nonexistent_chart_aborts() {
    let store = FlakyStore::new();
    let mut session = EditorSession::attach(&store, "p1", "does-not-exist");

    assert_eq!(session.phase(), &EditorPhase::Aborted(AbortReason::NotFound));
    assert!(matches!(
        session.select_tooth(Some(11)),
        Err(EditorError::NotReady(_))
    ));
    assert!(matches!(session.save(&store), Err(EditorError::NotReady(_))));
}

#[test]
fn test_missing_route_params_abort() {
    let store = FlakyStore::new();
    let session = EditorSession::attach(&store, "", "");
    assert_eq!(session.phase(), &EditorPhase::Aborted(AbortReason::NotFound));
}

#[test]
fn test_tooth_11_toggle_scenario_persists() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut session = EditorSession::attach(&store, "p1", chart.id());
    assert!(session.is_ready());

    session.select_tooth(Some(11)).unwrap();
    assert_eq!(codes(&session, 11), vec!["0"]);

    session.toggle_condition("1", true).unwrap();
    assert_eq!(codes(&session, 11), vec!["1"]);
    session.toggle_condition("2", true).unwrap();
    assert_eq!(codes(&session, 11), vec!["1", "2"]);
    session.toggle_condition("0", true).unwrap();
    assert_eq!(codes(&session, 11), vec!["0"]);
    session.toggle_condition("0", false).unwrap();
    assert_eq!(codes(&session, 11), vec!["0"]);
    session.toggle_condition("T", true).unwrap();

    session.save(&store).unwrap();

    let stored = store.load("p1", chart.id()).unwrap();
    assert_eq!(stored.state(11).conditions().to_vec(), vec!["T"]);
    assert_eq!(stored.teeth().len(), 1);
    assert_eq!(stored.dentition(), Dentition::Adult);
    assert_eq!(stored.charted_at(), chart.charted_at());
}

#[test]
fn test_failed_save_keeps_local_edits_and_retries() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut session = EditorSession::attach(&store, "p1", chart.id());

    session.select_tooth(Some(36)).unwrap();
    session.toggle_condition("12", true).unwrap();
    session.set_surface_note(Surface::Occlusal, "amalgama").unwrap();
    session.set_notes("dolor a la percusión").unwrap();

    store.set_offline(true);
    let err = session.save(&store).unwrap_err();
    assert!(matches!(err, EditorError::SaveFailed(StoreError::Unavailable(_))));
    assert!(session.is_ready());
    assert!(session.is_dirty());
    assert_eq!(session.notes(), "dolor a la percusión");
    assert!(session.last_error().is_some());

    // The stored chart is untouched
    assert_eq!(store.load("p1", chart.id()).unwrap().notes(), "");

    store.set_offline(false);
    session.save(&store).unwrap();
    assert!(!session.is_dirty());
    assert_eq!(session.last_error(), None);

    let stored = store.load("p1", chart.id()).unwrap();
    assert_eq!(stored.notes(), "dolor a la percusión");
    assert_eq!(stored.state(36).surface_note(Surface::Occlusal), Some("amalgama"));
}

#[test]
fn test_second_save_while_saving_is_rejected() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut session = EditorSession::attach(&store, "p1", chart.id());
    session.set_notes("x").unwrap();

    let request = session.begin_save().unwrap();
    assert!(matches!(session.save(&store), Err(EditorError::SaveInProgress)));

    let result = store.save(
        &request.patient_id,
        &request.odontogram_id,
        &request.teeth,
        &request.notes,
    );
    session.finish_save(result).unwrap();
    assert_eq!(store.load("p1", chart.id()).unwrap().notes(), "x");
}

#[test]
fn test_other_session_save_is_observed() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut writer = EditorSession::attach(&store, "p1", chart.id());
    let mut reader = EditorSession::attach(&store, "p1", chart.id());

    writer.select_tooth(Some(21)).unwrap();
    writer.toggle_condition("3", true).unwrap();
    writer.save(&store).unwrap();

    assert!(reader.refresh());
    assert_eq!(codes(&reader, 21), vec!["3"]);
    assert_eq!(reader.base().unwrap().state(21).conditions().to_vec(), vec!["3"]);
    assert!(!reader.refresh());
}

#[test]
fn test_last_save_wins_over_concurrent_edits() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut first = EditorSession::attach(&store, "p1", chart.id());
    let mut second = EditorSession::attach(&store, "p1", chart.id());

    second.set_notes("from second").unwrap();
    first.set_notes("from first").unwrap();
    first.save(&store).unwrap();

    // The pushed snapshot moves the base but not the unsaved local edits
    assert!(second.refresh());
    assert_eq!(second.notes(), "from second");
    assert_eq!(second.base().unwrap().notes(), "from first");

    second.save(&store).unwrap();
    assert_eq!(store.load("p1", chart.id()).unwrap().notes(), "from second");
}

#[test]
fn test_chart_deleted_while_open() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Pediatric).unwrap();
    let mut session = EditorSession::attach(&store, "p1", chart.id());
    session.set_notes("borrador").unwrap();

    assert!(store.delete_all_for_patient("p1").unwrap() == 1);
    assert!(session.refresh());
    assert!(session.base().is_none());

    let err = session.save(&store).unwrap_err();
    assert!(matches!(err, EditorError::SaveFailed(ref e) if e.is_not_found()));
    assert_eq!(session.notes(), "borrador");
}

#[test]
fn test_close_discards_without_writing() {
    let store = FlakyStore::new();
    let chart = store.create("p1", Dentition::Adult).unwrap();
    let mut session = EditorSession::attach(&store, "p1", chart.id());

    session.select_tooth(Some(48)).unwrap();
    session.toggle_condition("4", true).unwrap();
    assert_eq!(session.close(), CloseOutcome::DiscardedEdits);

    let stored = store.load("p1", chart.id()).unwrap();
    assert!(stored.teeth().is_empty());
    assert_eq!(store.inner.hub().active_channels().unwrap(), 0);
}
