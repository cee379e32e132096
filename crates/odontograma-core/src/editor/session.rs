//! The editor session state machine.

use tracing::{debug, info, warn};

use crate::models::{
    annotate_in, state_of, toggle_in, Dentition, Odontogram, Surface, TeethMap, ToothNumber,
    ToothState,
};
use crate::store::{OdontogramStore, StoreError, StoreResult, Subscription};

use super::{AbortReason, CloseOutcome, EditorError, EditorPhase, EditorResult};

/// Snapshot of the local edits handed to the store on save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub patient_id: String,
    pub odontogram_id: String,
    pub teeth: TeethMap,
    pub notes: String,
}

/// One clinician's editing session over one chart.
///
/// Local `teeth` and `notes` start as a copy of the loaded chart. Snapshots pushed by the
/// store afterwards replace `base` (the last known stored state) but are never merged into
/// unsaved local edits, so the next save overwrites whatever arrived in between.
#[derive(Debug)]
pub struct EditorSession {
    patient_id: String,
    odontogram_id: String,
    phase: EditorPhase,
    dentition: Option<Dentition>,
    base: Option<Odontogram>,
    teeth: TeethMap,
    notes: String,
    selected_tooth: Option<ToothNumber>,
    dirty: bool,
    last_error: Option<String>,
    subscription: Option<Subscription>,
}

impl EditorSession {
    /// Start a session in `Loading`. Blank ids abort immediately.
    pub fn open(patient_id: &str, odontogram_id: &str) -> Self {
        let mut session = Self {
            patient_id: patient_id.to_string(),
            odontogram_id: odontogram_id.to_string(),
            phase: EditorPhase::Loading,
            dentition: None,
            base: None,
            teeth: TeethMap::new(),
            notes: String::new(),
            selected_tooth: None,
            dirty: false,
            last_error: None,
            subscription: None,
        };
        if patient_id.trim().is_empty() || odontogram_id.trim().is_empty() {
            warn!("editor opened without patient or odontogram id");
            session.phase = EditorPhase::Aborted(AbortReason::NotFound);
        }
        session
    }

    /// Open a session and load it from a live subscription to the store.
    pub fn attach<S: OdontogramStore + ?Sized>(
        store: &S,
        patient_id: &str,
        odontogram_id: &str,
    ) -> Self {
        let mut session = Self::open(patient_id, odontogram_id);
        if session.phase != EditorPhase::Loading {
            return session;
        }

        match store.subscribe(patient_id, odontogram_id) {
            Ok(mut subscription) => {
                let snapshot = subscription.current();
                session.subscription = Some(subscription);
                session.apply_snapshot(snapshot);
            }
            Err(e) => session.fail_loading(&e),
        }
        session
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn odontogram_id(&self) -> &str {
        &self.odontogram_id
    }

    pub fn phase(&self) -> &EditorPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == EditorPhase::Ready
    }

    /// Dentition of the loaded chart. `None` until loaded.
    pub fn dentition(&self) -> Option<Dentition> {
        self.dentition
    }

    /// Last known stored state. `None` before loading or after the chart was deleted.
    pub fn base(&self) -> Option<&Odontogram> {
        self.base.as_ref()
    }

    pub fn teeth(&self) -> &TeethMap {
        &self.teeth
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn selected_tooth(&self) -> Option<ToothNumber> {
        self.selected_tooth
    }

    /// Whether there are local edits not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Message of the most recent failed save, cleared by the next attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Local state of a tooth, or the sound default.
    pub fn tooth_state(&self, tooth: ToothNumber) -> ToothState {
        state_of(&self.teeth, tooth)
    }

    pub fn selected_state(&self) -> Option<ToothState> {
        self.selected_tooth.map(|tooth| self.tooth_state(tooth))
    }

    /// Feed a snapshot from the store into the session.
    pub fn apply_snapshot(&mut self, snapshot: Option<Odontogram>) {
        match self.phase {
            EditorPhase::Loading => match snapshot {
                Some(chart) => {
                    self.dentition = Some(chart.dentition());
                    self.teeth = chart.teeth().clone();
                    self.notes = chart.notes().to_string();
                    self.base = Some(chart);
                    self.dirty = false;
                    self.phase = EditorPhase::Ready;
                    debug!(
                        patient_id = %self.patient_id,
                        odontogram_id = %self.odontogram_id,
                        "editor ready"
                    );
                }
                None => {
                    warn!(
                        patient_id = %self.patient_id,
                        odontogram_id = %self.odontogram_id,
                        "cannot open odontogram: not found"
                    );
                    self.abort(AbortReason::NotFound);
                }
            },
            EditorPhase::Ready | EditorPhase::Saving => {
                match &snapshot {
                    None => warn!(
                        odontogram_id = %self.odontogram_id,
                        "odontogram was deleted while open"
                    ),
                    Some(_) if self.dirty => warn!(
                        odontogram_id = %self.odontogram_id,
                        "stored odontogram changed under unsaved edits; next save overwrites it"
                    ),
                    Some(chart) => {
                        // Nothing local to lose, follow the store
                        self.teeth = chart.teeth().clone();
                        self.notes = chart.notes().to_string();
                    }
                }
                self.base = snapshot;
            }
            EditorPhase::Aborted(_) | EditorPhase::Closed => {}
        }
    }

    /// Abort a loading session because the store failed.
    pub fn fail_loading(&mut self, error: &StoreError) {
        if self.phase != EditorPhase::Loading {
            return;
        }
        warn!(odontogram_id = %self.odontogram_id, error = %error, "cannot open odontogram");
        // A malformed id can never resolve, same as a missing chart
        let reason = if error.is_not_found() || matches!(error, StoreError::InvalidInput(_)) {
            AbortReason::NotFound
        } else {
            AbortReason::LoadFailed(error.to_string())
        };
        self.abort(reason);
    }

    /// Apply the newest snapshot from `subscription`, if one arrived since the last call.
    pub fn sync(&mut self, subscription: &mut Subscription) -> bool {
        match subscription.next_change() {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    /// [`EditorSession::sync`] against the subscription opened by [`EditorSession::attach`].
    pub fn refresh(&mut self) -> bool {
        let Some(mut subscription) = self.subscription.take() else {
            return false;
        };
        let applied = self.sync(&mut subscription);
        if !self.phase.is_terminal() {
            self.subscription = Some(subscription);
        }
        applied
    }

    /// Select a tooth, or clear the selection. Does not touch chart data.
    pub fn select_tooth(&mut self, tooth: Option<ToothNumber>) -> EditorResult<()> {
        let dentition = self.ready_dentition()?;
        if let Some(tooth) = tooth {
            dentition.check_tooth(tooth)?;
        }
        self.selected_tooth = tooth;
        Ok(())
    }

    /// Toggle a condition on the selected tooth.
    ///
    /// Without a selection this is a no-op returning `Ok(None)`.
    pub fn toggle_condition(
        &mut self,
        code: &str,
        active: bool,
    ) -> EditorResult<Option<ToothState>> {
        let dentition = self.ready_dentition()?;
        let Some(tooth) = self.selected_tooth else {
            return Ok(None);
        };
        let state = toggle_in(&mut self.teeth, dentition, tooth, code, active)?.clone();
        self.dirty = true;
        Ok(Some(state))
    }

    /// Set or clear a surface note on the selected tooth. No-op without a selection.
    pub fn set_surface_note(
        &mut self,
        surface: Surface,
        note: &str,
    ) -> EditorResult<Option<ToothState>> {
        let dentition = self.ready_dentition()?;
        let Some(tooth) = self.selected_tooth else {
            return Ok(None);
        };
        let state = annotate_in(&mut self.teeth, dentition, tooth, surface, note)?.clone();
        self.dirty = true;
        Ok(Some(state))
    }

    /// Replace the session-level notes.
    pub fn set_notes(&mut self, notes: &str) -> EditorResult<()> {
        self.ready_dentition()?;
        if self.notes != notes {
            self.notes = notes.to_string();
            self.dirty = true;
        }
        Ok(())
    }

    /// Enter `Saving` and hand out the edits to write.
    ///
    /// Only one save may be in flight; a second call fails with `SaveInProgress`.
    pub fn begin_save(&mut self) -> EditorResult<SaveRequest> {
        match self.phase {
            EditorPhase::Ready => {}
            EditorPhase::Saving => return Err(EditorError::SaveInProgress),
            ref other => return Err(EditorError::NotReady(other.clone())),
        }
        self.phase = EditorPhase::Saving;
        self.last_error = None;
        Ok(SaveRequest {
            patient_id: self.patient_id.clone(),
            odontogram_id: self.odontogram_id.clone(),
            teeth: self.teeth.clone(),
            notes: self.notes.clone(),
        })
    }

    /// Leave `Saving` with the store's answer. Local edits survive a failure.
    pub fn finish_save(&mut self, result: StoreResult<()>) -> EditorResult<()> {
        if self.phase != EditorPhase::Saving {
            return Err(EditorError::NotReady(self.phase.clone()));
        }
        self.phase = EditorPhase::Ready;

        match result {
            Ok(()) => {
                self.dirty = false;
                if let Some(base) = self.base.as_mut() {
                    base.apply_update(self.teeth.clone(), self.notes.clone());
                }
                info!(odontogram_id = %self.odontogram_id, "odontogram changes saved");
                Ok(())
            }
            Err(e) => {
                warn!(odontogram_id = %self.odontogram_id, error = %e, "saving odontogram failed");
                self.last_error = Some(e.to_string());
                Err(EditorError::SaveFailed(e))
            }
        }
    }

    /// Save the local edits through `store`.
    pub fn save<S: OdontogramStore + ?Sized>(&mut self, store: &S) -> EditorResult<()> {
        let request = self.begin_save()?;
        let result = store.save(
            &request.patient_id,
            &request.odontogram_id,
            &request.teeth,
            &request.notes,
        );
        self.finish_save(result)
    }

    /// Leave the editor and stop following the store.
    pub fn close(&mut self) -> CloseOutcome {
        self.subscription = None;
        let outcome = if self.dirty {
            info!(odontogram_id = %self.odontogram_id, "discarding unsaved odontogram edits");
            CloseOutcome::DiscardedEdits
        } else {
            CloseOutcome::Clean
        };
        self.dirty = false;
        self.selected_tooth = None;
        self.phase = EditorPhase::Closed;
        outcome
    }

    fn abort(&mut self, reason: AbortReason) {
        self.subscription = None;
        self.phase = EditorPhase::Aborted(reason);
    }

    fn ready_dentition(&self) -> EditorResult<Dentition> {
        match (&self.phase, self.dentition) {
            (EditorPhase::Ready, Some(dentition)) => Ok(dentition),
            (phase, _) => Err(EditorError::NotReady(phase.clone())),
        }
    }
}

impl EditorError {
    /// Error to show when a session aborted for lack of a chart.
    pub fn not_found(session: &EditorSession) -> Self {
        EditorError::NotFound {
            patient_id: session.patient_id.clone(),
            odontogram_id: session.odontogram_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dentition;

    fn ready_session(dentition: Dentition) -> EditorSession {
        let chart = Odontogram::new("p1".into(), dentition);
        let mut session = EditorSession::open("p1", chart.id());
        session.apply_snapshot(Some(chart));
        assert!(session.is_ready());
        session
    }

    fn codes(state: &ToothState) -> Vec<String> {
        state.conditions().to_vec()
    }

    #[test]
    fn test_blank_ids_abort() {
        let session = EditorSession::open("", "o1");
        assert_eq!(session.phase(), &EditorPhase::Aborted(AbortReason::NotFound));

        let session = EditorSession::open("p1", " ");
        assert_eq!(session.phase(), &EditorPhase::Aborted(AbortReason::NotFound));
    }

    #[test]
    fn test_missing_snapshot_aborts() {
        let mut session = EditorSession::open("p1", "o1");
        assert_eq!(session.phase(), &EditorPhase::Loading);

        session.apply_snapshot(None);
        assert_eq!(session.phase(), &EditorPhase::Aborted(AbortReason::NotFound));

        // A late snapshot does not revive it
        session.apply_snapshot(Some(Odontogram::new("p1".into(), Dentition::Adult)));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_load_failure_aborts() {
        let mut session = EditorSession::open("p1", "o1");
        session.fail_loading(&StoreError::Unavailable("offline".into()));
        assert!(matches!(
            session.phase(),
            EditorPhase::Aborted(AbortReason::LoadFailed(_))
        ));
    }

    #[test]
    fn test_edits_require_ready() {
        let mut session = EditorSession::open("p1", "o1");
        assert!(matches!(
            session.select_tooth(Some(11)),
            Err(EditorError::NotReady(EditorPhase::Loading))
        ));
        assert!(session.set_notes("x").is_err());
        assert!(matches!(
            session.begin_save(),
            Err(EditorError::NotReady(EditorPhase::Loading))
        ));
    }

    #[test]
    fn test_toggle_without_selection_is_noop() {
        let mut session = ready_session(Dentition::Adult);
        assert_eq!(session.toggle_condition("1", true).unwrap(), None);
        assert!(session.teeth().is_empty());
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_select_and_toggle() {
        let mut session = ready_session(Dentition::Adult);
        session.select_tooth(Some(11)).unwrap();

        let state = session.toggle_condition("1", true).unwrap().unwrap();
        assert_eq!(codes(&state), vec!["1"]);
        let state = session.toggle_condition("0", true).unwrap().unwrap();
        assert_eq!(codes(&state), vec!["0"]);

        assert_eq!(codes(&session.tooth_state(11)), vec!["0"]);
        assert!(session.is_dirty());

        // Selection changes never touch chart data
        session.select_tooth(None).unwrap();
        assert_eq!(session.selected_state(), None);
        assert_eq!(session.teeth().len(), 1);
    }

    #[test]
    fn test_invalid_selection_rejected() {
        let mut session = ready_session(Dentition::Pediatric);
        assert!(matches!(
            session.select_tooth(Some(11)),
            Err(EditorError::Chart(_))
        ));
        assert_eq!(session.selected_tooth(), None);

        session.select_tooth(Some(55)).unwrap();
        assert!(matches!(
            session.toggle_condition("X", true),
            Err(EditorError::Chart(_))
        ));
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_surface_notes() {
        let mut session = ready_session(Dentition::Adult);
        session.select_tooth(Some(36)).unwrap();
        let state = session
            .set_surface_note(Surface::Occlusal, "sellante")
            .unwrap()
            .unwrap();
        assert_eq!(state.surface_note(Surface::Occlusal), Some("sellante"));
        assert!(state.is_sound());
    }

    #[test]
    fn test_save_cycle() {
        let mut session = ready_session(Dentition::Adult);
        session.set_notes("primera visita").unwrap();

        let request = session.begin_save().unwrap();
        assert_eq!(request.notes, "primera visita");
        assert_eq!(session.phase(), &EditorPhase::Saving);

        // Editing and a second save are blocked while saving
        assert!(matches!(session.begin_save(), Err(EditorError::SaveInProgress)));
        assert!(session.set_notes("otra").is_err());

        session.finish_save(Ok(())).unwrap();
        assert!(session.is_ready());
        assert!(!session.is_dirty());
        assert_eq!(session.base().unwrap().notes(), "primera visita");
    }

    #[test]
    fn test_failed_save_keeps_edits() {
        let mut session = ready_session(Dentition::Adult);
        session.set_notes("no perder").unwrap();

        session.begin_save().unwrap();
        let err = session
            .finish_save(Err(StoreError::Unavailable("network unreachable".into())))
            .unwrap_err();
        assert!(matches!(err, EditorError::SaveFailed(_)));

        assert!(session.is_ready());
        assert!(session.is_dirty());
        assert_eq!(session.notes(), "no perder");
        assert_eq!(
            session.last_error(),
            Some("Store unavailable: network unreachable")
        );

        // Retrying clears the error
        session.begin_save().unwrap();
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn test_pushed_snapshot_does_not_merge_into_dirty_edits() {
        let chart = Odontogram::new("p1".into(), Dentition::Adult);
        let mut session = EditorSession::open("p1", chart.id());
        session.apply_snapshot(Some(chart.clone()));
        session.set_notes("local").unwrap();

        let mut remote = chart.clone();
        remote.set_notes("remote");
        session.apply_snapshot(Some(remote));

        assert_eq!(session.notes(), "local");
        assert_eq!(session.base().unwrap().notes(), "remote");
    }

    #[test]
    fn test_pushed_snapshot_refreshes_clean_session() {
        let chart = Odontogram::new("p1".into(), Dentition::Adult);
        let mut session = EditorSession::open("p1", chart.id());
        session.apply_snapshot(Some(chart.clone()));

        let mut remote = chart;
        remote.set_notes("remote");
        session.apply_snapshot(Some(remote));

        assert_eq!(session.notes(), "remote");
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_sync_with_external_subscription() {
        use crate::store::{ChartKey, SnapshotHub};

        let chart = Odontogram::new("p1".into(), Dentition::Adult);
        let hub = SnapshotHub::new();
        let key = ChartKey::new("p1", chart.id());
        let mut sub = hub.subscribe(key.clone(), || Ok(Some(chart.clone()))).unwrap();

        let mut session = EditorSession::open("p1", chart.id());
        session.apply_snapshot(sub.current());
        assert!(!session.sync(&mut sub));

        hub.publish(&key, None).unwrap();
        assert!(session.sync(&mut sub));
        assert!(session.base().is_none());
        assert!(session.is_ready());
    }

    #[test]
    fn test_close_reports_discarded_edits() {
        let mut session = ready_session(Dentition::Adult);
        assert_eq!(session.close(), CloseOutcome::Clean);

        let mut session = ready_session(Dentition::Adult);
        session.set_notes("borrador").unwrap();
        assert_eq!(session.close(), CloseOutcome::DiscardedEdits);
        assert_eq!(session.phase(), &EditorPhase::Closed);
        assert!(session.set_notes("x").is_err());
    }
}
