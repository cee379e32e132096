//! Odontogram aggregate and its stored document shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::condition;
use super::dentition::{Dentition, ToothNumber};
use super::tooth::{Surface, ToothState};
use super::{null_as_default, ChartError};

/// Tooth number to state. Teeth without an entry are sound.
pub type TeethMap = BTreeMap<ToothNumber, ToothState>;

/// One dated charting session for a patient.
///
/// `dentition` and `charted_at` are fixed at creation. Only `teeth` and `notes` change
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Odontogram {
    id: String,
    patient_id: String,
    charted_at: String,
    dentition: Dentition,
    teeth: TeethMap,
    notes: String,
}

impl Odontogram {
    /// Create an empty chart, charted now.
    pub fn new(patient_id: String, dentition: Dentition) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            charted_at: now_rfc3339(),
            dentition,
            teeth: TeethMap::new(),
            notes: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// RFC 3339 creation timestamp.
    pub fn charted_at(&self) -> &str {
        &self.charted_at
    }

    pub fn dentition(&self) -> Dentition {
        self.dentition
    }

    pub fn teeth(&self) -> &TeethMap {
        &self.teeth
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Current state of a tooth, or the sound default when nothing is recorded.
    pub fn state(&self, tooth: ToothNumber) -> ToothState {
        state_of(&self.teeth, tooth)
    }

    /// Toggle a condition on one tooth.
    pub fn toggle_condition(
        &mut self,
        tooth: ToothNumber,
        code: &str,
        active: bool,
    ) -> Result<&ToothState, ChartError> {
        toggle_in(&mut self.teeth, self.dentition, tooth, code, active)
    }

    pub fn set_surface_note(
        &mut self,
        tooth: ToothNumber,
        surface: Surface,
        note: &str,
    ) -> Result<&ToothState, ChartError> {
        annotate_in(&mut self.teeth, self.dentition, tooth, surface, note)
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Replace the mutable fields, as a saved update does.
    pub fn apply_update(&mut self, teeth: TeethMap, notes: String) {
        self.teeth = teeth;
        self.notes = notes;
    }

    /// Encode the full document for insertion into the store.
    pub fn to_document(&self) -> OdontogramDocument {
        OdontogramDocument {
            tipo: Some(self.dentition),
            dientes: self.teeth.clone(),
            notas: self.notes.clone(),
            fecha: Some(self.charted_at.clone()),
        }
    }

    /// Decode a stored document, filling defaults for absent fields.
    pub fn from_document(patient_id: &str, id: &str, doc: OdontogramDocument) -> Self {
        let dentition = doc.tipo.unwrap_or_else(|| {
            warn!(odontogram_id = id, "stored chart has no tipo, assuming adulto");
            Dentition::Adult
        });
        let charted_at = doc.fecha.unwrap_or_else(|| {
            warn!(odontogram_id = id, "stored chart has no fecha, using decode time");
            now_rfc3339()
        });

        let mut teeth = doc.dientes;
        teeth.retain(|tooth, _| {
            let valid = dentition.contains(*tooth);
            if !valid {
                warn!(odontogram_id = id, tooth, %dentition, "dropping tooth outside dentition");
            }
            valid
        });

        Self {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            charted_at,
            dentition,
            teeth,
            notes: doc.notas,
        }
    }
}

/// Stored shape of an odontogram: `{tipo, dientes, notas, fecha}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdontogramDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<Dentition>,
    #[serde(default, deserialize_with = "teeth_or_default")]
    pub dientes: TeethMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,
}

/// Null teeth map or null tooth entries decode as sound.
fn teeth_or_default<'de, D>(deserializer: D) -> Result<TeethMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let stored: BTreeMap<ToothNumber, Option<ToothState>> = null_as_default(deserializer)?;
    Ok(stored
        .into_iter()
        .filter_map(|(tooth, state)| state.map(|state| (tooth, state)))
        .collect())
}

/// Partial update written on save. Only these two fields are ever rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartUpdate {
    pub dientes: TeethMap,
    pub notas: String,
}

/// Fixed-width UTC timestamp, so stored dates sort as strings.
fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// State of `tooth` in `teeth`, or the sound default.
pub fn state_of(teeth: &TeethMap, tooth: ToothNumber) -> ToothState {
    teeth.get(&tooth).cloned().unwrap_or_default()
}

/// Check every key of `teeth` against a dentition.
pub fn validate_teeth(dentition: Dentition, teeth: &TeethMap) -> Result<(), ChartError> {
    teeth
        .keys()
        .try_for_each(|tooth| dentition.check_tooth(*tooth))
}

pub(crate) fn toggle_in<'a>(
    teeth: &'a mut TeethMap,
    dentition: Dentition,
    tooth: ToothNumber,
    code: &str,
    active: bool,
) -> Result<&'a ToothState, ChartError> {
    dentition.check_tooth(tooth)?;
    if !condition::is_known(code) {
        return Err(ChartError::UnknownCondition(code.to_string()));
    }
    let state = teeth.entry(tooth).or_default();
    state.toggle(code, active);
    Ok(state)
}

pub(crate) fn annotate_in<'a>(
    teeth: &'a mut TeethMap,
    dentition: Dentition,
    tooth: ToothNumber,
    surface: Surface,
    note: &str,
) -> Result<&'a ToothState, ChartError> {
    dentition.check_tooth(tooth)?;
    let state = teeth.entry(tooth).or_default();
    state.set_surface_note(surface, note);
    Ok(state)
}
