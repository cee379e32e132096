//! Per-tooth clinical state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::condition::{self, DisplayColor, SOUND_CODE};
use super::null_as_default;

/// Tooth surface that can carry a free-text note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Surface {
    #[serde(rename = "oclusal")]
    Occlusal,
    #[serde(rename = "mesial")]
    Mesial,
    #[serde(rename = "distal")]
    Distal,
    #[serde(rename = "vestibular", alias = "buccal")]
    Buccal,
    #[serde(rename = "lingual")]
    Lingual,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Occlusal,
        Surface::Mesial,
        Surface::Distal,
        Surface::Buccal,
        Surface::Lingual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Occlusal => "oclusal",
            Surface::Mesial => "mesial",
            Surface::Distal => "distal",
            Surface::Buccal => "vestibular",
            Surface::Lingual => "lingual",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oclusal" | "occlusal" => Ok(Surface::Occlusal),
            "mesial" => Ok(Surface::Mesial),
            "distal" => Ok(Surface::Distal),
            "vestibular" | "buccal" => Ok(Surface::Buccal),
            "lingual" => Ok(Surface::Lingual),
            other => Err(format!("unknown surface: {}", other)),
        }
    }
}

/// Clinical state of one tooth.
///
/// `conditions` is never empty and never mixes [`SOUND_CODE`] with another code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredToothState")]
pub struct ToothState {
    #[serde(rename = "estados")]
    conditions: Vec<String>,
    #[serde(rename = "superficies")]
    surfaces: BTreeMap<Surface, String>,
}

impl Default for ToothState {
    fn default() -> Self {
        Self::sound()
    }
}

impl ToothState {
    /// State of a tooth with no recorded findings.
    pub fn sound() -> Self {
        Self {
            conditions: vec![SOUND_CODE.to_string()],
            surfaces: BTreeMap::new(),
        }
    }

    /// Build a state from a list of codes, applying the same rules as [`ToothState::toggle`].
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = Self::sound();
        for code in codes {
            state.toggle(code.as_ref(), true);
        }
        state
    }

    /// Active condition codes, in insertion order.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn has_condition(&self, code: &str) -> bool {
        self.conditions.iter().any(|c| c == code)
    }

    pub fn is_sound(&self) -> bool {
        self.conditions.len() == 1 && self.conditions[0] == SOUND_CODE
    }

    /// Add (`active = true`) or remove a condition code.
    ///
    /// Adding the sound code clears every other code; adding any other code removes the
    /// sound code; removing the last code leaves the sound code.
    pub fn toggle(&mut self, code: &str, active: bool) {
        if active {
            if code == SOUND_CODE {
                self.conditions = vec![SOUND_CODE.to_string()];
                return;
            }
            self.conditions.retain(|c| c != SOUND_CODE);
            if !self.has_condition(code) {
                self.conditions.push(code.to_string());
            }
        } else {
            self.conditions.retain(|c| c != code);
            if self.conditions.is_empty() {
                self.conditions.push(SOUND_CODE.to_string());
            }
        }
    }

    /// Non-mutating form of [`ToothState::toggle`].
    pub fn toggled(&self, code: &str, active: bool) -> Self {
        let mut next = self.clone();
        next.toggle(code, active);
        next
    }

    pub fn surfaces(&self) -> &BTreeMap<Surface, String> {
        &self.surfaces
    }

    pub fn surface_note(&self, surface: Surface) -> Option<&str> {
        self.surfaces.get(&surface).map(String::as_str)
    }

    /// Set a surface note. Blank text removes the note.
    pub fn set_surface_note(&mut self, surface: Surface, note: &str) {
        if note.trim().is_empty() {
            self.surfaces.remove(&surface);
        } else {
            self.surfaces.insert(surface, note.to_string());
        }
    }

    /// Code that drives the tooth's color.
    pub fn primary_code(&self) -> &str {
        self.conditions.first().map(String::as_str).unwrap_or(SOUND_CODE)
    }

    pub fn display_color(&self) -> DisplayColor {
        condition::display_color(self.primary_code())
    }

    /// Comma-separated codes, as shown on the tooth button.
    pub fn summary(&self) -> String {
        self.conditions.join(", ")
    }
}

/// Tooth state as it comes out of the store; any field may be absent or null.
#[derive(Deserialize)]
struct StoredToothState {
    #[serde(default, deserialize_with = "null_as_default")]
    estados: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    superficies: BTreeMap<String, Option<String>>,
}

impl From<StoredToothState> for ToothState {
    fn from(stored: StoredToothState) -> Self {
        let mut state = ToothState::from_codes(&stored.estados);
        for (key, note) in stored.superficies {
            let Some(note) = note else { continue };
            match key.parse::<Surface>() {
                Ok(surface) => state.set_surface_note(surface, &note),
                Err(_) => warn!(surface = %key, "dropping note on unknown surface"),
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(state: &ToothState) -> Vec<&str> {
        state.conditions().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_default_is_sound() {
        let state = ToothState::default();
        assert_eq!(codes(&state), vec!["0"]);
        assert!(state.is_sound());
        assert!(state.surfaces().is_empty());
    }

    #[test]
    fn test_adding_condition_removes_sound() {
        let state = ToothState::sound().toggled("1", true);
        assert_eq!(codes(&state), vec!["1"]);
    }

    #[test]
    fn test_adding_sound_clears_everything() {
        let state = ToothState::from_codes(["1", "T", "12"]);
        assert_eq!(codes(&state), vec!["1", "T", "12"]);

        let state = state.toggled("0", true);
        assert_eq!(codes(&state), vec!["0"]);
    }

    #[test]
    fn test_removing_last_code_restores_sound() {
        let state = ToothState::from_codes(["3"]).toggled("3", false);
        assert_eq!(codes(&state), vec!["0"]);

        // Removing the sound code itself leaves it in place
        let state = ToothState::sound().toggled("0", false);
        assert_eq!(codes(&state), vec!["0"]);
    }

    #[test]
    fn test_toggle_keeps_insertion_order_and_uniqueness() {
        let mut state = ToothState::sound();
        state.toggle("2", true);
        state.toggle("14", true);
        state.toggle("2", true);
        assert_eq!(codes(&state), vec!["2", "14"]);

        state.toggle("2", false);
        assert_eq!(codes(&state), vec!["14"]);
    }

    #[test]
    fn test_surface_notes() {
        let mut state = ToothState::sound();
        state.set_surface_note(Surface::Occlusal, "fisura profunda");
        assert_eq!(state.surface_note(Surface::Occlusal), Some("fisura profunda"));

        state.set_surface_note(Surface::Occlusal, "   ");
        assert_eq!(state.surface_note(Surface::Occlusal), None);
    }

    #[test]
    fn test_display_state() {
        let state = ToothState::from_codes(["T", "1"]);
        assert_eq!(state.primary_code(), "T");
        assert_eq!(state.display_color(), DisplayColor::Orange);
        assert_eq!(state.summary(), "T, 1");
    }

    #[test]
    fn test_wire_shape() {
        let mut state = ToothState::from_codes(["1"]);
        state.set_surface_note(Surface::Buccal, "mancha");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"estados": ["1"], "superficies": {"vestibular": "mancha"}})
        );
    }

    #[test]
    fn test_decode_fills_defaults() {
        let state: ToothState = serde_json::from_str("{}").unwrap();
        assert!(state.is_sound());

        let state: ToothState = serde_json::from_str(r#"{"estados": []}"#).unwrap();
        assert!(state.is_sound());

        // Stored data that mixes sound with findings is normalized on the way in
        let state: ToothState =
            serde_json::from_str(r#"{"estados": ["0", "1", "1"], "superficies": {"mesial": null}}"#)
                .unwrap();
        assert_eq!(codes(&state), vec!["1"]);
        assert!(state.surfaces().is_empty());
    }

    #[test]
    fn test_decode_tolerates_nulls_and_unknown_surfaces() {
        let state: ToothState =
            serde_json::from_str(r#"{"estados": null, "superficies": null}"#).unwrap();
        assert!(state.is_sound());
        assert!(state.surfaces().is_empty());

        let state: ToothState = serde_json::from_str(
            r#"{"estados": ["2"], "superficies": {"palatino": "x", "distal": "caries"}}"#,
        )
        .unwrap();
        assert_eq!(codes(&state), vec!["2"]);
        assert_eq!(state.surfaces().len(), 1);
        assert_eq!(state.surface_note(Surface::Distal), Some("caries"));
    }

    #[test]
    fn test_surface_parse() {
        assert_eq!("Oclusal".parse::<Surface>().unwrap(), Surface::Occlusal);
        assert_eq!("buccal".parse::<Surface>().unwrap(), Surface::Buccal);
        assert!("palatal".parse::<Surface>().is_err());
    }
}
