//! Condition catalog for tooth findings.

use serde::Serialize;

/// Code for a sound tooth. Mutually exclusive with every other code.
pub const SOUND_CODE: &str = "0";

/// A catalog entry. The catalog is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Condition {
    /// Short unique code (e.g. "1", "T")
    pub code: &'static str,
    /// Human-readable description
    pub label: &'static str,
}

/// All conditions, in the order the editor lists them.
pub const CONDITIONS: [Condition; 18] = [
    Condition { code: "0", label: "Sano" },
    Condition { code: "1", label: "Con Caries" },
    Condition { code: "2", label: "Obturado con caries" },
    Condition { code: "3", label: "Obturado sin caries" },
    Condition { code: "4", label: "Perdido por caries" },
    Condition { code: "5", label: "Perdido por otro motivo" },
    Condition { code: "6", label: "Fisura obturada" },
    Condition { code: "7", label: "Soporte de puente, corona, etc." },
    Condition { code: "8", label: "Diente sin erupcionar" },
    Condition { code: "T", label: "Traumatismo" },
    Condition { code: "9", label: "No registrado" },
    Condition { code: "11", label: "Recesión gingival" },
    Condition { code: "12", label: "Tratamiento de conductos" },
    Condition { code: "13", label: "Instrumento separado en conducto" },
    Condition { code: "14", label: "Bolsas periodontales" },
    Condition { code: "15", label: "Fluorosis" },
    Condition { code: "16", label: "Alteraciones (forma, número, etc.)" },
    Condition { code: "17", label: "Lesión endoperiodontal" },
];

/// Display color class for a tooth, keyed by its primary condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayColor {
    #[default]
    Default,
    Success,
    Destructive,
    DestructiveMuted,
    Primary,
    Muted,
    Orange,
    Purple,
}

impl DisplayColor {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayColor::Default => "default",
            DisplayColor::Success => "success",
            DisplayColor::Destructive => "destructive",
            DisplayColor::DestructiveMuted => "destructive-muted",
            DisplayColor::Primary => "primary",
            DisplayColor::Muted => "muted",
            DisplayColor::Orange => "orange",
            DisplayColor::Purple => "purple",
        }
    }
}

/// Look up a condition by code.
pub fn find(code: &str) -> Option<&'static Condition> {
    CONDITIONS.iter().find(|c| c.code == code)
}

pub fn is_known(code: &str) -> bool {
    find(code).is_some()
}

/// Display color for a code. Unknown codes fall back to [`DisplayColor::Default`].
pub fn display_color(code: &str) -> DisplayColor {
    match code {
        "0" => DisplayColor::Success,
        "1" => DisplayColor::Destructive,
        "2" => DisplayColor::DestructiveMuted,
        "3" => DisplayColor::Primary,
        "4" | "5" => DisplayColor::Muted,
        "T" => DisplayColor::Orange,
        "12" => DisplayColor::Purple,
        _ => DisplayColor::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_unique() {
        let codes: HashSet<_> = CONDITIONS.iter().map(|c| c.code).collect();
        assert_eq!(codes.len(), CONDITIONS.len());
    }

    #[test]
    fn test_sound_is_first() {
        assert_eq!(CONDITIONS[0].code, SOUND_CODE);
        assert_eq!(find(SOUND_CODE).unwrap().label, "Sano");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(find("T").unwrap().label, "Traumatismo");
        assert!(is_known("17"));
        assert!(!is_known("10"));
        assert!(!is_known(""));
    }

    #[test]
    fn test_display_color_fallback() {
        assert_eq!(display_color("0"), DisplayColor::Success);
        assert_eq!(display_color("5"), DisplayColor::Muted);
        assert_eq!(display_color("12"), DisplayColor::Purple);
        assert_eq!(display_color("14"), DisplayColor::Default);
        assert_eq!(display_color("??"), DisplayColor::Default);
        assert_eq!(DisplayColor::DestructiveMuted.as_str(), "destructive-muted");
    }
}
