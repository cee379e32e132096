//! Dentition layouts in two-digit quadrant notation.
//!
//! The first digit of a tooth number is the quadrant, the second its position counted from
//! the midline. Permanent teeth use quadrants 1-4 (positions 1-8), primary teeth use
//! quadrants 5-8 (positions 1-5).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ChartError;

/// A tooth number such as `11` or `85`.
pub type ToothNumber = u8;

const ADULT_UPPER_RIGHT: [ToothNumber; 8] = [18, 17, 16, 15, 14, 13, 12, 11];
const ADULT_UPPER_LEFT: [ToothNumber; 8] = [21, 22, 23, 24, 25, 26, 27, 28];
const ADULT_LOWER_RIGHT: [ToothNumber; 8] = [48, 47, 46, 45, 44, 43, 42, 41];
const ADULT_LOWER_LEFT: [ToothNumber; 8] = [31, 32, 33, 34, 35, 36, 37, 38];

const PEDIATRIC_UPPER_RIGHT: [ToothNumber; 5] = [55, 54, 53, 52, 51];
const PEDIATRIC_UPPER_LEFT: [ToothNumber; 5] = [61, 62, 63, 64, 65];
const PEDIATRIC_LOWER_RIGHT: [ToothNumber; 5] = [85, 84, 83, 82, 81];
const PEDIATRIC_LOWER_LEFT: [ToothNumber; 5] = [71, 72, 73, 74, 75];

/// Dentition type of a chart. Fixed when the chart is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dentition {
    /// Permanent dentition, 32 teeth
    #[default]
    #[serde(rename = "adulto")]
    Adult,
    /// Primary dentition, 20 teeth
    #[serde(rename = "niño", alias = "nino")]
    Pediatric,
}

/// Quadrant of the mouth, from the patient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    UpperRight,
    UpperLeft,
    LowerRight,
    LowerLeft,
}

impl Quadrant {
    /// Quadrants in the order the editor renders them.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UpperRight,
        Quadrant::UpperLeft,
        Quadrant::LowerRight,
        Quadrant::LowerLeft,
    ];

    /// Quadrant encoded in the first digit of a tooth number.
    pub fn of(tooth: ToothNumber) -> Option<Quadrant> {
        match tooth / 10 {
            1 | 5 => Some(Quadrant::UpperRight),
            2 | 6 => Some(Quadrant::UpperLeft),
            3 | 7 => Some(Quadrant::LowerLeft),
            4 | 8 => Some(Quadrant::LowerRight),
            _ => None,
        }
    }
}

impl Dentition {
    pub const ALL: [Dentition; 2] = [Dentition::Adult, Dentition::Pediatric];

    /// The four quadrant sequences: upper-right, upper-left, lower-right, lower-left.
    pub fn quadrants(self) -> [&'static [ToothNumber]; 4] {
        Quadrant::ALL.map(|q| self.quadrant(q))
    }

    /// Ordered tooth numbers of one quadrant.
    pub fn quadrant(self, quadrant: Quadrant) -> &'static [ToothNumber] {
        match (self, quadrant) {
            (Dentition::Adult, Quadrant::UpperRight) => &ADULT_UPPER_RIGHT,
            (Dentition::Adult, Quadrant::UpperLeft) => &ADULT_UPPER_LEFT,
            (Dentition::Adult, Quadrant::LowerRight) => &ADULT_LOWER_RIGHT,
            (Dentition::Adult, Quadrant::LowerLeft) => &ADULT_LOWER_LEFT,
            (Dentition::Pediatric, Quadrant::UpperRight) => &PEDIATRIC_UPPER_RIGHT,
            (Dentition::Pediatric, Quadrant::UpperLeft) => &PEDIATRIC_UPPER_LEFT,
            (Dentition::Pediatric, Quadrant::LowerRight) => &PEDIATRIC_LOWER_RIGHT,
            (Dentition::Pediatric, Quadrant::LowerLeft) => &PEDIATRIC_LOWER_LEFT,
        }
    }

    /// Every valid tooth number, in display order.
    pub fn teeth(self) -> impl Iterator<Item = ToothNumber> {
        self.quadrants().into_iter().flatten().copied()
    }

    pub fn tooth_count(self) -> usize {
        match self {
            Dentition::Adult => 32,
            Dentition::Pediatric => 20,
        }
    }

    /// Check if a tooth number belongs to this dentition.
    pub fn contains(self, tooth: ToothNumber) -> bool {
        let (quadrants, positions) = match self {
            Dentition::Adult => (1..=4, 1..=8),
            Dentition::Pediatric => (5..=8, 1..=5),
        };
        quadrants.contains(&(tooth / 10)) && positions.contains(&(tooth % 10))
    }

    /// Like [`Dentition::contains`], as a `Result`.
    pub fn check_tooth(self, tooth: ToothNumber) -> Result<(), ChartError> {
        if self.contains(tooth) {
            Ok(())
        } else {
            Err(ChartError::UnknownTooth {
                tooth,
                dentition: self,
            })
        }
    }

    /// Wire name used in stored documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Dentition::Adult => "adulto",
            Dentition::Pediatric => "niño",
        }
    }

    /// Display name.
    pub fn label(self) -> &'static str {
        match self {
            Dentition::Adult => "Adulto",
            Dentition::Pediatric => "Niño",
        }
    }
}

impl fmt::Display for Dentition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dentition {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "adulto" | "adult" => Ok(Dentition::Adult),
            "niño" | "nino" | "pediatric" => Ok(Dentition::Pediatric),
            other => Err(ChartError::InvalidDentition(other.to_string())),
        }
    }
}
