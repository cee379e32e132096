//! Domain models for odontogram charting.

pub mod condition;
mod dentition;
mod odontogram;
mod tooth;

pub use condition::{Condition, DisplayColor, CONDITIONS, SOUND_CODE};
pub use dentition::*;
pub use odontogram::*;
pub(crate) use odontogram::{annotate_in, toggle_in};
pub use tooth::*;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Deserialize an explicit `null` the same as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Invalid chart input. The editor only offers valid teeth and codes, so these indicate
/// a caller bug rather than a user mistake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartError {
    #[error("Tooth {tooth} is not part of the {dentition} dentition")]
    UnknownTooth { tooth: ToothNumber, dentition: Dentition },

    #[error("Unknown condition code: {0}")]
    UnknownCondition(String),

    #[error("Unknown dentition type: {0}")]
    InvalidDentition(String),
}
