use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantity used when the model gives none
pub const DEFAULT_QUANTITY: &str = "1";

/// Unit used when the model gives none
pub const DEFAULT_UNIT: &str = "piece";

/// Name used when an entry carries no usable name
pub const UNKNOWN_NAME: &str = "Unknown ingredient";

/// A single ingredient as recognised from a photo or edited by the user
///
/// After extraction all three fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    pub unit: String,
}

impl Ingredient {
    /// Build an ingredient, substituting defaults for blank fields
    pub fn new(
        name: impl Into<String>,
        quantity: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: non_empty_or(name.into(), UNKNOWN_NAME),
            quantity: non_empty_or(quantity.into(), DEFAULT_QUANTITY),
            unit: non_empty_or(unit.into(), DEFAULT_UNIT),
        }
    }

    /// An ingredient known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_QUANTITY, DEFAULT_UNIT)
    }

    /// The record returned when nothing at all could be recognised
    pub fn placeholder() -> Self {
        Self::named(UNKNOWN_NAME)
    }
}

/// Renders as `"{quantity} {unit} {name}"`, the form embedded in recipe prompts
impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.quantity, self.unit, self.name)
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}
