use serde::{Deserialize, Serialize};

/// Server-side aggregation applied to a summarized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    /// Number of records carrying a value.
    Count,
    /// Numeric sum.
    Sum,
    /// Numeric average.
    Average,
    /// Smallest value.
    Minimum,
    /// Largest value.
    Maximum,
    /// Share of records matching a comparison value.
    Percentage,
}

impl SummaryType {
    /// Returns the stable wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Percentage => "percentage",
        }
    }
}
