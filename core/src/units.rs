//! Conversion between mg/dL and mmol/L.
//!
//! The two directions round differently: mg/dL → mmol/L keeps one decimal,
//! mmol/L → mg/dL rounds to a whole number. A round trip is therefore lossy
//! (100 mg/dL → 5.6 mmol/L → 101 mg/dL) and callers rely on exactly these
//! displayed values.

use crate::models::Unit;

/// mg/dL per mmol/L.
pub const CONVERSION_FACTOR: f64 = 18.0;

/// Convert a value into the other unit, rounded for display.
#[must_use]
pub fn to_alternate_unit(value: f64, unit: Unit) -> (f64, Unit) {
    match unit {
        Unit::MgDl => (round_to_tenth(value / CONVERSION_FACTOR), Unit::MmolL),
        Unit::MmolL => ((value * CONVERSION_FACTOR).round(), Unit::MgDl),
    }
}

/// Normalize a value onto the mg/dL scale. Not rounded; never persisted.
#[must_use]
pub fn to_reference_unit(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::MgDl => value,
        Unit::MmolL => value * CONVERSION_FACTOR,
    }
}

/// The alternate-unit label shown next to a stored value, e.g. "5.6 mmol/L".
#[must_use]
pub fn secondary_display(value: f64, unit: Unit) -> String {
    let (converted, other) = to_alternate_unit(value, unit);
    match other {
        Unit::MmolL => format!("{converted:.1} {other}"),
        Unit::MgDl => format!("{converted:.0} {other}"),
    }
}

/// Format a value in its own unit the way it was entered.
#[must_use]
pub fn format_value(value: f64, unit: Unit) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0} {unit}")
    } else {
        format!("{value} {unit}")
    }
}

fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
