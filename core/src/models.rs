use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize};

use crate::units;

/// Measurement unit a value was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(rename = "mg/dL")]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl Unit {
    pub const ALL: [Unit; 2] = [Unit::MgDl, Unit::MmolL];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::MgDl => "mg/dL",
            Unit::MmolL => "mmol/L",
        }
    }

    /// The unit on the other side of the conversion.
    #[must_use]
    pub fn other(self) -> Unit {
        match self {
            Unit::MgDl => Unit::MmolL,
            Unit::MmolL => Unit::MgDl,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mg/dl" | "mgdl" | "mg" => Ok(Unit::MgDl),
            "mmol/l" | "mmoll" | "mmol" => Ok(Unit::MmolL),
            _ => bail!("Invalid unit '{s}'. Use 'mg/dL' or 'mmol/L'"),
        }
    }
}

/// Time-of-day / meal-relation tag attached to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Before Breakfast")]
    BeforeBreakfast,
    #[serde(rename = "After Breakfast")]
    AfterBreakfast,
    #[serde(rename = "Before Lunch")]
    BeforeLunch,
    #[serde(rename = "After Lunch")]
    AfterLunch,
    #[serde(rename = "Before Dinner")]
    BeforeDinner,
    #[serde(rename = "After Dinner")]
    AfterDinner,
    #[serde(rename = "Before Sleep")]
    BeforeSleep,
    #[serde(rename = "After Sleep")]
    AfterSleep,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::BeforeBreakfast,
        Category::AfterBreakfast,
        Category::BeforeLunch,
        Category::AfterLunch,
        Category::BeforeDinner,
        Category::AfterDinner,
        Category::BeforeSleep,
        Category::AfterSleep,
        Category::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::BeforeBreakfast => "Before Breakfast",
            Category::AfterBreakfast => "After Breakfast",
            Category::BeforeLunch => "Before Lunch",
            Category::AfterLunch => "After Lunch",
            Category::BeforeDinner => "Before Dinner",
            Category::AfterDinner => "After Dinner",
            Category::BeforeSleep => "Before Sleep",
            Category::AfterSleep => "After Sleep",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the display text ("Before Breakfast") or a slug ("before-breakfast",
/// "before_breakfast"), case-insensitively.
impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_category(s);
        Category::ALL
            .into_iter()
            .find(|c| normalize_category(c.as_str()) == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                anyhow::anyhow!(
                    "Invalid category '{s}'. Must be one of: {}",
                    names.join(", ")
                )
            })
    }
}

fn normalize_category(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => bail!("Invalid theme '{s}'. Use 'light' or 'dark'"),
        }
    }
}

/// One blood-glucose measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "text_or_number")]
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub category: Category,
    pub value: f64,
    pub unit: Unit,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
}

/// Ids minted by `Date.now()` in older backups are numbers.
fn text_or_number<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<RawId>::deserialize(d)? {
        None => String::new(),
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(n)) => n.to_string(),
        Some(RawId::Float(f)) => f.to_string(),
    })
}

fn null_as_empty<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl Record {
    /// Value on the mg/dL scale, for aggregation only.
    #[must_use]
    pub fn reference_value(&self) -> f64 {
        units::to_reference_unit(self.value, self.unit)
    }

    /// Same record with its value re-expressed in the other unit.
    #[must_use]
    pub fn converted(&self) -> Record {
        let (value, unit) = units::to_alternate_unit(self.value, self.unit);
        Record {
            value,
            unit,
            ..self.clone()
        }
    }
}

/// A record as handed to the store before an id is minted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub timestamp: i64,
    pub category: Category,
    pub value: f64,
    pub unit: Unit,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
}

impl NewRecord {
    #[must_use]
    pub fn with_id(self, id: String) -> Record {
        Record {
            id,
            timestamp: self.timestamp,
            category: self.category,
            value: self.value,
            unit: self.unit,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub default_unit: Unit,
}

// --- Derived view types ---

/// Where a reference-unit value falls against the dashboard's guide lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseRange {
    Low,
    InRange,
    High,
}

impl GlucoseRange {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GlucoseRange::Low => "low",
            GlucoseRange::InRange => "in range",
            GlucoseRange::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub id: String,
    pub timestamp: i64,
    pub label: String,
    /// Normalized to mg/dL.
    pub value: f64,
    pub original_value: f64,
    pub original_unit: Unit,
    pub category: Category,
    pub range: GlucoseRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub avg: i64,
    pub high: i64,
    pub low: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub stats: SummaryStats,
    pub chart: Vec<ChartPoint>,
}

/// A measurement value must be a positive, finite number.
pub fn validate_value(value: f64) -> Result<f64> {
    if !value.is_finite() {
        bail!("Value must be a number");
    }
    if value <= 0.0 {
        bail!("Value must be greater than 0");
    }
    Ok(value)
}
