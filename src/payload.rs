use crate::form::{FormState, PERCENT_MAX};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Region key meaning "apply to every region".
pub const ALL_REGIONS: &str = "__ALL_STATES__";
pub const DEFAULT_SCENARIO: &str = "baseline";

/// `(region, subsector)` key of an override entry.
///
/// Serialized as `"region,subsector"`, which is what the processing service
/// reads back into a tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverrideKey {
    pub region: String,
    pub subsector: String,
}

impl OverrideKey {
    pub fn new(region: impl Into<String>, subsector: impl Into<String>) -> Self {
        OverrideKey {
            region: region.into(),
            subsector: subsector.into(),
        }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.region, self.subsector)
    }
}

impl Serialize for OverrideKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Maps keep the order the form rows were read in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestPayload {
    pub year: String,
    pub scenario: String,
    pub weather_year: String,
    pub custom_values: IndexMap<OverrideKey, f64>,
    pub fallback_scenarios: IndexMap<String, String>,
}

impl RequestPayload {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Field normalization
// ═══════════════════════════════════════════════════════════════════════

pub fn normalize_region(raw: &str) -> String {
    let region = raw.trim().to_lowercase();
    if region.is_empty() {
        ALL_REGIONS.to_string()
    } else {
        region
    }
}

pub fn normalize_scenario(raw: &str) -> String {
    let scenario = raw.trim().to_lowercase();
    if scenario.is_empty() {
        DEFAULT_SCENARIO.to_string()
    } else {
        scenario
    }
}

/// Why a percentage field was left out of the override mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotANumber,
    NotPositive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PercentInput {
    Blank,
    Valid(f64),
    Dropped(DropReason),
}

pub fn classify_percent(raw: &str) -> PercentInput {
    let text = raw.trim();
    if text.is_empty() {
        return PercentInput::Blank;
    }
    match text.parse::<f64>() {
        Ok(v) if !v.is_finite() => PercentInput::Dropped(DropReason::NotANumber),
        Ok(v) if v > 0.0 => PercentInput::Valid(v),
        Ok(_) => PercentInput::Dropped(DropReason::NotPositive),
        Err(_) => PercentInput::Dropped(DropReason::NotANumber),
    }
}

/// `Some(v)` iff the text parses as a finite number greater than zero.
pub fn parse_percent(raw: &str) -> Option<f64> {
    match classify_percent(raw) {
        PercentInput::Valid(v) => Some(v),
        _ => None,
    }
}

/// Non-blocking notice about a percentage field.
#[derive(Debug, Clone, PartialEq)]
pub enum InputWarning {
    Dropped {
        subsector: String,
        raw: String,
        reason: DropReason,
    },
    AboveMaximum {
        subsector: String,
        value: f64,
    },
}

impl fmt::Display for InputWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dropped {
                subsector,
                raw,
                reason: DropReason::NotANumber,
            } => write!(f, "{}: {:?} is not a number, override ignored", subsector, raw),
            Self::Dropped {
                subsector, raw, ..
            } => write!(f, "{}: {:?} is not above zero, override ignored", subsector, raw),
            Self::AboveMaximum { subsector, value } => write!(
                f,
                "{}: {} is above the form maximum of {}, sending anyway",
                subsector, value, PERCENT_MAX
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Payload assembly
// ═══════════════════════════════════════════════════════════════════════

/// Reads the form once and assembles a fresh payload.
pub fn build_payload(form: &FormState) -> (RequestPayload, Vec<InputWarning>) {
    let region = normalize_region(&form.region);
    let mut custom_values = IndexMap::new();
    let mut fallback_scenarios = IndexMap::new();
    let mut warnings = Vec::new();

    for row in &form.rows {
        match classify_percent(&row.percent) {
            PercentInput::Blank => {}
            PercentInput::Valid(value) => {
                if value > PERCENT_MAX {
                    warnings.push(InputWarning::AboveMaximum {
                        subsector: row.subsector.clone(),
                        value,
                    });
                }
                custom_values.insert(OverrideKey::new(region.as_str(), row.subsector.as_str()), value);
            }
            PercentInput::Dropped(reason) => warnings.push(InputWarning::Dropped {
                subsector: row.subsector.clone(),
                raw: row.percent.clone(),
                reason,
            }),
        }
    }

    for row in &form.rows {
        fallback_scenarios.insert(row.subsector.clone(), normalize_scenario(&row.scenario));
    }

    let payload = RequestPayload {
        year: form.year.clone(),
        scenario: form.scenario.clone(),
        weather_year: form.weather_year.clone(),
        custom_values,
        fallback_scenarios,
    };
    (payload, warnings)
}

pub fn save_payload_json(
    payload: &RequestPayload,
    path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}
