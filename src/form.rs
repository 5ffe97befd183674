use crate::catalog::Catalog;
use crate::client::DEFAULT_ENDPOINT;
use serde::{Deserialize, Deserializer, Serialize};
use snafu::prelude::*;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const PERCENT_MIN: f64 = 0.0;
pub const PERCENT_MAX: f64 = 10.0;
pub const PERCENT_STEP: f64 = 0.01;

pub const PERCENT_PLACEHOLDER: &str = "0.0";
pub const SCENARIO_PLACEHOLDER: &str = "baseline";

// ═══════════════════════════════════════════════════════════════════════
// Field descriptors
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputKind {
    Number { min: f64, max: f64, step: f64 },
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Percent,
    Scenario,
}

impl FieldRole {
    /// Class name used by the HTML form; the submit path selects on it.
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Percent => "percentInput",
            Self::Scenario => "scenarioInput",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub role: FieldRole,
    pub kind: InputKind,
    pub placeholder: &'static str,
    pub default_value: &'static str,
    /// The subsector this input is tagged with.
    pub subsector: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub label: &'static str,
    pub percent: FieldDescriptor,
    pub scenario: FieldDescriptor,
}

impl FormRow {
    pub fn for_subsector(subsector: &'static str) -> Self {
        FormRow {
            label: subsector,
            percent: FieldDescriptor {
                role: FieldRole::Percent,
                kind: InputKind::Number {
                    min: PERCENT_MIN,
                    max: PERCENT_MAX,
                    step: PERCENT_STEP,
                },
                placeholder: PERCENT_PLACEHOLDER,
                default_value: "",
                subsector,
            },
            scenario: FieldDescriptor {
                role: FieldRole::Scenario,
                kind: InputKind::Text,
                placeholder: SCENARIO_PLACEHOLDER,
                default_value: "",
                subsector,
            },
        }
    }
}

/// A rendering target for the override form.
pub trait FormSink {
    fn begin(&mut self, _catalog: &Catalog) {}
    fn row(&mut self, row: &FormRow);
    fn finish(&mut self) {}
}

/// One row per catalog entry, in catalog order.
pub fn render(catalog: &Catalog) -> Vec<FormRow> {
    catalog.iter().map(FormRow::for_subsector).collect()
}

pub fn render_into<S: FormSink + ?Sized>(catalog: &Catalog, sink: &mut S) {
    sink.begin(catalog);
    for row in render(catalog) {
        sink.row(&row);
    }
    sink.finish();
}

// ═══════════════════════════════════════════════════════════════════════
// HTML sink
// ═══════════════════════════════════════════════════════════════════════

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn input_html(field: &FieldDescriptor, width_px: u32) -> String {
    let kind_attrs = match field.kind {
        InputKind::Number { min, max, step } => {
            format!(r#"type="number" min="{}" max="{}" step="{}""#, min, max, step)
        }
        InputKind::Text => r#"type="text""#.to_string(),
    };
    format!(
        r#"<input {kind_attrs} class="{class}" data-subsector="{subsector}" placeholder="{placeholder}" value="{value}" style="width:{width_px}px">"#,
        class = field.role.css_class(),
        subsector = escape_html(field.subsector),
        placeholder = escape_html(field.placeholder),
        value = escape_html(field.default_value),
    )
}

const SUBMIT_SCRIPT: &str = r#"async function submitForm() {
  const value = id => document.getElementById(id).value;
  const state = value("stateInput").trim().toLowerCase() || "__ALL_STATES__";
  const custom_values = {};
  const fallback_scenarios = {};

  document.querySelectorAll(".percentInput").forEach(input => {
    const v = parseFloat(input.value);
    if (!isNaN(v) && v > 0) {
      custom_values[state + "," + input.dataset.subsector] = v;
    } else if (input.value.trim() !== "") {
      console.warn(input.dataset.subsector + ": override ignored");
    }
  });
  document.querySelectorAll(".scenarioInput").forEach(input => {
    fallback_scenarios[input.dataset.subsector] = input.value.trim().toLowerCase() || "baseline";
  });

  const payload = {
    year: value("Year"),
    scenario: value("scenario"),
    weather_year: value("weatherYear"),
    custom_values,
    fallback_scenarios,
  };

  let res;
  try {
    res = await fetch(ENDPOINT, {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(payload),
    });
  } catch (e) {
    alert("Error: could not reach " + ENDPOINT + ": " + e.message);
    return;
  }

  if (res.ok) {
    const url = URL.createObjectURL(await res.blob());
    const a = document.createElement("a");
    a.href = url;
    a.download = "custom_output.csv";
    a.click();
    setTimeout(() => URL.revokeObjectURL(url), 0);
  } else {
    let message = "server returned HTTP " + res.status;
    try {
      const err = await res.json();
      if (err && err.error != null) message = err.error;
    } catch (_) {}
    alert("Error: " + message);
  }
}
"#;

/// Builds a standalone data-entry page that POSTs to `endpoint`.
#[derive(Debug)]
pub struct HtmlFormSink {
    html: String,
    endpoint: String,
}

impl Default for HtmlFormSink {
    fn default() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }
}

impl HtmlFormSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        HtmlFormSink {
            html: String::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

impl FormSink for HtmlFormSink {
    fn begin(&mut self, catalog: &Catalog) {
        let _ = write!(
            self.html,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Subsector overrides</title>
<style>
body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;margin:20px;color:#333}}
.row{{display:flex;gap:10px;align-items:center;margin-bottom:4px}}
.row label{{width:300px}}
</style>
</head>
<body>
<h1>Subsector overrides</h1>
<div>
<label>Year <input id="Year" type="text"></label>
<label>Weather year <input id="weatherYear" type="text"></label>
<label>Scenario <input id="scenario" type="text"></label>
<label>State <input id="stateInput" type="text" placeholder="all states"></label>
</div>
<div id="subsectorInputs" data-count="{}">
"#,
            catalog.len()
        );
    }

    fn row(&mut self, row: &FormRow) {
        let _ = writeln!(
            self.html,
            r#"<div class="row"><label>{}</label>{}{}</div>"#,
            escape_html(row.label),
            input_html(&row.percent, 60),
            input_html(&row.scenario, 100),
        );
    }

    fn finish(&mut self) {
        // JSON string literal; `</` is split so the endpoint cannot close the script.
        let endpoint = serde_json::Value::String(self.endpoint.clone())
            .to_string()
            .replace("</", "<\\/");
        self.html.push_str("</div>\n");
        self.html
            .push_str("<button type=\"button\" onclick=\"submitForm()\">Submit</button>\n");
        let _ = writeln!(self.html, "<script>\nconst ENDPOINT = {};", endpoint);
        self.html.push_str(SUBMIT_SCRIPT);
        self.html.push_str("</script>\n</body>\n</html>\n");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Form state (live field values)
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Snafu)]
pub enum FormError {
    #[snafu(display("Error reading form {}: {source}", path.display()))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error parsing form: {source}"))]
    Parse { source: toml::de::Error },
    #[snafu(display("Error rendering form: {source}"))]
    Render { source: toml::ser::Error },
    #[snafu(display("Unknown subsector: {subsector:?}"))]
    UnknownSubsector { subsector: String },
    #[snafu(display("Subsector {subsector:?} appears more than once"))]
    DuplicateSubsector { subsector: String },
    #[snafu(display("Expected SUBSECTOR=VALUE, got {text:?}"))]
    BadAssignment { text: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Accepts `percent = "3.5"` as well as `percent = 3.5`.
fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Int(i) => i.to_string(),
        TextOrNumber::Float(f) => f.to_string(),
    })
}

/// Raw text of one subsector row, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValues {
    pub subsector: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub percent: String,
    #[serde(default)]
    pub scenario: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub weather_year: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub rows: Vec<FieldValues>,
}

impl FormState {
    /// An empty form with one row per catalog entry.
    pub fn blank(catalog: &Catalog) -> Self {
        let mut sink = TomlFormSink::new();
        render_into(catalog, &mut sink);
        sink.into_state()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FormError> {
        toml::from_str(text).context(ParseSnafu)
    }

    pub fn load(path: &Path) -> Result<Self, FormError> {
        let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, FormError> {
        toml::to_string_pretty(self).context(RenderSnafu)
    }

    /// Rejects rows naming a subsector outside the catalog, or naming one twice.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), FormError> {
        let mut seen = HashSet::new();
        for row in &self.rows {
            ensure!(
                catalog.contains(&row.subsector),
                UnknownSubsectorSnafu {
                    subsector: row.subsector.as_str()
                }
            );
            ensure!(
                seen.insert(row.subsector.as_str()),
                DuplicateSubsectorSnafu {
                    subsector: row.subsector.as_str()
                }
            );
        }
        Ok(())
    }

    /// Validates the rows, then lays them over a blank form so every catalog
    /// subsector is present, in catalog order.
    pub fn conform(self, catalog: &Catalog) -> Result<Self, FormError> {
        self.validate(catalog)?;

        let mut full = FormState::blank(catalog);
        for row in self.rows {
            if let Some(slot) = full.rows.iter_mut().find(|r| r.subsector == row.subsector) {
                *slot = row;
            }
        }
        Ok(FormState {
            year: self.year,
            weather_year: self.weather_year,
            scenario: self.scenario,
            region: self.region,
            rows: full.rows,
        })
    }

    fn row_mut(&mut self, subsector: &str) -> Result<&mut FieldValues, FormError> {
        self.rows
            .iter_mut()
            .find(|r| r.subsector == subsector)
            .context(UnknownSubsectorSnafu { subsector })
    }

    pub fn set_percent(&mut self, subsector: &str, value: &str) -> Result<(), FormError> {
        self.row_mut(subsector)?.percent = value.to_string();
        Ok(())
    }

    pub fn set_scenario(&mut self, subsector: &str, value: &str) -> Result<(), FormError> {
        self.row_mut(subsector)?.scenario = value.to_string();
        Ok(())
    }
}

/// Splits a `SUBSECTOR=VALUE` command-line assignment.
pub fn parse_assignment(text: &str) -> Result<(&str, &str), FormError> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => BadAssignmentSnafu { text }.fail(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TOML sink
// ═══════════════════════════════════════════════════════════════════════

/// Collects rows into a fill-in [`FormState`] template.
#[derive(Debug, Default)]
pub struct TomlFormSink {
    state: FormState,
}

impl TomlFormSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_state(self) -> FormState {
        self.state
    }

    pub fn into_toml(self) -> Result<String, FormError> {
        self.state.to_toml_string()
    }
}

impl FormSink for TomlFormSink {
    fn begin(&mut self, catalog: &Catalog) {
        self.state = FormState::default();
        self.state.rows.reserve(catalog.len());
    }

    fn row(&mut self, row: &FormRow) {
        self.state.rows.push(FieldValues {
            subsector: row.label.to_string(),
            percent: row.percent.default_value.to_string(),
            scenario: row.scenario.default_value.to_string(),
        });
    }
}

pub fn save_form(contents: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
