//! Normalized report model shared by every module and the renderer.
//!
//! Modules map their own domain objects (builds, work items, branches) into
//! [`Section`]s and [`Table`]s. The runner only adds the measured duration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Well-known metadata key carrying a human-readable duration string.
pub const DURATION_META_KEY: &str = "duration";

/// Output unit produced by a module.
///
/// A report with errors is still a report: it is rendered like any other.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Report {
    pub title: String,
    pub summary: String,
    pub sections: Vec<Section>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub meta: ReportMeta,
}

impl Report {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Placeholder report for a module whose `run` failed.
    pub fn failed(module_name: &str, error: &dyn std::fmt::Display) -> Self {
        let message = error.to_string();
        Self {
            title: module_name.to_string(),
            summary: format!("error: {message}"),
            errors: vec![message],
            ..Self::default()
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key, value);
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Labeled block of a report: a table, free-form lines, or both.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Section {
    pub header: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
        self
    }
}

/// Pre-formatted tabular data. Every cell is already text.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<const N: usize>(headers: [&str; N]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Report metadata.
///
/// Fields the runner writes are typed; anything a module wants to attach
/// goes into the open `extra` map. At the renderer boundary both are exposed
/// as a single string-keyed map (see [`ReportMeta::to_map`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMeta {
    pub duration: Option<Duration>,
    extra: BTreeMap<String, Value>,
}

impl ReportMeta {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// Looks up a key in the boundary view of the metadata.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == DURATION_META_KEY {
            if let Some(duration) = self.duration {
                return Some(Value::String(format_duration(duration)));
            }
        }
        self.extra.get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.extra.is_empty()
    }

    /// Open key/value view, with the typed duration under [`DURATION_META_KEY`].
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.extra.clone();
        if let Some(duration) = self.duration {
            map.insert(
                DURATION_META_KEY.to_string(),
                Value::String(format_duration(duration)),
            );
        }
        map
    }
}

impl Serialize for ReportMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.to_map();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in &map {
            out.serialize_entry(key, value)?;
        }
        out.end()
    }
}

/// Formats a duration for humans: `850µs`, `312ms`, `1.27s`, `2m05s`.
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{micros}µs")
    } else if micros < 1_000_000 {
        format!("{}ms", duration.as_millis())
    } else if duration.as_secs() < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}
