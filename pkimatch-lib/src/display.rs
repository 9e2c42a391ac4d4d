//! Result projection: rendering relationship maps as a table, JSON or YAML.

use crate::relationship::RelationshipResult;
use crate::PkiMatchError;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Output format selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// The renderer for this format.
    pub fn renderer(self) -> Box<dyn Renderer> {
        match self {
            OutputFormat::Table => Box::new(TableRenderer),
            OutputFormat::Json => Box::new(JsonRenderer),
            OutputFormat::Yaml => Box::new(YamlRenderer),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!(
                "unknown output format '{}' (expected table, json or yaml)",
                other
            )),
        }
    }
}

/// Renders result maps. Keys are emitted in sorted order.
pub trait Renderer {
    /// Render a flat name/path to boolean map. `key_header` and
    /// `value_header` label the columns where the format has columns.
    fn render_flags(
        &self,
        flags: &BTreeMap<String, bool>,
        key_header: &str,
        value_header: &str,
    ) -> Result<String, PkiMatchError>;

    /// Render the full relationship facts for each candidate path.
    fn render_details(
        &self,
        details: &BTreeMap<String, RelationshipResult>,
    ) -> Result<String, PkiMatchError>;
}

struct TableRenderer;

impl Renderer for TableRenderer {
    fn render_flags(
        &self,
        flags: &BTreeMap<String, bool>,
        key_header: &str,
        value_header: &str,
    ) -> Result<String, PkiMatchError> {
        let width = flags
            .keys()
            .map(String::len)
            .chain(std::iter::once(key_header.len()))
            .max()
            .unwrap_or_default();

        let mut out = String::new();
        out.push_str(&format!("{:<width$}  {}\n", key_header, value_header));
        out.push_str(&format!(
            "{:<width$}  {}\n",
            "-".repeat(key_header.len()),
            "-".repeat(value_header.len())
        ));
        for (key, value) in flags {
            out.push_str(&format!("{:<width$}  {}\n", key, value));
        }
        Ok(out)
    }

    fn render_details(
        &self,
        details: &BTreeMap<String, RelationshipResult>,
    ) -> Result<String, PkiMatchError> {
        let width = details
            .keys()
            .map(String::len)
            .chain(std::iter::once("Path".len()))
            .max()
            .unwrap_or_default();
        let names: Vec<&str> = crate::Relationship::ALL
            .iter()
            .map(|r| r.as_str())
            .collect();

        let mut out = String::new();
        out.push_str(&format!("{:<width$}", "Path"));
        for name in &names {
            out.push_str(&format!("  {}", name));
        }
        out.push('\n');
        for (path, result) in details {
            out.push_str(&format!("{:<width$}", path));
            for ((_, value), name) in result.iter().zip(&names) {
                out.push_str(&format!("  {:<w$}", value, w = name.len()));
            }
            // Trailing padding on the last column is noise.
            let trimmed = out.trim_end_matches(' ').len();
            out.truncate(trimmed);
            out.push('\n');
        }
        Ok(out)
    }
}

struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_flags(
        &self,
        flags: &BTreeMap<String, bool>,
        _key_header: &str,
        _value_header: &str,
    ) -> Result<String, PkiMatchError> {
        Ok(serde_json::to_string_pretty(flags)? + "\n")
    }

    fn render_details(
        &self,
        details: &BTreeMap<String, RelationshipResult>,
    ) -> Result<String, PkiMatchError> {
        Ok(serde_json::to_string_pretty(details)? + "\n")
    }
}

struct YamlRenderer;

impl Renderer for YamlRenderer {
    fn render_flags(
        &self,
        flags: &BTreeMap<String, bool>,
        _key_header: &str,
        _value_header: &str,
    ) -> Result<String, PkiMatchError> {
        Ok(serde_yaml::to_string(flags)?)
    }

    fn render_details(
        &self,
        details: &BTreeMap<String, RelationshipResult>,
    ) -> Result<String, PkiMatchError> {
        Ok(serde_yaml::to_string(details)?)
    }
}
