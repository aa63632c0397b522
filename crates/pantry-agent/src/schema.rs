use lazy_static::lazy_static;
use serde_json::{Map, Number, Value};

use crate::models::tool::Tool;

/// A known value for a catalog-backed argument such as a storage location
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn new<I: Into<String>, L: Into<String>>(id: I, label: L, aliases: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn matches(&self, folded: &str) -> bool {
        fold(&self.id) == folded
            || fold(&self.label) == folded
            || self.aliases.iter().any(|alias| fold(alias) == folded)
    }
}

lazy_static! {
    static ref DEFAULT_LOCATIONS: Vec<CatalogEntry> = vec![
        CatalogEntry::new("pantry", "Pantry", &["cupboard", "cabinet", "larder"]),
        CatalogEntry::new("fridge", "Fridge", &["refrigerator", "cooler"]),
        CatalogEntry::new("freezer", "Freezer", &["deep freeze"]),
    ];
}

/// Known locations and categories used to normalize free-form arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub locations: Vec<CatalogEntry>,
    pub categories: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            locations: DEFAULT_LOCATIONS.clone(),
            categories: Vec::new(),
        }
    }
}

impl Catalog {
    pub fn new(locations: Vec<CatalogEntry>, categories: Vec<CatalogEntry>) -> Self {
        Self {
            locations,
            categories,
        }
    }

    fn entries_for(&self, key: &str) -> Option<&[CatalogEntry]> {
        if key.to_lowercase().contains("location") {
            Some(&self.locations)
        } else if key == "category" || key == "categoryId" {
            Some(&self.categories)
        } else {
            None
        }
    }

    /// Map a free-form value onto a catalog id, or hand it back trimmed
    fn normalize(entries: &[CatalogEntry], raw: &str) -> String {
        let folded = fold(raw);
        entries
            .iter()
            .find(|entry| entry.matches(&folded))
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

fn fold(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coerce every argument to its declared type. Tools without a schema still
/// get generic string trimming.
pub fn sanitize_arguments(
    tool: Option<&Tool>,
    arguments: Map<String, Value>,
    catalog: &Catalog,
) -> Map<String, Value> {
    arguments
        .into_iter()
        .map(|(key, value)| {
            let declared = tool.and_then(|t| t.property_type(&key));
            let mut value = coerce(declared, value);
            if let Some(entries) = catalog.entries_for(&key) {
                value = normalize_catalog_value(entries, value);
            }
            (key, value)
        })
        .collect()
}

fn coerce(declared: Option<&str>, value: Value) -> Value {
    match (declared, value) {
        (Some("string"), Value::String(s)) => Value::String(s.trim().to_string()),
        (Some("string"), Value::Number(n)) => Value::String(n.to_string()),
        (Some("string"), Value::Bool(b)) => Value::String(b.to_string()),
        (Some("number") | Some("integer"), Value::Number(n)) => Value::Number(n),
        (Some("number") | Some("integer"), Value::String(s)) => parse_number(&s),
        (Some("number") | Some("integer"), _) => Value::Null,
        (Some("boolean"), Value::Bool(b)) => Value::Bool(b),
        (Some("boolean"), Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        },
        (Some("boolean"), _) => Value::Null,
        (Some("array"), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .filter(|item| !is_blank(item))
                .map(|item| coerce(None, item))
                .collect(),
        ),
        (_, Value::String(s)) => Value::String(s.trim().to_string()),
        (_, other) => other,
    }
}

/// Accepts comma decimals. Anything unparsable becomes null, which is how a
/// NaN travels in JSON.
fn parse_number(raw: &str) -> Value {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn normalize_catalog_value(entries: &[CatalogEntry], value: Value) -> Value {
    if entries.is_empty() {
        return value;
    }
    match value {
        Value::String(s) => Value::String(Catalog::normalize(entries, &s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_catalog_value(entries, item))
                .collect(),
        ),
        other => other,
    }
}

/// First required field that is missing or malformed, if any
pub fn first_invalid_required(tool: &Tool, arguments: &Map<String, Value>) -> Option<String> {
    tool.required()
        .into_iter()
        .find(|key| {
            let present = arguments
                .get(*key)
                .is_some_and(|value| is_well_formed(tool.property_type(key), value));
            !present
        })
        .map(str::to_string)
}

fn is_well_formed(declared: Option<&str>, value: &Value) -> bool {
    match declared {
        Some("string") => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        Some("number") | Some("integer") => value.as_f64().is_some_and(f64::is_finite),
        Some("boolean") => value.is_boolean(),
        Some("array") => value.as_array().is_some_and(|items| !items.is_empty()),
        _ => !value.is_null(),
    }
}
