//! Column catalog: dimension and metric metadata loaded from JSON.
//!
//! The document has the shape of the reporting API's metadata listing:
//!
//! ```json
//! { "items": [ { "id": "ga:goalXXStarts",
//!                "attributes": { "type": "METRIC", "dataType": "INTEGER",
//!                                "minTemplateIndex": "1", "maxTemplateIndex": "20" } } ] }
//! ```
//!
//! Ids containing `XX` are templates that stand for a whole family of columns.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const BUNDLED_COLUMNS: &str = include_str!("../data/columns.json");
const TEMPLATE_MARKER: &str = "XX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("column file does not exist: {0}")]
    NotFound(String),
    #[error("cannot read column file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse column JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid column template {id}: {source}")]
    Template {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// Whether an identifier names a dimension or a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Dimension,
    Metric,
    Unknown,
}

impl ColumnType {
    fn from_attribute(value: &str) -> Self {
        match value {
            "DIMENSION" => ColumnType::Dimension,
            "METRIC" => ColumnType::Metric,
            _ => ColumnType::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawColumns {
    #[serde(default)]
    items: Vec<RawColumn>,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    id: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAttributes {
    pub id: String,
    pub column_type: ColumnType,
    pub data_type: String,
    pub group: String,
    pub status: String,
    pub ui_name: String,
    pub description: String,
    pub replaced_by: Option<String>,
    pub min_template_index: u32,
    pub max_template_index: u32,
    pub allowed_in_segments: bool,
}

impl ColumnAttributes {
    fn from_raw(raw: RawColumn) -> Self {
        let mut attributes = raw.attributes;
        let mut take = |key: &str| attributes.remove(key).unwrap_or_default();
        let index = |value: String| -> u32 { value.parse().unwrap_or(0) };

        Self {
            column_type: ColumnType::from_attribute(&take("type")),
            data_type: take("dataType"),
            group: take("group"),
            status: take("status"),
            ui_name: take("uiName"),
            description: take("description"),
            replaced_by: Some(take("replacedBy")).filter(|s| !s.is_empty()),
            min_template_index: index(take("minTemplateIndex")),
            max_template_index: index(take("maxTemplateIndex")),
            allowed_in_segments: take("allowedInSegments") == "true",
            id: raw.id,
        }
    }

    pub fn is_template(&self) -> bool {
        self.id.contains(TEMPLATE_MARKER)
    }
}

#[derive(Debug)]
struct Template {
    pattern: Regex,
    column: usize,
}

impl Template {
    fn compile(id: &str, column: usize) -> Result<Self, ConfigError> {
        let body = regex::escape(id).replacen(TEMPLATE_MARKER, r"(\d+)", 1);
        let pattern = Regex::new(&format!("^{body}$")).map_err(|source| ConfigError::Template {
            id: id.to_string(),
            source,
        })?;
        Ok(Self { pattern, column })
    }

    /// The index has no leading zero and lies within `[min, max]`.
    fn matches(&self, name: &str, attributes: &ColumnAttributes) -> bool {
        let Some(digits) = self.pattern.captures(name).and_then(|c| c.get(1)) else {
            return false;
        };
        let digits = digits.as_str();
        if digits.starts_with('0') {
            return false;
        }
        match digits.parse::<u32>() {
            Ok(index) => {
                index >= attributes.min_template_index && index <= attributes.max_template_index
            }
            Err(_) => false,
        }
    }
}

/// Every known dimension and metric.
#[derive(Debug)]
pub struct ColumnCatalog {
    columns: Vec<ColumnAttributes>,
    by_id: HashMap<String, usize>,
    templates: Vec<Template>,
}

impl ColumnCatalog {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawColumns = serde_json::from_str(content)?;

        let mut columns = Vec::with_capacity(raw.items.len());
        let mut by_id = HashMap::new();
        let mut templates = Vec::new();

        for item in raw.items {
            let column = ColumnAttributes::from_raw(item);
            let index = columns.len();
            if column.is_template() {
                templates.push(Template::compile(&column.id, index)?);
            } else {
                by_id.insert(column.id.clone(), index);
            }
            columns.push(column);
        }

        info!(
            columns = columns.len(),
            templates = templates.len(),
            "loaded column catalog"
        );
        Ok(Self {
            columns,
            by_id,
            templates,
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.display().to_string()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;

        Self::from_json_str(&content)
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json_str(BUNDLED_COLUMNS)
    }

    /// Exact id first, then the templates in catalog order. A template id
    /// such as `ga:goalXXStarts` is not a column name itself.
    pub fn lookup(&self, name: &str) -> Option<&ColumnAttributes> {
        if let Some(&index) = self.by_id.get(name) {
            return Some(&self.columns[index]);
        }
        self.templates
            .iter()
            .map(|template| (template, &self.columns[template.column]))
            .find(|(template, column)| template.matches(name, column))
            .map(|(_, column)| column)
    }

    pub fn columns(&self) -> &[ColumnAttributes] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL: &str = r#"{
        "items": [
            { "id": "ga:medium", "attributes": { "type": "DIMENSION", "dataType": "STRING", "allowedInSegments": "true" } },
            { "id": "ga:goalXXStarts", "attributes": { "type": "METRIC", "dataType": "INTEGER",
              "minTemplateIndex": "1", "maxTemplateIndex": "20" } },
            { "id": "ga:oldThing", "attributes": { "type": "DIMENSION", "status": "DEPRECATED", "replacedBy": "ga:newThing" } }
        ]
    }"#;

    #[test]
    fn test_exact_lookup() {
        let catalog = ColumnCatalog::from_json_str(SMALL).unwrap();
        assert_eq!(catalog.len(), 3);

        let medium = catalog.lookup("ga:medium").unwrap();
        assert_eq!(medium.column_type, ColumnType::Dimension);
        assert_eq!(medium.data_type, "STRING");
        assert!(medium.allowed_in_segments);
        assert_eq!(medium.replaced_by, None);

        let old = catalog.lookup("ga:oldThing").unwrap();
        assert_eq!(old.replaced_by.as_deref(), Some("ga:newThing"));
        assert_eq!(old.status, "DEPRECATED");

        assert!(catalog.lookup("ga:nothing").is_none());
    }

    #[test]
    fn test_template_lookup() {
        let catalog = ColumnCatalog::from_json_str(SMALL).unwrap();
        let cases = [
            ("ga:goal12Starts", true),
            ("ga:goal1Starts", true),
            ("ga:goal20Starts", true),
            ("ga:goal0Starts", false),
            ("ga:goal02Starts", false),
            ("ga:goal21Starts", false),
            ("ga:goalStarts", false),
            ("ga:goal1StartsX", false),
            ("xga:goal1Starts", false),
            ("ga:goalXXStarts", false),
        ];
        for (name, found) in cases {
            assert_eq!(catalog.lookup(name).is_some(), found, "{name}");
        }
        assert_eq!(
            catalog.lookup("ga:goal3Starts").unwrap().column_type,
            ColumnType::Metric
        );
    }

    #[test]
    fn test_bundled_catalog() {
        let catalog = ColumnCatalog::bundled().unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(
            catalog.lookup("ga:sessionCount").unwrap().column_type,
            ColumnType::Dimension
        );
        assert_eq!(
            catalog.lookup("ga:goal4Completions").unwrap().column_type,
            ColumnType::Metric
        );
        assert_eq!(
            catalog.lookup("ga:dimension3").unwrap().column_type,
            ColumnType::Dimension
        );
        assert!(catalog.lookup("session2").is_none());
        assert!(catalog.lookup("ga:dimensionXX").is_none());

        for name in [
            "ga:campaign",
            "ga:keyword",
            "ga:city",
            "ga:pageTitle",
            "ga:adContent",
            "ga:hostname",
        ] {
            assert_eq!(
                catalog.lookup(name).map(|c| c.column_type),
                Some(ColumnType::Dimension),
                "{name}"
            );
        }
        assert_eq!(
            catalog.lookup("ga:visits").unwrap().replaced_by.as_deref(),
            Some("ga:sessions")
        );
    }

    #[test]
    fn test_load_valid_json_file() {
        let temp_file = std::env::temp_dir().join("segment_dsl_test_columns.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        write!(file, "{SMALL}").unwrap();

        let catalog = ColumnCatalog::from_json_file(&temp_file).unwrap();
        assert!(catalog.lookup("ga:goal5Starts").is_some());

        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_invalid_json() {
        let result = ColumnCatalog::from_json_str("invalid json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ColumnCatalog::from_json_file("non_existent_columns.json");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
