//! Parser, canonical printer and reporting-API transforms for segment
//! definitions such as
//! `users::condition::perUser::ga:sessions>10;sessions::sequence::^ga:medium==cpc;->>ga:hits>2`.

pub mod ast;
pub mod classifier;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod stringify;
pub mod token;
pub mod transform;
pub mod validation;

use thiserror::Error;

pub use ast::Segments;
pub use classifier::{ClassificationError, Classifier};
pub use config::{ColumnCatalog, ConfigError};
pub use parser::{parse, ParseError};
pub use schema::DynamicSegment;
pub use stringify::stringify_dynamic_segment;
pub use transform::{SegmentTransformer, TransformConfig, TransformError};
pub use validation::{Validate, ValidationError};

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("invalid segment: {0}")]
    Validation(#[from] ValidationError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses `definition` and prints it back in canonical form.
pub fn canonicalize(definition: &str) -> Result<String, SegmentError> {
    Ok(parse(definition)?.to_string())
}

/// Parses `definition` and transforms it with the process-wide classifier.
pub fn transform(definition: &str, config: TransformConfig) -> Result<DynamicSegment, SegmentError> {
    transform_with(definition, Classifier::shared()?, config)
}

/// Like [`transform`], with the identifiers looked up in `classifier`.
pub fn transform_with(
    definition: &str,
    classifier: &Classifier,
    config: TransformConfig,
) -> Result<DynamicSegment, SegmentError> {
    let segments = parse(definition)?;
    Ok(SegmentTransformer::with_config(classifier, config).transform(&segments)?)
}

/// Reads a `DynamicSegment` JSON document and writes it as a definition.
pub fn reverse_json(json: &str) -> Result<String, SegmentError> {
    let segment: DynamicSegment = serde_json::from_str(json)?;
    Ok(segment.to_definition()?)
}
