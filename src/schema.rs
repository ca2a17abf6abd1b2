//! Wire types of the reporting API's dynamic segment.
//!
//! Field names follow the API's camelCase JSON. Unset optionals, `false`
//! flags, empty lists and unspecified enum values are left out when
//! serializing and default back in when deserializing.

use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSegment {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segment: Option<SegmentDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_segment: Option<SegmentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment_filters: Vec<SegmentFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFilter {
    #[serde(default, skip_serializing_if = "is_false")]
    pub not: bool,
    #[serde(flatten)]
    pub kind: SegmentFilterKind,
}

/// `simpleSegment` or `sequenceSegment`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentFilterKind {
    SimpleSegment(SimpleSegment),
    SequenceSegment(SequenceSegment),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleSegment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or_filters_for_segment: Vec<OrGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSegment {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment_sequence_steps: Vec<SegmentSequenceStep>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub first_step_should_match_first_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSequenceStep {
    #[serde(default, skip_serializing_if = "MatchType::is_unspecified")]
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or_filters_for_segment: Vec<OrGroup>,
}

/// Clauses OR-ed together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrGroup {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment_filter_clauses: Vec<FilterClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    #[serde(default, skip_serializing_if = "is_false")]
    pub not: bool,
    #[serde(flatten)]
    pub filter: ClauseFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClauseFilter {
    DimensionFilter(DimensionFilter),
    MetricFilter(MetricFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFilter {
    pub dimension_name: String,
    #[serde(default, skip_serializing_if = "DimensionOperator::is_unspecified")]
    pub operator: DimensionOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_comparison_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_comparison_value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFilter {
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "MetricOperator::is_unspecified")]
    pub operator: MetricOperator,
    #[serde(default, skip_serializing_if = "MetricFilterScope::is_unspecified")]
    pub scope: MetricFilterScope,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comparison_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_comparison_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionOperator {
    /// Treated as `REGEXP`.
    #[default]
    OperatorUnspecified,
    Regexp,
    BeginsWith,
    EndsWith,
    Partial,
    Exact,
    NumericEquals,
    InList,
    NumericLessThan,
    NumericGreaterThan,
    NumericBetween,
}

impl DimensionOperator {
    pub fn is_unspecified(&self) -> bool {
        *self == DimensionOperator::OperatorUnspecified
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DimensionOperator::OperatorUnspecified => "OPERATOR_UNSPECIFIED",
            DimensionOperator::Regexp => "REGEXP",
            DimensionOperator::BeginsWith => "BEGINS_WITH",
            DimensionOperator::EndsWith => "ENDS_WITH",
            DimensionOperator::Partial => "PARTIAL",
            DimensionOperator::Exact => "EXACT",
            DimensionOperator::NumericEquals => "NUMERIC_EQUALS",
            DimensionOperator::InList => "IN_LIST",
            DimensionOperator::NumericLessThan => "NUMERIC_LESS_THAN",
            DimensionOperator::NumericGreaterThan => "NUMERIC_GREATER_THAN",
            DimensionOperator::NumericBetween => "NUMERIC_BETWEEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricOperator {
    /// Treated as `EQUAL`.
    #[default]
    UnspecifiedOperator,
    LessThan,
    GreaterThan,
    Equal,
    Between,
}

impl MetricOperator {
    pub fn is_unspecified(&self) -> bool {
        *self == MetricOperator::UnspecifiedOperator
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricOperator::UnspecifiedOperator => "UNSPECIFIED_OPERATOR",
            MetricOperator::LessThan => "LESS_THAN",
            MetricOperator::GreaterThan => "GREATER_THAN",
            MetricOperator::Equal => "EQUAL",
            MetricOperator::Between => "BETWEEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricFilterScope {
    #[default]
    UnspecifiedScope,
    Product,
    Hit,
    Session,
    User,
}

impl MetricFilterScope {
    pub fn is_unspecified(&self) -> bool {
        *self == MetricFilterScope::UnspecifiedScope
    }
}

/// How a sequence step relates to the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Treated as `PRECEDES`.
    #[default]
    UnspecifiedMatchType,
    Precedes,
    ImmediatelyPrecedes,
}

impl MatchType {
    pub fn is_unspecified(&self) -> bool {
        *self == MatchType::UnspecifiedMatchType
    }
}
