//! Forward transform: segment AST to the reporting API's `DynamicSegment`.
//!
//! Every expression is classified as a dimension or a metric first, because
//! the two filter kinds have different operator sets:
//!
//! | DSL   | dimension                | metric             |
//! |-------|--------------------------|--------------------|
//! | `==`  | EXACT                    | EQUAL              |
//! | `!=`  | not EXACT                | not EQUAL          |
//! | `<`   | NUMERIC_LESS_THAN        | LESS_THAN          |
//! | `<=`  | not NUMERIC_GREATER_THAN | not GREATER_THAN   |
//! | `>`   | NUMERIC_GREATER_THAN     | GREATER_THAN       |
//! | `>=`  | not NUMERIC_LESS_THAN    | not LESS_THAN      |
//! | `<>`  | NUMERIC_BETWEEN          | BETWEEN            |
//! | `[]`  | IN_LIST                  |                    |
//! | `![]` | not IN_LIST              |                    |
//! | `=@`  | PARTIAL                  |                    |
//! | `!@`  | not PARTIAL              |                    |
//! | `=~`  | REGEXP                   |                    |
//! | `!~`  | not REGEXP               |                    |
//!
//! `!<>` has no representation on either side.

use thiserror::Error;
use tracing::debug;

use crate::ast::{
    AndExpression, Condition, Expression, OrExpression, Segment, SegmentBody, SegmentScope,
    Segments, Sequence, SequenceStep,
};
use crate::classifier::{ClassificationError, Classifier};
use crate::config::ColumnType;
use crate::lexer::{split_escaped_list, split_once_unescaped};
use crate::schema::{
    ClauseFilter, DimensionFilter, DimensionOperator, DynamicSegment, FilterClause, MatchType,
    MetricFilter, MetricFilterScope, MetricOperator, OrGroup, SegmentDefinition, SegmentFilter,
    SegmentFilterKind, SegmentSequenceStep, SequenceSegment, SimpleSegment,
};
use crate::token::{MetricScope, Operator, StepRelation};
use crate::validation::{Validate, ValidationError};

pub const LIST_SEPARATOR: char = '|';
pub const RANGE_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("operator {operator} is not supported on {column} {target}")]
    UnsupportedOperator {
        operator: String,
        column: &'static str,
        target: String,
    },
    #[error("{operator} cannot be negated")]
    UnsupportedNegation { operator: String },
    #[error("between value of {target} must look like min_max, got {value:?}")]
    MalformedBetween { target: String, value: String },
    #[error("{0} is neither a dimension nor a metric")]
    AmbiguousTarget(String),
    #[error("dimension filter on {0} has no expressions")]
    MissingExpressions(String),
    #[error("dynamic segment has neither a user nor a session segment")]
    EmptySegment,
    #[error("value ends in a dangling escape: {0}")]
    DanglingEscape(String),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Options for the forward transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// `name` of the produced dynamic segment.
    pub segment_name: String,
    /// Check value lengths before transforming.
    pub validate: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            segment_name: "-".to_string(),
            validate: false,
        }
    }
}

/// Converts parsed segments into a `DynamicSegment`.
pub struct SegmentTransformer<'a> {
    classifier: &'a Classifier,
    config: TransformConfig,
}

impl<'a> SegmentTransformer<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self {
            classifier,
            config: TransformConfig::default(),
        }
    }

    pub fn with_config(classifier: &'a Classifier, config: TransformConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Routes each segment into the user or session definition, keeping order.
    pub fn transform(&self, segments: &Segments) -> Result<DynamicSegment, TransformError> {
        if self.config.validate {
            segments.validate()?;
        }

        let mut user_filters = Vec::new();
        let mut session_filters = Vec::new();
        for segment in segments {
            let filter = self.transform_filter(segment)?;
            match segment.scope {
                SegmentScope::User => user_filters.push(filter),
                SegmentScope::Session => session_filters.push(filter),
            }
        }

        debug!(
            user_filters = user_filters.len(),
            session_filters = session_filters.len(),
            classified = self.classifier.cached_len(),
            "transformed segment definition"
        );
        Ok(DynamicSegment {
            name: self.config.segment_name.clone(),
            user_segment: definition(user_filters),
            session_segment: definition(session_filters),
        })
    }

    pub fn transform_segment(&self, segment: &Segment) -> Result<DynamicSegment, TransformError> {
        if self.config.validate {
            segment.validate()?;
        }

        let filter = Some(SegmentDefinition {
            segment_filters: vec![self.transform_filter(segment)?],
        });
        let (user_segment, session_segment) = match segment.scope {
            SegmentScope::User => (filter, None),
            SegmentScope::Session => (None, filter),
        };
        Ok(DynamicSegment {
            name: self.config.segment_name.clone(),
            user_segment,
            session_segment,
        })
    }

    fn transform_filter(&self, segment: &Segment) -> Result<SegmentFilter, TransformError> {
        match &segment.body {
            SegmentBody::Condition(condition) => self.transform_condition(condition),
            SegmentBody::Sequence(sequence) => self.transform_sequence(sequence),
        }
    }

    fn transform_condition(&self, condition: &Condition) -> Result<SegmentFilter, TransformError> {
        Ok(SegmentFilter {
            not: condition.exclude,
            kind: SegmentFilterKind::SimpleSegment(SimpleSegment {
                or_filters_for_segment: self.transform_and_expression(&condition.and_expression)?,
            }),
        })
    }

    fn transform_sequence(&self, sequence: &Sequence) -> Result<SegmentFilter, TransformError> {
        let steps = sequence
            .steps
            .iter()
            .map(|step| self.transform_step(step))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SegmentFilter {
            not: sequence.negate,
            kind: SegmentFilterKind::SequenceSegment(SequenceSegment {
                segment_sequence_steps: steps,
                first_step_should_match_first_hit: sequence.first_hit_matches_first_step,
            }),
        })
    }

    fn transform_step(&self, step: &SequenceStep) -> Result<SegmentSequenceStep, TransformError> {
        let match_type = match step.relation {
            None => MatchType::UnspecifiedMatchType,
            Some(StepRelation::Precedes) => MatchType::Precedes,
            Some(StepRelation::ImmediatelyPrecedes) => MatchType::ImmediatelyPrecedes,
        };
        Ok(SegmentSequenceStep {
            match_type,
            or_filters_for_segment: self.transform_and_expression(&step.and_expression)?,
        })
    }

    fn transform_and_expression(&self, and: &AndExpression) -> Result<Vec<OrGroup>, TransformError> {
        and.0.iter().map(|or| self.transform_or_expression(or)).collect()
    }

    fn transform_or_expression(&self, or: &OrExpression) -> Result<OrGroup, TransformError> {
        let clauses = or
            .0
            .iter()
            .map(|expression| self.transform_expression(expression))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OrGroup {
            segment_filter_clauses: clauses,
        })
    }

    fn transform_expression(&self, expression: &Expression) -> Result<FilterClause, TransformError> {
        let classification = self.classifier.classify(expression.target.as_str())?;
        match classification.column_type {
            ColumnType::Dimension => dimension_clause(expression),
            ColumnType::Metric => metric_clause(expression),
            ColumnType::Unknown => Err(TransformError::AmbiguousTarget(expression.target.to_string())),
        }
    }
}

fn definition(filters: Vec<SegmentFilter>) -> Option<SegmentDefinition> {
    (!filters.is_empty()).then_some(SegmentDefinition {
        segment_filters: filters,
    })
}

fn dimension_operator(operator: Operator) -> Result<(DimensionOperator, bool), TransformError> {
    let mapped = match operator {
        Operator::Equal => (DimensionOperator::Exact, false),
        Operator::NotEqual => (DimensionOperator::Exact, true),
        Operator::LessThan => (DimensionOperator::NumericLessThan, false),
        // x <= y  ==  !(x > y)
        Operator::LessThanEqual => (DimensionOperator::NumericGreaterThan, true),
        Operator::GreaterThan => (DimensionOperator::NumericGreaterThan, false),
        // x >= y  ==  !(x < y)
        Operator::GreaterThanEqual => (DimensionOperator::NumericLessThan, true),
        Operator::Between => (DimensionOperator::NumericBetween, false),
        Operator::NotBetween => {
            return Err(TransformError::UnsupportedNegation {
                operator: DimensionOperator::NumericBetween.as_str().to_string(),
            })
        }
        Operator::InList => (DimensionOperator::InList, false),
        Operator::NotInList => (DimensionOperator::InList, true),
        Operator::ContainsSubstring => (DimensionOperator::Partial, false),
        Operator::NotContainsSubstring => (DimensionOperator::Partial, true),
        Operator::Regexp => (DimensionOperator::Regexp, false),
        Operator::NotRegexp => (DimensionOperator::Regexp, true),
    };
    Ok(mapped)
}

fn metric_operator(expression: &Expression) -> Result<(MetricOperator, bool), TransformError> {
    let mapped = match expression.operator {
        Operator::Equal => (MetricOperator::Equal, false),
        Operator::NotEqual => (MetricOperator::Equal, true),
        Operator::LessThan => (MetricOperator::LessThan, false),
        Operator::LessThanEqual => (MetricOperator::GreaterThan, true),
        Operator::GreaterThan => (MetricOperator::GreaterThan, false),
        Operator::GreaterThanEqual => (MetricOperator::LessThan, true),
        Operator::Between => (MetricOperator::Between, false),
        Operator::NotBetween => {
            return Err(TransformError::UnsupportedNegation {
                operator: MetricOperator::Between.as_str().to_string(),
            })
        }
        other => {
            return Err(TransformError::UnsupportedOperator {
                operator: other.to_string(),
                column: "metric",
                target: expression.target.to_string(),
            })
        }
    };
    Ok(mapped)
}

fn metric_scope(scope: MetricScope) -> MetricFilterScope {
    match scope {
        MetricScope::Default => MetricFilterScope::UnspecifiedScope,
        MetricScope::PerHit => MetricFilterScope::Hit,
        MetricScope::PerSession => MetricFilterScope::Session,
        MetricScope::PerUser => MetricFilterScope::User,
    }
}

/// `min_max`, split on the first unescaped `_`.
fn split_range(expression: &Expression) -> Result<(String, String), TransformError> {
    split_once_unescaped(&expression.value, RANGE_SEPARATOR)
        .map(|(min, max)| (min.to_string(), max.to_string()))
        .ok_or_else(|| TransformError::MalformedBetween {
            target: expression.target.to_string(),
            value: expression.value.clone(),
        })
}

fn dimension_clause(expression: &Expression) -> Result<FilterClause, TransformError> {
    let (operator, not) = dimension_operator(expression.operator)?;
    let mut filter = DimensionFilter {
        dimension_name: expression.target.to_string(),
        operator,
        ..Default::default()
    };

    match operator {
        DimensionOperator::NumericBetween => {
            let (min, max) = split_range(expression)?;
            filter.min_comparison_value = Some(min);
            filter.max_comparison_value = Some(max);
        }
        DimensionOperator::InList => {
            filter.expressions = split_escaped_list(&expression.value, LIST_SEPARATOR);
        }
        _ => filter.expressions = vec![expression.value.clone()],
    }

    Ok(FilterClause {
        not,
        filter: ClauseFilter::DimensionFilter(filter),
    })
}

fn metric_clause(expression: &Expression) -> Result<FilterClause, TransformError> {
    let (operator, not) = metric_operator(expression)?;
    let mut filter = MetricFilter {
        metric_name: expression.target.to_string(),
        operator,
        scope: metric_scope(expression.metric_scope),
        ..Default::default()
    };

    if operator == MetricOperator::Between {
        let (min, max) = split_range(expression)?;
        filter.comparison_value = min;
        filter.max_comparison_value = Some(max);
    } else {
        filter.comparison_value = expression.value.clone();
    }

    Ok(FilterClause {
        not,
        filter: ClauseFilter::MetricFilter(filter),
    })
}
