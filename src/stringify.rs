//! Reverse transform: `DynamicSegment` back to segment definition text.
//!
//! The user bucket is always written before the session bucket, so the text
//! comes out in canonical scope order regardless of how it was first written.

use crate::ast::{SegmentKind, SegmentScope, StepRelation};
use crate::lexer::{escape_list_item, escape_value, has_dangling_escape};
use crate::schema::{
    ClauseFilter, DimensionFilter, DimensionOperator, DynamicSegment, FilterClause, MatchType,
    MetricFilter, MetricFilterScope, MetricOperator, OrGroup, SegmentDefinition, SegmentFilter,
    SegmentFilterKind, SequenceSegment, SimpleSegment,
};
use crate::token::Operator;
use crate::transform::{TransformError, LIST_SEPARATOR, RANGE_SEPARATOR};

pub fn stringify_dynamic_segment(segment: &DynamicSegment) -> Result<String, TransformError> {
    let buckets = [
        (SegmentScope::User, &segment.user_segment),
        (SegmentScope::Session, &segment.session_segment),
    ];

    let mut parts = Vec::with_capacity(2);
    for (scope, definition) in buckets {
        if let Some(definition) = definition {
            parts.push(format!(
                "{}{}",
                scope.as_str(),
                stringify_segment_definition(definition)?
            ));
        }
    }

    if parts.is_empty() {
        return Err(TransformError::EmptySegment);
    }
    Ok(parts.join(";"))
}

pub fn stringify_segment_definition(definition: &SegmentDefinition) -> Result<String, TransformError> {
    join_with(&definition.segment_filters, ";", stringify_segment_filter)
}

pub fn stringify_segment_filter(filter: &SegmentFilter) -> Result<String, TransformError> {
    let not = if filter.not { "!" } else { "" };
    match &filter.kind {
        SegmentFilterKind::SimpleSegment(simple) => Ok(format!(
            "{}{}{}",
            SegmentKind::Condition.as_str(),
            not,
            stringify_simple_segment(simple)?
        )),
        SegmentFilterKind::SequenceSegment(sequence) => Ok(format!(
            "{}{}{}",
            SegmentKind::Sequence.as_str(),
            not,
            stringify_sequence_segment(sequence)?
        )),
    }
}

pub fn stringify_simple_segment(simple: &SimpleSegment) -> Result<String, TransformError> {
    stringify_or_groups(&simple.or_filters_for_segment)
}

/// Step separators come from each step's own match type; the first step
/// has none.
pub fn stringify_sequence_segment(sequence: &SequenceSegment) -> Result<String, TransformError> {
    let mut out = String::new();
    if sequence.first_step_should_match_first_hit {
        out.push('^');
    }
    for (i, step) in sequence.segment_sequence_steps.iter().enumerate() {
        if i > 0 {
            out.push_str(step_relation(step.match_type).as_str());
        }
        out.push_str(&stringify_or_groups(&step.or_filters_for_segment)?);
    }
    Ok(out)
}

fn step_relation(match_type: MatchType) -> StepRelation {
    match match_type {
        MatchType::ImmediatelyPrecedes => StepRelation::ImmediatelyPrecedes,
        MatchType::Precedes | MatchType::UnspecifiedMatchType => StepRelation::Precedes,
    }
}

fn stringify_or_groups(groups: &[OrGroup]) -> Result<String, TransformError> {
    let mut outer = Vec::with_capacity(groups.len());
    for group in groups {
        if group.segment_filter_clauses.is_empty() {
            continue;
        }
        outer.push(join_with(&group.segment_filter_clauses, ",", stringify_filter_clause)?);
    }
    Ok(outer.join(";"))
}

/// Fails on a value ending in a lone backslash, which would swallow the
/// separator written after it.
pub fn stringify_filter_clause(clause: &FilterClause) -> Result<String, TransformError> {
    let text = match &clause.filter {
        ClauseFilter::DimensionFilter(filter) => stringify_dimension_filter(filter, clause.not)?,
        ClauseFilter::MetricFilter(filter) => stringify_metric_filter(filter, clause.not)?,
    };
    if has_dangling_escape(&text) {
        return Err(TransformError::DanglingEscape(text));
    }
    Ok(text)
}

fn expression(prefix: &str, name: &str, operator: Operator, value: &str) -> String {
    format!("{prefix}{name}{operator}{}", escape_value(value))
}

fn pick(not: bool, positive: Operator, negative: Operator) -> Operator {
    if not {
        negative
    } else {
        positive
    }
}

pub fn stringify_dimension_filter(filter: &DimensionFilter, not: bool) -> Result<String, TransformError> {
    let name = filter.dimension_name.as_str();
    let first = || {
        filter
            .expressions
            .first()
            .map(String::as_str)
            .ok_or_else(|| TransformError::MissingExpressions(name.to_string()))
    };

    let text = match filter.operator {
        DimensionOperator::OperatorUnspecified | DimensionOperator::Regexp => {
            expression("", name, pick(not, Operator::Regexp, Operator::NotRegexp), first()?)
        }
        DimensionOperator::BeginsWith => expression(
            "",
            name,
            pick(not, Operator::Regexp, Operator::NotRegexp),
            &format!("^{}", first()?),
        ),
        DimensionOperator::EndsWith => expression(
            "",
            name,
            pick(not, Operator::Regexp, Operator::NotRegexp),
            &format!("{}$", first()?),
        ),
        DimensionOperator::Partial => expression(
            "",
            name,
            pick(not, Operator::ContainsSubstring, Operator::NotContainsSubstring),
            first()?,
        ),
        DimensionOperator::Exact | DimensionOperator::NumericEquals => {
            expression("", name, pick(not, Operator::Equal, Operator::NotEqual), first()?)
        }
        DimensionOperator::InList => {
            if not {
                return Err(negation_error(filter.operator.as_str()));
            }
            first()?;
            let items: Vec<String> = filter
                .expressions
                .iter()
                .map(|item| escape_list_item(item, LIST_SEPARATOR))
                .collect();
            expression("", name, Operator::InList, &items.join("|"))
        }
        DimensionOperator::NumericLessThan => expression(
            "",
            name,
            pick(not, Operator::LessThan, Operator::GreaterThanEqual),
            first()?,
        ),
        DimensionOperator::NumericGreaterThan => expression(
            "",
            name,
            pick(not, Operator::GreaterThan, Operator::LessThanEqual),
            first()?,
        ),
        DimensionOperator::NumericBetween => {
            if not {
                return Err(negation_error(filter.operator.as_str()));
            }
            let value = format!(
                "{}{RANGE_SEPARATOR}{}",
                range_bound(filter, filter.min_comparison_value.as_deref(), 0)?,
                range_bound(filter, filter.max_comparison_value.as_deref(), 1)?,
            );
            expression("", name, Operator::Between, &value)
        }
    };
    Ok(text)
}

/// Between bounds live in min/max; older payloads put them in `expressions`.
fn range_bound<'f>(
    filter: &'f DimensionFilter,
    bound: Option<&'f str>,
    position: usize,
) -> Result<&'f str, TransformError> {
    bound
        .or_else(|| filter.expressions.get(position).map(String::as_str))
        .ok_or_else(|| TransformError::MissingExpressions(filter.dimension_name.clone()))
}

fn metric_scope_prefix(scope: MetricFilterScope) -> &'static str {
    match scope {
        MetricFilterScope::UnspecifiedScope => "",
        MetricFilterScope::Product => "perProduct::",
        MetricFilterScope::Hit => "perHit::",
        MetricFilterScope::Session => "perSession::",
        MetricFilterScope::User => "perUser::",
    }
}

pub fn stringify_metric_filter(filter: &MetricFilter, not: bool) -> Result<String, TransformError> {
    let prefix = metric_scope_prefix(filter.scope);
    let name = filter.metric_name.as_str();
    let value = filter.comparison_value.as_str();

    let text = match filter.operator {
        MetricOperator::UnspecifiedOperator | MetricOperator::Equal => {
            expression(prefix, name, pick(not, Operator::Equal, Operator::NotEqual), value)
        }
        MetricOperator::LessThan => expression(
            prefix,
            name,
            pick(not, Operator::LessThan, Operator::GreaterThanEqual),
            value,
        ),
        MetricOperator::GreaterThan => expression(
            prefix,
            name,
            pick(not, Operator::GreaterThan, Operator::LessThanEqual),
            value,
        ),
        MetricOperator::Between => {
            if not {
                return Err(negation_error(filter.operator.as_str()));
            }
            let max = filter.max_comparison_value.as_deref().ok_or_else(|| {
                TransformError::MalformedBetween {
                    target: name.to_string(),
                    value: value.to_string(),
                }
            })?;
            expression(
                prefix,
                name,
                Operator::Between,
                &format!("{value}{RANGE_SEPARATOR}{max}"),
            )
        }
    };
    Ok(text)
}

fn negation_error(operator: &str) -> TransformError {
    TransformError::UnsupportedNegation {
        operator: operator.to_string(),
    }
}

fn join_with<T>(
    items: &[T],
    separator: &str,
    render: impl Fn(&T) -> Result<String, TransformError>,
) -> Result<String, TransformError> {
    let rendered = items.iter().map(render).collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(separator))
}

impl DynamicSegment {
    /// Segment definition text for this dynamic segment.
    pub fn to_definition(&self) -> Result<String, TransformError> {
        stringify_dynamic_segment(self)
    }
}
