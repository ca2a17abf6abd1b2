//! AST of a segment definition and its canonical printer.
//!
//! `Display` on every node writes the canonical DSL text. `Segments` groups
//! user-scoped segments before session-scoped ones (stable) and writes a scope
//! token only where the scope changes, so `print(parse(s)) == s` holds for
//! canonical input.

use std::fmt::{self, Display};

use crate::lexer::escape_value;
pub use crate::token::{MetricScope, Operator, SegmentKind, SegmentScope, StepRelation};

/// Root of the AST: one complete segment definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segments(pub Vec<Segment>);

impl Segments {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Segments in print order: user scope first, original order within a scope.
    pub fn sorted_by_scope(&self) -> Vec<&Segment> {
        let mut sorted: Vec<&Segment> = self.0.iter().collect();
        sorted.sort_by_key(|s| s.scope);
        sorted
    }
}

impl<'a> IntoIterator for &'a Segments {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One top-level filter unit, `users::condition::...` or `sessions::sequence::...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub scope: SegmentScope,
    pub body: SegmentBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentBody {
    Condition(Condition),
    Sequence(Sequence),
}

impl Segment {
    pub fn condition(scope: SegmentScope, condition: Condition) -> Self {
        Self {
            scope,
            body: SegmentBody::Condition(condition),
        }
    }

    pub fn sequence(scope: SegmentScope, sequence: Sequence) -> Self {
        Self {
            scope,
            body: SegmentBody::Sequence(sequence),
        }
    }

    pub fn kind(&self) -> SegmentKind {
        match self.body {
            SegmentBody::Condition(_) => SegmentKind::Condition,
            SegmentBody::Sequence(_) => SegmentKind::Sequence,
        }
    }

    fn fmt_without_scope(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().as_str())?;
        match &self.body {
            SegmentBody::Condition(condition) => condition.fmt(f),
            SegmentBody::Sequence(sequence) => sequence.fmt(f),
        }
    }
}

/// A simple (non-sequential) filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    pub exclude: bool,
    pub and_expression: AndExpression,
}

/// An ordered chain of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub negate: bool,
    pub first_hit_matches_first_step: bool,
    /// Never empty; only the first step has no relation.
    pub steps: Vec<SequenceStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStep {
    pub relation: Option<StepRelation>,
    pub and_expression: AndExpression,
}

/// Conjunction, written with `;`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AndExpression(pub Vec<OrExpression>);

/// Disjunction, written with `,`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrExpression(pub Vec<Expression>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Leaf comparison, e.g. `perUser::ga:sessions>10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub metric_scope: MetricScope,
    pub target: Identifier,
    pub operator: Operator,
    /// Unescaped value.
    pub value: String,
}

impl Expression {
    pub fn new(target: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            metric_scope: MetricScope::Default,
            target: Identifier(target.into()),
            operator,
            value: value.into(),
        }
    }

    pub fn with_metric_scope(mut self, metric_scope: MetricScope) -> Self {
        self.metric_scope = metric_scope;
        self
    }

    pub fn escaped_value(&self) -> String {
        escape_value(&self.value)
    }
}

fn write_joined<T: Display>(f: &mut fmt::Formatter<'_>, items: &[T], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        item.fmt(f)?;
    }
    Ok(())
}

impl Display for Segments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current_scope = None;
        for (i, segment) in self.sorted_by_scope().into_iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            if current_scope != Some(segment.scope) {
                f.write_str(segment.scope.as_str())?;
                current_scope = Some(segment.scope);
            }
            segment.fmt_without_scope(f)?;
        }
        Ok(())
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope.as_str())?;
        self.fmt_without_scope(f)
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exclude {
            f.write_str("!")?;
        }
        self.and_expression.fmt(f)
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("!")?;
        }
        if self.first_hit_matches_first_step {
            f.write_str("^")?;
        }
        for step in &self.steps {
            step.fmt(f)?;
        }
        Ok(())
    }
}

impl Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(relation) = self.relation {
            f.write_str(relation.as_str())?;
        }
        self.and_expression.fmt(f)
    }
}

impl Display for AndExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.0, ";")
    }
}

impl Display for OrExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.0, ",")
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.metric_scope.as_str(),
            self.target,
            self.operator,
            self.escaped_value()
        )
    }
}
