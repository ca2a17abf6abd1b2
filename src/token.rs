//! Lexical grammar of the segment definition language.
//!
//! Every prefix-driven decision the parser makes goes through one of the
//! candidate tables below. When one token is a prefix of another, the longer
//! token is listed first.

use std::fmt;

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Which entity a segment filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentScope {
    User,    // "users::"
    Session, // "sessions::"
}

impl SegmentScope {
    pub const CANDIDATES: [SegmentScope; 2] = [SegmentScope::User, SegmentScope::Session];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentScope::User => "users::",
            SegmentScope::Session => "sessions::",
        }
    }

    /// Returns the scope whose token starts `s`, if any.
    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::CANDIDATES.into_iter().find(|c| s.starts_with(c.as_str()))
    }
}

/// The body keyword of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Condition, // "condition::"
    Sequence,  // "sequence::"
}

impl SegmentKind {
    pub const CANDIDATES: [SegmentKind; 2] = [SegmentKind::Condition, SegmentKind::Sequence];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Condition => "condition::",
            SegmentKind::Sequence => "sequence::",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::CANDIDATES.into_iter().find(|c| s.starts_with(c.as_str()))
    }
}

/// Granularity at which a metric is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricScope {
    #[default]
    Default, // ""
    PerHit,     // "perHit::"
    PerSession, // "perSession::"
    PerUser,    // "perUser::"
}

impl MetricScope {
    /// Prefixes tried when parsing an expression, first match wins.
    pub const CANDIDATES: [MetricScope; 3] =
        [MetricScope::PerHit, MetricScope::PerUser, MetricScope::PerSession];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricScope::Default => "",
            MetricScope::PerHit => "perHit::",
            MetricScope::PerSession => "perSession::",
            MetricScope::PerUser => "perUser::",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::CANDIDATES.into_iter().find(|c| s.starts_with(c.as_str()))
    }
}

/// Relation of a sequence step to the step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepRelation {
    Precedes,            // ";->>"
    ImmediatelyPrecedes, // ";->"
}

impl StepRelation {
    /// `;->>` must be tried before `;->`.
    pub const CANDIDATES: [StepRelation; 2] =
        [StepRelation::Precedes, StepRelation::ImmediatelyPrecedes];

    pub fn as_str(self) -> &'static str {
        match self {
            StepRelation::Precedes => ";->>",
            StepRelation::ImmediatelyPrecedes => ";->",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::CANDIDATES.into_iter().find(|c| s.starts_with(c.as_str()))
    }

    pub fn from_token(s: &str) -> Option<Self> {
        Self::CANDIDATES.into_iter().find(|c| c.as_str() == s)
    }
}

/// Comparison operators of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,                // ==
    NotEqual,             // !=
    LessThan,             // <
    LessThanEqual,        // <=
    GreaterThan,          // >
    GreaterThanEqual,     // >=
    Between,              // <>
    NotBetween,           // !<>
    InList,               // []
    NotInList,            // ![]
    ContainsSubstring,    // =@
    NotContainsSubstring, // !@
    Regexp,               // =~
    NotRegexp,            // !~
}

impl Operator {
    /// Scan order at a single position. Three-character tokens come first and
    /// `<`/`>` come last so `<=`, `>=` and `<>` are never split.
    pub const SCAN_ORDER: [Operator; 14] = [
        Operator::NotBetween,
        Operator::NotInList,
        Operator::Between,
        Operator::InList,
        Operator::LessThanEqual,
        Operator::GreaterThanEqual,
        Operator::Equal,
        Operator::NotEqual,
        Operator::ContainsSubstring,
        Operator::NotContainsSubstring,
        Operator::Regexp,
        Operator::NotRegexp,
        Operator::LessThan,
        Operator::GreaterThan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::Between => "<>",
            Operator::NotBetween => "!<>",
            Operator::InList => "[]",
            Operator::NotInList => "![]",
            Operator::ContainsSubstring => "=@",
            Operator::NotContainsSubstring => "!@",
            Operator::Regexp => "=~",
            Operator::NotRegexp => "!~",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::SCAN_ORDER.into_iter().find(|op| s.starts_with(op.as_str()))
    }

    /// Finds the leftmost operator in `s`, returning its byte offset.
    pub fn find_first(s: &str) -> Option<(usize, Operator)> {
        s.char_indices()
            .find_map(|(i, _)| Self::from_prefix(&s[i..]).map(|op| (i, op)))
    }

    pub fn is_regexp(self) -> bool {
        matches!(self, Operator::Regexp | Operator::NotRegexp)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
