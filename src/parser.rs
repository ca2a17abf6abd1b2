//! Parser for segment definitions.
//!
//! ## Parsing flow
//!
//! ```text
//! parse()
//!   ├─ split on segment boundaries  `;` + [users::|sessions::] + (condition::|sequence::)
//!   │    └─ parse_segment()
//!   │         ├─ strip scope (inherit the previous one when absent)
//!   │         ├─ "condition::" → parse_condition()
//!   │         │                   ├─ optional "!"  (exclude)
//!   │         │                   └─ parse_and_expression()
//!   │         └─ "sequence::"  → parse_sequence()
//!   │                             ├─ optional "!"  (negate)
//!   │                             ├─ optional "^"  (first hit matches first step)
//!   │                             └─ split on ";->>" / ";->"
//!   │                                  └─ parse_and_expression() per step
//!   │
//!   └─ parse_and_expression()  split on unescaped ";"
//!        └─ parse_or_expression()  split on unescaped ","
//!             └─ parse_expression()
//!                  ├─ optional metric scope  perHit:: | perUser:: | perSession::
//!                  ├─ leftmost operator      see `Operator::SCAN_ORDER`
//!                  └─ value                  unescaped here and nowhere else
//! ```
//!
//! ## Examples
//!
//! ```text
//! sessions::condition::ga:medium==referral
//! users::condition::perUser::ga:sessions>10;sequence::^ga:deviceCategory==desktop;->>ga:deviceCategory==mobile
//! sessions::condition::!ga:pagePath=~^/blog/,ga:pagePath=@help;condition::ga:hits<>10_20
//! ```
//!
//! Any error aborts the whole parse; there are no partial results.

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::ast::{
    AndExpression, Condition, Expression, Identifier, OrExpression, Segment, Segments, Sequence,
    SequenceStep,
};
use crate::lexer::{
    and_boundary, has_dangling_escape, or_boundary, segment_boundary, split_unescaped,
    step_boundary, unescape_value, Piece,
};
use crate::token::{MetricScope, Operator, SegmentKind, SegmentScope, Span, StepRelation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

pub struct Parser<'a> {
    input: &'a str,
}

/// Parses a complete segment definition.
pub fn parse(definition: &str) -> Result<Segments, ParseError> {
    Parser::new(definition).parse()
}

impl FromStr for Segments {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    pub fn parse(&self) -> Result<Segments, ParseError> {
        let split = split_unescaped(Piece::root(self.input), segment_boundary);
        let mut segments = Vec::new();
        let mut last_scope: Option<SegmentScope> = None;

        for chunk in split.chunks() {
            let segment = self.parse_segment(chunk, last_scope)?;
            last_scope = Some(segment.scope);
            segments.push(segment);
        }

        debug!(segments = segments.len(), "parsed segment definition");
        Ok(Segments(segments))
    }

    /// A segment without its own scope inherits the previous one.
    fn parse_segment(
        &self,
        piece: Piece<'a>,
        inherited: Option<SegmentScope>,
    ) -> Result<Segment, ParseError> {
        let (scope, rest) = match SegmentScope::from_prefix(piece.text) {
            Some(scope) => (scope, piece.skip(scope.as_str().len())),
            None => {
                let scope = inherited.ok_or_else(|| {
                    ParseError::at_position(
                        "no segment scope (users:: or sessions::)".to_string(),
                        piece.span,
                    )
                })?;
                (scope, piece)
            }
        };

        match SegmentKind::from_prefix(rest.text) {
            Some(SegmentKind::Condition) => {
                let body = rest.skip(SegmentKind::Condition.as_str().len());
                Ok(Segment::condition(scope, self.parse_condition(body)?))
            }
            Some(SegmentKind::Sequence) => {
                let body = rest.skip(SegmentKind::Sequence.as_str().len());
                Ok(Segment::sequence(scope, self.parse_sequence(body)?))
            }
            None => Err(ParseError::at_position(
                format!("unknown segment condition {}", rest.text),
                rest.span,
            )),
        }
    }

    fn parse_condition(&self, piece: Piece<'a>) -> Result<Condition, ParseError> {
        let (exclude, rest) = match piece.strip_prefix("!") {
            Some(rest) => (true, rest),
            None => (false, piece),
        };

        Ok(Condition {
            exclude,
            and_expression: self.parse_and_expression(rest)?,
        })
    }

    fn parse_sequence(&self, piece: Piece<'a>) -> Result<Sequence, ParseError> {
        let (negate, rest) = match piece.strip_prefix("!") {
            Some(rest) => (true, rest),
            None => (false, piece),
        };
        let (first_hit_matches_first_step, rest) = match rest.strip_prefix("^") {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        let split = split_unescaped(rest, step_boundary);
        let mut steps = vec![SequenceStep {
            relation: None,
            and_expression: self.parse_and_expression(split.first())?,
        }];

        for (separator, chunk) in split.separated() {
            let relation = StepRelation::from_token(separator.text).ok_or_else(|| {
                ParseError::at_position(
                    format!("unknown sequence step separator {}", separator.text),
                    separator.span,
                )
            })?;
            steps.push(SequenceStep {
                relation: Some(relation),
                and_expression: self.parse_and_expression(chunk)?,
            });
        }

        Ok(Sequence {
            negate,
            first_hit_matches_first_step,
            steps,
        })
    }

    fn parse_and_expression(&self, piece: Piece<'a>) -> Result<AndExpression, ParseError> {
        split_unescaped(piece, and_boundary)
            .chunks()
            .map(|chunk| self.parse_or_expression(chunk))
            .collect::<Result<Vec<_>, _>>()
            .map(AndExpression)
    }

    fn parse_or_expression(&self, piece: Piece<'a>) -> Result<OrExpression, ParseError> {
        split_unescaped(piece, or_boundary)
            .chunks()
            .map(|chunk| self.parse_expression(chunk))
            .collect::<Result<Vec<_>, _>>()
            .map(OrExpression)
    }

    fn parse_expression(&self, piece: Piece<'a>) -> Result<Expression, ParseError> {
        let (metric_scope, rest) = match MetricScope::from_prefix(piece.text) {
            Some(scope) => (scope, piece.skip(scope.as_str().len())),
            None => (MetricScope::Default, piece),
        };

        let Some((at, operator)) = Operator::find_first(rest.text) else {
            return Err(ParseError::at_position(
                format!("invalid expression: {}", piece.text),
                piece.span,
            ));
        };

        let target = &rest.text[..at];
        let raw_value = &rest.text[at + operator.as_str().len()..];
        if has_dangling_escape(raw_value) {
            return Err(ParseError::at_position(
                format!("dangling escape at end of value: {}", piece.text),
                Span::new(piece.span.end - 1, piece.span.end),
            ));
        }

        Ok(Expression {
            metric_scope,
            target: Identifier(target.to_string()),
            operator,
            value: unescape_value(raw_value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SegmentBody;

    fn condition_of(segment: &Segment) -> &Condition {
        match &segment.body {
            SegmentBody::Condition(condition) => condition,
            SegmentBody::Sequence(_) => panic!("Expected condition segment"),
        }
    }

    fn sequence_of(segment: &Segment) -> &Sequence {
        match &segment.body {
            SegmentBody::Sequence(sequence) => sequence,
            SegmentBody::Condition(_) => panic!("Expected sequence segment"),
        }
    }

    #[test]
    fn test_simple_condition() {
        let result = parse("sessions::condition::ga:medium==referral").unwrap();
        assert_eq!(result.len(), 1);

        let segment = &result.0[0];
        assert_eq!(segment.scope, SegmentScope::Session);
        assert_eq!(segment.kind(), SegmentKind::Condition);

        let condition = condition_of(segment);
        assert!(!condition.exclude);
        assert_eq!(
            condition.and_expression,
            AndExpression(vec![OrExpression(vec![Expression::new(
                "ga:medium",
                Operator::Equal,
                "referral"
            )])])
        );
    }

    #[test]
    fn test_scope_inheritance() {
        let result = parse("sessions::condition::ga:a==1;condition::ga:b==2").unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|s| s.scope == SegmentScope::Session));

        let result = parse("users::condition::a==1;sessions::condition::b==2;condition::c==3").unwrap();
        let scopes: Vec<_> = result.iter().map(|s| s.scope).collect();
        assert_eq!(
            scopes,
            vec![SegmentScope::User, SegmentScope::Session, SegmentScope::Session]
        );
    }

    #[test]
    fn test_missing_scope_is_error() {
        let err = parse("condition::ga:medium==referral").unwrap_err();
        assert!(err.message.contains("no segment scope"));
        assert_eq!(err.span, Some(Span::new(0, 30)));
    }

    #[test]
    fn test_unknown_segment_keyword_is_error() {
        let err = parse("sessions::conditions::ga:medium==referral").unwrap_err();
        assert!(err.message.starts_with("unknown segment condition"));
        assert_eq!(err.span.map(|s| s.start), Some(10));
    }

    #[test]
    fn test_expression_without_operator_is_error() {
        let err = parse("sessions::condition::ga:pagePath").unwrap_err();
        assert_eq!(err.message, "invalid expression: ga:pagePath");
        assert_eq!(err.span, Some(Span::new(21, 32)));

        let err = parse("sessions::condition::ga:a==1;ga:b").unwrap_err();
        assert_eq!(err.span, Some(Span::new(29, 33)));
    }

    #[test]
    fn test_trailing_backslash_is_error() {
        let input = r"sessions::condition::ga:medium==a;users::condition::ga:source==b\";
        let err = parse(input).unwrap_err();
        assert!(err.message.starts_with("dangling escape"));
        assert_eq!(err.span, Some(Span::new(input.len() - 1, input.len())));

        // An escaped backslash is fine and keeps segments apart after sorting.
        let input = r"sessions::condition::ga:medium==a;users::condition::ga:source==b\\";
        let segments = parse(input).unwrap();
        assert_eq!(segments.len(), 2);
        let canonical = segments.to_string();
        assert_eq!(
            canonical,
            r"users::condition::ga:source==b\\;sessions::condition::ga:medium==a"
        );
        assert_eq!(parse(&canonical).unwrap(), segments);
    }

    #[test]
    fn test_and_or_structure() {
        let result = parse("users::condition::!ga:a==1,ga:b!=2;ga:c=@x").unwrap();
        let condition = condition_of(&result.0[0]);
        assert!(condition.exclude);

        let and = &condition.and_expression.0;
        assert_eq!(and.len(), 2);
        assert_eq!(and[0].0.len(), 2);
        assert_eq!(and[0].0[1], Expression::new("ga:b", Operator::NotEqual, "2"));
        assert_eq!(and[1].0[0], Expression::new("ga:c", Operator::ContainsSubstring, "x"));
    }

    #[test]
    fn test_sequence_steps_and_relations() {
        let result = parse("users::sequence::!^a==1;->b==2;->>c==3").unwrap();
        let sequence = sequence_of(&result.0[0]);

        assert!(sequence.negate);
        assert!(sequence.first_hit_matches_first_step);
        let relations: Vec<_> = sequence.steps.iter().map(|s| s.relation).collect();
        assert_eq!(
            relations,
            vec![
                None,
                Some(StepRelation::ImmediatelyPrecedes),
                Some(StepRelation::Precedes)
            ]
        );
        assert_eq!(
            sequence.steps[1].and_expression.0[0].0[0],
            Expression::new("b", Operator::Equal, "2")
        );
    }

    #[test]
    fn test_sequence_step_with_conjunction() {
        let result =
            parse("users::sequence::^ga:sessionCount==1;ga:dateOfSession<>2014-05-20_2014-05-30;->>ga:sessionDurationBucket>600")
                .unwrap();
        let sequence = sequence_of(&result.0[0]);
        assert_eq!(sequence.steps.len(), 2);
        assert_eq!(sequence.steps[0].and_expression.0.len(), 2);
        assert_eq!(
            sequence.steps[0].and_expression.0[1].0[0],
            Expression::new("ga:dateOfSession", Operator::Between, "2014-05-20_2014-05-30")
        );
    }

    #[test]
    fn test_metric_scope_prefix() {
        let result = parse("users::condition::perSession::ga:goal3Completions!=0").unwrap();
        let expression = &condition_of(&result.0[0]).and_expression.0[0].0[0];
        assert_eq!(expression.metric_scope, MetricScope::PerSession);
        assert_eq!(expression.target.as_str(), "ga:goal3Completions");
        assert_eq!(expression.operator, Operator::NotEqual);
        assert_eq!(expression.value, "0");
    }

    #[test]
    fn test_operators_are_not_split() {
        let cases = [
            ("ga:hits<=10", Operator::LessThanEqual, "10"),
            ("ga:hits>=10", Operator::GreaterThanEqual, "10"),
            ("ga:hits<>10_20", Operator::Between, "10_20"),
            ("ga:hits!<>10_20", Operator::NotBetween, "10_20"),
            ("ga:medium[]a|b", Operator::InList, "a|b"),
            ("ga:medium![]a|b", Operator::NotInList, "a|b"),
            ("ga:medium!~^cpc", Operator::NotRegexp, "^cpc"),
            ("ga:medium=~a==b", Operator::Regexp, "a==b"),
        ];
        for (text, operator, value) in cases {
            let result = parse(&format!("sessions::condition::{text}")).unwrap();
            let expression = &condition_of(&result.0[0]).and_expression.0[0].0[0];
            assert_eq!(expression.operator, operator, "{text}");
            assert_eq!(expression.value, value, "{text}");
        }
    }

    #[test]
    fn test_escaped_separators_are_unescaped_in_values() {
        let result = parse(r"sessions::condition::ga:pagePath=~/bcdef\;\,").unwrap();
        let expression = &condition_of(&result.0[0]).and_expression.0[0].0[0];
        assert_eq!(expression.value, "/bcdef;,");
        assert_eq!(result.to_string(), r"sessions::condition::ga:pagePath=~/bcdef\;\,");
    }

    #[test]
    fn test_escaped_segment_keyword_stays_in_value() {
        let result = parse(r"sessions::condition::ga:pagePath==a\;condition::b").unwrap();
        assert_eq!(result.len(), 1);
        let expression = &condition_of(&result.0[0]).and_expression.0[0].0[0];
        assert_eq!(expression.value, "a;condition::b");
    }

    #[test]
    fn test_from_str() {
        let segments: Segments = "users::condition::ga:sessions>10".parse().unwrap();
        assert_eq!(segments.len(), 1);
        assert!("nonsense".parse::<Segments>().is_err());
    }

    #[test]
    fn test_round_trip_canonical_definitions() {
        let definitions = [
            "sessions::condition::ga:medium==referral",
            "users::condition::ga:sessions>10;sequence::ga:deviceCategory==desktop;->>ga:deviceCategory==mobile",
            r"sessions::condition::!ga:landingPagePath=~^\Qexample.com/blog/xxx/\E;condition::!ga:landingPagePath=~^\Qexample.com/yyy/\E",
            r"users::sequence::!ga:flashVersion=@bar2;sessions::condition::ga:flashVersion=@test\,ga:flashVersion=@test3\\;ga:flashVersion=@and\;\,;condition::!ga:sessionDurationBucket==123;sequence::^ga:operatingSystem=@Windows",
            "users::sequence::!^ga:pagePath==/aiueo;->ga:pagePath==/aiueo2;->>ga:pagePath==/aiueo3",
            "sessions::condition::perHit::ga:hits<>10_100",
        ];
        for definition in definitions {
            let parsed = parse(definition).unwrap();
            assert_eq!(parsed.to_string(), definition);
        }
    }

    #[test]
    fn test_print_sorts_scopes() {
        let parsed = parse("users::condition::A==1;sessions::condition::B==1;users::condition::C==1").unwrap();
        assert_eq!(
            parsed.to_string(),
            "users::condition::A==1;condition::C==1;sessions::condition::B==1"
        );
    }

    #[test]
    fn test_print_sorts_scopes_with_inheritance() {
        let input = r"sessions::condition::ga:deviceCategory==desktop;users::condition::ga:pagePath!~^\Q/lk/\E,ga:pagePath!~^\Q/netacho/\E;sessions::condition::!ga:channelGrouping==(none);condition::ga:pagePath=~^\Q/inquiry/\E,ga:pagePath=~^\Q/inquiry/\E;condition::ga:deviceCategory==desktop;users::condition::ga:pagePath!~^\Q/lk/\E,ga:pagePath!~^\Q/netacho/\E;sessions::condition::!ga:channelGrouping==(none);condition::ga:goal4Completions>0";
        let expected = r"users::condition::ga:pagePath!~^\Q/lk/\E,ga:pagePath!~^\Q/netacho/\E;condition::ga:pagePath!~^\Q/lk/\E,ga:pagePath!~^\Q/netacho/\E;sessions::condition::ga:deviceCategory==desktop;condition::!ga:channelGrouping==(none);condition::ga:pagePath=~^\Q/inquiry/\E,ga:pagePath=~^\Q/inquiry/\E;condition::ga:deviceCategory==desktop;condition::!ga:channelGrouping==(none);condition::ga:goal4Completions>0";
        assert_eq!(parse(input).unwrap().to_string(), expected);
    }
}
