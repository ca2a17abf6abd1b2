//! Value-length limits the reporting API enforces on segment expressions.

use thiserror::Error;

use crate::ast::{
    AndExpression, Condition, Expression, OrExpression, Segment, SegmentBody, Segments, Sequence,
};

/// Longest value accepted after `=~` / `!~`, in characters.
pub const MAX_REGEXP_VALUE_CHARS: usize = 128;
/// Longest value accepted after every other operator, in characters.
pub const MAX_VALUE_CHARS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value of {target}{operator} is {length} characters long, limit is {limit}")]
    ValueTooLong {
        target: String,
        operator: String,
        length: usize,
        limit: usize,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl Validate for Expression {
    fn validate(&self) -> Result<(), ValidationError> {
        let limit = if self.operator.is_regexp() {
            MAX_REGEXP_VALUE_CHARS
        } else {
            MAX_VALUE_CHARS
        };
        let length = self.value.chars().count();
        if length > limit {
            return Err(ValidationError::ValueTooLong {
                target: self.target.to_string(),
                operator: self.operator.to_string(),
                length,
                limit,
            });
        }
        Ok(())
    }
}

impl Validate for OrExpression {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.iter().try_for_each(Validate::validate)
    }
}

impl Validate for AndExpression {
    fn validate(&self) -> Result<(), ValidationError> {
        self.0.iter().try_for_each(Validate::validate)
    }
}

impl Validate for Condition {
    fn validate(&self) -> Result<(), ValidationError> {
        self.and_expression.validate()
    }
}

impl Validate for Sequence {
    fn validate(&self) -> Result<(), ValidationError> {
        self.steps
            .iter()
            .try_for_each(|step| step.and_expression.validate())
    }
}

impl Validate for Segment {
    fn validate(&self) -> Result<(), ValidationError> {
        match &self.body {
            SegmentBody::Condition(condition) => condition.validate(),
            SegmentBody::Sequence(sequence) => sequence.validate(),
        }
    }
}

impl Validate for Segments {
    fn validate(&self) -> Result<(), ValidationError> {
        self.iter().try_for_each(Validate::validate)
    }
}
