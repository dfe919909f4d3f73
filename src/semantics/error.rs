//! Analysis errors.
//!
//! Semantic errors are the user-facing kind: the program is wrong and the
//! message says where and why. Internal errors mean the analyzer was handed
//! a tree shape the parser should never produce. Both abort analysis at the
//! first occurrence by propagating out through `Result`.

use std::error::Error;
use std::fmt;

use crate::diagnostic::{Diagnostic, Label};
use crate::syntax::Span;

use super::format::format_span_location;

/// A diagnosable fault in the analyzed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Semantic error at {}: {}",
            format_span_location(&self.span),
            self.message
        )
    }
}

impl Error for SemanticError {}

/// A malformed tree or broken analyzer invariant; not the user's fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub message: String,
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Internal analyzer error: {}", self.message)
    }
}

impl Error for InternalError {}

/// Either kind of analysis failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    Semantic(SemanticError),
    Internal(InternalError),
}

impl AnalysisError {
    pub(crate) fn semantic(message: impl Into<String>, span: Span) -> AnalysisError {
        AnalysisError::Semantic(SemanticError {
            message: message.into(),
            span,
        })
    }

    pub(crate) fn internal(message: impl Into<String>) -> AnalysisError {
        AnalysisError::Internal(InternalError {
            message: message.into(),
        })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            AnalysisError::Semantic(e) => Some(e.span),
            AnalysisError::Internal(_) => None,
        }
    }

    /// Bridge into the diagnostic renderer.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            AnalysisError::Semantic(e) => Diagnostic::error()
                .with_message(&e.message)
                .with_label(Label::primary(e.span, "")),
            AnalysisError::Internal(e) => Diagnostic::error()
                .with_message(&e.message)
                .with_help(Some("this is an analyzer bug, not a problem in the program")),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Semantic(e) => e.fmt(f),
            AnalysisError::Internal(e) => e.fmt(f),
        }
    }
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalysisError::Semantic(e) => Some(e),
            AnalysisError::Internal(e) => Some(e),
        }
    }
}

impl From<SemanticError> for AnalysisError {
    fn from(e: SemanticError) -> AnalysisError {
        AnalysisError::Semantic(e)
    }
}

impl From<InternalError> for AnalysisError {
    fn from(e: InternalError) -> AnalysisError {
        AnalysisError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_errors_carry_their_location() {
        let err = AnalysisError::semantic("identifier x already declared", Span::new(3, 7));
        assert_eq!(
            err.to_string(),
            "Semantic error at line 3, column 7: identifier x already declared"
        );
        assert_eq!(err.span(), Some(Span::new(3, 7)));
    }

    #[test]
    fn internal_errors_have_no_location() {
        let err = AnalysisError::internal("declaration without declarator list");
        assert!(err.span().is_none());
        assert!(err.to_string().starts_with("Internal analyzer error:"));
    }
}
