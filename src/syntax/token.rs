//! The token abstraction the external lexer/parser hands to the analyzer.
//!
//! The analyzer never lexes text itself: it only inspects the terminal
//! category, the literal text, and (for literals) the parsed immediate value.

use ordered_float::OrderedFloat;

use super::span::Span;

/// Terminal categories the semantic phases dispatch on.
///
/// `ClassName` is produced by the lexer once a class declaration has been
/// seen, the usual feedback trick for C++-style grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    // type keywords
    Int,
    Float,
    Char,
    Bool,
    Void,

    // names
    Identifier,
    ClassName,

    // literals
    IntegerLit,
    FloatLit,
    CharLit,
    StringLit,
    TrueLit,
    FalseLit,

    // class access specifiers
    Public,
    Private,

    // punctuation the declarator queries look for
    Star,
    Ampersand,
    OpenBracket,
    CloseBracket,
    ScopeSep,

    // assignment operators, inspected on the middle leaf of an assignment
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,

    // unary operator leaves
    Plus,
    Minus,
    Not,
    Tilde,

    // keywords the checker inspects
    New,
    Delete,
    Sizeof,
    Return,

    // any other terminal; the analyzer never looks inside these
    Other,
}

/// Parsed immediate value carried by numeric/char/string/bool literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Int(i64),
    Float(OrderedFloat<f64>),
    Char(char),
    /// `storage_size` is the constant-pool slot size (text length plus the
    /// terminating NUL), recorded by the lexer.
    Str { text: String, storage_size: usize },
    Bool(bool),
}

/// A token with its category, source text, and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub category: Category,
    pub text: String,
    pub value: Option<LiteralValue>,
    pub span: Span,
}

impl Token {
    pub fn new(category: Category, text: impl Into<String>, span: Span) -> Token {
        Token {
            category,
            text: text.into(),
            value: None,
            span,
        }
    }

    pub fn literal(
        category: Category,
        text: impl Into<String>,
        value: LiteralValue,
        span: Span,
    ) -> Token {
        Token {
            category,
            text: text.into(),
            value: Some(value),
            span,
        }
    }

    /// The integer immediate, if this token carries one.
    pub fn int_value(&self) -> Option<i64> {
        match self.value {
            Some(LiteralValue::Int(v)) => Some(v),
            Some(LiteralValue::Char(c)) => Some(c as i64),
            Some(LiteralValue::Bool(b)) => Some(b as i64),
            _ => None,
        }
    }

    /// Constant-pool slot size for string literals.
    pub fn storage_size(&self) -> Option<usize> {
        match &self.value {
            Some(LiteralValue::Str { storage_size, .. }) => Some(*storage_size),
            _ => None,
        }
    }
}
