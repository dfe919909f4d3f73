//! Grammar productions for interior syntax-tree nodes.
//!
//! The parser tags every interior node with one of these rules; both analysis
//! phases dispatch on them with exhaustive matches so a newly added
//! production cannot be silently mishandled.

/// The nonterminal a subtree was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    // declarations
    SimpleDecl,
    InitDeclList,
    InitDecl,
    PointerDecl,
    FunctionDeclarator,
    CtorDeclarator,
    /// `Class::member` scoped declarator.
    MemberIdentDeclarator,
    /// `Class::Class` scoped declarator (out-of-class constructor).
    MemberCtorDeclarator,
    ArrayDeclarator,
    /// Unnamed array declarator in a parameter position.
    AbstractArrayDeclarator,
    ParamDeclList,
    ParamDecl,
    TypeSpecSeq,

    // class bodies
    ClassSpec,
    MemberSpec,
    AccessSection,
    MemberDecl,
    MemberDeclList,
    MemberDeclarator,

    // definitions and statements
    FunctionDef,
    CtorDef,
    CompoundStatement,
    ReturnStatement,

    // expressions
    Literal,
    Initializer,
    InitList,
    NewExpr,
    DeleteExpr,
    AssignExpr,
    EqualExpr,
    NotEqualExpr,
    RelLess,
    RelGreater,
    RelLessEq,
    RelGreaterEq,
    AddExpr,
    SubExpr,
    MulExpr,
    DivExpr,
    ModExpr,
    BitAndExpr,
    BitXorExpr,
    BitOrExpr,
    LogicalAndExpr,
    LogicalOrExpr,
    ArrayIndex,
    Call,
    DotField,
    ArrowField,
    PostfixInc,
    PostfixDec,
    PrefixInc,
    PrefixDec,
    Deref,
    AddressOf,
    UnaryExpr,
    SizeofExpr,
    StreamOut,
    StreamIn,
    ExprList,

    /// Any production neither phase treats specially; traversal descends
    /// through these unchanged.
    Other,
}
