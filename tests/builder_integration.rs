//! Scope-construction tests: declarations, layout offsets, function
//! prototype/definition merging, and class section handling. Trees are built
//! by hand in the shape the parser produces.

use cub_compiler::semantics::{
    self, AnalysisError, Libs, Region, SemanticContext, TypeInfo,
};
use cub_compiler::syntax::{Category, LiteralValue, NodeId, Rule, Span, SyntaxTree, Token};

fn leaf(tree: &mut SyntaxTree, parent: NodeId, category: Category, text: &str) -> NodeId {
    let id = tree.leaf(Token::new(category, text, Span::new(1, 1)));
    tree.push_child(parent, id);
    id
}

fn node(tree: &mut SyntaxTree, parent: NodeId, rule: Rule) -> NodeId {
    let id = tree.inner(rule);
    tree.push_child(parent, id);
    id
}

fn int_literal(tree: &mut SyntaxTree, parent: NodeId, value: i64) -> NodeId {
    let lit = node(tree, parent, Rule::Literal);
    let token = Token::literal(
        Category::IntegerLit,
        value.to_string(),
        LiteralValue::Int(value),
        Span::new(1, 1),
    );
    let id = tree.leaf(token);
    tree.push_child(lit, id);
    lit
}

/// `int <name>;`; returns the declarator node.
fn int_decl(tree: &mut SyntaxTree, parent: NodeId, name: &str) -> NodeId {
    let decl = node(tree, parent, Rule::SimpleDecl);
    leaf(tree, decl, Category::Int, "int");
    let init = node(tree, decl, Rule::InitDecl);
    leaf(tree, init, Category::Identifier, name);
    init
}

/// A function declarator `name(params...)` with typed, named parameters.
fn fn_declarator(
    tree: &mut SyntaxTree,
    parent: NodeId,
    name: &str,
    params: &[(Category, &str, &str)],
) -> NodeId {
    let decl = node(tree, parent, Rule::FunctionDeclarator);
    leaf(tree, decl, Category::Identifier, name);
    if !params.is_empty() {
        let list = node(tree, decl, Rule::ParamDeclList);
        for (category, type_text, param_name) in params {
            let param = node(tree, list, Rule::ParamDecl);
            leaf(tree, param, *category, type_text);
            leaf(tree, param, Category::Identifier, param_name);
        }
    }
    decl
}

/// `<ret> name(params...);`
fn fn_prototype(
    tree: &mut SyntaxTree,
    parent: NodeId,
    ret: Category,
    ret_text: &str,
    name: &str,
    params: &[(Category, &str, &str)],
) {
    let decl = node(tree, parent, Rule::SimpleDecl);
    leaf(tree, decl, ret, ret_text);
    fn_declarator(tree, decl, name, params);
}

/// `<ret> name(params...) { ... }`; returns the body node for statements.
fn fn_def(
    tree: &mut SyntaxTree,
    parent: NodeId,
    ret: Category,
    ret_text: &str,
    name: &str,
    params: &[(Category, &str, &str)],
) -> NodeId {
    let def = node(tree, parent, Rule::FunctionDef);
    leaf(tree, def, ret, ret_text);
    fn_declarator(tree, def, name, params);
    node(tree, def, Rule::CompoundStatement)
}

fn return_int(tree: &mut SyntaxTree, body: NodeId, value: i64) {
    let ret = node(tree, body, Rule::ReturnStatement);
    leaf(tree, ret, Category::Return, "return");
    int_literal(tree, ret, value);
}

fn analyze(tree: &mut SyntaxTree, root: NodeId) -> Result<SemanticContext, AnalysisError> {
    semantics::analyze(tree, root, Libs::default())
}

fn semantic_message(err: AnalysisError) -> String {
    match err {
        AnalysisError::Semantic(e) => e.message,
        AnalysisError::Internal(e) => panic!("unexpected internal error: {}", e.message),
    }
}

#[test]
fn duplicate_declaration_is_rejected() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    int_decl(&mut tree, root, "x");
    int_decl(&mut tree, root, "x");

    let err = analyze(&mut tree, root).unwrap_err();
    assert_eq!(semantic_message(err), "identifier x already declared");
}

#[test]
fn globals_are_laid_out_in_declaration_order() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    int_decl(&mut tree, root, "x");
    let y = int_decl(&mut tree, root, "y");
    int_decl(&mut tree, root, "z");

    let ctx = analyze(&mut tree, root).unwrap();
    let place = |name: &str| ctx.lookup(name).unwrap().place().unwrap();
    assert_eq!(place("x"), (Region::Global, 0));
    assert_eq!(place("y"), (Region::Global, 4));
    assert_eq!(place("z"), (Region::Global, 8));
    assert_eq!(ctx.offset(), 12);

    // the declarator node was stamped with the same placement
    let at_y = ctx.address_of(&tree, y).unwrap();
    assert_eq!(at_y.region, Region::Global);
    assert_eq!(at_y.offset, 4);
}

#[test]
fn prototype_and_definition_merge() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    fn_prototype(
        &mut tree,
        root,
        Category::Int,
        "int",
        "f",
        &[(Category::Int, "int", "a")],
    );
    let body = fn_def(
        &mut tree,
        root,
        Category::Int,
        "int",
        "f",
        &[(Category::Int, "int", "a")],
    );
    return_int(&mut tree, body, 0);

    let ctx = analyze(&mut tree, root).unwrap();
    let f = ctx.lookup("f").unwrap();
    assert!(f.is_function());
    // the prototype's descriptor gained the definition's locals and frame
    let locals = f.locals().expect("definition should attach locals");
    let a = locals.borrow().get("a").unwrap();
    assert_eq!(a.place(), Some((Region::Local, 0)));
    assert_eq!(f.param_size(), 4);
}

#[test]
fn second_definition_is_rejected() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let body = fn_def(&mut tree, root, Category::Int, "int", "f", &[]);
    return_int(&mut tree, body, 0);
    let body = fn_def(&mut tree, root, Category::Int, "int", "f", &[]);
    return_int(&mut tree, body, 0);

    let err = analyze(&mut tree, root).unwrap_err();
    assert_eq!(semantic_message(err), "function f already defined");
}

#[test]
fn definition_must_match_prototype_signature() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    fn_prototype(
        &mut tree,
        root,
        Category::Int,
        "int",
        "f",
        &[(Category::Int, "int", "a")],
    );
    let body = fn_def(&mut tree, root, Category::Int, "int", "f", &[]);
    return_int(&mut tree, body, 0);

    let err = analyze(&mut tree, root).unwrap_err();
    assert_eq!(semantic_message(err), "function signatures for f mismatched");
}

#[test]
fn parameters_then_locals_share_the_frame() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let body = fn_def(
        &mut tree,
        root,
        Category::Void,
        "void",
        "f",
        &[(Category::Int, "int", "a"), (Category::Float, "float", "b")],
    );
    int_decl(&mut tree, body, "c");

    let ctx = analyze(&mut tree, root).unwrap();
    let f = ctx.lookup("f").unwrap();
    assert_eq!(f.param_size(), 12);
    let locals = f.locals().unwrap();
    let place = |name: &str| locals.borrow().get(name).unwrap().place().unwrap();
    assert_eq!(place("a"), (Region::Local, 0));
    assert_eq!(place("b"), (Region::Local, 4));
    // locals start where the parameters end
    assert_eq!(place("c"), (Region::Local, 12));
    // the global region was restored after the definition
    assert_eq!(ctx.region(), Region::Global);
    assert_eq!(ctx.offset(), 0);
}

#[test]
fn local_scope_is_popped_after_the_definition() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let body = fn_def(
        &mut tree,
        root,
        Category::Void,
        "void",
        "f",
        &[(Category::Int, "int", "a")],
    );
    int_decl(&mut tree, body, "c");

    let ctx = analyze(&mut tree, root).unwrap();
    // only the global scope is left on the stack
    assert!(ctx.lookup("f").is_some());
    assert!(ctx.lookup("a").is_none());
    assert!(ctx.lookup("c").is_none());
}

#[test]
fn scope_stack_is_balanced_after_an_error_in_a_body() {
    // void f() { int a; int a; }
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let body = fn_def(&mut tree, root, Category::Void, "void", "f", &[]);
    int_decl(&mut tree, body, "a");
    int_decl(&mut tree, body, "a");

    let mut ctx = SemanticContext::new(Libs::default());
    let err = ctx.analyze(&mut tree, root).unwrap_err();
    assert_eq!(semantic_message(err), "identifier a already declared");
    // the failing body's scope was popped on the way out
    assert!(ctx.lookup("a").is_none());
    assert_eq!(ctx.region(), Region::Global);
    assert_eq!(ctx.offset(), 0);
}

#[test]
fn bare_class_gets_public_section_and_default_constructor() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let class = node(&mut tree, root, Rule::ClassSpec);
    leaf(&mut tree, class, Category::ClassName, "Foo");

    let ctx = analyze(&mut tree, root).unwrap();
    let foo = ctx.lookup("Foo").unwrap();
    assert!(foo.is_class());
    let public = foo.public_section().expect("public section synthesized");
    let ctor = public.borrow().get("Foo").expect("default constructor");
    assert!(ctor.is_function());
    assert_eq!(TypeInfo::return_type(&ctor).class_name(), Some("Foo"));
    // synthesized, so it has no body
    assert!(ctor.locals().is_none());
}

#[test]
fn private_members_are_placed_in_the_class_region() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let class = node(&mut tree, root, Rule::ClassSpec);
    leaf(&mut tree, class, Category::ClassName, "Foo");
    let members = node(&mut tree, class, Rule::MemberSpec);
    let section = node(&mut tree, members, Rule::AccessSection);
    leaf(&mut tree, section, Category::Private, "private");
    let decl = node(&mut tree, section, Rule::MemberDecl);
    leaf(&mut tree, decl, Category::Int, "int");
    let declarator = node(&mut tree, decl, Rule::MemberDeclarator);
    leaf(&mut tree, declarator, Category::Identifier, "x");

    let ctx = analyze(&mut tree, root).unwrap();
    let foo = ctx.lookup("Foo").unwrap();
    let private = foo.private_section().expect("private section attached");
    let x = private.borrow().get("x").unwrap();
    assert_eq!(x.place(), Some((Region::Class, 0)));
    // a public section still gets synthesized alongside, with the default ctor
    let public = foo.public_section().unwrap();
    assert!(public.borrow().contains("Foo"));
    assert_eq!(foo.storage_size(), 4);
}

#[test]
fn inline_constructor_suppresses_the_default_one() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let class = node(&mut tree, root, Rule::ClassSpec);
    leaf(&mut tree, class, Category::ClassName, "Foo");
    let members = node(&mut tree, class, Rule::MemberSpec);
    let section = node(&mut tree, members, Rule::AccessSection);
    leaf(&mut tree, section, Category::Public, "public");
    let ctor = node(&mut tree, section, Rule::CtorDef);
    let declarator = node(&mut tree, ctor, Rule::CtorDeclarator);
    leaf(&mut tree, declarator, Category::ClassName, "Foo");
    node(&mut tree, ctor, Rule::CompoundStatement);

    let ctx = analyze(&mut tree, root).unwrap();
    let foo = ctx.lookup("Foo").unwrap();
    let public = foo.public_section().unwrap();
    let ctor = public.borrow().get("Foo").unwrap();
    // the user's constructor, not a synthesized one: it carries a body scope
    assert!(ctor.locals().is_some());
}

#[test]
fn missing_array_size_is_rejected() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let decl = node(&mut tree, root, Rule::SimpleDecl);
    leaf(&mut tree, decl, Category::Int, "int");
    let init = node(&mut tree, decl, Rule::InitDecl);
    let array = node(&mut tree, init, Rule::ArrayDeclarator);
    leaf(&mut tree, array, Category::Identifier, "a");
    leaf(&mut tree, array, Category::OpenBracket, "[");
    leaf(&mut tree, array, Category::CloseBracket, "]");

    let err = analyze(&mut tree, root).unwrap_err();
    assert_eq!(semantic_message(err), "bad array declarator size");
}

#[test]
fn sized_array_occupies_element_times_size() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    let decl = node(&mut tree, root, Rule::SimpleDecl);
    leaf(&mut tree, decl, Category::Int, "int");
    let init = node(&mut tree, decl, Rule::InitDecl);
    let array = node(&mut tree, init, Rule::ArrayDeclarator);
    leaf(&mut tree, array, Category::Identifier, "a");
    leaf(&mut tree, array, Category::OpenBracket, "[");
    let size = tree.leaf(Token::literal(
        Category::IntegerLit,
        "3",
        LiteralValue::Int(3),
        Span::new(1, 1),
    ));
    tree.push_child(array, size);
    leaf(&mut tree, array, Category::CloseBracket, "]");
    int_decl(&mut tree, root, "x");

    let ctx = analyze(&mut tree, root).unwrap();
    let a = ctx.lookup("a").unwrap();
    assert!(a.is_array());
    assert_eq!(a.place(), Some((Region::Global, 0)));
    assert_eq!(a.storage_size(), 12);
    // the next global starts after the whole array
    let x = ctx.lookup("x").unwrap();
    assert_eq!(x.place(), Some((Region::Global, 12)));
}

#[test]
fn trace_records_symbol_events() {
    let mut tree = SyntaxTree::new();
    let root = tree.inner(Rule::Other);
    int_decl(&mut tree, root, "x");

    let mut ctx = SemanticContext::new(Libs::default());
    ctx.enable_trace();
    ctx.analyze(&mut tree, root).unwrap();
    let trace = ctx.take_trace();
    assert!(trace.iter().any(|line| line == "declared x as int"));
}
