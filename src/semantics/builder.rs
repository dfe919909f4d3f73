//! Pass one: scope construction.
//!
//! A pre-order walk over the tree. Declaration productions are handled in
//! full (the walk does not descend into them again); everything else is
//! descended through. Scope pushes and region switches go through the
//! `scoped`/`in_region` combinators so depth and region are restored even
//! when a handler errors out.

use std::rc::Rc;

use crate::syntax::{Category, NodeId, Rule, SyntaxTree};

use super::error::AnalysisError;
use super::symbol_table::{new_scope, ScopeRef};
use super::types::{Place, Region, TypeInfo, TypeKind, TypeRef};
use super::SemanticContext;

/// Whether a production was consumed by its handler or should be descended
/// through.
enum Flow {
    Handled,
    Descend,
}

pub struct Builder<'ctx> {
    ctx: &'ctx mut SemanticContext,
}

impl<'ctx> Builder<'ctx> {
    pub fn new(ctx: &'ctx mut SemanticContext) -> Builder<'ctx> {
        Builder { ctx }
    }

    pub fn run(&mut self, tree: &mut SyntaxTree, root: NodeId) -> Result<(), AnalysisError> {
        self.visit(tree, root)
    }

    fn visit(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<(), AnalysisError> {
        match self.handle(tree, n)? {
            Flow::Handled => Ok(()),
            Flow::Descend => {
                for child in tree.children(n).to_vec() {
                    self.visit(tree, child)?;
                }
                Ok(())
            }
        }
    }

    fn handle(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<Flow, AnalysisError> {
        let Some(rule) = tree.rule(n) else {
            return Ok(Flow::Handled);
        };
        match rule {
            Rule::SimpleDecl | Rule::MemberDecl => {
                let base = self.base_type(tree, n)?;
                let list = tree.child(n, 1).ok_or_else(|| {
                    AnalysisError::internal("declaration without a declarator list")
                })?;
                self.declare_list(tree, &base, list)?;
                Ok(Flow::Handled)
            }
            Rule::FunctionDef | Rule::CtorDef => {
                self.define_function(tree, n, rule)?;
                Ok(Flow::Handled)
            }
            Rule::ClassSpec => {
                self.declare_class(tree, n)?;
                Ok(Flow::Handled)
            }
            _ => Ok(Flow::Descend),
        }
    }

    /// Push scopes, run `f`, then pop back to the saved depth whether or not
    /// `f` succeeded.
    fn scoped<T>(
        &mut self,
        scopes: Vec<ScopeRef>,
        f: impl FnOnce(&mut Self) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        let depth = self.ctx.scopes.depth();
        for scope in scopes {
            self.ctx.scopes.push(scope);
        }
        let out = f(self);
        self.ctx.scopes.truncate(depth);
        out
    }

    /// Switch the active region and offset, run `f`, then restore both.
    fn in_region<T>(
        &mut self,
        region: Region,
        offset: usize,
        f: impl FnOnce(&mut Self) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        let saved = (self.ctx.region, self.ctx.offset);
        self.ctx.region = region;
        self.ctx.offset = offset;
        let out = f(self);
        self.ctx.region = saved.0;
        self.ctx.offset = saved.1;
        out
    }

    /// Base type named by the first type-specifier token in the subtree.
    fn base_type(&self, tree: &SyntaxTree, n: NodeId) -> Result<TypeInfo, AnalysisError> {
        let token = tree
            .find_first_token(n, |t| {
                matches!(
                    t.category,
                    Category::Int
                        | Category::Float
                        | Category::Char
                        | Category::Bool
                        | Category::Void
                        | Category::ClassName
                )
            })
            .ok_or_else(|| {
                AnalysisError::semantic("declaration missing a type specifier", tree.span(n))
            })?;
        Ok(match token.category {
            Category::Int => TypeInfo::new(TypeKind::Int, false),
            Category::Float => TypeInfo::new(TypeKind::Float, false),
            Category::Char => TypeInfo::new(TypeKind::Char, false),
            Category::Bool => TypeInfo::new(TypeKind::Bool, false),
            Category::Void => TypeInfo::new(TypeKind::Void, false),
            _ => TypeInfo::class(&token.text),
        })
    }

    /// Walk a declarator list, declaring one symbol per declarator. Each
    /// declarator decides its own pointer flag.
    fn declare_list(
        &mut self,
        tree: &mut SyntaxTree,
        base: &TypeInfo,
        n: NodeId,
    ) -> Result<(), AnalysisError> {
        if matches!(
            tree.rule(n),
            Some(Rule::InitDeclList) | Some(Rule::MemberDeclList)
        ) {
            for child in tree.children(n).to_vec() {
                if tree.rule(child).is_some() {
                    self.declare_list(tree, base, child)?;
                }
            }
            return Ok(());
        }
        let mut ty = base.shallow_copy();
        ty.pointer = tree.has_pointer(n);
        self.declare_one(tree, ty, n)
    }

    fn declare_one(
        &mut self,
        tree: &mut SyntaxTree,
        ty: TypeInfo,
        n: NodeId,
    ) -> Result<(), AnalysisError> {
        let rule = tree
            .rule(n)
            .ok_or_else(|| AnalysisError::internal("declarator handler reached a leaf"))?;
        match rule {
            // plain scalar or pointer, possibly with an initializer; descend
            // past wrapper nodes until the concrete declarator shows up
            Rule::InitDecl | Rule::PointerDecl | Rule::MemberDeclarator => {
                for child in tree.children(n).to_vec() {
                    let skip = matches!(
                        tree.rule(child),
                        None | Some(Rule::Initializer) | Some(Rule::InitList)
                    );
                    if !skip {
                        return self.declare_one(tree, ty, child);
                    }
                }
                let name = tree.identifier(n).map(str::to_owned);
                self.insert_or_fail(tree, name, ty, n)
            }
            Rule::FunctionDeclarator => {
                let name = tree.identifier(n).map(str::to_owned);
                let function = self.function_type(tree, n, ty, false)?;
                self.insert_or_fail(tree, name, function, n)
            }
            Rule::CtorDeclarator => {
                let name = tree.class_name(n).map(str::to_owned);
                let Some(class) = name else {
                    return Err(AnalysisError::semantic(
                        "constructor declarator names no class",
                        tree.span(n),
                    ));
                };
                let returns = TypeInfo::class(&class);
                let function = self.function_type(tree, n, returns, false)?;
                self.insert_or_fail(tree, Some(class), function, n)
            }
            Rule::ArrayDeclarator => {
                let size = tree.array_size(n).unwrap_or(-1);
                if size < 1 {
                    return Err(AnalysisError::semantic(
                        "bad array declarator size",
                        tree.span(n),
                    ));
                }
                let name = tree.identifier(n).map(str::to_owned);
                let array = TypeInfo::array(Rc::new(ty), size as usize);
                self.insert_or_fail(tree, name, array, n)
            }
            _ => Err(AnalysisError::semantic(
                "unsupported declarator form",
                tree.span(n),
            )),
        }
    }

    fn insert_or_fail(
        &mut self,
        tree: &mut SyntaxTree,
        name: Option<String>,
        ty: TypeInfo,
        n: NodeId,
    ) -> Result<(), AnalysisError> {
        match name {
            Some(name) => {
                self.ctx.insert_symbol(tree, &name, ty, n, false, None)?;
                Ok(())
            }
            None => Err(AnalysisError::semantic(
                "could not resolve declarator name",
                tree.span(n),
            )),
        }
    }

    /// Build a function descriptor from a declarator or definition subtree.
    /// Parameters are laid out in the local region starting at offset zero;
    /// only a definition gets a local symbol table (prototypes cannot know
    /// their frame layout, which is why the merge copies it over later).
    fn function_type(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        returns: TypeInfo,
        defining: bool,
    ) -> Result<TypeInfo, AnalysisError> {
        let locals = defining.then(new_scope);
        let mut parameters = Vec::new();
        let mut param_size = 0;
        if let Some(params) = tree.find_production(n, Rule::ParamDeclList) {
            param_size = self.in_region(Region::Local, 0, |b| {
                b.collect_params(tree, params, locals.as_ref(), &mut parameters)?;
                Ok(b.ctx.offset)
            })?;
        }
        Ok(TypeInfo::function(
            parameters,
            Rc::new(returns),
            locals,
            param_size,
        ))
    }

    fn collect_params(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        locals: Option<&ScopeRef>,
        parameters: &mut Vec<TypeRef>,
    ) -> Result<(), AnalysisError> {
        if tree.size(n) == 1 {
            return Ok(());
        }
        if tree.rule(n) != Some(Rule::ParamDecl) {
            for child in tree.children(n).to_vec() {
                self.collect_params(tree, child, locals, parameters)?;
            }
            return Ok(());
        }

        let mut ty = self.base_type(tree, n)?;
        ty.pointer = tree.has_pointer(n);
        if let Some(decl) = tree.child(n, 1) {
            if matches!(
                tree.rule(decl),
                Some(Rule::ArrayDeclarator) | Some(Rule::AbstractArrayDeclarator)
            ) {
                let size = tree.array_size(decl).unwrap_or(0).max(0) as usize;
                ty = TypeInfo::array(Rc::new(ty), size);
            }
        }
        let name = tree.identifier(n).map(str::to_owned);
        let ty: TypeRef = Rc::new(ty);
        parameters.push(Rc::clone(&ty));

        // unnamed parameters contribute to the signature but not the frame
        if let (Some(locals), Some(name)) = (locals, name) {
            ty.set_place(self.ctx.region, self.ctx.offset);
            tree.set_place(
                n,
                Place {
                    region: self.ctx.region,
                    offset: self.ctx.offset,
                    ty: Rc::clone(&ty),
                },
            );
            locals.borrow_mut().insert(&name, Rc::clone(&ty));
            self.ctx.trace(format!("parameter {}", name));
            self.ctx.offset += ty.storage_size();
        }
        Ok(())
    }

    /// Handle a function or constructor definition: merge the descriptor
    /// into the symbol table, then walk the body under the local scope with
    /// the local region active and its offset starting after the parameters.
    fn define_function(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        rule: Rule,
    ) -> Result<(), AnalysisError> {
        let name = if rule == Rule::CtorDef {
            tree.class_name(n).map(str::to_owned)
        } else {
            tree.identifier(n).map(str::to_owned)
        };
        let Some(name) = name else {
            return Err(AnalysisError::semantic(
                "function definition missing a name",
                tree.span(n),
            ));
        };
        let returns = if rule == Rule::CtorDef {
            TypeInfo::class(&name)
        } else {
            let mut r = self.base_type(tree, n)?;
            r.pointer = tree.has_pointer(n);
            r
        };
        let function = self.function_type(tree, n, returns, true)?;
        let param_size = function.param_size();
        let locals = function
            .locals()
            .ok_or_else(|| AnalysisError::internal("definition built without a local table"))?;

        let member_scopes = self.member_scopes(tree, n);
        self.scoped(member_scopes, |b| {
            b.ctx.insert_symbol(tree, &name, function, n, true, None)?;
            b.in_region(Region::Local, param_size, |b| {
                b.scoped(vec![locals], |b| {
                    match tree.find_production(n, Rule::CompoundStatement) {
                        Some(body) => b.visit(tree, body),
                        None => Ok(()),
                    }
                })
            })
        })
    }

    /// Class scopes to push for a `Class::member` definition: public first,
    /// then private, so private members shadow on lookup.
    fn member_scopes(&self, tree: &SyntaxTree, n: NodeId) -> Vec<ScopeRef> {
        let Some(class_name) = tree.member_class(n) else {
            return Vec::new();
        };
        let Some(class) = self.ctx.scopes.search(class_name) else {
            return Vec::new();
        };
        let mut scopes = Vec::new();
        if let Some(public) = class.public_section() {
            scopes.push(public);
        }
        if let Some(private) = class.private_section() {
            scopes.push(private);
        }
        scopes
    }

    /// Declare a class and populate its member sections under the class
    /// region. A class with no public section gets an empty one, and a
    /// public section with no constructor gets a default zero-parameter one.
    fn declare_class(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<(), AnalysisError> {
        let name = tree
            .class_name(n)
            .or_else(|| tree.identifier(n))
            .map(str::to_owned)
            .ok_or_else(|| {
                AnalysisError::semantic("class declaration missing a name", tree.span(n))
            })?;
        let class = self
            .ctx
            .insert_symbol(tree, &name, TypeInfo::class(&name), n, false, None)?;
        let body = tree.find_production(n, Rule::MemberSpec);

        self.in_region(Region::Class, 0, |b| {
            if let Some(body) = body {
                b.declare_members(tree, &class, body)?;
            }
            let public = match class.public_section() {
                Some(public) => public,
                None => {
                    let public = new_scope();
                    class.set_public_section(Rc::clone(&public));
                    public
                }
            };
            if !public.borrow().contains(&name) {
                b.ctx.trace(format!("default constructor for {}", name));
                let default_ctor =
                    TypeInfo::function(Vec::new(), Rc::new(TypeInfo::class(&name)), None, 0);
                b.scoped(vec![public], |b| {
                    b.ctx
                        .insert_symbol(tree, &name, default_ctor, n, false, None)
                })?;
            }
            Ok(())
        })
    }

    /// Walk a class body. Access sections allocate a fresh table, attach it
    /// to the class descriptor, and collect the members declared under them.
    fn declare_members(
        &mut self,
        tree: &mut SyntaxTree,
        class: &TypeRef,
        n: NodeId,
    ) -> Result<(), AnalysisError> {
        match tree.rule(n) {
            Some(Rule::AccessSection) => {
                let section = new_scope();
                let public = tree
                    .find_category(n, Category::Public, Some(Category::Private))
                    .is_some();
                let private = tree
                    .find_category(n, Category::Private, Some(Category::Public))
                    .is_some();
                if public {
                    class.set_public_section(Rc::clone(&section));
                } else if private {
                    class.set_private_section(Rc::clone(&section));
                } else {
                    return Err(AnalysisError::semantic(
                        "unrecognized class access specifier",
                        tree.span(n),
                    ));
                }
                let body = tree.child(n, 1);
                self.scoped(vec![section], |b| match body {
                    Some(body) => b.declare_members(tree, class, body),
                    None => Ok(()),
                })
            }
            Some(Rule::SimpleDecl) | Some(Rule::MemberDecl) => {
                let base = self.base_type(tree, n)?;
                let list = tree.child(n, 1).ok_or_else(|| {
                    AnalysisError::internal("member declaration without a declarator list")
                })?;
                self.declare_list(tree, &base, list)
            }
            // inline member definitions are handled like any other definition,
            // with the section scope already on the stack
            Some(Rule::FunctionDef) | Some(Rule::CtorDef) => self.visit(tree, n),
            Some(_) => {
                for child in tree.children(n).to_vec() {
                    if tree.rule(child).is_some() {
                        self.declare_members(tree, class, child)?;
                    }
                }
                Ok(())
            }
            None => Ok(()),
        }
    }
}
