//! Semantic analysis: scope construction and type checking.
//!
//! Analysis runs two passes over the parser's tree. The builder walks
//! pre-order, creating symbol tables and stamping storage placements onto
//! declarations. The checker then computes a type for every expression
//! bottom-up and rejects the program on the first fault. Both passes share
//! a [`SemanticContext`] holding the scope stack and the active storage
//! region; there is no global state.

pub mod builder;
pub mod checker;
pub mod error;
pub mod format;
pub mod symbol_table;
pub mod types;

use std::rc::Rc;

use crate::syntax::{NodeId, SyntaxTree, Token};

use builder::Builder;
use checker::Checker;
use format::format_type;
use symbol_table::ScopeStack;

pub use error::{AnalysisError, InternalError, SemanticError};
pub use symbol_table::ScopeRef;
pub use types::{Place, Primitives, Region, TypeInfo, TypeKind, TypeRef};

/// Which standard-library facilities the program has pulled in. The stream
/// operators are only checked (rather than rejected) when a stream header
/// is active under `using namespace std`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Libs {
    pub usingstd: bool,
    pub iostream: bool,
    pub fstream: bool,
    pub string: bool,
}

impl Libs {
    pub fn streams_active(&self) -> bool {
        self.usingstd && (self.iostream || self.fstream)
    }

    pub fn string_active(&self) -> bool {
        self.usingstd && self.string
    }
}

/// State shared by both analysis passes.
#[derive(Debug)]
pub struct SemanticContext {
    pub(crate) scopes: ScopeStack,
    pub(crate) region: Region,
    pub(crate) offset: usize,
    pub(crate) prims: Primitives,
    pub libs: Libs,
    trace: Option<Vec<String>>,
}

impl SemanticContext {
    pub fn new(libs: Libs) -> SemanticContext {
        SemanticContext {
            scopes: ScopeStack::new(),
            region: Region::Global,
            offset: 0,
            prims: Primitives::new(),
            libs,
            trace: None,
        }
    }

    /// Run both passes over the tree rooted at `root`.
    pub fn analyze(&mut self, tree: &mut SyntaxTree, root: NodeId) -> Result<(), AnalysisError> {
        Builder::new(self).run(tree, root)?;
        Checker::new(self).run(tree, root)?;
        Ok(())
    }

    pub fn global_scope(&self) -> ScopeRef {
        self.scopes.global()
    }

    pub fn constant_scope(&self) -> ScopeRef {
        self.scopes.constants()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Innermost-first lookup through the active scope stack.
    pub fn lookup(&self, name: &str) -> Option<TypeRef> {
        self.scopes.search(name)
    }

    /// Seed a global before analysis, e.g. the `cout`/`cin` stream objects
    /// a library prologue provides. The symbol is placed in the global
    /// region like an ordinary declaration.
    pub fn define_global(&mut self, name: &str, ty: TypeInfo) -> TypeRef {
        let ty: TypeRef = Rc::new(ty);
        ty.set_place(Region::Global, self.offset);
        self.scopes
            .global()
            .borrow_mut()
            .insert(name, Rc::clone(&ty));
        self.offset += ty.storage_size();
        ty
    }

    /// Start recording one line per symbol event; see [`take_trace`].
    ///
    /// [`take_trace`]: SemanticContext::take_trace
    pub fn enable_trace(&mut self) {
        self.trace = Some(Vec::new());
    }

    pub fn take_trace(&mut self) -> Vec<String> {
        self.trace.take().unwrap_or_default()
    }

    pub(crate) fn trace(&mut self, line: String) {
        if let Some(trace) = &mut self.trace {
            trace.push(line);
        }
    }

    /// Storage placement for a node: the stamp the builder left on it, or
    /// the declared placement of the identifier the node names.
    pub fn address_of(&self, tree: &SyntaxTree, node: NodeId) -> Result<Place, AnalysisError> {
        if let Some(place) = tree.place(node) {
            return Ok(place.clone());
        }
        let name = tree
            .identifier(node)
            .ok_or_else(|| AnalysisError::internal("address query on a node with no identifier"))?;
        let ty = self.scopes.search(name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(node))
        })?;
        let (region, offset) = ty
            .place()
            .ok_or_else(|| AnalysisError::internal(format!("symbol {} has no placement", name)))?;
        Ok(Place { region, offset, ty })
    }

    /// Insert a symbol, merging with a previous declaration when allowed.
    ///
    /// A function definition searches the whole stack so it can merge with a
    /// prototype from an outer scope; everything else only collides with the
    /// current scope. A fresh symbol is stamped with the active region and
    /// offset (mirrored onto the tree node) and the offset advances by its
    /// storage size. Literal constants land in the constants table instead,
    /// and int-like constants record their immediate value as the offset.
    pub(crate) fn insert_symbol(
        &mut self,
        tree: &mut SyntaxTree,
        name: &str,
        ty: TypeInfo,
        node: NodeId,
        is_definition: bool,
        literal: Option<&Token>,
    ) -> Result<TypeRef, AnalysisError> {
        if name.is_empty() {
            return Err(AnalysisError::internal("symbol insert with an empty name"));
        }
        let existing = if is_definition && ty.is_function() {
            // a definition may merge with a prototype from any enclosing
            // scope, but only a function counts as a merge candidate
            match self.scopes.search(name) {
                Some(found) if found.is_function() => Some(found),
                _ => self.scopes.search_current(name),
            }
        } else {
            self.scopes.search_current(name)
        };
        match existing {
            None => self.insert_fresh(tree, name, ty, node, literal),
            Some(existing) if existing.is_function() && ty.is_function() => {
                if !existing.compatible(&ty) {
                    return Err(AnalysisError::semantic(
                        format!("function signatures for {} mismatched", name),
                        tree.span(node),
                    ));
                }
                if is_definition {
                    if existing.locals().is_some() {
                        return Err(AnalysisError::semantic(
                            format!("function {} already defined", name),
                            tree.span(node),
                        ));
                    }
                    let locals = ty.locals().ok_or_else(|| {
                        AnalysisError::internal(format!(
                            "definition of {} carries no local table",
                            name
                        ))
                    })?;
                    existing.attach_locals(locals);
                    existing.set_param_size(ty.param_size());
                    self.trace(format!("defined function {}", name));
                }
                Ok(existing)
            }
            Some(_) => Err(AnalysisError::semantic(
                format!("identifier {} already declared", name),
                tree.span(node),
            )),
        }
    }

    fn insert_fresh(
        &mut self,
        tree: &mut SyntaxTree,
        name: &str,
        ty: TypeInfo,
        node: NodeId,
        literal: Option<&Token>,
    ) -> Result<TypeRef, AnalysisError> {
        let ty: TypeRef = Rc::new(ty);
        ty.set_place(self.region, self.offset);
        tree.set_place(
            node,
            Place {
                region: self.region,
                offset: self.offset,
                ty: Rc::clone(&ty),
            },
        );
        let target = if literal.is_some() {
            self.scopes.constants()
        } else {
            self.scopes.current()
        };
        target.borrow_mut().insert(name, Rc::clone(&ty));
        self.trace(format!("declared {} as {}", name, format_type(&ty)));

        match literal {
            None => self.offset += ty.storage_size(),
            Some(token) => {
                let is_float = matches!(ty.kind, TypeKind::Float) && !ty.pointer;
                let is_string = matches!(ty.kind, TypeKind::Char) && ty.pointer;
                if is_float {
                    self.offset += 8;
                } else if is_string {
                    self.offset += token.storage_size().unwrap_or(token.text.len() + 1);
                } else {
                    // int-like constants are immediates, not pool slots: the
                    // recorded offset is the value itself and no space is used
                    let value = token.int_value().unwrap_or(0).max(0) as usize;
                    ty.set_place(self.region, value);
                    tree.set_place(
                        node,
                        Place {
                            region: self.region,
                            offset: value,
                            ty: Rc::clone(&ty),
                        },
                    );
                }
            }
        }
        Ok(ty)
    }
}

/// Analyze a whole translation unit with a fresh context.
pub fn analyze(
    tree: &mut SyntaxTree,
    root: NodeId,
    libs: Libs,
) -> Result<SemanticContext, AnalysisError> {
    let mut ctx = SemanticContext::new(libs);
    ctx.analyze(tree, root)?;
    Ok(ctx)
}
