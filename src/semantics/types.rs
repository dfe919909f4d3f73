//! Type descriptors and storage placement.
//!
//! Descriptors are reference-counted: symbol tables own an `Rc<TypeInfo>`
//! and tree placements hold clones of the same `Rc`, so a merge that
//! attaches a definition's locals to a declared function is visible from
//! every holder. The three slots mutated after insertion (placement, local
//! scope, parameter frame size) use interior mutability for that reason.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::symbol_table::ScopeRef;

/// Shared handle to a type descriptor.
pub type TypeRef = Rc<TypeInfo>;

/// Storage region a symbol lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Global,
    Local,
    Class,
    Constant,
}

/// Where a symbol was placed: region plus byte offset, with a handle to the
/// descriptor the placement belongs to.
#[derive(Debug, Clone)]
pub struct Place {
    pub region: Region,
    pub offset: usize,
    pub ty: TypeRef,
}

/// The shape of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Int,
    Float,
    Char,
    Bool,
    Void,
    /// Placeholder for tokens the analyzer has no type for.
    Unknown,
    Array {
        element: TypeRef,
        size: usize,
    },
    Function {
        parameters: Vec<TypeRef>,
        returns: TypeRef,
        /// Local symbol table, attached when the definition is seen.
        locals: RefCell<Option<ScopeRef>>,
        /// Bytes occupied by the parameters at the start of the local frame.
        param_size: Cell<usize>,
    },
    Class {
        name: String,
        public: RefCell<Option<ScopeRef>>,
        private: RefCell<Option<ScopeRef>>,
    },
}

/// A type descriptor: base shape plus a single level of indirection.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub pointer: bool,
    place: Cell<Option<(Region, usize)>>,
}

impl TypeInfo {
    pub fn new(kind: TypeKind, pointer: bool) -> TypeInfo {
        TypeInfo {
            kind,
            pointer,
            place: Cell::new(None),
        }
    }

    pub fn class(name: &str) -> TypeInfo {
        TypeInfo::new(
            TypeKind::Class {
                name: name.to_owned(),
                public: RefCell::new(None),
                private: RefCell::new(None),
            },
            false,
        )
    }

    pub fn function(
        parameters: Vec<TypeRef>,
        returns: TypeRef,
        locals: Option<ScopeRef>,
        param_size: usize,
    ) -> TypeInfo {
        TypeInfo::new(
            TypeKind::Function {
                parameters,
                returns,
                locals: RefCell::new(locals),
                param_size: Cell::new(param_size),
            },
            false,
        )
    }

    pub fn array(element: TypeRef, size: usize) -> TypeInfo {
        TypeInfo::new(TypeKind::Array { element, size }, false)
    }

    /// Copy of this descriptor. Class and function member tables stay shared;
    /// the placement slot is carried over as-is and usually re-stamped by the
    /// caller.
    pub fn shallow_copy(&self) -> TypeInfo {
        self.clone()
    }

    pub fn place(&self) -> Option<(Region, usize)> {
        self.place.get()
    }

    pub fn set_place(&self, region: Region, offset: usize) {
        self.place.set(Some((region, offset)));
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn class_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<TypeRef> {
        match &self.kind {
            TypeKind::Array { element, .. } => Some(Rc::clone(element)),
            _ => None,
        }
    }

    pub fn locals(&self) -> Option<ScopeRef> {
        match &self.kind {
            TypeKind::Function { locals, .. } => locals.borrow().clone(),
            _ => None,
        }
    }

    pub fn attach_locals(&self, scope: ScopeRef) {
        if let TypeKind::Function { locals, .. } = &self.kind {
            *locals.borrow_mut() = Some(scope);
        }
    }

    pub fn param_size(&self) -> usize {
        match &self.kind {
            TypeKind::Function { param_size, .. } => param_size.get(),
            _ => 0,
        }
    }

    pub fn set_param_size(&self, size: usize) {
        if let TypeKind::Function { param_size, .. } = &self.kind {
            param_size.set(size);
        }
    }

    pub fn public_section(&self) -> Option<ScopeRef> {
        match &self.kind {
            TypeKind::Class { public, .. } => public.borrow().clone(),
            _ => None,
        }
    }

    pub fn private_section(&self) -> Option<ScopeRef> {
        match &self.kind {
            TypeKind::Class { private, .. } => private.borrow().clone(),
            _ => None,
        }
    }

    pub fn set_public_section(&self, scope: ScopeRef) {
        if let TypeKind::Class { public, .. } = &self.kind {
            *public.borrow_mut() = Some(scope);
        }
    }

    pub fn set_private_section(&self, scope: ScopeRef) {
        if let TypeKind::Class { private, .. } = &self.kind {
            *private.borrow_mut() = Some(scope);
        }
    }

    /// Return type of a function descriptor; any other descriptor projects
    /// to itself, so expression results thread through uniformly.
    pub fn return_type(this: &TypeRef) -> TypeRef {
        match &this.kind {
            TypeKind::Function { returns, .. } => Rc::clone(returns),
            _ => Rc::clone(this),
        }
    }

    /// Structural compatibility.
    ///
    /// Pointer flags must agree. Arrays compare element type and size,
    /// functions compare return type and parameters pairwise (local tables
    /// and frame sizes are bookkeeping, not signature), classes compare by
    /// name.
    pub fn compatible(&self, other: &TypeInfo) -> bool {
        if self.pointer != other.pointer {
            return false;
        }
        match (&self.kind, &other.kind) {
            (TypeKind::Int, TypeKind::Int)
            | (TypeKind::Float, TypeKind::Float)
            | (TypeKind::Char, TypeKind::Char)
            | (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Void, TypeKind::Void) => true,
            (
                TypeKind::Array { element: a, size: x },
                TypeKind::Array { element: b, size: y },
            ) => x == y && a.compatible(b),
            (
                TypeKind::Function {
                    parameters: pa,
                    returns: ra,
                    ..
                },
                TypeKind::Function {
                    parameters: pb,
                    returns: rb,
                    ..
                },
            ) => {
                ra.compatible(rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| a.compatible(b))
            }
            (TypeKind::Class { name: a, .. }, TypeKind::Class { name: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Bytes of storage a symbol of this type occupies.
    pub fn storage_size(&self) -> usize {
        if self.pointer {
            return 8;
        }
        match &self.kind {
            TypeKind::Int => 4,
            TypeKind::Float => 8,
            TypeKind::Char | TypeKind::Bool => 1,
            TypeKind::Void | TypeKind::Unknown => 0,
            TypeKind::Array { element, size } => size * element.storage_size(),
            TypeKind::Function { .. } => 0,
            TypeKind::Class { public, private, .. } => {
                let section_size = |section: &RefCell<Option<ScopeRef>>| {
                    section.borrow().as_ref().map_or(0, |scope| {
                        scope
                            .borrow()
                            .iter()
                            .map(|(_, ty)| ty.storage_size())
                            .sum()
                    })
                };
                section_size(public) + section_size(private)
            }
        }
    }
}

/// Canonical descriptors for the primitive types, shared so repeated uses
/// alias a single allocation each.
#[derive(Debug)]
pub struct Primitives {
    pub int: TypeRef,
    pub float: TypeRef,
    pub char: TypeRef,
    pub bool: TypeRef,
    pub void: TypeRef,
    /// String literals are pointers to char.
    pub string: TypeRef,
    pub unknown: TypeRef,
}

impl Primitives {
    pub fn new() -> Primitives {
        Primitives {
            int: Rc::new(TypeInfo::new(TypeKind::Int, false)),
            float: Rc::new(TypeInfo::new(TypeKind::Float, false)),
            char: Rc::new(TypeInfo::new(TypeKind::Char, false)),
            bool: Rc::new(TypeInfo::new(TypeKind::Bool, false)),
            void: Rc::new(TypeInfo::new(TypeKind::Void, false)),
            string: Rc::new(TypeInfo::new(TypeKind::Char, true)),
            unknown: Rc::new(TypeInfo::new(TypeKind::Unknown, false)),
        }
    }
}

impl Default for Primitives {
    fn default() -> Self {
        Primitives::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::symbol_table::new_scope;

    #[test]
    fn pointers_are_not_compatible_with_their_base() {
        let int = TypeInfo::new(TypeKind::Int, false);
        let int_ptr = TypeInfo::new(TypeKind::Int, true);
        assert!(!int.compatible(&int_ptr));
        assert!(int_ptr.compatible(&int_ptr.shallow_copy()));
    }

    #[test]
    fn function_compatibility_ignores_locals_and_frame_size() {
        let prims = Primitives::new();
        let declared = TypeInfo::function(
            vec![Rc::clone(&prims.int)],
            Rc::clone(&prims.void),
            None,
            0,
        );
        let defined = TypeInfo::function(
            vec![Rc::clone(&prims.int)],
            Rc::clone(&prims.void),
            Some(new_scope()),
            4,
        );
        assert!(declared.compatible(&defined));

        let other = TypeInfo::function(Vec::new(), Rc::clone(&prims.void), None, 0);
        assert!(!declared.compatible(&other));
    }

    #[test]
    fn storage_sizes() {
        let prims = Primitives::new();
        assert_eq!(prims.int.storage_size(), 4);
        assert_eq!(prims.float.storage_size(), 8);
        assert_eq!(prims.bool.storage_size(), 1);
        assert_eq!(prims.string.storage_size(), 8);

        let arr = TypeInfo::array(Rc::clone(&prims.int), 3);
        assert_eq!(arr.storage_size(), 12);
    }

    #[test]
    fn class_size_sums_member_sections() {
        let prims = Primitives::new();
        let class = TypeInfo::class("Point");
        let public = new_scope();
        public.borrow_mut().insert("x", Rc::clone(&prims.int));
        public.borrow_mut().insert("y", Rc::clone(&prims.int));
        class.set_public_section(public);
        assert_eq!(class.storage_size(), 8);
    }

    #[test]
    fn attached_locals_are_visible_through_shared_handles() {
        let prims = Primitives::new();
        let f: TypeRef = Rc::new(TypeInfo::function(
            Vec::new(),
            Rc::clone(&prims.void),
            None,
            0,
        ));
        let alias = Rc::clone(&f);
        assert!(alias.locals().is_none());
        f.attach_locals(new_scope());
        f.set_param_size(12);
        assert!(alias.locals().is_some());
        assert_eq!(alias.param_size(), 12);
    }
}
