//! Pass two: type checking.
//!
//! A bottom-up walk computing a type for every expression. Each production
//! the checker knows about has its own handler; structural productions are
//! descended through with no type of their own. Leaves resolve through the
//! scope stack, so an undeclared identifier surfaces as `None` and the
//! nearest handler turns that into the error for its position.

use std::rc::Rc;

use crate::syntax::{Category, NodeId, Rule, SyntaxTree, Token};

use super::error::AnalysisError;
use super::symbol_table::ScopeRef;
use super::types::{TypeInfo, TypeKind, TypeRef};
use super::SemanticContext;

pub struct Checker<'ctx> {
    ctx: &'ctx mut SemanticContext,
}

impl<'ctx> Checker<'ctx> {
    pub fn new(ctx: &'ctx mut SemanticContext) -> Checker<'ctx> {
        Checker { ctx }
    }

    pub fn run(&mut self, tree: &mut SyntaxTree, root: NodeId) -> Result<(), AnalysisError> {
        self.check(tree, root)?;
        Ok(())
    }

    /// Type of the subtree at `n`, or `None` for constructs that have no
    /// type (statements, undeclared identifiers, empty productions).
    pub fn check(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        if tree.size(n) == 1 {
            return Ok(self.leaf_type(tree, n));
        }
        let Some(rule) = tree.rule(n) else {
            return Ok(None);
        };
        match rule {
            Rule::Literal => self.literal(tree, n).map(Some),
            Rule::Initializer => self.initializer(tree, n).map(Some),
            Rule::InitList => self.init_list(tree, n).map(Some),
            Rule::NewExpr => self.new_expr(tree, n).map(Some),
            Rule::DeleteExpr => self.delete_expr(tree, n),
            Rule::AssignExpr => self.assignment(tree, n).map(Some),
            Rule::EqualExpr | Rule::NotEqualExpr => self.equality(tree, n).map(Some),
            Rule::RelLess | Rule::RelGreater | Rule::RelLessEq | Rule::RelGreaterEq => {
                self.relational(tree, n).map(Some)
            }
            Rule::AddExpr | Rule::SubExpr | Rule::MulExpr | Rule::DivExpr => {
                self.arithmetic(tree, n).map(Some)
            }
            Rule::ModExpr => self.modulo(tree, n).map(Some),
            Rule::BitAndExpr | Rule::BitXorExpr | Rule::BitOrExpr => Err(AnalysisError::semantic(
                "bitwise operations are unsupported in Cub",
                tree.span(n),
            )),
            Rule::LogicalAndExpr | Rule::LogicalOrExpr => self.logical(tree, n).map(Some),
            Rule::ArrayIndex => self.array_index(tree, n).map(Some),
            Rule::Call => self.call(tree, n).map(Some),
            Rule::DotField => self.field_access(tree, n, false).map(Some),
            Rule::ArrowField => self.field_access(tree, n, true).map(Some),
            Rule::PostfixInc | Rule::PostfixDec => self.postfix_step(tree, n).map(Some),
            Rule::PrefixInc | Rule::PrefixDec => self.prefix_step(tree, n).map(Some),
            Rule::Deref => self.deref(tree, n).map(Some),
            Rule::AddressOf => self.address_of(tree, n).map(Some),
            Rule::UnaryExpr => self.unary(tree, n).map(Some),
            Rule::SizeofExpr => Ok(Some(Rc::clone(&self.ctx.prims.int))),
            Rule::StreamOut => self.stream_out(tree, n),
            Rule::StreamIn => self.stream_in(tree, n),
            Rule::FunctionDef | Rule::CtorDef => self.function_def(tree, n, rule).map(Some),
            Rule::ClassSpec => self.class_spec(tree, n),
            Rule::ExprList => self.expr_list(tree, n),

            Rule::SimpleDecl
            | Rule::InitDeclList
            | Rule::InitDecl
            | Rule::PointerDecl
            | Rule::FunctionDeclarator
            | Rule::CtorDeclarator
            | Rule::MemberIdentDeclarator
            | Rule::MemberCtorDeclarator
            | Rule::ArrayDeclarator
            | Rule::AbstractArrayDeclarator
            | Rule::ParamDeclList
            | Rule::ParamDecl
            | Rule::TypeSpecSeq
            | Rule::MemberSpec
            | Rule::AccessSection
            | Rule::MemberDecl
            | Rule::MemberDeclList
            | Rule::MemberDeclarator
            | Rule::CompoundStatement
            | Rule::ReturnStatement
            | Rule::Other => self.descend(tree, n),
        }
    }

    fn descend(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        for child in tree.children(n).to_vec() {
            self.check(tree, child)?;
        }
        Ok(None)
    }

    /// Type of a single token: identifiers resolve through the scope stack,
    /// literals and type keywords map to their primitive.
    fn leaf_type(&self, tree: &SyntaxTree, n: NodeId) -> Option<TypeRef> {
        let token = tree.token(n)?;
        let prims = &self.ctx.prims;
        match token.category {
            Category::Identifier => self.ctx.scopes.search(&token.text),
            Category::ClassName => Some(Rc::new(TypeInfo::class(&token.text))),
            Category::Int | Category::IntegerLit => Some(Rc::clone(&prims.int)),
            Category::Float | Category::FloatLit => Some(Rc::clone(&prims.float)),
            Category::Char | Category::CharLit => Some(Rc::clone(&prims.char)),
            Category::Bool | Category::TrueLit | Category::FalseLit => Some(Rc::clone(&prims.bool)),
            Category::Void => Some(Rc::clone(&prims.void)),
            Category::StringLit => Some(Rc::clone(&prims.string)),
            _ => Some(Rc::clone(&prims.unknown)),
        }
    }

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

    fn member_scopes(&self, tree: &SyntaxTree, n: NodeId) -> Vec<ScopeRef> {
        let Some(class_name) = tree.member_class(n) else {
            return Vec::new();
        };
        self.class_sections(class_name)
    }

    fn class_sections(&self, class_name: &str) -> Vec<ScopeRef> {
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

    fn left_type(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let child = self
            .left_child(tree, n)
            .ok_or_else(|| AnalysisError::internal("binary node missing its left operand"))?;
        let span = tree.span(child);
        self.check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("left operand undeclared", span))
    }

    fn left_child(&self, tree: &SyntaxTree, n: NodeId) -> Option<NodeId> {
        tree.child(n, 0)
    }

    fn right_type(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let child = tree
            .child(n, 2)
            .ok_or_else(|| AnalysisError::internal("binary node missing its right operand"))?;
        let span = tree.span(child);
        self.check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("right operand undeclared", span))
    }

    fn require_numeric(
        &self,
        ty: &TypeRef,
        tree: &SyntaxTree,
        n: NodeId,
        side: &str,
    ) -> Result<(), AnalysisError> {
        if ty.compatible(&self.ctx.prims.int) || ty.compatible(&self.ctx.prims.float) {
            Ok(())
        } else {
            Err(AnalysisError::semantic(
                format!("{} operand not an int or float", side),
                tree.span(n),
            ))
        }
    }

    fn is_truthy(&self, ty: &TypeRef) -> bool {
        ty.compatible(&self.ctx.prims.int) || ty.compatible(&self.ctx.prims.bool)
    }

    /// Literal tokens are interned into the constants table: the first use
    /// of a spelling allocates (or records the immediate), later uses reuse
    /// the same descriptor.
    fn literal(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let child = tree
            .child(n, 0)
            .ok_or_else(|| AnalysisError::internal("literal production without a token"))?;
        let token: Token = tree
            .token(child)
            .cloned()
            .ok_or_else(|| AnalysisError::internal("literal child is not a token"))?;
        let base = self
            .leaf_type(tree, child)
            .ok_or_else(|| AnalysisError::internal("literal with no primitive mapping"))?;

        let interned = self.ctx.scopes.constants().borrow().get(&token.text);
        if let Some(existing) = interned {
            return Ok(existing);
        }
        let name = token.text.clone();
        self.ctx
            .insert_symbol(tree, &name, base.shallow_copy(), child, false, Some(&token))
    }

    fn initializer(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let parent = tree
            .parent(n)
            .ok_or_else(|| AnalysisError::internal("initializer without a parent declarator"))?;
        let name = tree.identifier(parent).map(str::to_owned).ok_or_else(|| {
            AnalysisError::semantic("could not get identifier in initializer", tree.span(n))
        })?;
        let declared = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(
                format!("could not get symbol for {} in initializer", name),
                tree.span(n),
            )
        })?;
        let child = tree
            .child(n, 0)
            .ok_or_else(|| AnalysisError::internal("initializer without a value"))?;
        let span = tree.span(child);
        let value = self
            .check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("initializer value undeclared", span))?;
        if declared.compatible(&value) || self.string_from_literal(&declared, &value) {
            self.ctx.trace(format!("initialized {}", name));
            Ok(declared)
        } else {
            Err(AnalysisError::semantic(
                format!("could not initialize {} with given type", name),
                tree.span(n),
            ))
        }
    }

    /// A `string` class object may be initialized or assigned from a string
    /// literal (a char pointer), once the string header is active.
    fn string_from_literal(&self, declared: &TypeRef, value: &TypeRef) -> bool {
        self.ctx.libs.string_active()
            && declared.class_name() == Some("string")
            && value.compatible(&self.ctx.prims.string)
    }

    fn init_list(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let grandparent = tree
            .parent(n)
            .and_then(|p| tree.parent(p))
            .ok_or_else(|| AnalysisError::internal("initializer list outside a declarator"))?;
        let name = tree
            .identifier(grandparent)
            .map(str::to_owned)
            .ok_or_else(|| {
                AnalysisError::semantic(
                    "could not get identifier in initializer list",
                    tree.span(n),
                )
            })?;
        let declared = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(
                format!("could not get symbol for {} in initializer list", name),
                tree.span(n),
            )
        })?;
        let TypeKind::Array { element, size } = &declared.kind else {
            return Err(AnalysisError::semantic(
                format!("initializer list assignee {} is not an array", name),
                tree.span(n),
            ));
        };
        let element = Rc::clone(element);
        let size = *size;

        let mut items = 0;
        for child in tree.children(n).to_vec() {
            if tree.rule(child).is_none() {
                continue;
            }
            items += 1;
            let span = tree.span(child);
            let item = self
                .check(tree, child)?
                .ok_or_else(|| AnalysisError::semantic("initializer item undeclared", span))?;
            if !element.compatible(&item) {
                return Err(AnalysisError::semantic(
                    format!("initializer item did not match {} element type", name),
                    span,
                ));
            }
            if items > size {
                return Err(AnalysisError::semantic(
                    format!("array {} size {} exceeded by initializer list", name, size),
                    span,
                ));
            }
        }
        self.ctx.trace(format!("initialized array {}", name));
        Ok(declared)
    }

    /// `new T(args)` yields a pointer to `T`. For a class the argument list
    /// must match a visible constructor.
    fn new_expr(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let spec = tree.find_production(n, Rule::TypeSpecSeq).ok_or_else(|| {
            AnalysisError::semantic("new operator missing a type", tree.span(n))
        })?;
        let spec_child = tree
            .child(spec, 0)
            .ok_or_else(|| AnalysisError::internal("empty type specifier under new"))?;
        let span = tree.span(n);
        let base = self
            .check(tree, spec_child)?
            .ok_or_else(|| AnalysisError::semantic("could not resolve type in new expression", span))?;
        let mut pointer = base.shallow_copy();
        pointer.pointer = true;

        if let Some(class_name) = base.class_name().map(str::to_owned) {
            let sections = self.class_sections(&class_name);
            let args_from = tree.find_production(n, Rule::ExprList);
            self.scoped(sections, |chk| {
                let ctor = chk.ctx.scopes.search(&class_name).ok_or_else(|| {
                    AnalysisError::semantic(
                        format!("could not find constructor for {}", class_name),
                        span,
                    )
                })?;
                let arguments = chk.collect_args(tree, args_from)?;
                let candidate =
                    TypeInfo::function(arguments, TypeInfo::return_type(&ctor), None, 0);
                if !ctor.compatible(&candidate) {
                    return Err(AnalysisError::semantic("new operator types mismatched", span));
                }
                Ok(())
            })?;
            self.ctx.trace(format!("new {}", class_name));
        }
        Ok(Rc::new(pointer))
    }

    fn delete_expr(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        let child = tree
            .child(n, 1)
            .ok_or_else(|| AnalysisError::internal("delete without an operand"))?;
        let span = tree.span(child);
        let ty = self
            .check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("delete operand undeclared", span))?;
        if !ty.pointer {
            return Err(AnalysisError::semantic(
                "delete operator expected a pointer",
                tree.span(n),
            ));
        }
        Ok(None)
    }

    fn assignment(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let target = self
            .left_child(tree, n)
            .ok_or_else(|| AnalysisError::internal("assignment missing its target"))?;
        let name = tree.identifier(target).map(str::to_owned).ok_or_else(|| {
            AnalysisError::semantic("left assignment operand not assignable", tree.span(n))
        })?;
        let op = tree
            .child(n, 1)
            .and_then(|c| tree.token(c))
            .map(|t| t.category)
            .ok_or_else(|| AnalysisError::internal("assignment missing its operator"))?;
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;

        match op {
            Category::Assign => {}
            Category::AddAssign
            | Category::SubAssign
            | Category::MulAssign
            | Category::DivAssign => {
                self.require_numeric(&left, tree, n, "left")?;
                self.require_numeric(&right, tree, n, "right")?;
            }
            Category::ModAssign => {
                if !left.compatible(&self.ctx.prims.int) || !right.compatible(&self.ctx.prims.int) {
                    return Err(AnalysisError::semantic(
                        "modulo operand not an integer",
                        tree.span(n),
                    ));
                }
            }
            Category::ShlAssign
            | Category::ShrAssign
            | Category::AndAssign
            | Category::XorAssign
            | Category::OrAssign => {
                return Err(AnalysisError::semantic(
                    "bitwise operations are unsupported in Cub",
                    tree.span(n),
                ));
            }
            _ => {
                return Err(AnalysisError::internal("unexpected assignment operator"));
            }
        }

        if left.compatible(&right) || self.string_from_literal(&left, &right) {
            self.ctx.trace(format!("assigned {}", name));
            Ok(left)
        } else {
            Err(AnalysisError::semantic(
                format!("could not assign to {}", name),
                tree.span(n),
            ))
        }
    }

    fn equality(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;
        if !left.compatible(&right) {
            return Err(AnalysisError::semantic(
                "equality operands don't match",
                tree.span(n),
            ));
        }
        Ok(Rc::clone(&self.ctx.prims.bool))
    }

    fn relational(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;
        self.require_numeric(&left, tree, n, "left")?;
        self.require_numeric(&right, tree, n, "right")?;
        if !left.compatible(&right) {
            return Err(AnalysisError::semantic(
                "could not order operands",
                tree.span(n),
            ));
        }
        Ok(Rc::clone(&self.ctx.prims.bool))
    }

    fn arithmetic(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;
        self.require_numeric(&left, tree, n, "left")?;
        self.require_numeric(&right, tree, n, "right")?;
        if !left.compatible(&right) {
            return Err(AnalysisError::semantic(
                "could not perform arithmetic on operands",
                tree.span(n),
            ));
        }
        Ok(left)
    }

    fn modulo(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;
        if !left.compatible(&self.ctx.prims.int) || !right.compatible(&self.ctx.prims.int) {
            return Err(AnalysisError::semantic(
                "modulo operand not an integer",
                tree.span(n),
            ));
        }
        Ok(left)
    }

    fn logical(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let left = self.left_type(tree, n)?;
        let right = self.right_type(tree, n)?;
        if !self.is_truthy(&left) {
            return Err(AnalysisError::semantic(
                "left operand not an int or bool",
                tree.span(n),
            ));
        }
        if !self.is_truthy(&right) {
            return Err(AnalysisError::semantic(
                "right operand not an int or bool",
                tree.span(n),
            ));
        }
        Ok(Rc::clone(&self.ctx.prims.bool))
    }

    fn array_index(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let name = tree.identifier(n).map(str::to_owned).ok_or_else(|| {
            AnalysisError::semantic("array expression missing an identifier", tree.span(n))
        })?;
        let array = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(n))
        })?;
        if !array.is_array() {
            return Err(AnalysisError::semantic(
                format!("trying to index non array symbol {}", name),
                tree.span(n),
            ));
        }
        let index = self.right_type(tree, n)?;
        if !index.compatible(&self.ctx.prims.int) {
            return Err(AnalysisError::semantic(
                "array index not an integer",
                tree.span(n),
            ));
        }
        array
            .element_type()
            .ok_or_else(|| AnalysisError::internal("array descriptor without an element type"))
    }

    /// Call: build a signature from the callee's return type plus the
    /// argument types and require the callee to match it exactly.
    fn call(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let callee = self.left_type(tree, n)?;
        let args_from = tree.find_production(n, Rule::ExprList);
        let arguments = self.collect_args(tree, args_from)?;
        let candidate = TypeInfo::function(arguments, TypeInfo::return_type(&callee), None, 0);
        if !callee.compatible(&candidate) {
            return Err(AnalysisError::semantic(
                "function invocation did not match signature",
                tree.span(n),
            ));
        }
        Ok(TypeInfo::return_type(&callee))
    }

    /// Argument types from a nested expression list, left-to-right. The list
    /// nests leftward: each level's first child is the rest of the list.
    fn collect_args(
        &mut self,
        tree: &mut SyntaxTree,
        list: Option<NodeId>,
    ) -> Result<Vec<TypeRef>, AnalysisError> {
        let mut arguments = Vec::new();
        let mut cursor = list;
        while let Some(node) = cursor {
            if tree.rule(node) != Some(Rule::ExprList) {
                break;
            }
            let span = tree.span(node);
            let ty = self.check(tree, node)?.ok_or_else(|| {
                AnalysisError::semantic("symbol for parameter undeclared", span)
            })?;
            arguments.insert(0, ty);
            cursor = tree.child(node, 0);
        }
        Ok(arguments)
    }

    /// Evaluate one expression list node: the rightmost item at this level.
    fn expr_list(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        let first = tree
            .child(n, 0)
            .ok_or_else(|| AnalysisError::internal("empty expression list"))?;
        if tree.rule(first) == Some(Rule::ExprList) {
            let item = tree
                .child(n, 1)
                .ok_or_else(|| AnalysisError::internal("expression list without an item"))?;
            self.check(tree, item)
        } else {
            self.check(tree, first)
        }
    }

    /// Field access through `.` or `->`. The object must be a class instance
    /// (or class pointer for arrow), and the field must be in the class's
    /// public section.
    fn field_access(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        through_pointer: bool,
    ) -> Result<TypeRef, AnalysisError> {
        let name = tree
            .identifier(n)
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::internal("field access missing an object"))?;
        let field_node = tree
            .child(n, 2)
            .ok_or_else(|| AnalysisError::internal("field access missing a member"))?;
        let field = tree
            .identifier(field_node)
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::internal("field access missing a member name"))?;

        let object = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(n))
        })?;
        if !object.is_class() || object.pointer != through_pointer {
            let expected = if through_pointer {
                "class pointer"
            } else {
                "class instance"
            };
            return Err(AnalysisError::semantic(
                format!("expected {} to be a {}", name, expected),
                tree.span(n),
            ));
        }
        let class_name = object
            .class_name()
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::internal("class descriptor without a name"))?;
        let class = self.ctx.scopes.search(&class_name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", class_name), tree.span(n))
        })?;
        let member = class
            .public_section()
            .and_then(|section| section.borrow().get(&field))
            .ok_or_else(|| {
                AnalysisError::semantic(
                    format!("field {} not in public scope of {}", field, class_name),
                    tree.span(n),
                )
            })?;
        Ok(TypeInfo::return_type(&member))
    }

    fn postfix_step(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let child = tree
            .child(n, 0)
            .ok_or_else(|| AnalysisError::internal("postfix step without an operand"))?;
        self.step_operand(tree, n, child, "postfix")
    }

    fn prefix_step(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let child = tree
            .child(n, 1)
            .ok_or_else(|| AnalysisError::internal("prefix step without an operand"))?;
        self.step_operand(tree, n, child, "prefix")
    }

    fn step_operand(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        child: NodeId,
        position: &str,
    ) -> Result<TypeRef, AnalysisError> {
        let span = tree.span(child);
        let ty = self
            .check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("step operand undeclared", span))?;
        if !ty.compatible(&self.ctx.prims.int) {
            return Err(AnalysisError::semantic(
                format!("operand to {} ++/-- not an int", position),
                tree.span(n),
            ));
        }
        Ok(ty)
    }

    fn deref(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let name = tree
            .identifier(n)
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::internal("dereference without an identifier"))?;
        let ty = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(n))
        })?;
        if !ty.pointer {
            return Err(AnalysisError::semantic(
                format!("cannot dereference non-pointer {}", name),
                tree.span(n),
            ));
        }
        let mut value = ty.shallow_copy();
        value.pointer = false;
        Ok(Rc::new(value))
    }

    fn address_of(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let name = tree
            .identifier(n)
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::internal("address-of without an identifier"))?;
        let ty = self.ctx.scopes.search(&name).ok_or_else(|| {
            AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(n))
        })?;
        if ty.pointer {
            return Err(AnalysisError::semantic(
                "double pointers unsupported in Cub",
                tree.span(n),
            ));
        }
        let mut pointer = ty.shallow_copy();
        pointer.pointer = true;
        Ok(Rc::new(pointer))
    }

    fn unary(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        let op = self
            .left_child(tree, n)
            .and_then(|c| tree.token(c))
            .map(|t| t.category)
            .ok_or_else(|| AnalysisError::internal("unary expression without an operator"))?;
        let child = tree
            .child(n, 1)
            .ok_or_else(|| AnalysisError::internal("unary expression without an operand"))?;
        let span = tree.span(child);

        if op == Category::Tilde {
            return Err(AnalysisError::semantic(
                "destructors not yet supported",
                tree.span(n),
            ));
        }
        let ty = self
            .check(tree, child)?
            .ok_or_else(|| AnalysisError::semantic("unary operand undeclared", span))?;
        match op {
            Category::Plus | Category::Minus => {
                if !ty.compatible(&self.ctx.prims.int) {
                    return Err(AnalysisError::semantic(
                        "unary + or - operand not an int",
                        tree.span(n),
                    ));
                }
                Ok(ty)
            }
            Category::Not => {
                if !self.is_truthy(&ty) {
                    return Err(AnalysisError::semantic(
                        "! operand not an int or bool",
                        tree.span(n),
                    ));
                }
                Ok(Rc::clone(&self.ctx.prims.bool))
            }
            _ => Err(AnalysisError::internal("unexpected unary operator")),
        }
    }

    /// `<<` chains: only meaningful with a stream header active, the
    /// leftmost operand must be an output stream, and every written operand
    /// must be a printable type.
    fn stream_out(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        if !self.ctx.libs.streams_active() {
            return Err(AnalysisError::semantic(
                "<< can only be used with std streams in Cub",
                tree.span(n),
            ));
        }
        let mut stream = None;
        let mut first = true;
        for child in tree.children(n).to_vec() {
            if tree.rule(child).is_none() && tree.token(child).map(|t| t.category) == Some(Category::Other) {
                continue;
            }
            let span = tree.span(child);
            let ty = self
                .check(tree, child)?
                .ok_or_else(|| AnalysisError::semantic("stream operand undeclared", span))?;
            if first {
                if ty.class_name() != Some("ofstream") || ty.pointer {
                    return Err(AnalysisError::semantic(
                        "leftmost << operand not a ofstream",
                        span,
                    ));
                }
                stream = Some(ty);
                first = false;
            } else if !self.printable(&ty) {
                return Err(AnalysisError::semantic(
                    "a << operand is not a printable type",
                    span,
                ));
            }
        }
        Ok(stream)
    }

    fn printable(&self, ty: &TypeRef) -> bool {
        ty.compatible(&self.ctx.prims.bool) || self.readable(ty)
    }

    /// Types `>>` can read into: numeric, char, or string. Unlike `<<`,
    /// bool is not accepted.
    fn readable(&self, ty: &TypeRef) -> bool {
        let prims = &self.ctx.prims;
        ty.compatible(&prims.int)
            || ty.compatible(&prims.float)
            || ty.compatible(&prims.char)
            || ty.compatible(&prims.string)
            || (ty.class_name() == Some("string") && !ty.pointer)
    }

    /// `cin >> target`: the left operand must literally be `cin` and the
    /// target must be a readable type.
    fn stream_in(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        if !self.ctx.libs.streams_active() {
            return Err(AnalysisError::semantic(
                ">> can only be used with std streams in Cub",
                tree.span(n),
            ));
        }
        let left = self
            .left_child(tree, n)
            .ok_or_else(|| AnalysisError::internal(">> without a stream operand"))?;
        let source = tree.identifier(left).map(str::to_owned);
        if source.as_deref() != Some("cin") {
            return Err(AnalysisError::semantic(
                "left operand of >> is not cin",
                tree.span(left),
            ));
        }
        let target = tree
            .child(n, 1)
            .ok_or_else(|| AnalysisError::internal(">> without a target operand"))?;
        let span = tree.span(target);
        let ty = self
            .check(tree, target)?
            .ok_or_else(|| AnalysisError::semantic("stream target undeclared", span))?;
        if !self.readable(&ty) {
            return Err(AnalysisError::semantic(
                "right operand of >> is not a readable type",
                span,
            ));
        }
        Ok(None)
    }

    /// Re-enter a definition: push its class sections (for member
    /// definitions) and local scope, validate the returned type against the
    /// declared one, then check the body.
    fn function_def(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
        rule: Rule,
    ) -> Result<TypeRef, AnalysisError> {
        let member_scopes = self.member_scopes(tree, n);
        self.scoped(member_scopes, |chk| {
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
            let function = chk.ctx.scopes.search(&name).ok_or_else(|| {
                AnalysisError::semantic(format!("symbol {} undeclared", name), tree.span(n))
            })?;
            let locals = function.locals().ok_or_else(|| {
                AnalysisError::internal(format!("function {} has no local scope", name))
            })?;
            chk.scoped(vec![locals], |chk| {
                let declared = TypeInfo::return_type(&function);
                let returned = if rule == Rule::CtorDef {
                    Rc::clone(&declared)
                } else {
                    chk.returned_type(tree, n)?
                };
                // returning an int from a void function is tolerated, the
                // classic `return 0` from main
                let int_for_void = returned.compatible(&chk.ctx.prims.int)
                    && declared.compatible(&chk.ctx.prims.void);
                if !returned.compatible(&declared) && !int_for_void {
                    return Err(AnalysisError::semantic(
                        format!("return value of wrong type for function {}", name),
                        tree.span(n),
                    ));
                }
                chk.ctx.trace(format!("checked function {}", name));
                for child in tree.children(n).to_vec() {
                    chk.check(tree, child)?;
                }
                Ok(Rc::clone(&function))
            })
        })
    }

    /// Type returned by a definition's body: void when there is no return
    /// statement or a bare `return;`.
    fn returned_type(&mut self, tree: &mut SyntaxTree, n: NodeId) -> Result<TypeRef, AnalysisError> {
        match tree.find_production(n, Rule::ReturnStatement) {
            None => Ok(Rc::clone(&self.ctx.prims.void)),
            Some(jump) if tree.size(jump) == 2 => Ok(Rc::clone(&self.ctx.prims.void)),
            Some(jump) => {
                let value = tree
                    .child(jump, 1)
                    .ok_or_else(|| AnalysisError::internal("return statement without a value"))?;
                let span = tree.span(value);
                self.check(tree, value)?
                    .ok_or_else(|| AnalysisError::semantic("return value undeclared", span))
            }
        }
    }

    /// Class bodies are checked with the member sections pushed so inline
    /// member definitions and member initializers resolve.
    fn class_spec(
        &mut self,
        tree: &mut SyntaxTree,
        n: NodeId,
    ) -> Result<Option<TypeRef>, AnalysisError> {
        let sections = tree
            .class_name(n)
            .or_else(|| tree.identifier(n))
            .map(|name| self.class_sections(name))
            .unwrap_or_default();
        self.scoped(sections, |chk| chk.descend(tree, n))
    }
}
