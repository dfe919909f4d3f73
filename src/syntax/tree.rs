//! Arena-backed rooted n-ary syntax tree.
//!
//! The external parser allocates nodes here and links them with
//! [`SyntaxTree::push_child`]. The analyzer walks the finished tree read-only,
//! except for the placement slot on interior nodes, which the first analysis
//! pass writes exactly once per declaration.

use crate::semantics::types::Place;

use super::rules::Rule;
use super::span::Span;
use super::token::{Category, Token};

/// Index of a node inside its [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Payload of an interior node: the production that built it plus the
/// storage placement recorded during analysis.
#[derive(Debug, Clone)]
pub struct ProductionRecord {
    pub rule: Rule,
    pub place: Option<Place>,
}

#[derive(Debug, Clone)]
enum Payload {
    Leaf(Token),
    Inner(ProductionRecord),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload: Payload,
}

/// The tree arena. Children are exclusively owned by their parent link;
/// every node except the root has a parent back-reference.
#[derive(Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an interior node for the given production.
    pub fn inner(&mut self, rule: Rule) -> NodeId {
        self.alloc(Payload::Inner(ProductionRecord { rule, place: None }))
    }

    /// Allocate a leaf node holding a token.
    pub fn leaf(&mut self, token: Token) -> NodeId {
        self.alloc(Payload::Leaf(token))
    }

    fn alloc(&mut self, payload: Payload) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            payload,
        });
        id
    }

    /// Append `child` to `parent`'s ordered child list and set its back link.
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
    }

    pub fn parent(&self, n: NodeId) -> Option<NodeId> {
        self.nodes[n.0 as usize].parent
    }

    pub fn children(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n.0 as usize].children
    }

    pub fn child(&self, n: NodeId, index: usize) -> Option<NodeId> {
        self.children(n).get(index).copied()
    }

    /// Production tag of an interior node; `None` for leaves.
    pub fn rule(&self, n: NodeId) -> Option<Rule> {
        match &self.nodes[n.0 as usize].payload {
            Payload::Inner(record) => Some(record.rule),
            Payload::Leaf(_) => None,
        }
    }

    /// Token of a leaf node; `None` for interior nodes.
    pub fn token(&self, n: NodeId) -> Option<&Token> {
        match &self.nodes[n.0 as usize].payload {
            Payload::Leaf(token) => Some(token),
            Payload::Inner(_) => None,
        }
    }

    /// Number of nodes in the subtree rooted at `n`, counting `n` itself.
    pub fn size(&self, n: NodeId) -> usize {
        1 + self
            .children(n)
            .iter()
            .map(|&c| self.size(c))
            .sum::<usize>()
    }

    /// Placement recorded on an interior node, if analysis has assigned one.
    pub fn place(&self, n: NodeId) -> Option<&Place> {
        match &self.nodes[n.0 as usize].payload {
            Payload::Inner(record) => record.place.as_ref(),
            Payload::Leaf(_) => None,
        }
    }

    pub(crate) fn set_place(&mut self, n: NodeId, place: Place) {
        if let Payload::Inner(record) = &mut self.nodes[n.0 as usize].payload {
            record.place = Some(place);
        }
    }

    /// Span of the first token in the subtree, for diagnostics.
    pub fn span(&self, n: NodeId) -> Span {
        self.first_token(n)
            .map(|t| t.span)
            .unwrap_or_else(Span::none)
    }

    fn first_token(&self, n: NodeId) -> Option<&Token> {
        if let Some(token) = self.token(n) {
            return Some(token);
        }
        self.children(n).iter().find_map(|&c| self.first_token(c))
    }

    /// First subtree (depth-first) produced by `rule`, skipping single-node
    /// subtrees.
    pub fn find_production(&self, n: NodeId, rule: Rule) -> Option<NodeId> {
        if self.size(n) != 1 && self.rule(n) == Some(rule) {
            return Some(n);
        }
        self.children(n)
            .iter()
            .find_map(|&c| self.find_production(c, rule))
    }

    /// First token of category `target` in depth-first order, unless a token
    /// of category `before` appears earlier (in which case the search gives
    /// up). Declarator queries use this to stop at grammar landmarks.
    pub fn find_category(
        &self,
        n: NodeId,
        target: Category,
        before: Option<Category>,
    ) -> Option<&Token> {
        let found = self.first_of_categories(n, target, before)?;
        (found.category == target).then_some(found)
    }

    fn first_of_categories(
        &self,
        n: NodeId,
        target: Category,
        before: Option<Category>,
    ) -> Option<&Token> {
        if let Some(token) = self.token(n) {
            if token.category == target || Some(token.category) == before {
                return Some(token);
            }
            return None;
        }
        self.children(n)
            .iter()
            .find_map(|&c| self.first_of_categories(c, target, before))
    }

    /// First token in depth-first order satisfying `pred`.
    pub fn find_first_token(&self, n: NodeId, pred: impl Fn(&Token) -> bool + Copy) -> Option<&Token> {
        if let Some(token) = self.token(n) {
            return pred(token).then_some(token);
        }
        self.children(n)
            .iter()
            .find_map(|&c| self.find_first_token(c, pred))
    }

    /// First plain identifier in the subtree.
    pub fn identifier(&self, n: NodeId) -> Option<&str> {
        self.find_category(n, Category::Identifier, None)
            .map(|t| t.text.as_str())
    }

    /// First class name in the subtree, unless a plain identifier comes first.
    pub fn class_name(&self, n: NodeId) -> Option<&str> {
        self.find_category(n, Category::ClassName, Some(Category::Identifier))
            .map(|t| t.text.as_str())
    }

    /// Whether the declarator carries a pointer star.
    ///
    /// The star must come before both the identifier and the class name, so
    /// that a pointer parameter does not make a constructor's return type a
    /// pointer.
    pub fn has_pointer(&self, n: NodeId) -> bool {
        self.find_category(n, Category::Star, Some(Category::Identifier))
            .is_some()
            && self
                .find_category(n, Category::Star, Some(Category::ClassName))
                .is_some()
    }

    /// Declared array size: `Some(size)` for `[size]`, `Some(0)` for `[]`,
    /// `None` when the subtree is not an array declarator.
    pub fn array_size(&self, n: NodeId) -> Option<i64> {
        self.find_category(n, Category::OpenBracket, Some(Category::IntegerLit))?;
        let size = self
            .find_category(n, Category::IntegerLit, Some(Category::CloseBracket))
            .and_then(Token::int_value)
            .unwrap_or(0);
        Some(size)
    }

    /// Class named by a `Class::member` or `Class::Class` scoped declarator,
    /// if the subtree contains one.
    pub fn member_class(&self, n: NodeId) -> Option<&str> {
        let scoped = self
            .find_production(n, Rule::MemberIdentDeclarator)
            .or_else(|| self.find_production(n, Rule::MemberCtorDeclarator))?;
        self.class_name(scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::span::Span;
    use crate::syntax::token::{Category, Token};

    fn tok(category: Category, text: &str) -> Token {
        Token::new(category, text, Span::new(1, 1))
    }

    fn int_tok(text: &str, value: i64) -> Token {
        Token::literal(
            Category::IntegerLit,
            text,
            crate::syntax::token::LiteralValue::Int(value),
            Span::new(1, 1),
        )
    }

    #[test]
    fn size_counts_whole_subtree() {
        let mut tree = SyntaxTree::new();
        let root = tree.inner(Rule::SimpleDecl);
        let decl = tree.inner(Rule::InitDecl);
        let name = tree.leaf(tok(Category::Identifier, "x"));
        tree.push_child(root, decl);
        tree.push_child(decl, name);

        assert_eq!(tree.size(root), 3);
        assert_eq!(tree.size(name), 1);
        assert_eq!(tree.parent(name), Some(decl));
    }

    #[test]
    fn find_category_respects_barrier() {
        let mut tree = SyntaxTree::new();
        let root = tree.inner(Rule::InitDecl);
        let star = tree.leaf(tok(Category::Star, "*"));
        let name = tree.leaf(tok(Category::Identifier, "p"));
        tree.push_child(root, star);
        tree.push_child(root, name);

        // star before identifier: found
        assert!(tree
            .find_category(root, Category::Star, Some(Category::Identifier))
            .is_some());
        // identifier before star from the identifier's perspective
        assert!(tree
            .find_category(root, Category::Identifier, Some(Category::Star))
            .is_none());
        assert!(tree.has_pointer(root));
    }

    #[test]
    fn array_size_reads_the_bracketed_integer() {
        let mut tree = SyntaxTree::new();
        let decl = tree.inner(Rule::ArrayDeclarator);
        for t in [
            tok(Category::Identifier, "a"),
            tok(Category::OpenBracket, "["),
            int_tok("3", 3),
            tok(Category::CloseBracket, "]"),
        ] {
            let leaf = tree.leaf(t);
            tree.push_child(decl, leaf);
        }

        assert_eq!(tree.array_size(decl), Some(3));
        assert_eq!(tree.identifier(decl), Some("a"));
    }

    #[test]
    fn find_production_returns_first_match() {
        let mut tree = SyntaxTree::new();
        let root = tree.inner(Rule::FunctionDef);
        let body = tree.inner(Rule::CompoundStatement);
        let ret = tree.inner(Rule::ReturnStatement);
        let kw = tree.leaf(tok(Category::Return, "return"));
        tree.push_child(root, body);
        tree.push_child(body, ret);
        tree.push_child(ret, kw);

        assert_eq!(tree.find_production(root, Rule::ReturnStatement), Some(ret));
        assert_eq!(tree.find_production(root, Rule::ClassSpec), None);
    }
}
