//! Tree navigation and editing helpers. All edits are "replace/insert a
//! child of a parent" operations addressed by node identity; nothing here
//! hands out long-lived mutable aliases into the tree.

use std::collections::HashMap;

use crate::ast::{
    Block, Declaration, Expr, ExprKind, FunctionPrototype, NodeId, Stmt, StmtKind,
    TranslationUnit, VarDeclGroup,
};
use crate::scope::{Scope, ScopeEntry};

impl TranslationUnit {
    #[must_use]
    pub fn find_block(&self, id: NodeId) -> Option<&Block> {
        self.functions().find_map(|f| find_block_in_block(&f.body, id))
    }

    pub fn find_block_mut(&mut self, id: NodeId) -> Option<&mut Block> {
        self.declarations.iter_mut().find_map(|d| match d {
            Declaration::Function(f) => find_block_in_block_mut(&mut f.body, id),
            _ => None,
        })
    }

    #[must_use]
    pub fn find_stmt(&self, id: NodeId) -> Option<&Stmt> {
        self.functions()
            .find_map(|f| f.body.stmts.iter().find_map(|s| find_stmt_in_stmt(s, id)))
    }

    /// Short-lived mutable access to a statement by id, for callers that
    /// edit a statement's own fields (e.g. rewriting a declaration in
    /// place). The reference must not be stored.
    pub fn find_stmt_mut(&mut self, id: NodeId) -> Option<&mut Stmt> {
        self.declarations.iter_mut().find_map(|d| match d {
            Declaration::Function(f) => f
                .body
                .stmts
                .iter_mut()
                .find_map(|s| find_stmt_in_stmt_mut(s, id)),
            _ => None,
        })
    }

    /// Replaces the statement with the given id, wherever it sits (a block's
    /// statement list, a loop body, an if branch). Returns false if the id is
    /// not present.
    pub fn replace_stmt(&mut self, id: NodeId, replacement: Stmt) -> bool {
        let mut replacement = Some(replacement);
        for declaration in &mut self.declarations {
            if let Declaration::Function(f) = declaration {
                if replace_stmt_in_block(&mut f.body, id, &mut replacement) {
                    return true;
                }
            }
        }
        false
    }

    /// Inserts `stmt` into the identified block, before the statement
    /// identified by `before` (or at the end when `before` is `None`).
    /// Returns false if block or marker cannot be found.
    pub fn insert_stmt(&mut self, block: NodeId, before: Option<NodeId>, stmt: Stmt) -> bool {
        let Some(block) = self.find_block_mut(block) else {
            return false;
        };
        match before {
            None => {
                block.stmts.push(stmt);
                true
            }
            Some(marker) => match block.index_of(marker) {
                Some(index) => {
                    block.stmts.insert(index, stmt);
                    true
                }
                None => false,
            },
        }
    }

    #[must_use]
    pub fn find_expr(&self, id: NodeId) -> Option<&Expr> {
        self.functions().find_map(|f| {
            f.body
                .stmts
                .iter()
                .find_map(|s| exprs_of_stmt(s).into_iter().find_map(|e| find_expr_in_expr(e, id)))
        })
    }

    /// Replaces the expression with the given id. Returns false if the id is
    /// not present.
    pub fn replace_expr(&mut self, id: NodeId, replacement: Expr) -> bool {
        let mut replacement = Some(replacement);
        for declaration in &mut self.declarations {
            if let Declaration::Function(f) = declaration {
                if replace_expr_in_block(&mut f.body, id, &mut replacement) {
                    return true;
                }
            }
        }
        false
    }
}

fn find_block_in_block(block: &Block, id: NodeId) -> Option<&Block> {
    if block.id == id {
        return Some(block);
    }
    block.stmts.iter().find_map(|s| find_block_in_stmt(s, id))
}

fn find_block_in_stmt(stmt: &Stmt, id: NodeId) -> Option<&Block> {
    match &stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            find_block_in_block(block, id)
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => find_block_in_stmt(then_branch, id)
            .or_else(|| else_branch.as_ref().and_then(|e| find_block_in_stmt(e, id))),
        StmtKind::For { init, body, .. } => init
            .as_ref()
            .and_then(|i| find_block_in_stmt(i, id))
            .or_else(|| find_block_in_stmt(body, id)),
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            find_block_in_stmt(body, id)
        }
        _ => None,
    }
}

fn find_block_in_block_mut(block: &mut Block, id: NodeId) -> Option<&mut Block> {
    if block.id == id {
        return Some(block);
    }
    block
        .stmts
        .iter_mut()
        .find_map(|s| find_block_in_stmt_mut(s, id))
}

fn find_block_in_stmt_mut(stmt: &mut Stmt, id: NodeId) -> Option<&mut Block> {
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            find_block_in_block_mut(block, id)
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            if let Some(found) = find_block_in_stmt_mut(then_branch, id) {
                return Some(found);
            }
            else_branch
                .as_mut()
                .and_then(|e| find_block_in_stmt_mut(e, id))
        }
        StmtKind::For { init, body, .. } => {
            if let Some(found) = init.as_mut().and_then(|i| find_block_in_stmt_mut(i, id)) {
                return Some(found);
            }
            find_block_in_stmt_mut(body, id)
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            find_block_in_stmt_mut(body, id)
        }
        _ => None,
    }
}

fn find_stmt_in_stmt(stmt: &Stmt, id: NodeId) -> Option<&Stmt> {
    if stmt.id == id {
        return Some(stmt);
    }
    match &stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            block.stmts.iter().find_map(|s| find_stmt_in_stmt(s, id))
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => find_stmt_in_stmt(then_branch, id)
            .or_else(|| else_branch.as_ref().and_then(|e| find_stmt_in_stmt(e, id))),
        StmtKind::For { init, body, .. } => init
            .as_ref()
            .and_then(|i| find_stmt_in_stmt(i, id))
            .or_else(|| find_stmt_in_stmt(body, id)),
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            find_stmt_in_stmt(body, id)
        }
        _ => None,
    }
}

fn find_stmt_in_stmt_mut(stmt: &mut Stmt, id: NodeId) -> Option<&mut Stmt> {
    if stmt.id == id {
        return Some(stmt);
    }
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => block
            .stmts
            .iter_mut()
            .find_map(|s| find_stmt_in_stmt_mut(s, id)),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            if let Some(found) = find_stmt_in_stmt_mut(then_branch, id) {
                return Some(found);
            }
            else_branch
                .as_mut()
                .and_then(|e| find_stmt_in_stmt_mut(e, id))
        }
        StmtKind::For { init, body, .. } => {
            if let Some(found) = init.as_mut().and_then(|i| find_stmt_in_stmt_mut(i, id)) {
                return Some(found);
            }
            find_stmt_in_stmt_mut(body, id)
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            find_stmt_in_stmt_mut(body, id)
        }
        _ => None,
    }
}

fn replace_stmt_in_block(block: &mut Block, id: NodeId, replacement: &mut Option<Stmt>) -> bool {
    for stmt in &mut block.stmts {
        if stmt.id == id {
            *stmt = replacement.take().expect("replacement consumed twice");
            return true;
        }
        if replace_stmt_in_stmt(stmt, id, replacement) {
            return true;
        }
    }
    false
}

fn replace_boxed_stmt(slot: &mut Box<Stmt>, id: NodeId, replacement: &mut Option<Stmt>) -> bool {
    if slot.id == id {
        **slot = replacement.take().expect("replacement consumed twice");
        return true;
    }
    replace_stmt_in_stmt(slot, id, replacement)
}

fn replace_stmt_in_stmt(stmt: &mut Stmt, id: NodeId, replacement: &mut Option<Stmt>) -> bool {
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            replace_stmt_in_block(block, id, replacement)
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            replace_boxed_stmt(then_branch, id, replacement)
                || else_branch
                    .as_mut()
                    .is_some_and(|e| replace_boxed_stmt(e, id, replacement))
        }
        StmtKind::For { init, body, .. } => {
            init.as_mut()
                .is_some_and(|i| replace_boxed_stmt(i, id, replacement))
                || replace_boxed_stmt(body, id, replacement)
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            replace_boxed_stmt(body, id, replacement)
        }
        _ => false,
    }
}

/// The expressions directly owned by a statement (not descending into child
/// statements).
#[must_use]
pub fn exprs_of_stmt(stmt: &Stmt) -> Vec<&Expr> {
    match &stmt.kind {
        StmtKind::Expr(e) => vec![e],
        StmtKind::If { cond, .. }
        | StmtKind::While { cond, .. }
        | StmtKind::DoWhile { cond, .. }
        | StmtKind::Switch { subject: cond, .. } => vec![cond],
        StmtKind::For { cond, inc, .. } => {
            cond.iter().chain(inc.iter()).collect()
        }
        StmtKind::Return(value) => value.iter().collect(),
        StmtKind::Decl(group) => group.decls.iter().filter_map(|d| d.init.as_ref()).collect(),
        StmtKind::CaseLabel(label) => label.iter().collect(),
        _ => Vec::new(),
    }
}

fn find_expr_in_expr(expr: &Expr, id: NodeId) -> Option<&Expr> {
    if expr.id == id {
        return Some(expr);
    }
    match &expr.kind {
        ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => {
            find_expr_in_expr(e, id)
        }
        ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => {
            find_expr_in_expr(l, id).or_else(|| find_expr_in_expr(r, id))
        }
        ExprKind::Ternary(c, t, e) => find_expr_in_expr(c, id)
            .or_else(|| find_expr_in_expr(t, id))
            .or_else(|| find_expr_in_expr(e, id)),
        ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => {
            args.iter().find_map(|a| find_expr_in_expr(a, id))
        }
        _ => None,
    }
}

fn replace_expr_in_expr(expr: &mut Expr, id: NodeId, replacement: &mut Option<Expr>) -> bool {
    if expr.id == id {
        *expr = replacement.take().expect("replacement consumed twice");
        return true;
    }
    match &mut expr.kind {
        ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => {
            replace_expr_in_expr(e, id, replacement)
        }
        ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => {
            replace_expr_in_expr(l, id, replacement) || replace_expr_in_expr(r, id, replacement)
        }
        ExprKind::Ternary(c, t, e) => {
            replace_expr_in_expr(c, id, replacement)
                || replace_expr_in_expr(t, id, replacement)
                || replace_expr_in_expr(e, id, replacement)
        }
        ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => args
            .iter_mut()
            .any(|a| replace_expr_in_expr(a, id, replacement)),
        _ => false,
    }
}

fn replace_expr_in_stmt(stmt: &mut Stmt, id: NodeId, replacement: &mut Option<Expr>) -> bool {
    let direct = match &mut stmt.kind {
        StmtKind::Expr(e) => replace_expr_in_expr(e, id, replacement),
        StmtKind::If { cond, .. }
        | StmtKind::While { cond, .. }
        | StmtKind::DoWhile { cond, .. }
        | StmtKind::Switch { subject: cond, .. } => replace_expr_in_expr(cond, id, replacement),
        StmtKind::For { cond, inc, .. } => {
            cond.as_mut()
                .is_some_and(|c| replace_expr_in_expr(c, id, replacement))
                || inc
                    .as_mut()
                    .is_some_and(|i| replace_expr_in_expr(i, id, replacement))
        }
        StmtKind::Return(Some(value)) => replace_expr_in_expr(value, id, replacement),
        StmtKind::Decl(group) => group
            .decls
            .iter_mut()
            .filter_map(|d| d.init.as_mut())
            .any(|e| replace_expr_in_expr(e, id, replacement)),
        StmtKind::CaseLabel(Some(label)) => replace_expr_in_expr(label, id, replacement),
        _ => false,
    };
    if direct {
        return true;
    }
    match &mut stmt.kind {
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            replace_expr_in_block(block, id, replacement)
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            replace_expr_in_stmt(then_branch, id, replacement)
                || else_branch
                    .as_mut()
                    .is_some_and(|e| replace_expr_in_stmt(e, id, replacement))
        }
        StmtKind::For { init, body, .. } => {
            init.as_mut()
                .is_some_and(|i| replace_expr_in_stmt(i, id, replacement))
                || replace_expr_in_stmt(body, id, replacement)
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            replace_expr_in_stmt(body, id, replacement)
        }
        _ => false,
    }
}

fn replace_expr_in_block(block: &mut Block, id: NodeId, replacement: &mut Option<Expr>) -> bool {
    block
        .stmts
        .iter_mut()
        .any(|s| replace_expr_in_stmt(s, id, replacement))
}

/// True when the statement contains a `break` that would bind to an enclosing
/// loop or switch at the statement's own level, i.e. not absorbed by a nested
/// loop or switch.
#[must_use]
pub fn contains_top_level_break(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Break => true,
        StmtKind::Block(block) => block.stmts.iter().any(contains_top_level_break),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_top_level_break(then_branch)
                || else_branch.as_deref().is_some_and(contains_top_level_break)
        }
        _ => false,
    }
}

/// As [`contains_top_level_break`] for `continue`; a nested switch does not
/// absorb `continue`, so the search descends into switch bodies.
#[must_use]
pub fn contains_top_level_continue(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Continue => true,
        StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
            block.stmts.iter().any(contains_top_level_continue)
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_top_level_continue(then_branch)
                || else_branch
                    .as_deref()
                    .is_some_and(contains_top_level_continue)
        }
        _ => false,
    }
}

/// Registers a global declaration in the given scope, as a source-order
/// traversal would encounter it.
pub fn declare_global(scope: &mut Scope, declaration: &Declaration) {
    match declaration {
        Declaration::Struct(definition) => scope.add_struct(definition.clone()),
        Declaration::Variables(group) => declare_group(scope, group),
        Declaration::Function(_) => {}
    }
}

/// Registers every declarator of a declaration group.
pub fn declare_group(scope: &mut Scope, group: &VarDeclGroup) {
    for (index, decl) in group.decls.iter().enumerate() {
        scope.add(
            decl.name.clone(),
            ScopeEntry::variable(group.declared_type(index), group.id),
        );
    }
}

/// Registers a function's parameters in the (freshly pushed) function frame.
pub fn declare_params(scope: &mut Scope, prototype: &FunctionPrototype) {
    for param in &prototype.params {
        scope.add(param.name.clone(), ScopeEntry::parameter(param.ty.clone()));
    }
}

/// Identifier names referenced by an expression, in first-occurrence order,
/// without duplicates. Swizzle/field names are not identifiers and are not
/// included.
#[must_use]
pub fn referenced_names(expr: &Expr) -> Vec<String> {
    fn walk(expr: &Expr, out: &mut Vec<String>) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => walk(e, out),
            ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => {
                walk(l, out);
                walk(r, out);
            }
            ExprKind::Ternary(c, t, e) => {
                walk(c, out);
                walk(t, out);
                walk(e, out);
            }
            ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => {
                for arg in args {
                    walk(arg, out);
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

/// Replaces, within one block, every identifier reference that resolves to
/// one of the given declaration groups with (a fresh copy of) the mapped
/// expression. Resolution respects shadowing: a nested redeclaration of the
/// same name shields its uses.
pub fn substitute_variable_uses(block: &mut Block, substitutions: &HashMap<NodeId, Expr>) {
    let mut scope = Scope::new();
    substitute_in_block(block, substitutions, &mut scope);
}

fn substitute_in_block(
    block: &mut Block,
    substitutions: &HashMap<NodeId, Expr>,
    scope: &mut Scope,
) {
    scope.push_frame();
    for stmt in &mut block.stmts {
        substitute_in_stmt(stmt, substitutions, scope);
    }
    scope.pop_frame();
}

fn substitute_in_stmt(stmt: &mut Stmt, substitutions: &HashMap<NodeId, Expr>, scope: &mut Scope) {
    match &mut stmt.kind {
        StmtKind::Decl(group) => {
            for decl in &mut group.decls {
                if let Some(init) = &mut decl.init {
                    substitute_in_expr(init, substitutions, scope);
                }
            }
            declare_group(scope, group);
        }
        StmtKind::Expr(e) => substitute_in_expr(e, substitutions, scope),
        StmtKind::Block(block) => substitute_in_block(block, substitutions, scope),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            substitute_in_expr(cond, substitutions, scope);
            substitute_in_stmt(then_branch, substitutions, scope);
            if let Some(else_branch) = else_branch {
                substitute_in_stmt(else_branch, substitutions, scope);
            }
        }
        StmtKind::For {
            init,
            cond,
            inc,
            body,
        } => {
            scope.push_frame();
            if let Some(init) = init {
                substitute_in_stmt(init, substitutions, scope);
            }
            if let Some(cond) = cond {
                substitute_in_expr(cond, substitutions, scope);
            }
            if let Some(inc) = inc {
                substitute_in_expr(inc, substitutions, scope);
            }
            substitute_in_stmt(body, substitutions, scope);
            scope.pop_frame();
        }
        StmtKind::While { cond, body } => {
            substitute_in_expr(cond, substitutions, scope);
            substitute_in_stmt(body, substitutions, scope);
        }
        StmtKind::DoWhile { body, cond } => {
            substitute_in_stmt(body, substitutions, scope);
            substitute_in_expr(cond, substitutions, scope);
        }
        StmtKind::Switch { subject, body } => {
            substitute_in_expr(subject, substitutions, scope);
            substitute_in_block(body, substitutions, scope);
        }
        StmtKind::Return(Some(value)) => substitute_in_expr(value, substitutions, scope),
        StmtKind::CaseLabel(Some(label)) => substitute_in_expr(label, substitutions, scope),
        _ => {}
    }
}

fn substitute_in_expr(expr: &mut Expr, substitutions: &HashMap<NodeId, Expr>, scope: &Scope) {
    if let ExprKind::Ident(name) = &expr.kind {
        if let Some(entry) = scope.lookup(name) {
            if let Some(replacement) = entry.decl_group.and_then(|id| substitutions.get(&id)) {
                *expr = replacement.clone_fresh();
                return;
            }
        }
        return;
    }
    match &mut expr.kind {
        ExprKind::Unary(_, e) | ExprKind::Paren(e) | ExprKind::Member(e, _) => {
            substitute_in_expr(e, substitutions, scope);
        }
        ExprKind::Binary(_, l, r) | ExprKind::Index(l, r) => {
            substitute_in_expr(l, substitutions, scope);
            substitute_in_expr(r, substitutions, scope);
        }
        ExprKind::Ternary(c, t, e) => {
            substitute_in_expr(c, substitutions, scope);
            substitute_in_expr(t, substitutions, scope);
            substitute_in_expr(e, substitutions, scope);
        }
        ExprKind::Call(_, args) | ExprKind::Ctor(_, args) => {
            for arg in args {
                substitute_in_expr(arg, substitutions, scope);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;
    use crate::types::{BasicType, Type};

    #[test]
    fn top_level_break_detection() {
        let plain_break = Stmt::new(StmtKind::Break);
        assert!(contains_top_level_break(&plain_break));

        // A break nested in a loop is absorbed by that loop.
        let loop_with_break = Stmt::new(StmtKind::While {
            cond: Expr::bool_lit(true),
            body: Box::new(Stmt::block(vec![Stmt::new(StmtKind::Break)], true)),
        });
        assert!(!contains_top_level_break(&loop_with_break));

        // A continue inside a switch still binds to the enclosing loop.
        let switch_with_continue = Stmt::new(StmtKind::Switch {
            subject: Expr::int(0),
            body: Block::new(vec![Stmt::new(StmtKind::Continue)], true),
        });
        assert!(contains_top_level_continue(&switch_with_continue));
        assert!(!contains_top_level_break(&switch_with_continue));
    }

    #[test]
    fn substitution_respects_shadowing() {
        let outer = VarDeclGroup::single(Type::Basic(BasicType::Float), "x", None);
        let outer_id = outer.id;
        let inner = VarDeclGroup::single(Type::Basic(BasicType::Float), "x", None);

        let mut block = Block::new(
            vec![
                Stmt::new(StmtKind::Decl(outer)),
                Stmt::expr(Expr::assign(Expr::ident("x"), Expr::float(1.0))),
                Stmt::block(
                    vec![
                        Stmt::new(StmtKind::Decl(inner)),
                        Stmt::expr(Expr::assign(Expr::ident("x"), Expr::float(2.0))),
                    ],
                    true,
                ),
            ],
            true,
        );

        let mut substitutions = HashMap::new();
        substitutions.insert(outer_id, Expr::member(Expr::ident("wrapped"), "x"));
        substitute_variable_uses(&mut block, &substitutions);

        // Outer use rewritten.
        let StmtKind::Expr(e) = &block.stmts[1].kind else {
            unreachable!()
        };
        let ExprKind::Binary(BinOp::Assign, lhs, _) = &e.kind else {
            unreachable!()
        };
        assert!(matches!(&lhs.kind, ExprKind::Member(..)));

        // Shadowed inner use untouched.
        let StmtKind::Block(inner_block) = &block.stmts[2].kind else {
            unreachable!()
        };
        let StmtKind::Expr(e) = &inner_block.stmts[1].kind else {
            unreachable!()
        };
        let ExprKind::Binary(BinOp::Assign, lhs, _) = &e.kind else {
            unreachable!()
        };
        assert!(matches!(&lhs.kind, ExprKind::Ident(name) if name == "x"));
    }

    #[test]
    fn referenced_names_are_ordered_and_unique() {
        let expr = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Mul, Expr::ident("b"), Expr::ident("a")),
            Expr::ident("b"),
        );
        assert_eq!(referenced_names(&expr), vec!["b", "a"]);
    }
}
