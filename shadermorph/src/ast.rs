use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::{BasicType, Type};
use crate::version::{ShaderKind, ShadingLanguageVersion};

/// Identity of a tree node. Ids are minted from a process-wide counter and
/// never reused, which makes them usable as durable handles into a tree:
/// inserting or replacing siblings does not disturb the id of any other node.
/// Ids are transient (fresh ones are minted on deserialization) and carry no
/// meaning beyond the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    #[must_use]
    pub fn fresh() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_unit()
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <()>::deserialize(deserializer)?;
        Ok(NodeId::fresh())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

impl UnOp {
    #[must_use]
    pub fn is_side_effecting(self) -> bool {
        matches!(
            self,
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Comma,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl BinOp {
    #[must_use]
    pub fn is_side_effecting(self) -> bool {
        matches!(
            self,
            BinOp::Assign
                | BinOp::AddAssign
                | BinOp::SubAssign
                | BinOp::MulAssign
                | BinOp::DivAssign
        )
    }

    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    IntLit(i32),
    UintLit(u32),
    FloatLit(f32),
    BoolLit(bool),
    Ident(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Call of a user function, builtin, or marker macro.
    Call(String, Vec<Expr>),
    /// Type constructor such as `vec4(...)` or a struct constructor.
    Ctor(String, Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind) -> Expr {
        Expr {
            id: NodeId::fresh(),
            kind,
        }
    }

    #[must_use]
    pub fn int(value: i32) -> Expr {
        Expr::new(ExprKind::IntLit(value))
    }

    #[must_use]
    pub fn uint(value: u32) -> Expr {
        Expr::new(ExprKind::UintLit(value))
    }

    #[must_use]
    pub fn float(value: f32) -> Expr {
        Expr::new(ExprKind::FloatLit(value))
    }

    #[must_use]
    pub fn bool_lit(value: bool) -> Expr {
        Expr::new(ExprKind::BoolLit(value))
    }

    #[must_use]
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Ident(name.into()))
    }

    #[must_use]
    pub fn unary(op: UnOp, operand: Expr) -> Expr {
        Expr::new(ExprKind::Unary(op, Box::new(operand)))
    }

    #[must_use]
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    #[must_use]
    pub fn ternary(cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        Expr::new(ExprKind::Ternary(
            Box::new(cond),
            Box::new(then_expr),
            Box::new(else_expr),
        ))
    }

    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Call(name.into(), args))
    }

    #[must_use]
    pub fn ctor(type_name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Ctor(type_name.into(), args))
    }

    #[must_use]
    pub fn member(receiver: Expr, field: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Member(Box::new(receiver), field.into()))
    }

    #[must_use]
    pub fn index(receiver: Expr, index: Expr) -> Expr {
        Expr::new(ExprKind::Index(Box::new(receiver), Box::new(index)))
    }

    #[must_use]
    pub fn paren(inner: Expr) -> Expr {
        Expr::new(ExprKind::Paren(Box::new(inner)))
    }

    #[must_use]
    pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Assign, lhs, rhs)
    }

    /// Deep copy with fresh node ids. Use this, not `clone()`, whenever a
    /// duplicated subtree is inserted back into a tree; derived `clone()`
    /// keeps ids and would make id-addressed edits ambiguous.
    #[must_use]
    pub fn clone_fresh(&self) -> Expr {
        let kind = match &self.kind {
            ExprKind::IntLit(v) => ExprKind::IntLit(*v),
            ExprKind::UintLit(v) => ExprKind::UintLit(*v),
            ExprKind::FloatLit(v) => ExprKind::FloatLit(*v),
            ExprKind::BoolLit(v) => ExprKind::BoolLit(*v),
            ExprKind::Ident(name) => ExprKind::Ident(name.clone()),
            ExprKind::Unary(op, e) => ExprKind::Unary(*op, Box::new(e.clone_fresh())),
            ExprKind::Binary(op, l, r) => {
                ExprKind::Binary(*op, Box::new(l.clone_fresh()), Box::new(r.clone_fresh()))
            }
            ExprKind::Ternary(c, t, e) => ExprKind::Ternary(
                Box::new(c.clone_fresh()),
                Box::new(t.clone_fresh()),
                Box::new(e.clone_fresh()),
            ),
            ExprKind::Call(name, args) => ExprKind::Call(
                name.clone(),
                args.iter().map(Expr::clone_fresh).collect(),
            ),
            ExprKind::Ctor(name, args) => ExprKind::Ctor(
                name.clone(),
                args.iter().map(Expr::clone_fresh).collect(),
            ),
            ExprKind::Member(e, field) => {
                ExprKind::Member(Box::new(e.clone_fresh()), field.clone())
            }
            ExprKind::Index(e, i) => {
                ExprKind::Index(Box::new(e.clone_fresh()), Box::new(i.clone_fresh()))
            }
            ExprKind::Paren(e) => ExprKind::Paren(Box::new(e.clone_fresh())),
        };
        Expr::new(kind)
    }

    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int_lit(&self) -> Option<i32> {
        match &self.kind {
            ExprKind::IntLit(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    /// Whether entering the block opens a new scope frame. False for e.g.
    /// a for-loop body sharing the header's scope.
    pub introduces_scope: bool,
}

impl Block {
    #[must_use]
    pub fn new(stmts: Vec<Stmt>, introduces_scope: bool) -> Block {
        Block {
            id: NodeId::fresh(),
            stmts,
            introduces_scope,
        }
    }

    #[must_use]
    pub fn index_of(&self, stmt_id: NodeId) -> Option<usize> {
        self.stmts.iter().position(|s| s.id == stmt_id)
    }

    #[must_use]
    pub fn clone_fresh(&self) -> Block {
        Block::new(
            self.stmts.iter().map(Stmt::clone_fresh).collect(),
            self.introduces_scope,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    Block(Block),
    Decl(VarDeclGroup),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        inc: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Switch {
        subject: Expr,
        body: Block,
    },
    /// `case <expr>:` or, with `None`, `default:`.
    CaseLabel(Option<Expr>),
    Break,
    Continue,
    Discard,
    Return(Option<Expr>),
    Empty,
}

impl Stmt {
    #[must_use]
    pub fn new(kind: StmtKind) -> Stmt {
        Stmt {
            id: NodeId::fresh(),
            kind,
        }
    }

    #[must_use]
    pub fn block(stmts: Vec<Stmt>, introduces_scope: bool) -> Stmt {
        Stmt::new(StmtKind::Block(Block::new(stmts, introduces_scope)))
    }

    #[must_use]
    pub fn expr(expr: Expr) -> Stmt {
        Stmt::new(StmtKind::Expr(expr))
    }

    /// Deep copy with fresh node ids throughout, like [`Expr::clone_fresh`].
    #[must_use]
    pub fn clone_fresh(&self) -> Stmt {
        let kind = match &self.kind {
            StmtKind::Block(block) => StmtKind::Block(block.clone_fresh()),
            StmtKind::Decl(group) => StmtKind::Decl(group.clone_fresh()),
            StmtKind::Expr(e) => StmtKind::Expr(e.clone_fresh()),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => StmtKind::If {
                cond: cond.clone_fresh(),
                then_branch: Box::new(then_branch.clone_fresh()),
                else_branch: else_branch.as_ref().map(|e| Box::new(e.clone_fresh())),
            },
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => StmtKind::For {
                init: init.as_ref().map(|i| Box::new(i.clone_fresh())),
                cond: cond.as_ref().map(Expr::clone_fresh),
                inc: inc.as_ref().map(Expr::clone_fresh),
                body: Box::new(body.clone_fresh()),
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: cond.clone_fresh(),
                body: Box::new(body.clone_fresh()),
            },
            StmtKind::DoWhile { body, cond } => StmtKind::DoWhile {
                body: Box::new(body.clone_fresh()),
                cond: cond.clone_fresh(),
            },
            StmtKind::Switch { subject, body } => StmtKind::Switch {
                subject: subject.clone_fresh(),
                body: body.clone_fresh(),
            },
            StmtKind::CaseLabel(label) => {
                StmtKind::CaseLabel(label.as_ref().map(Expr::clone_fresh))
            }
            StmtKind::Break => StmtKind::Break,
            StmtKind::Continue => StmtKind::Continue,
            StmtKind::Discard => StmtKind::Discard,
            StmtKind::Return(value) => {
                StmtKind::Return(value.as_ref().map(Expr::clone_fresh))
            }
            StmtKind::Empty => StmtKind::Empty,
        };
        Stmt::new(kind)
    }

    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::For { .. } | StmtKind::While { .. } | StmtKind::DoWhile { .. }
        )
    }

    #[must_use]
    pub fn loop_body(&self) -> Option<&Stmt> {
        match &self.kind {
            StmtKind::For { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. } => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_block(&self) -> Option<&Block> {
        match &self.kind {
            StmtKind::Block(block) => Some(block),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match &mut self.kind {
            StmtKind::Block(block) => Some(block),
            _ => None,
        }
    }
}

/// One declarator inside a declaration group: `name[size] = init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclInfo {
    pub name: String,
    pub array_size: Option<u32>,
    pub init: Option<Expr>,
}

/// `base_type d0, d1, ...;` — one base type, one or more declarators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclGroup {
    pub id: NodeId,
    pub base_type: Type,
    pub decls: Vec<VarDeclInfo>,
}

impl VarDeclGroup {
    #[must_use]
    pub fn new(base_type: Type, decls: Vec<VarDeclInfo>) -> VarDeclGroup {
        VarDeclGroup {
            id: NodeId::fresh(),
            base_type,
            decls,
        }
    }

    #[must_use]
    pub fn single(base_type: Type, name: impl Into<String>, init: Option<Expr>) -> VarDeclGroup {
        VarDeclGroup::new(
            base_type,
            vec![VarDeclInfo {
                name: name.into(),
                array_size: None,
                init,
            }],
        )
    }

    #[must_use]
    pub fn clone_fresh(&self) -> VarDeclGroup {
        VarDeclGroup::new(
            self.base_type.clone(),
            self.decls
                .iter()
                .map(|d| VarDeclInfo {
                    name: d.name.clone(),
                    array_size: d.array_size,
                    init: d.init.as_ref().map(Expr::clone_fresh),
                })
                .collect(),
        )
    }

    /// The declared type of declarator `index`, accounting for array suffixes.
    #[must_use]
    pub fn declared_type(&self, index: usize) -> Type {
        match self.decls[index].array_size {
            Some(size) => Type::Array(Box::new(self.base_type.clone()), size),
            None => self.base_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionPrototype {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<ParamDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub prototype: FunctionPrototype,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructDefinition {
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    Function(FunctionDefinition),
    Variables(VarDeclGroup),
    Struct(StructDefinition),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub version: ShadingLanguageVersion,
    pub kind: ShaderKind,
    pub declarations: Vec<Declaration>,
}

impl TranslationUnit {
    #[must_use]
    pub fn new(
        version: ShadingLanguageVersion,
        kind: ShaderKind,
        declarations: Vec<Declaration>,
    ) -> TranslationUnit {
        TranslationUnit {
            version,
            kind,
            declarations,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
    }

    #[must_use]
    pub fn struct_definition(&self, name: &str) -> Option<&StructDefinition> {
        self.declarations.iter().find_map(|d| match d {
            Declaration::Struct(s) if s.name == name => Some(s),
            _ => None,
        })
    }

    /// Inserts a declaration at the front of the unit, before all existing
    /// declarations.
    pub fn prepend_declaration(&mut self, declaration: Declaration) {
        self.declarations.insert(0, declaration);
    }

    /// Inserts a declaration immediately before the named function.
    /// Appends if the function is not found.
    pub fn add_declaration_before(&mut self, declaration: Declaration, function_name: &str) {
        let position = self.declarations.iter().position(|d| {
            matches!(d, Declaration::Function(f) if f.prototype.name == function_name)
        });
        match position {
            Some(index) => self.declarations.insert(index, declaration),
            None => self.declarations.push(declaration),
        }
    }
}

/// Canonical literal/constructor forms for basic types, used e.g. for the
/// value of an injected dead `return`. `None` for types with no canonical
/// constant (structs, arrays, void).
impl Type {
    #[must_use]
    pub fn canonical_constant(&self) -> Option<Expr> {
        let basic = self.as_basic()?;
        Some(canonical_basic_constant(basic))
    }
}

fn canonical_basic_constant(basic: BasicType) -> Expr {
    match basic {
        BasicType::Float => Expr::float(1.0),
        BasicType::Int => Expr::int(1),
        BasicType::Uint => Expr::uint(1),
        BasicType::Bool => Expr::bool_lit(true),
        vector_or_matrix => {
            let args = if vector_or_matrix.is_matrix() {
                // A single scalar fills the diagonal.
                vec![canonical_basic_constant(BasicType::Float)]
            } else {
                (0..vector_or_matrix.num_elements())
                    .map(|_| canonical_basic_constant(vector_or_matrix.element_type()))
                    .collect()
            };
            Expr::ctor(vector_or_matrix.glsl_name(), args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let a = Expr::int(1);
        let b = Expr::int(1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn clone_fresh_remints_every_id() {
        let original = Expr::binary(BinOp::Add, Expr::ident("x"), Expr::int(2));
        let copy = original.clone_fresh();
        assert_ne!(original.id, copy.id);
        match (&original.kind, &copy.kind) {
            (ExprKind::Binary(_, l0, r0), ExprKind::Binary(_, l1, r1)) => {
                assert_ne!(l0.id, l1.id);
                assert_ne!(r0.id, r1.id);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn canonical_constants_exist_for_basic_types() {
        for basic in crate::types::BasicType::ALL {
            assert!(Type::Basic(basic).canonical_constant().is_some());
        }
        assert!(Type::Void.canonical_constant().is_none());
    }
}
