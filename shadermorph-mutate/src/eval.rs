//! A small reference interpreter for side-effect-checked testing. It runs
//! straight-line shader code (declarations, assignments, control flow, the
//! builtins the generators emit) over concrete values, so tests can check
//! that a mutated program computes exactly what the original did. It is not
//! a rendering substitute: unsupported constructs make evaluation return
//! `None` and the test fails loudly.

use std::collections::HashMap;

use shadermorph::ast::{
    BinOp, Block, Declaration, Expr, ExprKind, FunctionDefinition, Stmt, StmtKind,
    TranslationUnit, UnOp,
};
use shadermorph::consts;
use shadermorph::types::{BasicType, Type};
use shadermorph::version::ShaderKind;

const MAX_LOOP_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
    /// Vector of scalar components.
    Vector(BasicType, Vec<Value>),
    Struct(String, Vec<(String, Value)>),
}

impl Value {
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn components(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(_, components) => Some(components),
            _ => None,
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<Value>),
    Discard,
}

pub struct Interpreter<'a> {
    tu: &'a TranslationUnit,
    frames: Vec<HashMap<String, Value>>,
}

impl<'a> Interpreter<'a> {
    /// Sets up globals in declaration order (uniforms get zero defaults,
    /// overridable with [`Interpreter::set`]) plus the harness bindings: the
    /// switch uniform holding `(0.0, 1.0)` and the stage builtins.
    #[must_use]
    pub fn new(tu: &'a TranslationUnit) -> Interpreter<'a> {
        let mut interpreter = Interpreter {
            tu,
            frames: vec![HashMap::new()],
        };
        match tu.kind {
            ShaderKind::Fragment => {
                interpreter.bind(
                    "gl_FragCoord",
                    Value::Vector(
                        BasicType::Vec4,
                        vec![
                            Value::Float(0.5),
                            Value::Float(0.5),
                            Value::Float(0.0),
                            Value::Float(1.0),
                        ],
                    ),
                );
                interpreter.bind("gl_FragColor", zero_vector(BasicType::Vec4));
            }
            ShaderKind::Vertex => {
                interpreter.bind("gl_Position", zero_vector(BasicType::Vec4));
                interpreter.bind("gl_PointSize", Value::Float(0.0));
            }
            ShaderKind::Compute => {}
        }
        for declaration in &tu.declarations {
            if let Declaration::Variables(group) = declaration {
                for (index, decl) in group.decls.iter().enumerate() {
                    let value = decl
                        .init
                        .as_ref()
                        .and_then(|init| interpreter.eval(init))
                        .or_else(|| interpreter.zero_of(&group.declared_type(index)));
                    if let Some(value) = value {
                        interpreter.bind(decl.name.clone(), value);
                    }
                }
            }
        }
        // The harness contract: the switch uniform holds (0.0, 1.0). Bound
        // after the globals so a zero-defaulted uniform declaration of the
        // same name cannot shadow it.
        interpreter.bind(
            consts::SWITCH_UNIFORM,
            Value::Vector(BasicType::Vec2, vec![Value::Float(0.0), Value::Float(1.0)]),
        );
        interpreter
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.frames
            .last_mut()
            .expect("at least one frame")
            .insert(name.into(), value);
    }

    /// Overrides a global (e.g. a uniform) before running.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.frames[0].insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }

    /// Runs `main` to completion. `None` means the program used a construct
    /// the interpreter does not model.
    pub fn run_main(&mut self) -> Option<()> {
        let main = self
            .tu
            .functions()
            .find(|f| f.prototype.name == "main")?
            .clone();
        self.frames.push(HashMap::new());
        let flow = self.exec_block(&main.body)?;
        self.frames.pop();
        match flow {
            Flow::Normal | Flow::Return(_) | Flow::Discard => Some(()),
            Flow::Break | Flow::Continue => None,
        }
    }

    fn zero_of(&self, ty: &Type) -> Option<Value> {
        match ty.without_qualifiers() {
            Type::Basic(basic) => Some(zero_basic(*basic)),
            Type::Struct(name) => {
                let definition = self.tu.struct_definition(name)?;
                let fields = definition
                    .fields
                    .iter()
                    .map(|f| self.zero_of(&f.ty).map(|v| (f.name.clone(), v)))
                    .collect::<Option<Vec<_>>>()?;
                Some(Value::Struct(name.clone(), fields))
            }
            _ => None,
        }
    }

    fn exec_block(&mut self, block: &Block) -> Option<Flow> {
        self.frames.push(HashMap::new());
        let mut result = Flow::Normal;
        for stmt in &block.stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => {
                    result = other;
                    break;
                }
            }
        }
        self.frames.pop();
        Some(result)
    }

    #[allow(clippy::too_many_lines)]
    fn exec_stmt(&mut self, stmt: &Stmt) -> Option<Flow> {
        match &stmt.kind {
            StmtKind::Empty | StmtKind::CaseLabel(_) => Some(Flow::Normal),
            StmtKind::Break => Some(Flow::Break),
            StmtKind::Continue => Some(Flow::Continue),
            StmtKind::Discard => Some(Flow::Discard),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.eval(value)?),
                    None => None,
                };
                Some(Flow::Return(value))
            }
            StmtKind::Expr(e) => {
                self.eval(e)?;
                Some(Flow::Normal)
            }
            StmtKind::Decl(group) => {
                for (index, decl) in group.decls.iter().enumerate() {
                    if decl.array_size.is_some() {
                        return None;
                    }
                    let value = match &decl.init {
                        Some(init) => self.eval(init)?,
                        None => self.zero_of(&group.declared_type(index))?,
                    };
                    self.bind(decl.name.clone(), value);
                }
                Some(Flow::Normal)
            }
            StmtKind::Block(block) => self.exec_block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Some(Flow::Normal)
                }
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                self.frames.push(HashMap::new());
                if let Some(init) = init {
                    match self.exec_stmt(init)? {
                        Flow::Normal => {}
                        _ => return None,
                    }
                }
                let mut iterations = 0;
                let flow = loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond)?.as_bool()? {
                            break Flow::Normal;
                        }
                    }
                    match self.exec_stmt(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break Flow::Normal,
                        other => break other,
                    }
                    if let Some(inc) = inc {
                        self.eval(inc)?;
                    }
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return None;
                    }
                };
                self.frames.pop();
                Some(flow)
            }
            StmtKind::While { cond, body } => {
                let mut iterations = 0;
                loop {
                    if !self.eval(cond)?.as_bool()? {
                        return Some(Flow::Normal);
                    }
                    match self.exec_stmt(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => return Some(Flow::Normal),
                        other => return Some(other),
                    }
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return None;
                    }
                }
            }
            StmtKind::DoWhile { body, cond } => {
                let mut iterations = 0;
                loop {
                    match self.exec_stmt(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => return Some(Flow::Normal),
                        other => return Some(other),
                    }
                    if !self.eval(cond)?.as_bool()? {
                        return Some(Flow::Normal);
                    }
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return None;
                    }
                }
            }
            StmtKind::Switch { subject, body } => self.exec_switch(subject, body),
        }
    }

    fn exec_switch(&mut self, subject: &Expr, body: &Block) -> Option<Flow> {
        let selector = self.eval(subject)?.as_i32()?;
        // Find the matching case label, falling back to default.
        let mut entry = None;
        let mut default = None;
        for (index, stmt) in body.stmts.iter().enumerate() {
            match &stmt.kind {
                StmtKind::CaseLabel(Some(label)) => {
                    if self.eval(label)?.as_i32()? == selector && entry.is_none() {
                        entry = Some(index);
                    }
                }
                StmtKind::CaseLabel(None) => default = Some(index),
                _ => {}
            }
        }
        let Some(start) = entry.or(default) else {
            return Some(Flow::Normal);
        };
        self.frames.push(HashMap::new());
        let mut result = Flow::Normal;
        for stmt in &body.stmts[start..] {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                Flow::Break => break,
                other => {
                    result = other;
                    break;
                }
            }
        }
        self.frames.pop();
        Some(result)
    }

    fn assign(&mut self, lvalue: &Expr, value: Value) -> Option<()> {
        match &lvalue.kind {
            ExprKind::Ident(name) => {
                *self.get_mut(name)? = value;
                Some(())
            }
            ExprKind::Paren(inner) => self.assign(inner, value),
            ExprKind::Member(receiver, field) => {
                let mut receiver_value = self.read_lvalue(receiver)?;
                write_member(&mut receiver_value, field, value)?;
                self.assign(receiver, receiver_value)
            }
            ExprKind::Index(receiver, index) => {
                let index = self.eval(index)?.as_i32()?;
                let mut receiver_value = self.read_lvalue(receiver)?;
                match &mut receiver_value {
                    Value::Vector(_, components) => {
                        *components.get_mut(index as usize)? = value;
                    }
                    _ => return None,
                }
                self.assign(receiver, receiver_value)
            }
            _ => None,
        }
    }

    fn read_lvalue(&mut self, lvalue: &Expr) -> Option<Value> {
        match &lvalue.kind {
            ExprKind::Ident(name) => self.get(name).cloned(),
            ExprKind::Paren(inner) => self.read_lvalue(inner),
            ExprKind::Member(receiver, field) => {
                read_member(&self.read_lvalue(receiver)?, field)
            }
            ExprKind::Index(receiver, index) => {
                let index = self.eval(index)?.as_i32()?;
                let receiver = self.read_lvalue(receiver)?;
                receiver.components()?.get(index as usize).cloned()
            }
            _ => None,
        }
    }

    #[allow(clippy::too_many_lines)]
    pub fn eval(&mut self, expr: &Expr) -> Option<Value> {
        match &expr.kind {
            ExprKind::IntLit(v) => Some(Value::Int(*v)),
            ExprKind::UintLit(v) => Some(Value::Uint(*v)),
            ExprKind::FloatLit(v) => Some(Value::Float(*v)),
            ExprKind::BoolLit(v) => Some(Value::Bool(*v)),
            ExprKind::Ident(name) => self.get(name).cloned(),
            ExprKind::Paren(inner) => self.eval(inner),
            ExprKind::Unary(op, operand) => self.eval_unary(*op, operand),
            ExprKind::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs),
            ExprKind::Ternary(cond, then_expr, else_expr) => {
                if self.eval(cond)?.as_bool()? {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            ExprKind::Member(receiver, field) => {
                let receiver = self.eval(receiver)?;
                read_member(&receiver, field)
            }
            ExprKind::Index(receiver, index) => {
                let index = self.eval(index)?.as_i32()?;
                let receiver = self.eval(receiver)?;
                receiver.components()?.get(index as usize).cloned()
            }
            ExprKind::Ctor(name, args) => self.eval_ctor(name, args),
            ExprKind::Call(name, args) => self.eval_call(name, args),
        }
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Expr) -> Option<Value> {
        match op {
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let old = self.read_lvalue(operand)?;
                let delta = match op {
                    UnOp::PreInc | UnOp::PostInc => 1,
                    _ => -1,
                };
                let new = match &old {
                    Value::Int(v) => Value::Int(v.wrapping_add(delta)),
                    Value::Uint(v) => Value::Uint(v.wrapping_add_signed(delta)),
                    Value::Float(v) => Value::Float(v + delta as f32),
                    _ => return None,
                };
                self.assign(operand, new.clone())?;
                match op {
                    UnOp::PreInc | UnOp::PreDec => Some(new),
                    _ => Some(old),
                }
            }
            UnOp::Plus => self.eval(operand),
            UnOp::Minus => map_numeric(self.eval(operand)?, |v| -v, |v| v.wrapping_neg(), |_| 0),
            UnOp::LogicalNot => Some(Value::Bool(!self.eval(operand)?.as_bool()?)),
            UnOp::BitwiseNot => {
                map_numeric(self.eval(operand)?, |_| f32::NAN, |v| !v, |v| !v)
                    .filter(|v| !matches!(v, Value::Float(_)))
            }
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Value> {
        match op {
            BinOp::Assign => {
                let value = self.eval(rhs)?;
                self.assign(lhs, value.clone())?;
                Some(value)
            }
            BinOp::AddAssign | BinOp::SubAssign | BinOp::MulAssign | BinOp::DivAssign => {
                let current = self.read_lvalue(lhs)?;
                let operand = self.eval(rhs)?;
                let base_op = match op {
                    BinOp::AddAssign => BinOp::Add,
                    BinOp::SubAssign => BinOp::Sub,
                    BinOp::MulAssign => BinOp::Mul,
                    _ => BinOp::Div,
                };
                let value = numeric_binop(base_op, &current, &operand)?;
                self.assign(lhs, value.clone())?;
                Some(value)
            }
            BinOp::Comma => {
                self.eval(lhs)?;
                self.eval(rhs)
            }
            BinOp::LogicalAnd => {
                if self.eval(lhs)?.as_bool()? {
                    self.eval(rhs)
                } else {
                    Some(Value::Bool(false))
                }
            }
            BinOp::LogicalOr => {
                if self.eval(lhs)?.as_bool()? {
                    Some(Value::Bool(true))
                } else {
                    self.eval(rhs)
                }
            }
            op => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                numeric_binop(op, &lhs, &rhs)
            }
        }
    }

    fn eval_ctor(&mut self, name: &str, args: &[Expr]) -> Option<Value> {
        if let Some(definition) = self.tu.struct_definition(name) {
            if definition.fields.len() != args.len() {
                return None;
            }
            let definition = definition.clone();
            let mut fields = Vec::new();
            for (field, arg) in definition.fields.iter().zip(args) {
                fields.push((field.name.clone(), self.eval(arg)?));
            }
            return Some(Value::Struct(name.to_string(), fields));
        }
        let basic = BasicType::ALL.into_iter().find(|b| b.glsl_name() == name)?;
        let mut scalars = Vec::new();
        for arg in args {
            match self.eval(arg)? {
                Value::Vector(_, components) => scalars.extend(components),
                scalar => scalars.push(scalar),
            }
        }
        let scalars: Option<Vec<Value>> = scalars
            .into_iter()
            .map(|v| convert_scalar(&v, basic.element_type()))
            .collect();
        let mut scalars = scalars?;
        if basic.is_scalar() {
            return scalars.into_iter().next();
        }
        if basic.is_matrix() {
            // Only the single-scalar diagonal form is modelled.
            if scalars.len() != 1 {
                return None;
            }
            let diagonal = scalars.remove(0);
            let side = basic.columns() as usize;
            let mut components = Vec::new();
            for row in 0..side {
                for column in 0..side {
                    components.push(if row == column {
                        diagonal.clone()
                    } else {
                        Value::Float(0.0)
                    });
                }
            }
            return Some(Value::Vector(basic, components));
        }
        let width = basic.num_elements() as usize;
        if scalars.len() == 1 {
            let splat = scalars.remove(0);
            return Some(Value::Vector(basic, vec![splat; width]));
        }
        (scalars.len() == width).then(|| Value::Vector(basic, scalars))
    }

    fn eval_call(&mut self, name: &str, args: &[Expr]) -> Option<Value> {
        // Marker macros evaluate to one designated argument.
        match name {
            consts::DEAD
            | consts::FUZZED
            | consts::SWITCH
            | consts::WRAPPED_IF_TRUE
            | consts::WRAPPED_IF_FALSE
            | consts::WRAPPED_LOOP => return self.eval(args.first()?),
            consts::TRUE | consts::FALSE | consts::ZERO | consts::ONE | consts::IDENTITY => {
                return self.eval(args.last()?);
            }
            _ => {}
        }
        if let Some(function) = self
            .tu
            .functions()
            .find(|f| f.prototype.name == name && f.prototype.params.len() == args.len())
        {
            let function = function.clone();
            return self.call_user_function(&function, args);
        }
        self.eval_builtin(name, args)
    }

    fn call_user_function(
        &mut self,
        function: &FunctionDefinition,
        args: &[Expr],
    ) -> Option<Value> {
        let mut bound = Vec::new();
        for (param, arg) in function.prototype.params.iter().zip(args) {
            bound.push((param.name.clone(), self.eval(arg)?));
        }
        self.frames.push(bound.into_iter().collect());
        let flow = self.exec_block(&function.body)?;
        self.frames.pop();
        match flow {
            Flow::Return(value) => value.or(Some(Value::Bool(true))),
            Flow::Normal => Some(Value::Bool(true)),
            _ => None,
        }
    }

    fn eval_builtin(&mut self, name: &str, args: &[Expr]) -> Option<Value> {
        let values: Option<Vec<Value>> = args.iter().map(|a| self.eval(a)).collect();
        let values = values?;
        match (name, values.as_slice()) {
            ("length", [v]) => {
                let components = float_components(v)?;
                Some(Value::Float(
                    components.iter().map(|c| c * c).sum::<f32>().sqrt(),
                ))
            }
            ("distance", [a, b]) => {
                let a = float_components(a)?;
                let b = float_components(b)?;
                (a.len() == b.len()).then(|| {
                    Value::Float(
                        a.iter()
                            .zip(&b)
                            .map(|(x, y)| (x - y) * (x - y))
                            .sum::<f32>()
                            .sqrt(),
                    )
                })
            }
            ("dot", [a, b]) => {
                let a = float_components(a)?;
                let b = float_components(b)?;
                (a.len() == b.len()).then(|| {
                    Value::Float(a.iter().zip(&b).map(|(x, y)| x * y).sum::<f32>())
                })
            }
            ("normalize", [v]) => {
                let components = float_components(v)?;
                let len = components.iter().map(|c| c * c).sum::<f32>().sqrt();
                rebuild_like(v, &components.iter().map(|c| c / len).collect::<Vec<_>>())
            }
            ("cross", [a, b]) => {
                let a = float_components(a)?;
                let b = float_components(b)?;
                if a.len() != 3 || b.len() != 3 {
                    return None;
                }
                Some(Value::Vector(
                    BasicType::Vec3,
                    vec![
                        Value::Float(a[1] * b[2] - a[2] * b[1]),
                        Value::Float(a[2] * b[0] - a[0] * b[2]),
                        Value::Float(a[0] * b[1] - a[1] * b[0]),
                    ],
                ))
            }
            (_, [v]) => {
                let f = float_unary(name)?;
                match v {
                    Value::Float(x) => Some(Value::Float(f(*x))),
                    Value::Int(x) if name == "abs" => Some(Value::Int(x.abs())),
                    Value::Int(x) if name == "sign" => Some(Value::Int(x.signum())),
                    Value::Vector(ty, components) if ty.element_type() == BasicType::Float => {
                        let mapped = components
                            .iter()
                            .map(|c| c.as_f32().map(|x| Value::Float(f(x))))
                            .collect::<Option<Vec<_>>>()?;
                        Some(Value::Vector(*ty, mapped))
                    }
                    _ => None,
                }
            }
            (_, [a, b]) => {
                let f = float_binary(name)?;
                componentwise(a, b, f)
            }
            ("clamp", [x, low, high]) => {
                let clamped = componentwise(x, low, f32::max)?;
                componentwise(&clamped, high, f32::min)
            }
            ("mix", [a, b, t]) => {
                let inverse = map_numeric(t.clone(), |v| 1.0 - v, |_| 0, |_| 0)?;
                let left = componentwise(a, &inverse, |x, y| x * y)?;
                let right = componentwise(b, t, |x, y| x * y)?;
                componentwise(&left, &right, |x, y| x + y)
            }
            _ => None,
        }
    }
}

fn zero_basic(basic: BasicType) -> Value {
    match basic {
        BasicType::Float => Value::Float(0.0),
        BasicType::Int => Value::Int(0),
        BasicType::Uint => Value::Uint(0),
        BasicType::Bool => Value::Bool(false),
        vector_or_matrix => {
            let count = vector_or_matrix.num_elements() as usize;
            Value::Vector(
                vector_or_matrix,
                vec![zero_basic(vector_or_matrix.element_type()); count],
            )
        }
    }
}

fn zero_vector(basic: BasicType) -> Value {
    zero_basic(basic)
}

fn convert_scalar(value: &Value, target: BasicType) -> Option<Value> {
    match (value, target) {
        (Value::Float(v), BasicType::Float) => Some(Value::Float(*v)),
        (Value::Float(v), BasicType::Int) => Some(Value::Int(*v as i32)),
        (Value::Float(v), BasicType::Uint) => Some(Value::Uint(*v as u32)),
        (Value::Float(v), BasicType::Bool) => Some(Value::Bool(*v != 0.0)),
        (Value::Int(v), BasicType::Float) => Some(Value::Float(*v as f32)),
        (Value::Int(v), BasicType::Int) => Some(Value::Int(*v)),
        (Value::Int(v), BasicType::Uint) => Some(Value::Uint(*v as u32)),
        (Value::Int(v), BasicType::Bool) => Some(Value::Bool(*v != 0)),
        (Value::Uint(v), BasicType::Float) => Some(Value::Float(*v as f32)),
        (Value::Uint(v), BasicType::Int) => Some(Value::Int(*v as i32)),
        (Value::Uint(v), BasicType::Uint) => Some(Value::Uint(*v)),
        (Value::Uint(v), BasicType::Bool) => Some(Value::Bool(*v != 0)),
        (Value::Bool(v), BasicType::Float) => Some(Value::Float(f32::from(u8::from(*v)))),
        (Value::Bool(v), BasicType::Int) => Some(Value::Int(i32::from(*v))),
        (Value::Bool(v), BasicType::Uint) => Some(Value::Uint(u32::from(*v))),
        (Value::Bool(v), BasicType::Bool) => Some(Value::Bool(*v)),
        _ => None,
    }
}

fn swizzle_index(c: char) -> Option<usize> {
    match c {
        'x' | 'r' | 's' => Some(0),
        'y' | 'g' | 't' => Some(1),
        'z' | 'b' | 'p' => Some(2),
        'w' | 'a' | 'q' => Some(3),
        _ => None,
    }
}

fn read_member(receiver: &Value, field: &str) -> Option<Value> {
    match receiver {
        Value::Struct(_, fields) => fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.clone()),
        Value::Vector(ty, components) => {
            let indices: Option<Vec<usize>> = field.chars().map(swizzle_index).collect();
            let indices = indices?;
            if indices.len() == 1 {
                return components.get(indices[0]).cloned();
            }
            let selected: Option<Vec<Value>> = indices
                .iter()
                .map(|&i| components.get(i).cloned())
                .collect();
            Some(Value::Vector(
                BasicType::make_vector(ty.element_type(), indices.len() as u32),
                selected?,
            ))
        }
        _ => None,
    }
}

fn write_member(receiver: &mut Value, field: &str, value: Value) -> Option<()> {
    match receiver {
        Value::Struct(_, fields) => {
            let slot = fields.iter_mut().find(|(name, _)| name == field)?;
            slot.1 = value;
            Some(())
        }
        Value::Vector(_, components) => {
            let indices: Option<Vec<usize>> = field.chars().map(swizzle_index).collect();
            let indices = indices?;
            if indices.len() == 1 {
                *components.get_mut(indices[0])? = value;
                return Some(());
            }
            let incoming = match value {
                Value::Vector(_, incoming) if incoming.len() == indices.len() => incoming,
                _ => return None,
            };
            for (slot, incoming) in indices.into_iter().zip(incoming) {
                *components.get_mut(slot)? = incoming;
            }
            Some(())
        }
        _ => None,
    }
}

fn map_numeric(
    value: Value,
    float_op: impl Fn(f32) -> f32 + Copy,
    int_op: impl Fn(i32) -> i32 + Copy,
    uint_op: impl Fn(u32) -> u32 + Copy,
) -> Option<Value> {
    match value {
        Value::Float(v) => Some(Value::Float(float_op(v))),
        Value::Int(v) => Some(Value::Int(int_op(v))),
        Value::Uint(v) => Some(Value::Uint(uint_op(v))),
        Value::Vector(ty, components) => {
            let mapped = components
                .into_iter()
                .map(|c| map_numeric(c, float_op, int_op, uint_op))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(ty, mapped))
        }
        Value::Bool(_) | Value::Struct(..) => None,
    }
}

fn scalar_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => match op {
            BinOp::Add => Some(Value::Float(a + b)),
            BinOp::Sub => Some(Value::Float(a - b)),
            BinOp::Mul => Some(Value::Float(a * b)),
            BinOp::Div => Some(Value::Float(a / b)),
            BinOp::Lt => Some(Value::Bool(a < b)),
            BinOp::Le => Some(Value::Bool(a <= b)),
            BinOp::Gt => Some(Value::Bool(a > b)),
            BinOp::Ge => Some(Value::Bool(a >= b)),
            BinOp::Eq => Some(Value::Bool(a == b)),
            BinOp::Ne => Some(Value::Bool(a != b)),
            _ => None,
        },
        (Value::Int(a), Value::Int(b)) => match op {
            BinOp::Add => Some(Value::Int(a.wrapping_add(*b))),
            BinOp::Sub => Some(Value::Int(a.wrapping_sub(*b))),
            BinOp::Mul => Some(Value::Int(a.wrapping_mul(*b))),
            BinOp::Div => a.checked_div(*b).map(Value::Int),
            BinOp::Mod => a.checked_rem(*b).map(Value::Int),
            BinOp::Shl => Some(Value::Int(a.wrapping_shl(*b as u32))),
            BinOp::Shr => Some(Value::Int(a.wrapping_shr(*b as u32))),
            BinOp::BitAnd => Some(Value::Int(a & b)),
            BinOp::BitOr => Some(Value::Int(a | b)),
            BinOp::BitXor => Some(Value::Int(a ^ b)),
            BinOp::Lt => Some(Value::Bool(a < b)),
            BinOp::Le => Some(Value::Bool(a <= b)),
            BinOp::Gt => Some(Value::Bool(a > b)),
            BinOp::Ge => Some(Value::Bool(a >= b)),
            BinOp::Eq => Some(Value::Bool(a == b)),
            BinOp::Ne => Some(Value::Bool(a != b)),
            _ => None,
        },
        (Value::Uint(a), Value::Uint(b)) => match op {
            BinOp::Add => Some(Value::Uint(a.wrapping_add(*b))),
            BinOp::Sub => Some(Value::Uint(a.wrapping_sub(*b))),
            BinOp::Mul => Some(Value::Uint(a.wrapping_mul(*b))),
            BinOp::Div => a.checked_div(*b).map(Value::Uint),
            BinOp::Mod => a.checked_rem(*b).map(Value::Uint),
            BinOp::Shl => Some(Value::Uint(a.wrapping_shl(*b))),
            BinOp::Shr => Some(Value::Uint(a.wrapping_shr(*b))),
            BinOp::BitAnd => Some(Value::Uint(a & b)),
            BinOp::BitOr => Some(Value::Uint(a | b)),
            BinOp::BitXor => Some(Value::Uint(a ^ b)),
            BinOp::Lt => Some(Value::Bool(a < b)),
            BinOp::Le => Some(Value::Bool(a <= b)),
            BinOp::Gt => Some(Value::Bool(a > b)),
            BinOp::Ge => Some(Value::Bool(a >= b)),
            BinOp::Eq => Some(Value::Bool(a == b)),
            BinOp::Ne => Some(Value::Bool(a != b)),
            _ => None,
        },
        // Mixed int/uint shift amounts appear in generated shifts.
        (Value::Uint(a), Value::Int(b)) if matches!(op, BinOp::Shl | BinOp::Shr) => {
            scalar_binop(op, &Value::Uint(*a), &Value::Uint(*b as u32))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::Eq => Some(Value::Bool(a == b)),
            BinOp::Ne => Some(Value::Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

/// Component-wise application with scalar broadcast on either side.
fn numeric_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::Vector(ty, a), Value::Vector(ty2, b)) => {
            if ty.is_matrix() && ty2.is_matrix() && op == BinOp::Mul {
                return matrix_product(*ty, a, b);
            }
            if a.len() != b.len() {
                return None;
            }
            let components = a
                .iter()
                .zip(b)
                .map(|(x, y)| scalar_binop(op, x, y))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        (Value::Vector(ty, a), scalar) => {
            let components = a
                .iter()
                .map(|x| scalar_binop(op, x, scalar))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        (scalar, Value::Vector(ty, b)) => {
            let components = b
                .iter()
                .map(|y| scalar_binop(op, scalar, y))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        (lhs, rhs) => scalar_binop(op, lhs, rhs),
    }
}

fn matrix_product(ty: BasicType, a: &[Value], b: &[Value]) -> Option<Value> {
    let side = ty.columns() as usize;
    let get = |m: &[Value], row: usize, column: usize| -> Option<f32> {
        m.get(row * side + column)?.as_f32()
    };
    let mut components = Vec::new();
    for row in 0..side {
        for column in 0..side {
            let mut sum = 0.0;
            for k in 0..side {
                sum += get(a, row, k)? * get(b, k, column)?;
            }
            components.push(Value::Float(sum));
        }
    }
    Some(Value::Vector(ty, components))
}

fn float_components(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::Float(v) => Some(vec![*v]),
        Value::Vector(_, components) => {
            components.iter().map(Value::as_f32).collect()
        }
        _ => None,
    }
}

fn rebuild_like(original: &Value, components: &[f32]) -> Option<Value> {
    match original {
        Value::Float(_) => components.first().map(|v| Value::Float(*v)),
        Value::Vector(ty, _) => Some(Value::Vector(
            *ty,
            components.iter().map(|v| Value::Float(*v)).collect(),
        )),
        _ => None,
    }
}

fn float_unary(name: &str) -> Option<fn(f32) -> f32> {
    Some(match name {
        "sin" => f32::sin,
        "cos" => f32::cos,
        "tan" => f32::tan,
        "asin" => f32::asin,
        "acos" => f32::acos,
        "atan" => f32::atan,
        "exp" => f32::exp,
        "log" => f32::ln,
        "exp2" => f32::exp2,
        "log2" => f32::log2,
        "sqrt" => f32::sqrt,
        "inversesqrt" => |v: f32| 1.0 / v.sqrt(),
        "abs" => f32::abs,
        "sign" => f32::signum,
        "floor" => f32::floor,
        "ceil" => f32::ceil,
        "fract" => f32::fract,
        _ => return None,
    })
}

fn float_binary(name: &str) -> Option<fn(f32, f32) -> f32> {
    Some(match name {
        "min" => f32::min,
        "max" => f32::max,
        "pow" => f32::powf,
        "step" => |edge: f32, x: f32| if x < edge { 0.0 } else { 1.0 },
        "mod" => |x: f32, y: f32| x - y * (x / y).floor(),
        _ => return None,
    })
}

fn componentwise(a: &Value, b: &Value, f: fn(f32, f32) -> f32) -> Option<Value> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Some(Value::Float(f(*x, *y))),
        (Value::Vector(ty, xs), Value::Vector(_, ys)) if xs.len() == ys.len() => {
            let components = xs
                .iter()
                .zip(ys)
                .map(|(x, y)| Some(Value::Float(f(x.as_f32()?, y.as_f32()?))))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        (Value::Vector(ty, xs), Value::Float(y)) => {
            let components = xs
                .iter()
                .map(|x| Some(Value::Float(f(x.as_f32()?, *y))))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        (Value::Float(x), Value::Vector(ty, ys)) => {
            let components = ys
                .iter()
                .map(|y| Some(Value::Float(f(*x, y.as_f32()?))))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Vector(*ty, components))
        }
        _ => None,
    }
}
