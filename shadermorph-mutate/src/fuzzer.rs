//! Random synthesis of type-correct expressions and statements. The fuzzer
//! declines (with [`FuzzerError::IntoACorner`]) rather than fabricate when no
//! value of the requested type can be produced at the current site.

use shadermorph::ast::{
    BinOp, Expr, FunctionPrototype, Stmt, StmtKind, UnOp, VarDeclGroup,
};
use shadermorph::rng::MutationRng;
use shadermorph::scope::{Scope, ScopeEntry};
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};

use crate::params::GenerationParams;

#[derive(Debug, PartialEq, Eq)]
pub enum FuzzerError {
    /// Random choices reached a site where no expression of the requested
    /// type can be built.
    IntoACorner,
}

pub type FuzzerResult<T> = Result<T, FuzzerError>;

/// The environment a fuzzer synthesizes code against: the scope at the
/// injection site, the callable user functions, and control-flow context.
#[derive(Debug, Clone)]
pub struct FuzzingContext {
    pub scope: Scope,
    pub functions: Vec<FunctionPrototype>,
    pub enclosing_function: Option<FunctionPrototype>,
    loop_depth: u32,
}

impl FuzzingContext {
    #[must_use]
    pub fn new(scope: Scope) -> FuzzingContext {
        FuzzingContext {
            scope,
            functions: Vec::new(),
            enclosing_function: None,
            loop_depth: 0,
        }
    }

    #[must_use]
    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }
}

pub struct Fuzzer<'a> {
    version: ShadingLanguageVersion,
    params: &'a GenerationParams,
    ctx: FuzzingContext,
    /// Prefix distinguishing this fuzzer's declarations from those of other
    /// fuzzer instances. Required before any declaration is generated.
    declaration_prefix: Option<String>,
    next_name_id: u32,
    block_depth: u32,
}

const MAX_BLOCK_STMTS: u32 = 6;
const MAX_BLOCK_NESTING_DEPTH: u32 = 4;

impl<'a> Fuzzer<'a> {
    #[must_use]
    pub fn new(
        ctx: FuzzingContext,
        version: ShadingLanguageVersion,
        params: &'a GenerationParams,
    ) -> Fuzzer<'a> {
        Fuzzer {
            version,
            params,
            ctx,
            declaration_prefix: None,
            next_name_id: 0,
            block_depth: 0,
        }
    }

    #[must_use]
    pub fn with_prefix(
        ctx: FuzzingContext,
        version: ShadingLanguageVersion,
        params: &'a GenerationParams,
        declaration_prefix: impl Into<String>,
    ) -> Fuzzer<'a> {
        Fuzzer {
            declaration_prefix: Some(declaration_prefix.into()),
            ..Fuzzer::new(ctx, version, params)
        }
    }

    #[must_use]
    pub fn context(&self) -> &FuzzingContext {
        &self.ctx
    }

    /// Produces a random expression of the target type, retrying when random
    /// choices dead-end.
    pub fn fuzz_expr(
        &mut self,
        rng: &mut MutationRng,
        target: &Type,
        is_lvalue: bool,
        const_context: bool,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        for _ in 0..self.params.max_fuzz_attempts {
            if let Ok(expr) = self.make_expr(rng, target, is_lvalue, const_context, depth) {
                return Ok(expr);
            }
        }
        Err(FuzzerError::IntoACorner)
    }

    fn too_deep(&self, rng: &mut MutationRng, depth: u32) -> bool {
        if depth >= self.params.max_expr_depth {
            return true;
        }
        // Chances of going deeper shrink exponentially with depth.
        (0..=depth).any(|_| rng.next_int(2) == 0)
    }

    fn make_expr(
        &mut self,
        rng: &mut MutationRng,
        target: &Type,
        is_lvalue: bool,
        const_context: bool,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        match target {
            Type::Qualified(_, inner) => {
                self.make_expr(rng, inner, is_lvalue, const_context, depth)
            }
            Type::Basic(basic) => {
                self.make_basic_expr(rng, *basic, is_lvalue, const_context, depth)
            }
            Type::Struct(name) => {
                if is_lvalue {
                    return self.variable_of_type(rng, target, is_lvalue, const_context);
                }
                let definition = self
                    .ctx
                    .scope
                    .lookup_struct(name)
                    .cloned()
                    .ok_or(FuzzerError::IntoACorner)?;
                let mut args = Vec::new();
                for field in &definition.fields {
                    args.push(self.make_expr(rng, &field.ty, false, const_context, depth + 1)?);
                }
                Ok(Expr::ctor(name.clone(), args))
            }
            // Arrays come only from in-scope variables; there is no portable
            // literal form across the supported dialects.
            Type::Array(..) => self.variable_of_type(rng, target, is_lvalue, const_context),
            Type::Void => Err(FuzzerError::IntoACorner),
        }
    }

    fn candidate_variables(
        &self,
        target: &Type,
        is_lvalue: bool,
        const_context: bool,
    ) -> Vec<String> {
        self.ctx
            .scope
            .names_in_scope()
            .into_iter()
            .filter(|name| {
                let Some(entry) = self.ctx.scope.lookup(name) else {
                    return false;
                };
                if entry.ty.without_qualifiers() != target.without_qualifiers() {
                    return false;
                }
                if is_lvalue && !is_assignable(entry) {
                    return false;
                }
                if const_context && !entry.ty.has_qualifier(TypeQualifier::Const) {
                    return false;
                }
                true
            })
            .collect()
    }

    fn variable_of_type(
        &mut self,
        rng: &mut MutationRng,
        target: &Type,
        is_lvalue: bool,
        const_context: bool,
    ) -> FuzzerResult<Expr> {
        let candidates = self.candidate_variables(target, is_lvalue, const_context);
        if candidates.is_empty() {
            return Err(FuzzerError::IntoACorner);
        }
        let name = &candidates[rng.choose_index(candidates.len())];
        Ok(Expr::ident(name.clone()))
    }

    fn make_basic_expr(
        &mut self,
        rng: &mut MutationRng,
        target: BasicType,
        is_lvalue: bool,
        const_context: bool,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        let target_ty = Type::Basic(target);
        if is_lvalue {
            return self.variable_of_type(rng, &target_ty, true, const_context);
        }
        let leaf_only = self.too_deep(rng, depth);
        // Strategies legal for this type at this depth; each is attempted in
        // a random order until one produces an expression.
        let mut strategies: Vec<u32> = vec![0, 1];
        if !leaf_only {
            if !target.is_scalar() {
                strategies.push(2);
            }
            if target.is_numeric() && !target.is_matrix() {
                strategies.push(3);
            }
            if !const_context && BasicType::GEN_TYPES.contains(&target) {
                strategies.push(4);
            }
            if !const_context {
                strategies.push(5);
            }
        }
        while !strategies.is_empty() {
            let index = rng.choose_index(strategies.len());
            let strategy = strategies.swap_remove(index);
            let result = match strategy {
                0 => self.variable_of_type(rng, &target_ty, false, const_context),
                1 => self.literal_of_type(rng, target),
                2 => self.constructor_from_elements(rng, target, const_context, depth),
                3 => self.arithmetic_expr(rng, target, const_context, depth),
                4 => self.builtin_call(rng, target, depth),
                5 => self.user_call(rng, target, depth),
                _ => unreachable!(),
            };
            if result.is_ok() {
                return result;
            }
        }
        Err(FuzzerError::IntoACorner)
    }

    fn literal_of_type(&mut self, rng: &mut MutationRng, target: BasicType) -> FuzzerResult<Expr> {
        match target {
            BasicType::Float => {
                Ok(Expr::float(rng.next_int_in(-100, 101) as f32 / 4.0))
            }
            BasicType::Int => Ok(Expr::int(rng.next_int_in(-100, 101))),
            BasicType::Uint => {
                if self.version.supports_unsigned() {
                    Ok(Expr::uint(rng.next_int(200)))
                } else {
                    Err(FuzzerError::IntoACorner)
                }
            }
            BasicType::Bool => Ok(Expr::bool_lit(rng.next_bool())),
            vector_or_matrix => {
                let count = if vector_or_matrix.is_matrix() {
                    // A single scalar argument fills the diagonal.
                    1
                } else {
                    vector_or_matrix.num_elements()
                };
                let mut args = Vec::new();
                for _ in 0..count {
                    args.push(self.literal_of_type(rng, vector_or_matrix.element_type())?);
                }
                Ok(Expr::ctor(vector_or_matrix.glsl_name(), args))
            }
        }
    }

    fn constructor_from_elements(
        &mut self,
        rng: &mut MutationRng,
        target: BasicType,
        const_context: bool,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        if target.is_matrix() {
            let scalar =
                self.make_basic_expr(rng, BasicType::Float, false, const_context, depth + 1)?;
            return Ok(Expr::ctor(target.glsl_name(), vec![scalar]));
        }
        let element = Type::Basic(target.element_type());
        let mut args = Vec::new();
        for _ in 0..target.num_elements() {
            args.push(self.make_expr(rng, &element, false, const_context, depth + 1)?);
        }
        Ok(Expr::ctor(target.glsl_name(), args))
    }

    fn arithmetic_expr(
        &mut self,
        rng: &mut MutationRng,
        target: BasicType,
        const_context: bool,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        let ops = [BinOp::Add, BinOp::Sub, BinOp::Mul];
        let op = ops[rng.choose_index(ops.len())];
        let lhs = self.make_basic_expr(rng, target, false, const_context, depth + 1)?;
        let rhs = self.make_basic_expr(rng, target, false, const_context, depth + 1)?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn builtin_call(
        &mut self,
        rng: &mut MutationRng,
        target: BasicType,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        const UNARY: [&str; 6] = ["abs", "sign", "floor", "fract", "exp", "sin"];
        const BINARY: [&str; 3] = ["min", "max", "mod"];
        let use_binary = rng.next_bool();
        if use_binary {
            let name = BINARY[rng.choose_index(BINARY.len())];
            let lhs = self.make_basic_expr(rng, target, false, false, depth + 1)?;
            let rhs = self.make_basic_expr(rng, target, false, false, depth + 1)?;
            Ok(Expr::call(name, vec![lhs, rhs]))
        } else {
            let name = UNARY[rng.choose_index(UNARY.len())];
            let arg = self.make_basic_expr(rng, target, false, false, depth + 1)?;
            Ok(Expr::call(name, vec![arg]))
        }
    }

    fn user_call(
        &mut self,
        rng: &mut MutationRng,
        target: BasicType,
        depth: u32,
    ) -> FuzzerResult<Expr> {
        let candidates: Vec<FunctionPrototype> = self
            .ctx
            .functions
            .iter()
            .filter(|p| {
                p.return_type.without_qualifiers() == &Type::Basic(target)
                    && p.params.iter().all(|param| {
                        !param.ty.has_qualifier(TypeQualifier::OutParam)
                            && !param.ty.has_qualifier(TypeQualifier::InoutParam)
                    })
            })
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(FuzzerError::IntoACorner);
        }
        let prototype = &candidates[rng.choose_index(candidates.len())];
        let mut args = Vec::new();
        for param in &prototype.params {
            args.push(self.make_expr(rng, &param.ty, false, false, depth + 1)?);
        }
        Ok(Expr::call(prototype.name.clone(), args))
    }

    fn fresh_name(&mut self, stem: &str) -> String {
        let prefix = self
            .declaration_prefix
            .as_ref()
            .expect("a fuzzer needs a declaration prefix before it can declare anything");
        let id = self.next_name_id;
        self.next_name_id += 1;
        format!("{stem}_{prefix}_{id}")
    }

    /// Produces a random statement. Only used inside provably-dead regions,
    /// so the statement may read and write freely.
    pub fn fuzz_stmt(&mut self, rng: &mut MutationRng) -> Stmt {
        loop {
            let num = rng.next_int(120);
            match num {
                0..=5 if self.ctx.in_loop() => return Stmt::new(StmtKind::Continue),
                6..=9 if self.ctx.in_loop() => return Stmt::new(StmtKind::Break),
                10..=14 => return Stmt::new(StmtKind::Empty),
                15..=16 if self.params.shader_kind == ShaderKind::Fragment => {
                    return Stmt::new(StmtKind::Discard);
                }
                17..=26 if self.below_nesting_depth() => return self.fuzz_block_stmt(rng),
                27..=56 => {
                    if let Some(stmt) = self.fuzz_expr_stmt(rng) {
                        return stmt;
                    }
                }
                57..=61 => {
                    if let Some(stmt) = self.fuzz_return_stmt(rng) {
                        return stmt;
                    }
                }
                62..=81 => return self.fuzz_decl_stmt(rng),
                82..=91 if self.below_nesting_depth() => {
                    if let Some(stmt) = self.fuzz_if_stmt(rng) {
                        return stmt;
                    }
                }
                92..=101 if self.below_nesting_depth() => return self.fuzz_for_stmt(rng),
                102..=109 if self.below_nesting_depth() => {
                    if let Some(stmt) = self.fuzz_while_stmt(rng) {
                        return stmt;
                    }
                }
                110..=111
                    if self.below_nesting_depth() && self.version.supports_do_stmt() =>
                {
                    if let Some(stmt) = self.fuzz_do_stmt(rng) {
                        return stmt;
                    }
                }
                _ => {}
            }
        }
    }

    fn below_nesting_depth(&self) -> bool {
        self.block_depth < MAX_BLOCK_NESTING_DEPTH
    }

    fn random_value_type(&mut self, rng: &mut MutationRng) -> BasicType {
        loop {
            let candidate = BasicType::ALL[rng.choose_index(BasicType::ALL.len())];
            if candidate.element_type() == BasicType::Uint && !self.version.supports_unsigned() {
                continue;
            }
            return candidate;
        }
    }

    fn fuzz_block_stmt(&mut self, rng: &mut MutationRng) -> Stmt {
        self.block_depth += 1;
        self.ctx.scope.push_frame();
        let count = rng.next_int(MAX_BLOCK_STMTS);
        let mut stmts = Vec::new();
        for _ in 0..count {
            stmts.push(self.fuzz_stmt(rng));
        }
        self.ctx.scope.pop_frame();
        self.block_depth -= 1;
        Stmt::block(stmts, true)
    }

    fn fuzz_expr_stmt(&mut self, rng: &mut MutationRng) -> Option<Stmt> {
        let target = self.random_value_type(rng);
        // Prefer an assignment when an assignable variable exists; a bare
        // expression statement otherwise.
        let lvalue = self
            .fuzz_expr(rng, &Type::Basic(target), true, false, 0)
            .ok();
        let value = self.fuzz_expr(rng, &Type::Basic(target), false, false, 0).ok()?;
        match lvalue {
            Some(lvalue) if rng.next_int(4) != 0 => {
                Some(Stmt::expr(Expr::assign(lvalue, value)))
            }
            _ => Some(Stmt::expr(value)),
        }
    }

    fn fuzz_return_stmt(&mut self, rng: &mut MutationRng) -> Option<Stmt> {
        let function = self.ctx.enclosing_function.clone()?;
        if function.return_type == Type::Void {
            return Some(Stmt::new(StmtKind::Return(None)));
        }
        let value = self
            .fuzz_expr(rng, &function.return_type, false, false, 0)
            .ok()?;
        Some(Stmt::new(StmtKind::Return(Some(value))))
    }

    fn fuzz_decl_stmt(&mut self, rng: &mut MutationRng) -> Stmt {
        let base = self.random_value_type(rng);
        let count = 1 + rng.next_int(3);
        let mut decls = Vec::new();
        for _ in 0..count {
            let name = self.fresh_name("v");
            let init = self
                .fuzz_expr(rng, &Type::Basic(base), false, false, 0)
                .ok();
            decls.push(shadermorph::ast::VarDeclInfo {
                name,
                array_size: None,
                init,
            });
        }
        let group = VarDeclGroup::new(
            Type::Basic(base),
            decls,
        );
        shadermorph::walk::declare_group(&mut self.ctx.scope, &group);
        Stmt::new(StmtKind::Decl(group))
    }

    fn fuzz_if_stmt(&mut self, rng: &mut MutationRng) -> Option<Stmt> {
        let cond = self
            .fuzz_expr(rng, &Type::Basic(BasicType::Bool), false, false, 0)
            .ok()?;
        let then_branch = self.fuzz_block_stmt(rng);
        let else_branch = if rng.next_bool() {
            Some(Box::new(self.fuzz_block_stmt(rng)))
        } else {
            None
        };
        Some(Stmt::new(StmtKind::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch,
        }))
    }

    /// Loops are always generated in the canonical counted shape so that the
    /// result is legal even under restricted-for-loop dialects.
    fn fuzz_for_stmt(&mut self, rng: &mut MutationRng) -> Stmt {
        self.ctx.scope.push_frame();
        let counter = self.fresh_name("i");
        let bound = 1 + rng.next_int(8) as i32;
        let init = Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Int),
            counter.clone(),
            Some(Expr::int(0)),
        )));
        let cond = Expr::binary(BinOp::Lt, Expr::ident(counter.clone()), Expr::int(bound));
        let inc = Expr::unary(UnOp::PostInc, Expr::ident(counter.clone()));
        self.ctx.scope.add(
            counter,
            ScopeEntry::builtin(Type::Basic(BasicType::Int)),
        );
        self.ctx.loop_depth += 1;
        let body = self.fuzz_block_stmt(rng);
        self.ctx.loop_depth -= 1;
        self.ctx.scope.pop_frame();
        Stmt::new(StmtKind::For {
            init: Some(Box::new(init)),
            cond: Some(cond),
            inc: Some(inc),
            body: Box::new(body),
        })
    }

    fn fuzz_while_stmt(&mut self, rng: &mut MutationRng) -> Option<Stmt> {
        let cond = self
            .fuzz_expr(rng, &Type::Basic(BasicType::Bool), false, false, 0)
            .ok()?;
        self.ctx.loop_depth += 1;
        let body = self.fuzz_block_stmt(rng);
        self.ctx.loop_depth -= 1;
        Some(Stmt::new(StmtKind::While {
            cond,
            body: Box::new(body),
        }))
    }

    fn fuzz_do_stmt(&mut self, rng: &mut MutationRng) -> Option<Stmt> {
        let cond = self
            .fuzz_expr(rng, &Type::Basic(BasicType::Bool), false, false, 0)
            .ok()?;
        self.ctx.loop_depth += 1;
        let body = self.fuzz_block_stmt(rng);
        self.ctx.loop_depth -= 1;
        Some(Stmt::new(StmtKind::DoWhile {
            body: Box::new(body),
            cond,
        }))
    }
}

fn is_assignable(entry: &ScopeEntry) -> bool {
    !entry.ty.has_qualifier(TypeQualifier::Const)
        && !entry.ty.has_qualifier(TypeQualifier::Uniform)
        && !entry.ty.has_qualifier(TypeQualifier::ShaderInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams::small(ShaderKind::Fragment)
    }

    #[test]
    fn fuzzed_expressions_have_the_requested_type() {
        let params = params();
        let mut scope = Scope::new();
        scope.add("x", ScopeEntry::builtin(Type::Basic(BasicType::Float)));
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(scope.clone()),
            ShadingLanguageVersion::Essl300,
            &params,
        );
        let tu = shadermorph::ast::TranslationUnit::new(
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment,
            Vec::new(),
        );
        let env = shadermorph::typer::TypeEnv::new(&tu);
        let mut rng = MutationRng::from_seed(11);
        for target in [BasicType::Float, BasicType::Int, BasicType::Vec3, BasicType::Bool] {
            for _ in 0..20 {
                let expr = fuzzer
                    .fuzz_expr(&mut rng, &Type::Basic(target), false, false, 0)
                    .expect("fuzzing a basic type succeeds");
                assert_eq!(
                    shadermorph::typer::type_of(&expr, &scope, &env)
                        .map(|t| t.without_qualifiers().clone()),
                    Some(Type::Basic(target)),
                    "wrong type for {}",
                    shadermorph::printer::expr_to_string(&expr)
                );
            }
        }
    }

    #[test]
    fn lvalue_requests_decline_without_assignable_variables() {
        let params = params();
        let mut scope = Scope::new();
        scope.add(
            "u",
            ScopeEntry::builtin(Type::qualified(
                vec![TypeQualifier::Uniform],
                Type::Basic(BasicType::Float),
            )),
        );
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(scope),
            ShadingLanguageVersion::Essl300,
            &params,
        );
        let mut rng = MutationRng::from_seed(5);
        let result = fuzzer.fuzz_expr(&mut rng, &Type::Basic(BasicType::Float), true, false, 0);
        assert_eq!(result, Err(FuzzerError::IntoACorner));
    }

    #[test]
    fn struct_fuzzing_declines_for_unknown_structs() {
        let params = params();
        let mut fuzzer = Fuzzer::new(
            FuzzingContext::new(Scope::new()),
            ShadingLanguageVersion::Essl300,
            &params,
        );
        let mut rng = MutationRng::from_seed(5);
        let result = fuzzer.fuzz_expr(
            &mut rng,
            &Type::Struct("NoSuchStruct".to_string()),
            false,
            false,
            0,
        );
        assert_eq!(result, Err(FuzzerError::IntoACorner));
    }

    #[test]
    fn fuzzed_statements_terminate() {
        let params = params();
        let mut scope = Scope::new();
        scope.add("x", ScopeEntry::builtin(Type::Basic(BasicType::Float)));
        let mut fuzzer = Fuzzer::with_prefix(
            FuzzingContext::new(scope),
            ShadingLanguageVersion::Essl300,
            &params,
            "t0",
        );
        let mut rng = MutationRng::from_seed(23);
        for _ in 0..50 {
            let _ = fuzzer.fuzz_stmt(&mut rng);
        }
    }
}
