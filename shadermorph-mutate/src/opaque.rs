//! Generation of opaque expressions: syntactically involved expressions that
//! provably evaluate to a chosen constant ("always true", "always false",
//! "zero of type T", "one of type T") under every legal execution. The
//! guarantee is structural — it never depends on runtime values beyond the
//! harness contract that the switch uniform holds `(0.0, 1.0)`.

use shadermorph::ast::{BinOp, Expr, UnOp};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::typer::side_effect_free;
use shadermorph::types::{BasicType, Type};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};

use crate::fuzzer::Fuzzer;
use crate::params::GenerationParams;

pub struct OpaqueExprGenerator<'a> {
    version: ShadingLanguageVersion,
    params: &'a GenerationParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroOneFactory {
    /// Recursively make the opaque value, then apply an identity function.
    IdentityWrapped,
    /// `morphSwitch.x` is 0.0 and `morphSwitch.y` is 1.0 at runtime.
    InjectionSwitch,
    /// `sqrt(0) == 0`, `sqrt(1) == 1`.
    Sqrt,
    /// `abs(0) == 0`, `abs(1) == 1`.
    Abs,
    /// Shifting: zero shifted anywhere stays zero; one shifted left then
    /// right by the same amount comes back.
    BitwiseShift,
    /// And/or/xor recombinations of opaque zeros and ones.
    BitwiseCombine,
    SinOfZero,
    TanOfZero,
    LogOfOne,
    LengthOfZeroVector,
    ExpOfZero,
    CosOfZero,
}

const COMMON_FACTORIES: [ZeroOneFactory; 6] = [
    ZeroOneFactory::IdentityWrapped,
    ZeroOneFactory::InjectionSwitch,
    ZeroOneFactory::Sqrt,
    ZeroOneFactory::Abs,
    ZeroOneFactory::BitwiseShift,
    ZeroOneFactory::BitwiseCombine,
];

const ZERO_FACTORIES: [ZeroOneFactory; 4] = [
    ZeroOneFactory::SinOfZero,
    ZeroOneFactory::TanOfZero,
    ZeroOneFactory::LogOfOne,
    ZeroOneFactory::LengthOfZeroVector,
];

const ONE_FACTORIES: [ZeroOneFactory; 2] =
    [ZeroOneFactory::ExpOfZero, ZeroOneFactory::CosOfZero];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityKind {
    AddSubZero,
    MulDivOne,
    AndTrue,
    OrFalse,
    NotNot,
    TernaryTrue,
    MinSelf,
    MaxSelf,
    ClampSelf,
    BitNotNot,
    BitOrSelf,
    BitOrZero,
    BitXorZero,
    BitShiftZero,
    MatrixMulIdentity,
}

const ALL_IDENTITIES: [IdentityKind; 15] = [
    IdentityKind::AddSubZero,
    IdentityKind::MulDivOne,
    IdentityKind::AndTrue,
    IdentityKind::OrFalse,
    IdentityKind::NotNot,
    IdentityKind::TernaryTrue,
    IdentityKind::MinSelf,
    IdentityKind::MaxSelf,
    IdentityKind::ClampSelf,
    IdentityKind::BitNotNot,
    IdentityKind::BitOrSelf,
    IdentityKind::BitOrZero,
    IdentityKind::BitXorZero,
    IdentityKind::BitShiftZero,
    IdentityKind::MatrixMulIdentity,
];

impl<'a> OpaqueExprGenerator<'a> {
    #[must_use]
    pub fn new(
        version: ShadingLanguageVersion,
        params: &'a GenerationParams,
    ) -> OpaqueExprGenerator<'a> {
        OpaqueExprGenerator { version, params }
    }

    fn too_deep(&self, rng: &mut MutationRng, depth: u32) -> bool {
        if depth >= self.params.max_expr_depth {
            return true;
        }
        (0..=depth).any(|_| rng.next_int(2) == 0)
    }

    fn shader_kind(&self) -> ShaderKind {
        self.params.shader_kind
    }

    pub fn make_opaque_zero(
        &self,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        self.make_opaque_zero_or_one(true, ty, const_context, depth, rng, fuzzer)
    }

    pub fn make_opaque_one(
        &self,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        self.make_opaque_zero_or_one(false, ty, const_context, depth, rng, fuzzer)
    }

    fn make_opaque_zero_or_one(
        &self,
        is_zero: bool,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        assert!(ty.is_numeric(), "no opaque zero/one for boolean types");
        if ty.is_matrix() || self.too_deep(rng, depth) {
            // Matrices only ever need the literal form (an all-zero matrix,
            // or the multiplicative identity).
            return literal_zero_or_one(is_zero, ty);
        }
        let new_depth = depth + 1;
        let mut factories: Vec<ZeroOneFactory> = COMMON_FACTORIES.to_vec();
        factories.extend(if is_zero {
            ZERO_FACTORIES.to_vec()
        } else {
            ONE_FACTORIES.to_vec()
        });
        while !factories.is_empty() {
            let index = rng.choose_index(factories.len());
            let factory = factories.swap_remove(index);
            if let Some(expr) =
                self.try_factory(factory, is_zero, ty, const_context, new_depth, rng, fuzzer)
            {
                return expr;
            }
        }
        // IdentityWrapped always applies, so the factory pool cannot drain.
        unreachable!("no opaque factory applied for {}", ty.glsl_name());
    }

    #[allow(clippy::too_many_lines)]
    fn try_factory(
        &self,
        factory: ZeroOneFactory,
        is_zero: bool,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Option<Expr> {
        let gen_type = BasicType::GEN_TYPES.contains(&ty);
        let bitwise_ok = ty.is_integral() && self.version.supports_bitwise_operations();
        match factory {
            ZeroOneFactory::IdentityWrapped => {
                let inner =
                    self.make_opaque_zero_or_one(is_zero, ty, const_context, depth, rng, fuzzer);
                Some(self.apply_identity(inner, ty, const_context, depth, rng, fuzzer))
            }
            ZeroOneFactory::InjectionSwitch => {
                if const_context || !self.params.injection_switch_available {
                    return None;
                }
                Some(from_injection_switch(is_zero, ty))
            }
            ZeroOneFactory::Sqrt | ZeroOneFactory::Abs => {
                if !gen_type {
                    return None;
                }
                let name = if factory == ZeroOneFactory::Sqrt {
                    "sqrt"
                } else {
                    "abs"
                };
                let inner =
                    self.make_opaque_zero_or_one(is_zero, ty, const_context, depth, rng, fuzzer);
                Some(Expr::call(name, vec![inner]))
            }
            ZeroOneFactory::SinOfZero | ZeroOneFactory::TanOfZero => {
                if !gen_type {
                    return None;
                }
                let name = if factory == ZeroOneFactory::SinOfZero {
                    "sin"
                } else {
                    "tan"
                };
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                Some(Expr::call(name, vec![zero]))
            }
            ZeroOneFactory::LogOfOne => {
                if !gen_type {
                    return None;
                }
                let one = self.make_opaque_one(ty, const_context, depth, rng, fuzzer);
                Some(Expr::call("log", vec![one]))
            }
            ZeroOneFactory::ExpOfZero | ZeroOneFactory::CosOfZero => {
                if !gen_type {
                    return None;
                }
                let name = if factory == ZeroOneFactory::ExpOfZero {
                    "exp"
                } else {
                    "cos"
                };
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                Some(Expr::call(name, vec![zero]))
            }
            ZeroOneFactory::LengthOfZeroVector => {
                if ty != BasicType::Float {
                    return None;
                }
                let width = 2 + rng.next_int(3);
                let vector = BasicType::make_vector(BasicType::Float, width);
                let zero = self.make_opaque_zero(vector, const_context, depth, rng, fuzzer);
                Some(Expr::call("length", vec![zero]))
            }
            ZeroOneFactory::BitwiseShift => {
                if !bitwise_ok {
                    return None;
                }
                // A lowp int is at least 9 bits; shifting by up to 8 keeps
                // the result defined, and up to 7 keeps a set bit alive.
                if is_zero {
                    let amount = int_literal_of(ty, rng.next_int(9) as i32);
                    let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                    let op = if rng.next_bool() { BinOp::Shl } else { BinOp::Shr };
                    Some(Expr::paren(Expr::binary(op, zero, amount)))
                } else {
                    let shift = rng.next_int(8) as i32;
                    let one = self.make_opaque_one(ty, const_context, depth, rng, fuzzer);
                    let left = Expr::paren(Expr::binary(
                        BinOp::Shl,
                        one,
                        int_literal_of(ty, shift),
                    ));
                    Some(Expr::paren(Expr::binary(
                        BinOp::Shr,
                        left,
                        int_literal_of(ty, shift),
                    )))
                }
            }
            ZeroOneFactory::BitwiseCombine => {
                if !bitwise_ok {
                    return None;
                }
                let expr = if is_zero {
                    match rng.next_int(3) {
                        0 => {
                            // Anything ANDed with zero is zero; the other
                            // operand may be arbitrary as long as it is pure.
                            let other = fuzzer
                                .fuzz_expr(rng, &Type::Basic(ty), false, const_context, depth)
                                .ok()
                                .filter(|e| {
                                    side_effect_free(e, self.version, self.shader_kind())
                                })
                                .unwrap_or_else(|| {
                                    self.make_opaque_zero_or_one(
                                        true, ty, const_context, depth, rng, fuzzer,
                                    )
                                });
                            let zero = self
                                .make_opaque_zero_or_one(true, ty, const_context, depth, rng, fuzzer);
                            Expr::binary(BinOp::BitAnd, Expr::paren(other), zero)
                        }
                        1 => {
                            let a = self
                                .make_opaque_zero_or_one(true, ty, const_context, depth, rng, fuzzer);
                            let b = self
                                .make_opaque_zero_or_one(true, ty, const_context, depth, rng, fuzzer);
                            Expr::binary(BinOp::BitOr, a, b)
                        }
                        _ => {
                            let value = rng.next_bool();
                            let a = self.make_opaque_zero_or_one(
                                value, ty, const_context, depth, rng, fuzzer,
                            );
                            let b = self.make_opaque_zero_or_one(
                                value, ty, const_context, depth, rng, fuzzer,
                            );
                            Expr::binary(BinOp::BitXor, a, b)
                        }
                    }
                } else {
                    match rng.next_int(3) {
                        0 => {
                            let a = self
                                .make_opaque_zero_or_one(false, ty, const_context, depth, rng, fuzzer);
                            let b = self
                                .make_opaque_zero_or_one(false, ty, const_context, depth, rng, fuzzer);
                            Expr::binary(BinOp::BitAnd, a, b)
                        }
                        1 => {
                            let one = self
                                .make_opaque_zero_or_one(false, ty, const_context, depth, rng, fuzzer);
                            let either = rng.next_bool();
                            let other = self.make_opaque_zero_or_one(
                                either, ty, const_context, depth, rng, fuzzer,
                            );
                            Expr::binary(BinOp::BitOr, one, other)
                        }
                        _ => {
                            let first = rng.next_bool();
                            let a = self.make_opaque_zero_or_one(
                                first, ty, const_context, depth, rng, fuzzer,
                            );
                            let b = self.make_opaque_zero_or_one(
                                !first, ty, const_context, depth, rng, fuzzer,
                            );
                            Expr::binary(BinOp::BitXor, a, b)
                        }
                    }
                };
                Some(Expr::paren(expr))
            }
        }
    }

    /// An opaque boolean of the given (scalar or vector) boolean type.
    pub fn make_opaque_bool(
        &self,
        value: bool,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        assert!(ty.is_boolean(), "opaque booleans require a boolean type");
        if ty != BasicType::Bool {
            let args = (0..ty.num_elements())
                .map(|_| {
                    self.make_opaque_bool(value, BasicType::Bool, const_context, depth, rng, fuzzer)
                })
                .collect();
            return Expr::ctor(ty.glsl_name(), args);
        }
        if self.too_deep(rng, depth) {
            return Expr::bool_lit(value);
        }
        let new_depth = depth + 1;
        if const_context {
            let inner =
                self.make_opaque_bool(value, BasicType::Bool, const_context, new_depth, rng, fuzzer);
            return self.apply_identity(inner, BasicType::Bool, const_context, new_depth, rng, fuzzer);
        }
        let choices = if self.shader_kind() == ShaderKind::Fragment { 4 } else { 2 };
        loop {
            match rng.next_int(choices) {
                0 => {
                    let inner = self.make_opaque_bool(
                        value,
                        BasicType::Bool,
                        const_context,
                        new_depth,
                        rng,
                        fuzzer,
                    );
                    return self.apply_identity(
                        inner,
                        BasicType::Bool,
                        const_context,
                        new_depth,
                        rng,
                        fuzzer,
                    );
                }
                1 => {
                    if !self.params.injection_switch_available {
                        continue;
                    }
                    // morphSwitch.x < morphSwitch.y holds; > does not.
                    let cmp = Expr::binary(
                        if value { BinOp::Lt } else { BinOp::Gt },
                        switch_member("x"),
                        switch_member("y"),
                    );
                    return bool_tag(value, Expr::paren(cmp));
                }
                coord => {
                    // gl_FragCoord components are never negative.
                    let member = if coord == 2 { "x" } else { "y" };
                    let zero = self.make_opaque_zero(
                        BasicType::Float,
                        const_context,
                        new_depth,
                        rng,
                        fuzzer,
                    );
                    let cmp = Expr::binary(
                        if value { BinOp::Ge } else { BinOp::Lt },
                        Expr::member(Expr::ident("gl_FragCoord"), member),
                        zero,
                    );
                    return bool_tag(value, Expr::paren(cmp));
                }
            }
        }
    }

    /// A condition that never holds, wrapped in the dead-guard marker.
    pub fn make_dead_condition(&self, rng: &mut MutationRng, fuzzer: &mut Fuzzer) -> Expr {
        let condition = self.make_opaque_bool(false, BasicType::Bool, false, 0, rng, fuzzer);
        Expr::call(consts::DEAD, vec![condition])
    }

    #[must_use]
    pub fn fuzzed_tag(expr: Expr) -> Expr {
        Expr::call(consts::FUZZED, vec![expr])
    }

    /// Wraps `expr` in a randomly chosen value-preserving transformation,
    /// tagged with the identity marker. Returns the expression unchanged when
    /// the depth budget is exhausted or no identity applies to its type.
    pub fn apply_identity(
        &self,
        expr: Expr,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        if self.too_deep(rng, depth) {
            return expr;
        }
        let pure = side_effect_free(&expr, self.version, self.shader_kind());
        let applicable: Vec<IdentityKind> = ALL_IDENTITIES
            .into_iter()
            .filter(|kind| self.identity_precondition(*kind, ty, pure))
            .collect();
        if applicable.is_empty() {
            return expr;
        }
        let kind = applicable[rng.choose_index(applicable.len())];
        self.apply_identity_kind(kind, expr, ty, const_context, depth + 1, rng, fuzzer)
    }

    fn identity_precondition(&self, kind: IdentityKind, ty: BasicType, pure: bool) -> bool {
        let bitwise_ok = ty.is_integral() && self.version.supports_bitwise_operations();
        match kind {
            IdentityKind::AddSubZero => ty.is_numeric(),
            IdentityKind::MulDivOne => ty.is_numeric() && !ty.is_matrix(),
            IdentityKind::AndTrue | IdentityKind::OrFalse | IdentityKind::NotNot => {
                ty == BasicType::Bool
            }
            IdentityKind::TernaryTrue => !ty.is_matrix() && pure,
            IdentityKind::MinSelf | IdentityKind::MaxSelf | IdentityKind::ClampSelf => {
                BasicType::GEN_TYPES.contains(&ty) && pure
            }
            IdentityKind::BitOrSelf => bitwise_ok && pure,
            IdentityKind::BitNotNot
            | IdentityKind::BitOrZero
            | IdentityKind::BitXorZero
            | IdentityKind::BitShiftZero => bitwise_ok,
            IdentityKind::MatrixMulIdentity => ty.is_matrix(),
        }
    }

    fn apply_identity_kind(
        &self,
        kind: IdentityKind,
        expr: Expr,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        match kind {
            IdentityKind::AddSubZero => {
                let op = if rng.next_bool() { BinOp::Add } else { BinOp::Sub };
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, zero, op, op == BinOp::Add, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::MulDivOne => {
                let op = if rng.next_bool() { BinOp::Mul } else { BinOp::Div };
                let one = self.make_opaque_one(ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, one, op, op == BinOp::Mul, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::AndTrue => {
                let truth = self.make_opaque_bool(true, ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, truth, BinOp::LogicalAnd, true, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::OrFalse => {
                let falsity = self.make_opaque_bool(false, ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, falsity, BinOp::LogicalOr, true, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::NotNot => {
                let original = expr.clone_fresh();
                let wrapped =
                    Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
                let doubled = Expr::unary(
                    UnOp::LogicalNot,
                    Expr::paren(Expr::unary(UnOp::LogicalNot, wrapped)),
                );
                identity_tag(original, doubled)
            }
            IdentityKind::TernaryTrue => {
                let original = expr.clone_fresh();
                let alternative = fuzzer
                    .fuzz_expr(rng, &Type::Basic(ty), false, const_context, depth)
                    .unwrap_or_else(|_| expr.clone_fresh());
                let wrapped =
                    Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
                let condition =
                    self.make_opaque_bool(true, BasicType::Bool, const_context, depth, rng, fuzzer);
                identity_tag(
                    original,
                    Expr::paren(Expr::ternary(condition, wrapped, alternative)),
                )
            }
            IdentityKind::MinSelf | IdentityKind::MaxSelf => {
                let name = if kind == IdentityKind::MinSelf { "min" } else { "max" };
                let original = expr.clone_fresh();
                let copy = expr.clone_fresh();
                let wrapped =
                    self.apply_identity(expr, ty, const_context, depth, rng, fuzzer);
                identity_tag(original, Expr::call(name, vec![wrapped, copy]))
            }
            IdentityKind::ClampSelf => {
                let original = expr.clone_fresh();
                let low = expr.clone_fresh();
                let high = expr.clone_fresh();
                let wrapped =
                    self.apply_identity(expr, ty, const_context, depth, rng, fuzzer);
                identity_tag(original, Expr::call("clamp", vec![wrapped, low, high]))
            }
            IdentityKind::BitNotNot => {
                let original = expr.clone_fresh();
                let wrapped =
                    Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
                let doubled = Expr::unary(
                    UnOp::BitwiseNot,
                    Expr::paren(Expr::unary(UnOp::BitwiseNot, wrapped)),
                );
                identity_tag(original, doubled)
            }
            IdentityKind::BitOrSelf => {
                // x | x == x; duplication is fine because the precondition
                // demands a pure expression.
                let original = expr.clone_fresh();
                let copy = expr.clone_fresh();
                let wrapped =
                    Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
                identity_tag(original, Expr::binary(BinOp::BitOr, wrapped, copy))
            }
            IdentityKind::BitOrZero => {
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, zero, BinOp::BitOr, true, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::BitXorZero => {
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, zero, BinOp::BitXor, true, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::BitShiftZero => {
                let op = if rng.next_bool() { BinOp::Shl } else { BinOp::Shr };
                let zero = self.make_opaque_zero(ty, const_context, depth, rng, fuzzer);
                self.binary_identity(expr, zero, op, false, ty, const_context, depth, rng, fuzzer)
            }
            IdentityKind::MatrixMulIdentity => {
                let original = expr.clone_fresh();
                let identity_matrix = Expr::ctor(ty.glsl_name(), vec![Expr::float(1.0)]);
                let wrapped =
                    Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
                let product = if rng.next_bool() {
                    Expr::binary(BinOp::Mul, wrapped, identity_matrix)
                } else {
                    Expr::binary(BinOp::Mul, identity_matrix, wrapped)
                };
                identity_tag(original, product)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn binary_identity(
        &self,
        expr: Expr,
        opaque: Expr,
        op: BinOp,
        consider_reverse: bool,
        ty: BasicType,
        const_context: bool,
        depth: u32,
        rng: &mut MutationRng,
        fuzzer: &mut Fuzzer,
    ) -> Expr {
        let original = expr.clone_fresh();
        let wrapped =
            Expr::paren(self.apply_identity(expr, ty, const_context, depth, rng, fuzzer));
        let combined = if !consider_reverse || rng.next_bool() {
            Expr::binary(op, wrapped, opaque)
        } else {
            Expr::binary(op, opaque, wrapped)
        };
        identity_tag(original, combined)
    }
}

fn identity_tag(original: Expr, transformed: Expr) -> Expr {
    Expr::call(consts::IDENTITY, vec![original, transformed])
}

fn bool_tag(value: bool, expr: Expr) -> Expr {
    let name = if value { consts::TRUE } else { consts::FALSE };
    Expr::call(name, vec![Expr::bool_lit(value), expr])
}

fn value_tag(is_zero: bool, ty: BasicType, expr: Expr) -> Expr {
    let name = if is_zero { consts::ZERO } else { consts::ONE };
    Expr::call(name, vec![literal_zero_or_one(is_zero, ty), expr])
}

fn switch_member(component: &str) -> Expr {
    Expr::member(Expr::ident(consts::SWITCH_UNIFORM), component)
}

fn from_injection_switch(is_zero: bool, ty: BasicType) -> Expr {
    if ty == BasicType::Float {
        let component = if is_zero { "x" } else { "y" };
        return value_tag(is_zero, ty, switch_member(component));
    }
    // Scalar and vector constructors accept float arguments.
    let args = (0..ty.num_elements())
        .map(|_| from_injection_switch(is_zero, BasicType::Float))
        .collect();
    Expr::ctor(ty.glsl_name(), args)
}

fn int_literal_of(ty: BasicType, value: i32) -> Expr {
    match ty.element_type() {
        BasicType::Uint => Expr::uint(value as u32),
        _ => Expr::int(value),
    }
}

fn literal_zero_or_one(is_zero: bool, ty: BasicType) -> Expr {
    let value = u32::from(!is_zero);
    match ty {
        BasicType::Float => Expr::float(value as f32),
        BasicType::Int => Expr::int(value as i32),
        BasicType::Uint => Expr::uint(value),
        BasicType::Bool => unreachable!("boolean types have no zero/one literal"),
        vector_or_matrix => {
            let args = if vector_or_matrix.is_matrix() {
                // One scalar argument: all-zero matrix, or the identity.
                vec![Expr::float(value as f32)]
            } else {
                (0..vector_or_matrix.num_elements())
                    .map(|_| literal_zero_or_one(is_zero, vector_or_matrix.element_type()))
                    .collect()
            };
            Expr::ctor(vector_or_matrix.glsl_name(), args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzer::FuzzingContext;
    use shadermorph::printer::expr_to_string;
    use shadermorph::scope::Scope;

    fn fixture() -> (GenerationParams, ShadingLanguageVersion) {
        (
            GenerationParams::normal(ShaderKind::Fragment),
            ShadingLanguageVersion::Essl300,
        )
    }

    #[test]
    fn opaque_booleans_are_marked() {
        let (params, version) = fixture();
        let generator = OpaqueExprGenerator::new(version, &params);
        let mut rng = MutationRng::from_seed(1);
        let mut fuzzer = Fuzzer::new(FuzzingContext::new(Scope::new()), version, &params);
        // Over many seeds, the top of the expression is either a literal
        // (depth exhaustion), a marker call, or an identity wrapper.
        for seed in 0..40 {
            let mut rng_child = rng.spawn_child();
            let expr =
                generator.make_opaque_bool(false, BasicType::Bool, false, 0, &mut rng_child, &mut fuzzer);
            let printed = expr_to_string(&expr);
            assert!(
                printed.contains(consts::FALSE)
                    || printed.contains(consts::IDENTITY)
                    || printed == "false",
                "unexpected opaque false (seed {seed}): {printed}"
            );
        }
    }

    #[test]
    fn opaque_values_exist_for_all_numeric_scalars_and_vectors() {
        let (params, version) = fixture();
        let generator = OpaqueExprGenerator::new(version, &params);
        let mut rng = MutationRng::from_seed(77);
        let mut fuzzer = Fuzzer::new(FuzzingContext::new(Scope::new()), version, &params);
        for ty in BasicType::ALL {
            if !ty.is_numeric() || ty.is_matrix() {
                continue;
            }
            let _ = generator.make_opaque_zero(ty, false, 0, &mut rng, &mut fuzzer);
            let _ = generator.make_opaque_one(ty, false, 0, &mut rng, &mut fuzzer);
        }
    }

    #[test]
    fn const_context_avoids_the_switch_uniform() {
        let (params, version) = fixture();
        let generator = OpaqueExprGenerator::new(version, &params);
        let mut fuzzer = Fuzzer::new(FuzzingContext::new(Scope::new()), version, &params);
        for seed in 0..60 {
            let mut rng = MutationRng::from_seed(seed);
            let expr =
                generator.make_opaque_zero(BasicType::Float, true, 0, &mut rng, &mut fuzzer);
            let printed = expr_to_string(&expr);
            assert!(
                !printed.contains(consts::SWITCH_UNIFORM),
                "const context leaked the switch uniform: {printed}"
            );
        }
    }
}
