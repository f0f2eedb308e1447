//! The type oracle: answers "what is the type of this expression" given a
//! scope snapshot, without re-parsing. When no type can be determined the
//! oracle returns `None` and the caller must decline to mutate that site —
//! it never guesses.

use crate::ast::{
    BinOp, Expr, ExprKind, FunctionPrototype, ParamDecl, TranslationUnit, UnOp,
};
use crate::consts;
use crate::scope::Scope;
use crate::types::{BasicType, Type, TypeQualifier};
use crate::version::{ShaderKind, ShadingLanguageVersion};

/// Per-unit context the oracle needs besides the scope: user function
/// prototypes, struct definitions, and the dialect/kind for builtin tables.
pub struct TypeEnv<'a> {
    tu: &'a TranslationUnit,
}

impl<'a> TypeEnv<'a> {
    #[must_use]
    pub fn new(tu: &'a TranslationUnit) -> TypeEnv<'a> {
        TypeEnv { tu }
    }

    #[must_use]
    pub fn version(&self) -> ShadingLanguageVersion {
        self.tu.version
    }

    #[must_use]
    pub fn shader_kind(&self) -> ShaderKind {
        self.tu.kind
    }

    #[must_use]
    pub fn tu(&self) -> &TranslationUnit {
        self.tu
    }

    /// All prototypes (user-defined then builtin) for a callee name.
    #[must_use]
    pub fn prototypes(&self, name: &str) -> Vec<FunctionPrototype> {
        let mut result: Vec<FunctionPrototype> = self
            .tu
            .functions()
            .filter(|f| f.prototype.name == name)
            .map(|f| f.prototype.clone())
            .collect();
        result.extend(builtin_prototypes(name, self.tu.version, self.tu.kind));
        result
    }
}

/// Types of the `gl_*` builtin variables visible to the given shader kind.
#[must_use]
pub fn builtin_variable_type(
    name: &str,
    version: ShadingLanguageVersion,
    kind: ShaderKind,
) -> Option<Type> {
    match (name, kind) {
        ("gl_FragCoord", ShaderKind::Fragment) => Some(Type::qualified(
            vec![TypeQualifier::ShaderInput],
            Type::Basic(BasicType::Vec4),
        )),
        ("gl_FragColor", ShaderKind::Fragment) if version.supports_gl_frag_color() => {
            Some(Type::qualified(
                vec![TypeQualifier::ShaderOutput],
                Type::Basic(BasicType::Vec4),
            ))
        }
        ("gl_Position", ShaderKind::Vertex) => Some(Type::qualified(
            vec![TypeQualifier::ShaderOutput],
            Type::Basic(BasicType::Vec4),
        )),
        ("gl_PointSize", ShaderKind::Vertex) => Some(Type::qualified(
            vec![TypeQualifier::ShaderOutput],
            Type::Basic(BasicType::Float),
        )),
        _ => None,
    }
}

fn gen_prototype(name: &str, arity: usize, ty: BasicType) -> FunctionPrototype {
    FunctionPrototype {
        name: name.to_string(),
        return_type: Type::Basic(ty),
        params: (0..arity)
            .map(|i| ParamDecl {
                name: format!("p{i}"),
                ty: Type::Basic(ty),
            })
            .collect(),
    }
}

/// Signatures of the builtin functions this engine needs to reason about.
/// The table is intentionally partial: an unknown builtin makes the oracle
/// answer `None`, which makes callers skip the site.
#[must_use]
pub fn builtin_prototypes(
    name: &str,
    version: ShadingLanguageVersion,
    kind: ShaderKind,
) -> Vec<FunctionPrototype> {
    let mut result = Vec::new();
    match name {
        // genType -> genType, component-wise
        "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "exp" | "log" | "exp2" | "log2"
        | "sqrt" | "inversesqrt" | "floor" | "ceil" | "fract" | "abs" | "sign" | "normalize" => {
            for ty in BasicType::GEN_TYPES {
                result.push(gen_prototype(name, 1, ty));
            }
        }
        // (genType, genType) -> genType
        "pow" | "mod" | "step" | "reflect" => {
            for ty in BasicType::GEN_TYPES {
                result.push(gen_prototype(name, 2, ty));
            }
        }
        "min" | "max" => {
            for ty in BasicType::GEN_TYPES {
                result.push(gen_prototype(name, 2, ty));
                if ty != BasicType::Float {
                    // Vector with scalar second operand.
                    result.push(FunctionPrototype {
                        name: name.to_string(),
                        return_type: Type::Basic(ty),
                        params: vec![
                            ParamDecl {
                                name: "x".to_string(),
                                ty: Type::Basic(ty),
                            },
                            ParamDecl {
                                name: "y".to_string(),
                                ty: Type::Basic(BasicType::Float),
                            },
                        ],
                    });
                }
            }
        }
        "clamp" | "mix" | "smoothstep" => {
            for ty in BasicType::GEN_TYPES {
                result.push(gen_prototype(name, 3, ty));
            }
        }
        "length" | "distance" | "dot" => {
            let arity = if name == "length" { 1 } else { 2 };
            for ty in BasicType::GEN_TYPES {
                let mut proto = gen_prototype(name, arity, ty);
                proto.return_type = Type::Basic(BasicType::Float);
                result.push(proto);
            }
        }
        "cross" => {
            result.push(gen_prototype(name, 2, BasicType::Vec3));
        }
        // modf has an output parameter; the oracle must know this so that
        // mutation finders treat the second argument as a write.
        "modf" if version.supports_bitwise_operations() => {
            for ty in BasicType::GEN_TYPES {
                result.push(FunctionPrototype {
                    name: name.to_string(),
                    return_type: Type::Basic(ty),
                    params: vec![
                        ParamDecl {
                            name: "x".to_string(),
                            ty: Type::Basic(ty),
                        },
                        ParamDecl {
                            name: "i".to_string(),
                            ty: Type::qualified(
                                vec![TypeQualifier::OutParam],
                                Type::Basic(ty),
                            ),
                        },
                    ],
                });
            }
        }
        "barrier" if kind == ShaderKind::Compute && version.supports_barrier() => {
            result.push(FunctionPrototype {
                name: name.to_string(),
                return_type: Type::Void,
                params: Vec::new(),
            });
        }
        _ => {}
    }
    result
}

/// The type carried through a marker-macro call, or `None` when the callee is
/// not one of the engine's markers.
fn marker_call_type(name: &str, args: &[Expr], scope: &Scope, env: &TypeEnv) -> Option<Type> {
    match name {
        consts::DEAD
        | consts::TRUE
        | consts::FALSE
        | consts::WRAPPED_IF_TRUE
        | consts::WRAPPED_IF_FALSE
        | consts::WRAPPED_LOOP => Some(Type::Basic(BasicType::Bool)),
        consts::ZERO | consts::ONE | consts::IDENTITY => {
            type_of(args.last()?, scope, env).map(|t| t.without_qualifiers().clone())
        }
        consts::FUZZED | consts::SWITCH => {
            type_of(args.first()?, scope, env).map(|t| t.without_qualifiers().clone())
        }
        _ => None,
    }
}

fn swizzle_type(receiver: BasicType, swizzle: &str) -> Option<Type> {
    if !receiver.is_vector() {
        return None;
    }
    let width = receiver.num_elements() as usize;
    if swizzle.is_empty() || swizzle.len() > 4 {
        return None;
    }
    let sets = ["xyzw", "rgba", "stpq"];
    let valid = sets.iter().any(|set| {
        swizzle
            .chars()
            .all(|c| set.chars().take(width).any(|s| s == c))
    });
    if !valid {
        return None;
    }
    Some(Type::Basic(BasicType::make_vector(
        receiver.element_type(),
        swizzle.len() as u32,
    )))
}

fn arithmetic_result(op: BinOp, lhs: BasicType, rhs: BasicType) -> Option<BasicType> {
    if lhs == rhs {
        // Linear-algebraic matrix product aside, all same-type operators are
        // component-wise and type-preserving.
        return Some(lhs);
    }
    // Scalar with vector/matrix of the same element type.
    if lhs.is_scalar() && rhs.element_type() == lhs {
        return Some(rhs);
    }
    if rhs.is_scalar() && lhs.element_type() == rhs {
        return Some(lhs);
    }
    // Matrix-vector products.
    if op == BinOp::Mul {
        if lhs.is_matrix() && rhs.is_vector() && rhs.num_elements() == lhs.columns() {
            return Some(rhs);
        }
        if lhs.is_vector() && rhs.is_matrix() && lhs.num_elements() == rhs.columns() {
            return Some(lhs);
        }
    }
    None
}

fn prototype_matches(
    prototype: &FunctionPrototype,
    args: &[Expr],
    scope: &Scope,
    env: &TypeEnv,
) -> bool {
    if prototype.params.len() != args.len() {
        return false;
    }
    args.iter().zip(&prototype.params).all(|(arg, param)| {
        // With incomplete information we say there is a match; the input is
        // assumed well-typed.
        type_of(arg, scope, env).is_none_or(|arg_ty| {
            arg_ty.without_qualifiers() == param.ty.without_qualifiers()
        })
    })
}

/// Resolves a call to the prototype it invokes, considering user functions
/// first and builtins second.
#[must_use]
pub fn resolve_call(
    name: &str,
    args: &[Expr],
    scope: &Scope,
    env: &TypeEnv,
) -> Option<FunctionPrototype> {
    env.prototypes(name)
        .into_iter()
        .find(|prototype| prototype_matches(prototype, args, scope, env))
}

/// Indices of arguments a call writes through (`out`/`inout` parameters).
/// `None` when the callee cannot be resolved.
#[must_use]
pub fn output_argument_indices(
    name: &str,
    args: &[Expr],
    scope: &Scope,
    env: &TypeEnv,
) -> Option<Vec<usize>> {
    let prototype = resolve_call(name, args, scope, env)?;
    Some(
        prototype
            .params
            .iter()
            .enumerate()
            .filter(|(_, param)| {
                param.ty.has_qualifier(TypeQualifier::OutParam)
                    || param.ty.has_qualifier(TypeQualifier::InoutParam)
            })
            .map(|(i, _)| i)
            .collect(),
    )
}

/// Resolves the type of `expr` at a point where `scope` is the visible
/// environment. Identifier types come back as declared (possibly qualified);
/// every computed type is unqualified.
#[must_use]
pub fn type_of(expr: &Expr, scope: &Scope, env: &TypeEnv) -> Option<Type> {
    match &expr.kind {
        ExprKind::IntLit(_) => Some(Type::Basic(BasicType::Int)),
        ExprKind::UintLit(_) => Some(Type::Basic(BasicType::Uint)),
        ExprKind::FloatLit(_) => Some(Type::Basic(BasicType::Float)),
        ExprKind::BoolLit(_) => Some(Type::Basic(BasicType::Bool)),
        ExprKind::Ident(name) => scope
            .lookup_type(name)
            .cloned()
            .or_else(|| builtin_variable_type(name, env.version(), env.shader_kind())),
        ExprKind::Paren(inner) => type_of(inner, scope, env),
        ExprKind::Unary(op, operand) => {
            let ty = type_of(operand, scope, env)?.without_qualifiers().clone();
            match op {
                UnOp::LogicalNot => (ty == Type::Basic(BasicType::Bool)).then_some(ty),
                _ => Some(ty),
            }
        }
        ExprKind::Binary(op, lhs, rhs) => {
            if op.is_side_effecting() {
                return type_of(lhs, scope, env).map(|t| t.without_qualifiers().clone());
            }
            match op {
                BinOp::Comma => type_of(rhs, scope, env).map(|t| t.without_qualifiers().clone()),
                BinOp::LogicalAnd | BinOp::LogicalOr => Some(Type::Basic(BasicType::Bool)),
                op if op.is_comparison() => Some(Type::Basic(BasicType::Bool)),
                op => {
                    let lhs_ty = type_of(lhs, scope, env)?.as_basic()?;
                    let rhs_ty = type_of(rhs, scope, env)?.as_basic()?;
                    arithmetic_result(*op, lhs_ty, rhs_ty).map(Type::Basic)
                }
            }
        }
        ExprKind::Ternary(_, then_expr, else_expr) => {
            let then_ty = type_of(then_expr, scope, env)?.without_qualifiers().clone();
            let else_ty = type_of(else_expr, scope, env)?.without_qualifiers().clone();
            (then_ty == else_ty).then_some(then_ty)
        }
        ExprKind::Member(receiver, field) => {
            let receiver_ty = type_of(receiver, scope, env)?.without_qualifiers().clone();
            match receiver_ty {
                Type::Struct(struct_name) => {
                    let definition = scope
                        .lookup_struct(&struct_name)
                        .cloned()
                        .or_else(|| env.tu().struct_definition(&struct_name).cloned())?;
                    definition.field_type(field).cloned()
                }
                Type::Basic(basic) => swizzle_type(basic, field),
                _ => None,
            }
        }
        ExprKind::Index(receiver, _) => {
            let receiver_ty = type_of(receiver, scope, env)?.without_qualifiers().clone();
            match receiver_ty {
                Type::Array(base, _) => Some(*base),
                Type::Basic(basic) if basic.is_vector() => {
                    Some(Type::Basic(basic.element_type()))
                }
                Type::Basic(basic) if basic.is_matrix() => Some(Type::Basic(
                    BasicType::make_vector(BasicType::Float, basic.columns()),
                )),
                _ => None,
            }
        }
        ExprKind::Ctor(type_name, _) => {
            if let Some(basic) = BasicType::ALL
                .into_iter()
                .find(|b| b.glsl_name() == type_name)
            {
                return Some(Type::Basic(basic));
            }
            let known = scope.lookup_struct(type_name).is_some()
                || env.tu().struct_definition(type_name).is_some();
            known.then(|| Type::Struct(type_name.clone()))
        }
        ExprKind::Call(name, args) => {
            if let Some(marker) = marker_call_type(name, args, scope, env) {
                return Some(marker);
            }
            resolve_call(name, args, scope, env).map(|p| p.return_type)
        }
    }
}

const MARKER_NAMES: [&str; 11] = [
    crate::consts::DEAD,
    crate::consts::TRUE,
    crate::consts::FALSE,
    crate::consts::ZERO,
    crate::consts::ONE,
    crate::consts::IDENTITY,
    crate::consts::FUZZED,
    crate::consts::WRAPPED_IF_TRUE,
    crate::consts::WRAPPED_IF_FALSE,
    crate::consts::WRAPPED_LOOP,
    crate::consts::SWITCH,
];

/// Conservative side-effect check: true only when evaluating `expr` provably
/// writes no storage. Callees that are not marker macros or builtins without
/// output parameters are assumed effectful.
#[must_use]
pub fn side_effect_free(expr: &Expr, version: ShadingLanguageVersion, kind: ShaderKind) -> bool {
    match &expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::UintLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::Ident(_) => true,
        ExprKind::Unary(op, operand) => {
            !op.is_side_effecting() && side_effect_free(operand, version, kind)
        }
        ExprKind::Binary(op, lhs, rhs) => {
            !op.is_side_effecting()
                && side_effect_free(lhs, version, kind)
                && side_effect_free(rhs, version, kind)
        }
        ExprKind::Ternary(cond, then_expr, else_expr) => {
            side_effect_free(cond, version, kind)
                && side_effect_free(then_expr, version, kind)
                && side_effect_free(else_expr, version, kind)
        }
        ExprKind::Paren(inner) => side_effect_free(inner, version, kind),
        ExprKind::Member(receiver, _) => side_effect_free(receiver, version, kind),
        ExprKind::Index(receiver, index) => {
            side_effect_free(receiver, version, kind) && side_effect_free(index, version, kind)
        }
        ExprKind::Ctor(_, args) => args.iter().all(|a| side_effect_free(a, version, kind)),
        ExprKind::Call(name, args) => {
            if !args.iter().all(|a| side_effect_free(a, version, kind)) {
                return false;
            }
            if MARKER_NAMES.contains(&name.as_str()) {
                return true;
            }
            let prototypes = builtin_prototypes(name, version, kind);
            !prototypes.is_empty()
                && prototypes.iter().all(|p| {
                    p.params.iter().all(|param| {
                        !param.ty.has_qualifier(TypeQualifier::OutParam)
                            && !param.ty.has_qualifier(TypeQualifier::InoutParam)
                    })
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Declaration;
    use crate::scope::ScopeEntry;

    fn env_fixture() -> TranslationUnit {
        TranslationUnit::new(
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment,
            Vec::<Declaration>::new(),
        )
    }

    #[test]
    fn literal_types() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let scope = Scope::new();
        assert_eq!(
            type_of(&Expr::float(1.5), &scope, &env),
            Some(Type::Basic(BasicType::Float))
        );
        assert_eq!(
            type_of(&Expr::uint(3), &scope, &env),
            Some(Type::Basic(BasicType::Uint))
        );
    }

    #[test]
    fn vector_scalar_promotion() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let mut scope = Scope::new();
        scope.add("v", ScopeEntry::builtin(Type::Basic(BasicType::Vec3)));
        let sum = Expr::binary(BinOp::Add, Expr::ident("v"), Expr::float(1.0));
        assert_eq!(
            type_of(&sum, &scope, &env),
            Some(Type::Basic(BasicType::Vec3))
        );
    }

    #[test]
    fn swizzles() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let mut scope = Scope::new();
        scope.add("v", ScopeEntry::builtin(Type::Basic(BasicType::Vec4)));
        let xy = Expr::member(Expr::ident("v"), "xy");
        assert_eq!(
            type_of(&xy, &scope, &env),
            Some(Type::Basic(BasicType::Vec2))
        );
        let bad = Expr::member(Expr::ident("v"), "xq");
        assert_eq!(type_of(&bad, &scope, &env), None);
    }

    #[test]
    fn builtin_call_resolution() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let scope = Scope::new();
        let dot = Expr::call(
            "dot",
            vec![
                Expr::ctor("vec2", vec![Expr::float(0.0), Expr::float(1.0)]),
                Expr::ctor("vec2", vec![Expr::float(1.0), Expr::float(0.0)]),
            ],
        );
        assert_eq!(
            type_of(&dot, &scope, &env),
            Some(Type::Basic(BasicType::Float))
        );
    }

    #[test]
    fn unknown_callee_yields_none() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let scope = Scope::new();
        let call = Expr::call("no_such_function", vec![Expr::float(1.0)]);
        assert_eq!(type_of(&call, &scope, &env), None);
    }

    #[test]
    fn modf_second_argument_is_an_output() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let mut scope = Scope::new();
        scope.add("x", ScopeEntry::builtin(Type::Basic(BasicType::Float)));
        scope.add("i", ScopeEntry::builtin(Type::Basic(BasicType::Float)));
        let call = Expr::call("modf", vec![Expr::ident("x"), Expr::ident("i")]);
        assert_eq!(
            output_argument_indices("modf", match &call.kind {
                ExprKind::Call(_, args) => args,
                _ => unreachable!(),
            }, &scope, &env),
            Some(vec![1])
        );
        assert!(!side_effect_free(
            &call,
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment
        ));
    }

    #[test]
    fn assignment_is_side_effecting() {
        let tu = env_fixture();
        let env = TypeEnv::new(&tu);
        let mut scope = Scope::new();
        scope.add("x", ScopeEntry::builtin(Type::Basic(BasicType::Float)));
        let assign = Expr::assign(Expr::ident("x"), Expr::float(1.0));
        assert!(!side_effect_free(
            &assign,
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment
        ));
        assert_eq!(
            type_of(&assign, &scope, &env),
            Some(Type::Basic(BasicType::Float))
        );
        let pure = Expr::call("abs", vec![Expr::ident("x")]);
        assert!(side_effect_free(
            &pure,
            ShadingLanguageVersion::Essl300,
            ShaderKind::Fragment
        ));
    }
}
