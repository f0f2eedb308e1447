//! End-to-end checks of the semantic contracts: every mutation family must
//! leave the observable outputs of a shader unchanged, as judged by the
//! reference interpreter.

use shadermorph::ast::{
    BinOp, Block, Declaration, Expr, FunctionDefinition, FunctionPrototype, Stmt, StmtKind,
    TranslationUnit, UnOp, VarDeclGroup,
};
use shadermorph::consts;
use shadermorph::printer;
use shadermorph::rng::MutationRng;
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};
use shadermorph_mutate::eval::{Interpreter, Value};
use shadermorph_mutate::families::{
    find_dead_jump_mutations, find_dead_output_write_mutations, find_identity_mutations,
    find_live_output_write_mutations, find_outline_mutations, find_split_loop_mutations,
    find_structification_mutations, find_switch_injection_mutations,
    find_vectorization_mutations, find_wrapping_mutations,
};
use shadermorph_mutate::{mutate, GenerationParams, Mutation};

fn uniform_decl(name: &str, ty: BasicType) -> Declaration {
    Declaration::Variables(VarDeclGroup::single(
        Type::qualified(vec![TypeQualifier::Uniform], Type::Basic(ty)),
        name,
        None,
    ))
}

fn output_decl(name: &str, ty: BasicType) -> Declaration {
    Declaration::Variables(VarDeclGroup::single(
        Type::qualified(vec![TypeQualifier::ShaderOutput], Type::Basic(ty)),
        name,
        None,
    ))
}

fn fragment_shader(body: Vec<Stmt>) -> TranslationUnit {
    TranslationUnit::new(
        ShadingLanguageVersion::Essl300,
        ShaderKind::Fragment,
        vec![
            uniform_decl("uniformA", BasicType::Float),
            uniform_decl(consts::SWITCH_UNIFORM, BasicType::Vec2),
            output_decl("color", BasicType::Float),
            Declaration::Function(FunctionDefinition {
                prototype: FunctionPrototype {
                    name: "main".to_string(),
                    return_type: Type::Void,
                    params: Vec::new(),
                },
                body: Block::new(body, true),
            }),
        ],
    )
}

/// The canonical one-statement shader: `color = uniformA + 1.0;`.
fn reference_shader() -> TranslationUnit {
    fragment_shader(vec![Stmt::expr(Expr::assign(
        Expr::ident("color"),
        Expr::binary(BinOp::Add, Expr::ident("uniformA"), Expr::float(1.0)),
    ))])
}

fn final_color(tu: &TranslationUnit, uniform_a: f32) -> Value {
    let mut interpreter = Interpreter::new(tu);
    interpreter.set("uniformA", Value::Float(uniform_a));
    interpreter
        .run_main()
        .unwrap_or_else(|| panic!("interpretable program:\n{}", printer::print(tu)));
    interpreter
        .get("color")
        .cloned()
        .expect("color is in scope")
}

fn assert_value_preserved(original: &TranslationUnit, mutated: &TranslationUnit) {
    for uniform_a in [0.0, 2.0, -3.5, 10.25] {
        assert_eq!(
            final_color(original, uniform_a),
            final_color(mutated, uniform_a),
            "outputs diverged for uniformA = {uniform_a}:\n{}",
            printer::print(mutated)
        );
    }
}

fn params() -> GenerationParams {
    GenerationParams::normal(ShaderKind::Fragment)
}

#[test]
fn dead_jump_preserves_value() {
    let tu = reference_shader();
    for seed in 0..10 {
        let mut rng = MutationRng::from_seed(seed);
        let mutations = find_dead_jump_mutations(&tu, &mut rng, &params());
        assert!(!mutations.is_empty());
        for mut mutation in mutations {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            assert!(printer::print(&mutated).contains(consts::DEAD));
            assert_value_preserved(&tu, &mutated);
        }
    }
    // The end-to-end scenario: uniformA = 2.0 must still give color = 3.0.
    let mut rng = MutationRng::from_seed(1);
    let mut mutated = tu.clone();
    let mut mutations = find_dead_jump_mutations(&tu, &mut rng, &params());
    mutations[0].apply(&mut mutated);
    assert_eq!(final_color(&mutated, 2.0), Value::Float(3.0));
}

#[test]
fn dead_and_live_output_writes_preserve_value() {
    let tu = reference_shader();
    for seed in 0..10 {
        let mut rng = MutationRng::from_seed(seed);
        for mut mutation in find_dead_output_write_mutations(&tu, &mut rng, &params()) {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            assert_value_preserved(&tu, &mutated);
        }
        let mut rng = MutationRng::from_seed(seed);
        for mut mutation in find_live_output_write_mutations(&tu, &mut rng, &params()) {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            assert!(printer::print(&mutated).contains(consts::OUT_BACKUP_PREFIX));
            assert_value_preserved(&tu, &mutated);
        }
    }
}

#[test]
fn wrapping_executes_wrapped_statement_exactly_once() {
    // color counts executions: it must end at exactly 1.0.
    let tu = fragment_shader(vec![
        Stmt::expr(Expr::assign(Expr::ident("color"), Expr::float(0.0))),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::binary(BinOp::Add, Expr::ident("color"), Expr::float(1.0)),
        )),
    ]);
    for seed in 0..20 {
        let mut rng = MutationRng::from_seed(seed);
        let mutations = find_wrapping_mutations(&tu, &mut rng, &params());
        assert!(!mutations.is_empty());
        for mut mutation in mutations {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            assert_eq!(
                final_color(&mutated, 0.0),
                Value::Float(1.0),
                "wrapped statement did not execute exactly once:\n{}",
                printer::print(&mutated)
            );
        }
    }
}

#[test]
fn switch_injection_reaches_original_statements_in_order() {
    // Order-sensitive accumulation: 0*2+1 = 1, 1*2+2 = 4, 4*2+4 = 12.
    let increments = [1.0, 2.0, 4.0];
    let inner: Vec<Stmt> = increments
        .iter()
        .map(|inc| {
            Stmt::expr(Expr::assign(
                Expr::ident("color"),
                Expr::binary(
                    BinOp::Add,
                    Expr::binary(BinOp::Mul, Expr::ident("color"), Expr::float(2.0)),
                    Expr::float(*inc),
                ),
            ))
        })
        .collect();
    let tu = fragment_shader(vec![
        Stmt::expr(Expr::assign(Expr::ident("color"), Expr::float(0.0))),
        Stmt::block(inner, true),
    ]);
    let expected = final_color(&tu, 0.0);
    assert_eq!(expected, Value::Float(12.0));

    let mut found_any = false;
    for seed in 0..20 {
        let mut rng = MutationRng::from_seed(seed);
        for mut mutation in find_switch_injection_mutations(&tu, &mut rng, &params()) {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            let printed = printer::print(&mutated);
            assert!(printed.contains("switch"), "no switch in:\n{printed}");
            assert_eq!(
                final_color(&mutated, 0.0),
                expected,
                "switch injection changed behavior:\n{printed}"
            );
            found_any = true;
        }
    }
    assert!(found_any);
}

#[test]
fn structification_preserves_storage() {
    // x goes through a write and a read-back; both must track the moved
    // storage.
    let tu = fragment_shader(vec![
        Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Float),
            "x",
            Some(Expr::float(2.0)),
        ))),
        Stmt::expr(Expr::assign(
            Expr::ident("x"),
            Expr::binary(BinOp::Add, Expr::ident("x"), Expr::ident("uniformA")),
        )),
        Stmt::expr(Expr::assign(Expr::ident("color"), Expr::ident("x"))),
    ]);
    for seed in 0..10 {
        let mut rng = MutationRng::from_seed(seed);
        let mutations = find_structification_mutations(&tu, &mut rng, &params());
        assert_eq!(mutations.len(), 1);
        for mut mutation in mutations {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            let printed = printer::print(&mutated);
            assert!(printed.contains(consts::STRUCT_PREFIX), "no struct in:\n{printed}");
            assert_value_preserved(&tu, &mutated);
        }
    }
}

#[test]
fn vectorization_preserves_each_variable() {
    let tu = fragment_shader(vec![
        Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Float),
            "a",
            Some(Expr::float(1.5)),
        ))),
        Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Float),
            "b",
            Some(Expr::binary(BinOp::Add, Expr::ident("a"), Expr::ident("uniformA"))),
        ))),
        Stmt::expr(Expr::assign(
            Expr::ident("a"),
            Expr::binary(BinOp::Mul, Expr::ident("a"), Expr::float(2.0)),
        )),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::binary(BinOp::Add, Expr::ident("a"), Expr::ident("b")),
        )),
    ]);
    let mut merged_at_least_once = false;
    for seed in 0..30 {
        let mut rng = MutationRng::from_seed(seed);
        for mut mutation in find_vectorization_mutations(&tu, &mut rng, &params()) {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            let printed = printer::print(&mutated);
            assert!(printed.contains(consts::MERGED_PREFIX));
            assert_value_preserved(&tu, &mutated);
            merged_at_least_once = true;
        }
    }
    assert!(merged_at_least_once, "no seed produced a merge set of two");
}

#[test]
fn split_loop_preserves_iteration_sequence() {
    // acc = acc * 2 + i is sensitive to both order and count of iterations.
    let tu = fragment_shader(vec![
        Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Int),
            "acc",
            Some(Expr::int(0)),
        ))),
        Stmt::new(StmtKind::For {
            init: Some(Box::new(Stmt::new(StmtKind::Decl(VarDeclGroup::single(
                Type::Basic(BasicType::Int),
                "i",
                Some(Expr::int(0)),
            ))))),
            cond: Some(Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(10))),
            inc: Some(Expr::unary(UnOp::PostInc, Expr::ident("i"))),
            body: Box::new(Stmt::block(
                vec![Stmt::expr(Expr::assign(
                    Expr::ident("acc"),
                    Expr::binary(
                        BinOp::Add,
                        Expr::binary(BinOp::Mul, Expr::ident("acc"), Expr::int(2)),
                        Expr::ident("i"),
                    ),
                ))],
                true,
            )),
        }),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::ctor("float", vec![Expr::ident("acc")]),
        )),
    ]);
    let expected = final_color(&tu, 0.0);
    for seed in 0..20 {
        let mut rng = MutationRng::from_seed(seed);
        let mutations = find_split_loop_mutations(&tu, &mut rng, &params());
        assert_eq!(mutations.len(), 1, "exactly the one for loop qualifies");
        for mut mutation in mutations {
            let mut mutated = tu.clone();
            mutation.apply(&mut mutated);
            let printed = printer::print(&mutated);
            assert!(printed.contains(consts::SPLIT_LOOP_COUNTER_PREFIX));
            assert_eq!(
                final_color(&mutated, 0.0),
                expected,
                "split changed the iteration sequence:\n{printed}"
            );
        }
    }
}

#[test]
fn split_loop_rejects_unanalyzable_loops() {
    // The counter is modified in the body: no split opportunity.
    let tu = fragment_shader(vec![Stmt::new(StmtKind::For {
        init: Some(Box::new(Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Int),
            "i",
            Some(Expr::int(0)),
        ))))),
        cond: Some(Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(10))),
        inc: Some(Expr::unary(UnOp::PostInc, Expr::ident("i"))),
        body: Box::new(Stmt::block(
            vec![Stmt::expr(Expr::assign(Expr::ident("i"), Expr::int(3)))],
            true,
        )),
    })]);
    let mut rng = MutationRng::from_seed(0);
    assert!(find_split_loop_mutations(&tu, &mut rng, &params()).is_empty());
}

#[test]
fn outlining_preserves_the_assigned_value() {
    let tu = fragment_shader(vec![Stmt::expr(Expr::assign(
        Expr::ident("color"),
        Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Mul, Expr::ident("uniformA"), Expr::float(2.0)),
            Expr::float(1.0),
        ),
    ))]);
    let mut rng = MutationRng::from_seed(0);
    let mutations = find_outline_mutations(&tu, &mut rng, &params());
    assert_eq!(mutations.len(), 1);
    for mut mutation in mutations {
        let mut mutated = tu.clone();
        mutation.apply(&mut mutated);
        let printed = printer::print(&mutated);
        assert!(printed.contains(consts::OUTLINED_FUNCTION_PREFIX));
        assert_value_preserved(&tu, &mutated);
    }
}

#[test]
fn identity_wrapping_preserves_value() {
    let tu = reference_shader();
    let mut wrapped_at_least_once = false;
    for seed in 0..20 {
        let mut rng = MutationRng::from_seed(seed);
        let mut mutated = tu.clone();
        // Apply every discovered identity mutation in forward order.
        for mut mutation in find_identity_mutations(&tu, &mut rng, &params()) {
            mutation.apply(&mut mutated);
        }
        if printer::print(&mutated).contains(consts::IDENTITY) {
            wrapped_at_least_once = true;
        }
        assert_value_preserved(&tu, &mutated);
    }
    assert!(wrapped_at_least_once);
}

#[test]
fn discovery_is_independent_of_application_order() {
    let tu = fragment_shader(vec![
        Stmt::expr(Expr::assign(Expr::ident("color"), Expr::float(0.0))),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::binary(BinOp::Add, Expr::ident("color"), Expr::ident("uniformA")),
        )),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::binary(BinOp::Mul, Expr::ident("color"), Expr::float(2.0)),
        )),
    ]);
    // Two identical discovery passes; one applied forward, one in reverse.
    let mut forward_tree = tu.clone();
    let mut rng = MutationRng::from_seed(9);
    for mut mutation in find_dead_jump_mutations(&tu, &mut rng, &params()) {
        mutation.apply(&mut forward_tree);
    }

    let mut reverse_tree = tu.clone();
    let mut rng = MutationRng::from_seed(9);
    for mut mutation in find_dead_jump_mutations(&tu, &mut rng, &params())
        .into_iter()
        .rev()
    {
        mutation.apply(&mut reverse_tree);
    }

    assert_eq!(
        printer::print(&forward_tree),
        printer::print(&reverse_tree),
        "application order leaked into the result"
    );
    assert_value_preserved(&tu, &forward_tree);
}

#[test]
fn whole_runs_are_deterministic_and_value_preserving() {
    let tu = reference_shader();
    for seed in 0..20 {
        let mut first = tu.clone();
        let mut second = tu.clone();
        let mut rng1 = MutationRng::from_seed(seed);
        let mut rng2 = MutationRng::from_seed(seed);
        // The retry loop may, for some seeds, only draw families with no
        // opportunity; the tree then stays unchanged, which is still a valid
        // determinism check.
        let outcome1 = mutate(&mut first, &mut rng1, &params());
        let outcome2 = mutate(&mut second, &mut rng2, &params());
        assert_eq!(outcome1.is_ok(), outcome2.is_ok());
        assert_eq!(
            printer::print(&first),
            printer::print(&second),
            "same seed produced different trees"
        );
        assert_value_preserved(&tu, &first);
    }
}

#[test]
fn sequential_family_runs_compose() {
    use shadermorph_mutate::{mutate_family, MutationFamily};
    let tu = reference_shader();
    let mut mutated = tu.clone();
    let mut rng = MutationRng::from_seed(4);
    let sequence = [
        MutationFamily::Identity,
        MutationFamily::DeadJump,
        MutationFamily::WrappingConditional,
        MutationFamily::LiveOutputWrite,
        MutationFamily::Outline,
    ];
    for family in sequence {
        // Families with no remaining opportunity are allowed to decline.
        let _ = mutate_family(&mut mutated, family, &mut rng, &params());
    }
    assert_value_preserved(&tu, &mutated);
}
