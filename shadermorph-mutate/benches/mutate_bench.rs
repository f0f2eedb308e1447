use criterion::{criterion_group, criterion_main, Criterion};

use shadermorph::ast::{
    BinOp, Block, Declaration, Expr, FunctionDefinition, FunctionPrototype, Stmt, StmtKind,
    TranslationUnit, UnOp, VarDeclGroup,
};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};
use shadermorph_mutate::{find_mutations, mutate, GenerationParams, MutationFamily};

fn bench_shader() -> TranslationUnit {
    let mut body = vec![Stmt::expr(Expr::assign(Expr::ident("color"), Expr::float(0.0)))];
    for i in 0..16 {
        body.push(Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Float),
            format!("v{i}"),
            Some(Expr::binary(
                BinOp::Add,
                Expr::ident("uniformA"),
                Expr::float(i as f32),
            )),
        ))));
        body.push(Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::binary(BinOp::Add, Expr::ident("color"), Expr::ident(format!("v{i}"))),
        )));
    }
    body.push(Stmt::new(StmtKind::For {
        init: Some(Box::new(Stmt::new(StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Int),
            "i",
            Some(Expr::int(0)),
        ))))),
        cond: Some(Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(8))),
        inc: Some(Expr::unary(UnOp::PostInc, Expr::ident("i"))),
        body: Box::new(Stmt::block(
            vec![Stmt::expr(Expr::assign(
                Expr::ident("color"),
                Expr::binary(BinOp::Mul, Expr::ident("color"), Expr::float(1.0)),
            ))],
            true,
        )),
    }));

    TranslationUnit::new(
        ShadingLanguageVersion::Essl300,
        ShaderKind::Fragment,
        vec![
            Declaration::Variables(VarDeclGroup::single(
                Type::qualified(vec![TypeQualifier::Uniform], Type::Basic(BasicType::Float)),
                "uniformA",
                None,
            )),
            Declaration::Variables(VarDeclGroup::single(
                Type::qualified(vec![TypeQualifier::Uniform], Type::Basic(BasicType::Vec2)),
                consts::SWITCH_UNIFORM,
                None,
            )),
            Declaration::Variables(VarDeclGroup::single(
                Type::qualified(
                    vec![TypeQualifier::ShaderOutput],
                    Type::Basic(BasicType::Float),
                ),
                "color",
                None,
            )),
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

fn full_run(c: &mut Criterion) {
    let tu = bench_shader();
    let params = GenerationParams::normal(ShaderKind::Fragment);

    c.bench_function("discover_dead_jump_sites", |b| {
        b.iter(|| {
            let mut rng = MutationRng::from_seed(7);
            find_mutations(MutationFamily::DeadJump, &tu, &mut rng, &params).len()
        });
    });

    c.bench_function("single_mutation_run", |b| {
        b.iter(|| {
            let mut mutated = tu.clone();
            let mut rng = MutationRng::from_seed(7);
            let _ = mutate(&mut mutated, &mut rng, &params);
            mutated
        });
    });
}

criterion_group!(benches, full_run);
criterion_main!(benches);
