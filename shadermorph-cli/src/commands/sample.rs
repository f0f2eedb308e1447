use std::path::PathBuf;

use clap::Args;

use shadermorph::ast::{
    Block, Declaration, Expr, FunctionDefinition, FunctionPrototype, Stmt, TranslationUnit,
    VarDeclGroup,
};
use shadermorph::consts;
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::version::{ShaderKind, ShadingLanguageVersion};
use shadermorph::ast::BinOp;

use super::write_tree;

#[derive(Args)]
pub struct SampleCommand {
    /// Where to write the serialized example shader.
    output: PathBuf,
}

impl SampleCommand {
    pub fn run(self) -> Result<(), String> {
        let tu = sample_shader();
        write_tree(&self.output, &tu)
    }
}

/// A small fragment shader: `color = brightness + 1.0` through a local.
fn sample_shader() -> TranslationUnit {
    let uniform = |name: &str, ty: BasicType| {
        Declaration::Variables(VarDeclGroup::single(
            Type::qualified(vec![TypeQualifier::Uniform], Type::Basic(ty)),
            name,
            None,
        ))
    };
    let output = Declaration::Variables(VarDeclGroup::single(
        Type::qualified(
            vec![TypeQualifier::ShaderOutput],
            Type::Basic(BasicType::Vec4),
        ),
        "color",
        None,
    ));
    let body = vec![
        Stmt::new(shadermorph::ast::StmtKind::Decl(VarDeclGroup::single(
            Type::Basic(BasicType::Float),
            "level",
            Some(Expr::binary(
                BinOp::Add,
                Expr::ident("brightness"),
                Expr::float(1.0),
            )),
        ))),
        Stmt::expr(Expr::assign(
            Expr::ident("color"),
            Expr::ctor(
                "vec4",
                vec![
                    Expr::ident("level"),
                    Expr::ident("level"),
                    Expr::ident("level"),
                    Expr::float(1.0),
                ],
            ),
        )),
    ];
    TranslationUnit::new(
        ShadingLanguageVersion::Essl300,
        ShaderKind::Fragment,
        vec![
            uniform("brightness", BasicType::Float),
            uniform(consts::SWITCH_UNIFORM, BasicType::Vec2),
            output,
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
