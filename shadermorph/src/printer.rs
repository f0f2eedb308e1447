//! Deterministic pretty-printer. Every node kind the mutation engine can
//! produce round-trips through here; the output is stable across runs, which
//! the reproducibility contract relies on (same seed, same input tree,
//! byte-identical output).

use std::fmt::Write;

use crate::ast::{
    BinOp, Block, Declaration, Expr, ExprKind, FunctionPrototype, Stmt, StmtKind,
    TranslationUnit, UnOp, VarDeclGroup,
};
use crate::types::{Type, TypeQualifier};
use crate::version::{ShaderKind, ShadingLanguageVersion};

const INDENT: &str = "    ";

#[must_use]
pub fn print(tu: &TranslationUnit) -> String {
    let mut out = String::new();
    out.push_str(version_directive(tu.version));
    out.push('\n');
    if tu.kind == ShaderKind::Fragment && tu.version != ShadingLanguageVersion::Glsl330
        && tu.version != ShadingLanguageVersion::Glsl450
    {
        out.push_str("precision highp float;\n");
    }
    out.push('\n');
    for declaration in &tu.declarations {
        print_declaration(&mut out, declaration);
        out.push('\n');
    }
    out
}

fn version_directive(version: ShadingLanguageVersion) -> &'static str {
    match version {
        ShadingLanguageVersion::WebGl100 => "#version 100",
        ShadingLanguageVersion::Essl300 => "#version 300 es",
        ShadingLanguageVersion::Essl310 => "#version 310 es",
        ShadingLanguageVersion::Glsl330 => "#version 330",
        ShadingLanguageVersion::Glsl450 => "#version 450",
    }
}

fn print_declaration(out: &mut String, declaration: &Declaration) {
    match declaration {
        Declaration::Struct(s) => {
            let _ = writeln!(out, "struct {} {{", s.name);
            for field in &s.fields {
                let _ = writeln!(out, "{INDENT}{};", declarator(&field.ty, &field.name));
            }
            out.push_str("};\n");
        }
        Declaration::Variables(group) => {
            print_decl_group(out, group, 0);
        }
        Declaration::Function(f) => {
            print_prototype(out, &f.prototype);
            out.push('\n');
            print_block(out, &f.body, 0);
        }
    }
}

fn print_prototype(out: &mut String, prototype: &FunctionPrototype) {
    let _ = write!(out, "{} {}(", type_name(&prototype.return_type), prototype.name);
    for (i, param) in prototype.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&declarator(&param.ty, &param.name));
    }
    out.push(')');
}

fn qualifier_name(qualifier: TypeQualifier) -> &'static str {
    match qualifier {
        TypeQualifier::Const => "const",
        TypeQualifier::Uniform => "uniform",
        TypeQualifier::ShaderInput | TypeQualifier::InParam => "in",
        TypeQualifier::ShaderOutput | TypeQualifier::OutParam => "out",
        TypeQualifier::InoutParam => "inout",
    }
}

fn type_name(ty: &Type) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Basic(basic) => basic.glsl_name().to_string(),
        Type::Struct(name) => name.clone(),
        Type::Array(base, size) => format!("{}[{size}]", type_name(base)),
        Type::Qualified(qualifiers, target) => {
            let mut result = String::new();
            for q in qualifiers {
                result.push_str(qualifier_name(*q));
                result.push(' ');
            }
            result.push_str(&type_name(target));
            result
        }
    }
}

/// `type name` with the array suffix attached to the name, GLSL-style.
fn declarator(ty: &Type, name: &str) -> String {
    match ty.without_qualifiers() {
        Type::Array(base, size) => {
            let element = match ty {
                Type::Qualified(qualifiers, _) => {
                    type_name(&Type::Qualified(qualifiers.clone(), base.clone()))
                }
                _ => type_name(base),
            };
            format!("{element} {name}[{size}]")
        }
        _ => format!("{} {name}", type_name(ty)),
    }
}

fn print_decl_group(out: &mut String, group: &VarDeclGroup, depth: usize) {
    indent(out, depth);
    out.push_str(&type_name(&group.base_type));
    for (i, decl) in group.decls.iter().enumerate() {
        out.push_str(if i == 0 { " " } else { ", " });
        out.push_str(&decl.name);
        if let Some(size) = decl.array_size {
            let _ = write!(out, "[{size}]");
        }
        if let Some(init) = &decl.init {
            out.push_str(" = ");
            out.push_str(&expr_to_string(init));
        }
    }
    out.push_str(";\n");
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn print_block(out: &mut String, block: &Block, depth: usize) {
    indent(out, depth);
    out.push_str("{\n");
    for stmt in &block.stmts {
        print_stmt(out, stmt, depth + 1);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn print_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match &stmt.kind {
        StmtKind::Block(block) => print_block(out, block, depth),
        StmtKind::Decl(group) => print_decl_group(out, group, depth),
        StmtKind::Expr(e) => {
            indent(out, depth);
            let _ = writeln!(out, "{};", expr_to_string(e));
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            indent(out, depth);
            let _ = writeln!(out, "if ({})", expr_to_string(cond));
            print_stmt(out, then_branch, depth + 1);
            if let Some(else_branch) = else_branch {
                indent(out, depth);
                out.push_str("else\n");
                print_stmt(out, else_branch, depth + 1);
            }
        }
        StmtKind::For {
            init,
            cond,
            inc,
            body,
        } => {
            indent(out, depth);
            out.push_str("for (");
            match init {
                Some(init) => {
                    let mut header = String::new();
                    print_stmt(&mut header, init, 0);
                    // Fold the init statement (which prints its own line)
                    // into the header.
                    out.push_str(header.trim_end_matches('\n'));
                }
                None => out.push(';'),
            }
            out.push(' ');
            if let Some(cond) = cond {
                out.push_str(&expr_to_string(cond));
            }
            out.push_str("; ");
            if let Some(inc) = inc {
                out.push_str(&expr_to_string(inc));
            }
            out.push_str(")\n");
            print_stmt(out, body, depth + 1);
        }
        StmtKind::While { cond, body } => {
            indent(out, depth);
            let _ = writeln!(out, "while ({})", expr_to_string(cond));
            print_stmt(out, body, depth + 1);
        }
        StmtKind::DoWhile { body, cond } => {
            indent(out, depth);
            out.push_str("do\n");
            print_stmt(out, body, depth + 1);
            indent(out, depth);
            let _ = writeln!(out, "while ({});", expr_to_string(cond));
        }
        StmtKind::Switch { subject, body } => {
            indent(out, depth);
            let _ = writeln!(out, "switch ({})", expr_to_string(subject));
            print_block(out, body, depth);
        }
        StmtKind::CaseLabel(Some(label)) => {
            indent(out, depth);
            let _ = writeln!(out, "case {}:", expr_to_string(label));
        }
        StmtKind::CaseLabel(None) => {
            indent(out, depth);
            out.push_str("default:\n");
        }
        StmtKind::Break => {
            indent(out, depth);
            out.push_str("break;\n");
        }
        StmtKind::Continue => {
            indent(out, depth);
            out.push_str("continue;\n");
        }
        StmtKind::Discard => {
            indent(out, depth);
            out.push_str("discard;\n");
        }
        StmtKind::Return(value) => {
            indent(out, depth);
            match value {
                Some(value) => {
                    let _ = writeln!(out, "return {};", expr_to_string(value));
                }
                None => out.push_str("return;\n"),
            }
        }
        StmtKind::Empty => {
            indent(out, depth);
            out.push_str(";\n");
        }
    }
}

// Binding strengths; larger binds tighter. Mirrors the language grammar.
fn bin_op_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Mul | BinOp::Div | BinOp::Mod => 15,
        BinOp::Add | BinOp::Sub => 14,
        BinOp::Shl | BinOp::Shr => 13,
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 12,
        BinOp::Eq | BinOp::Ne => 11,
        BinOp::BitAnd => 10,
        BinOp::BitXor => 9,
        BinOp::BitOr => 8,
        BinOp::LogicalAnd => 7,
        BinOp::LogicalOr => 5,
        BinOp::Assign
        | BinOp::AddAssign
        | BinOp::SubAssign
        | BinOp::MulAssign
        | BinOp::DivAssign => 3,
        BinOp::Comma => 1,
    }
}

fn bin_op_token(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::LogicalAnd => "&&",
        BinOp::LogicalOr => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Comma => ",",
        BinOp::Assign => "=",
        BinOp::AddAssign => "+=",
        BinOp::SubAssign => "-=",
        BinOp::MulAssign => "*=",
        BinOp::DivAssign => "/=",
    }
}

fn float_token(value: f32) -> String {
    let mut token = format!("{value:?}");
    if !token.contains('.') && !token.contains('e') && !token.contains("inf")
        && !token.contains("NaN")
    {
        token.push_str(".0");
    }
    token
}

#[must_use]
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

fn write_expr(out: &mut String, expr: &Expr, min_precedence: u8) {
    match &expr.kind {
        ExprKind::IntLit(v) => {
            let _ = write!(out, "{v}");
        }
        ExprKind::UintLit(v) => {
            let _ = write!(out, "{v}u");
        }
        ExprKind::FloatLit(v) => out.push_str(&float_token(*v)),
        ExprKind::BoolLit(v) => {
            let _ = write!(out, "{v}");
        }
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::Paren(inner) => {
            out.push('(');
            write_expr(out, inner, 0);
            out.push(')');
        }
        ExprKind::Unary(op, operand) => {
            let parenthesize = 16 < min_precedence;
            if parenthesize {
                out.push('(');
            }
            match op {
                UnOp::PostInc | UnOp::PostDec => {
                    write_expr(out, operand, 17);
                    out.push_str(if *op == UnOp::PostInc { "++" } else { "--" });
                }
                _ => {
                    out.push_str(match op {
                        UnOp::PreInc => "++",
                        UnOp::PreDec => "--",
                        UnOp::Plus => "+",
                        UnOp::Minus => "-",
                        UnOp::LogicalNot => "!",
                        UnOp::BitwiseNot => "~",
                        UnOp::PostInc | UnOp::PostDec => unreachable!(),
                    });
                    write_expr(out, operand, 16);
                }
            }
            if parenthesize {
                out.push(')');
            }
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let precedence = bin_op_precedence(*op);
            let parenthesize = precedence < min_precedence;
            if parenthesize {
                out.push('(');
            }
            let right_assoc = op.is_side_effecting();
            let (lhs_min, rhs_min) = if right_assoc {
                (precedence + 1, precedence)
            } else {
                (precedence, precedence + 1)
            };
            write_expr(out, lhs, lhs_min);
            if *op == BinOp::Comma {
                out.push_str(", ");
            } else {
                let _ = write!(out, " {} ", bin_op_token(*op));
            }
            write_expr(out, rhs, rhs_min);
            if parenthesize {
                out.push(')');
            }
        }
        ExprKind::Ternary(cond, then_expr, else_expr) => {
            let parenthesize = 4 < min_precedence;
            if parenthesize {
                out.push('(');
            }
            write_expr(out, cond, 5);
            out.push_str(" ? ");
            write_expr(out, then_expr, 4);
            out.push_str(" : ");
            write_expr(out, else_expr, 4);
            if parenthesize {
                out.push(')');
            }
        }
        ExprKind::Call(name, args) | ExprKind::Ctor(name, args) => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                // Argument positions exclude the comma operator.
                write_expr(out, arg, 2);
            }
            out.push(')');
        }
        ExprKind::Member(receiver, field) => {
            write_expr(out, receiver, 17);
            out.push('.');
            out.push_str(field);
        }
        ExprKind::Index(receiver, index) => {
            write_expr(out, receiver, 17);
            out.push('[');
            write_expr(out, index, 0);
            out.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn precedence_parenthesization() {
        // (a + b) * c needs parentheses, a + b * c does not.
        let sum = Expr::binary(BinOp::Add, Expr::ident("a"), Expr::ident("b"));
        let product = Expr::binary(BinOp::Mul, sum, Expr::ident("c"));
        assert_eq!(expr_to_string(&product), "(a + b) * c");

        let product = Expr::binary(BinOp::Mul, Expr::ident("b"), Expr::ident("c"));
        let sum = Expr::binary(BinOp::Add, Expr::ident("a"), product);
        assert_eq!(expr_to_string(&sum), "a + b * c");
    }

    #[test]
    fn float_literals_keep_a_decimal_point() {
        assert_eq!(expr_to_string(&Expr::float(1.0)), "1.0");
        assert_eq!(expr_to_string(&Expr::float(0.25)), "0.25");
        assert_eq!(expr_to_string(&Expr::uint(7)), "7u");
    }

    #[test]
    fn member_and_call_chains() {
        let expr = Expr::member(
            Expr::call("normalize", vec![Expr::ident("v")]),
            "xy",
        );
        assert_eq!(expr_to_string(&expr), "normalize(v).xy");
    }

    #[test]
    fn assignment_associativity() {
        let inner = Expr::assign(Expr::ident("b"), Expr::int(1));
        let outer = Expr::assign(Expr::ident("a"), inner);
        assert_eq!(expr_to_string(&outer), "a = b = 1");
    }
}
