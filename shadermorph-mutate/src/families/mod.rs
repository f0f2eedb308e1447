//! One module per mutation family: a finder that discovers legal sites in a
//! pure pass, and a mutation type whose `apply` performs the edit.

pub mod dead_barrier;
pub mod dead_jump;
pub mod identity;
pub mod outline;
pub mod output_write;
pub mod split_loop;
pub mod structification;
pub mod switch_injection;
pub mod vectorization;
pub mod wrapping;

pub use dead_barrier::*;
pub use dead_jump::*;
pub use identity::*;
pub use outline::*;
pub use output_write::*;
pub use split_loop::*;
pub use structification::*;
pub use switch_injection::*;
pub use vectorization::*;
pub use wrapping::*;

use shadermorph::ast::{Declaration, Stmt, StmtKind, TranslationUnit};

/// All names declared anywhere in the unit (functions, structs, globals,
/// locals, parameters). Used to mint fresh synthesized names that cannot
/// collide with prior mutation runs over the same tree.
fn collect_declared_names(tu: &TranslationUnit) -> Vec<String> {
    fn collect_stmt(stmt: &Stmt, out: &mut Vec<String>) {
        match &stmt.kind {
            StmtKind::Decl(group) => {
                out.extend(group.decls.iter().map(|d| d.name.clone()));
            }
            StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                for stmt in &block.stmts {
                    collect_stmt(stmt, out);
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_stmt(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_stmt(else_branch, out);
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_stmt(init, out);
                }
                collect_stmt(body, out);
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                collect_stmt(body, out);
            }
            _ => {}
        }
    }

    let mut names = Vec::new();
    for declaration in &tu.declarations {
        match declaration {
            Declaration::Function(f) => {
                names.push(f.prototype.name.clone());
                names.extend(f.prototype.params.iter().map(|p| p.name.clone()));
                for stmt in &f.body.stmts {
                    collect_stmt(stmt, &mut names);
                }
            }
            Declaration::Variables(group) => {
                names.extend(group.decls.iter().map(|d| d.name.clone()));
            }
            Declaration::Struct(s) => names.push(s.name.clone()),
        }
    }
    names
}

/// Smallest id such that `{prefix}{id}` collides with nothing declared in the
/// unit. Deterministic for a given tree, so repeated runs over already
/// mutated trees stay reproducible.
#[must_use]
pub fn fresh_prefix_id(tu: &TranslationUnit, prefix: &str) -> u32 {
    collect_declared_names(tu)
        .iter()
        .filter_map(|name| {
            name.strip_prefix(prefix)
                .and_then(|rest| {
                    // Accept "<id>" and "<id>_suffix" forms.
                    let digits: String =
                        rest.chars().take_while(char::is_ascii_digit).collect();
                    digits.parse::<u32>().ok()
                })
        })
        .max()
        .map_or(0, |max| max + 1)
}
