pub mod ast;
pub mod consts;
pub mod parent;
pub mod printer;
pub mod rng;
pub mod scope;
pub mod typer;
pub mod types;
pub mod version;
pub mod walk;

pub use ast::*;
pub use types::{BasicType, Type, TypeQualifier};
pub use version::{ShaderKind, ShadingLanguageVersion};
