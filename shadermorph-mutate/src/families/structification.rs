//! Structification: move a local declaration's storage into a field of a
//! fresh (possibly nested) struct variable and rewrite every use in the
//! owning block to the corresponding field access.

use std::collections::HashMap;

use shadermorph::ast::{
    Block, Declaration, Expr, NodeId, Stmt, StmtKind, StructDefinition, StructField,
    TranslationUnit,
};
use shadermorph::consts;
use shadermorph::rng::MutationRng;
use shadermorph::types::{BasicType, Type};
use shadermorph::walk::substitute_variable_uses;

use crate::families::fresh_prefix_id;
use crate::mutation::Mutation;
use crate::params::GenerationParams;

pub struct StructificationMutation {
    decl_stmt: NodeId,
    block: NodeId,
    rng: MutationRng,
    params: GenerationParams,
}

fn declaration_is_structifiable(group: &shadermorph::ast::VarDeclGroup) -> bool {
    // Solo declarations of unqualified basic types only; arrays and structs
    // stay as they are.
    group.decls.len() == 1
        && group.decls[0].array_size.is_none()
        && !group.base_type.has_qualifiers()
        && group.base_type.as_basic().is_some()
}

pub fn find_structification_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<StructificationMutation> {
    struct Walker<'a> {
        tu: &'a TranslationUnit,
        rng: &'a mut MutationRng,
        params: &'a GenerationParams,
        out: Vec<StructificationMutation>,
    }

    impl Walker<'_> {
        fn visit_block(&mut self, block: &Block) {
            for stmt in &block.stmts {
                self.visit_stmt(stmt, block.id);
            }
        }

        fn visit_stmt(&mut self, stmt: &Stmt, enclosing_block: NodeId) {
            match &stmt.kind {
                StmtKind::Decl(group) => {
                    if declaration_is_structifiable(group) {
                        self.out.push(StructificationMutation {
                            decl_stmt: stmt.id,
                            block: enclosing_block,
                            rng: self.rng.spawn_child(),
                            params: self.params.clone(),
                        });
                    }
                }
                StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                    self.visit_block(block);
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.visit_stmt(then_branch, enclosing_block);
                    if let Some(else_branch) = else_branch {
                        self.visit_stmt(else_branch, enclosing_block);
                    }
                }
                StmtKind::For { init, body, .. } => {
                    // Loop-header declarations can only be structified where
                    // the dialect allows arbitrary loop headers; uses in the
                    // header and body are rewritten via the enclosing block.
                    if !self.tu.version.restricted_for_loops() {
                        if let Some(init) = init {
                            self.visit_stmt(init, enclosing_block);
                        }
                    }
                    self.visit_stmt(body, enclosing_block);
                }
                StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                    self.visit_stmt(body, enclosing_block);
                }
                _ => {}
            }
        }
    }

    let mut walker = Walker {
        tu,
        rng,
        params,
        out: Vec::new(),
    };
    for function in tu.functions() {
        walker.visit_block(&function.body);
    }
    walker.out
}

impl Mutation for StructificationMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let (group_id, original_name, original_type, original_init) = {
            let stmt = tu
                .find_stmt(self.decl_stmt)
                .expect("structification site vanished between discovery and application");
            let StmtKind::Decl(group) = &stmt.kind else {
                panic!("structification target is not a declaration");
            };
            assert!(
                declaration_is_structifiable(group),
                "structification site became unsuitable between discovery and application"
            );
            (
                group.id,
                group.decls[0].name.clone(),
                group.base_type.clone(),
                group.decls[0].init.as_ref().map(Expr::clone_fresh),
            )
        };

        let mut structs = self.random_structs(tu, 0, &mut next_struct_id(tu));
        let variable_name = format!(
            "{}{}",
            consts::STRUCT_REPLACEMENT_PREFIX,
            fresh_prefix_id(tu, consts::STRUCT_REPLACEMENT_PREFIX)
        );

        let access = self.insert_field_into_chain(&mut structs, &original_name, &original_type);
        let access_expr = access
            .iter()
            .fold(Expr::ident(variable_name.clone()), |receiver, field| {
                Expr::member(receiver, field.clone())
            });

        // Rewrite every use in the owning block before renaming the
        // declaration itself.
        let mut substitutions = HashMap::new();
        substitutions.insert(group_id, access_expr);
        let block = tu
            .find_block_mut(self.block)
            .expect("structification block vanished");
        substitute_variable_uses(block, &substitutions);

        let enclosing = structs[0].clone();
        let by_name: HashMap<String, StructDefinition> =
            structs.iter().map(|s| (s.name.clone(), s.clone())).collect();

        let stmt = tu
            .find_stmt_mut(self.decl_stmt)
            .expect("structification declaration vanished");
        let StmtKind::Decl(group) = &mut stmt.kind else {
            unreachable!()
        };
        group.base_type = Type::Struct(enclosing.name.clone());
        group.decls[0].name = variable_name;
        if let Some(init) = original_init {
            group.decls[0].init =
                Some(make_struct_initializer(&enclosing, &by_name, &original_name, &init));
        }

        // Prepending in chain order leaves every struct declared before its
        // first use.
        for definition in structs {
            tu.prepend_declaration(Declaration::Struct(definition));
        }
    }

    fn name(&self) -> &'static str {
        "StructificationMutation"
    }
}

fn next_struct_id(tu: &TranslationUnit) -> u32 {
    fresh_prefix_id(tu, consts::STRUCT_PREFIX)
}

impl StructificationMutation {
    /// A random struct, possibly with nested sub-structs. The first element
    /// of the result is the outermost struct; the rest are its transitive
    /// field types in dependency order (each before its own dependencies).
    fn random_structs(
        &mut self,
        tu: &TranslationUnit,
        depth: u32,
        next_id: &mut u32,
    ) -> Vec<StructDefinition> {
        let field_count = 1 + self.rng.next_int(self.params.max_struct_fields - 1);
        let mut sub_structs = Vec::new();
        let mut fields = Vec::new();
        let name = format!("{}{}", consts::STRUCT_PREFIX, *next_id);
        *next_id += 1;
        for i in 0..field_count {
            let field_name = format!("{}{i}", consts::STRUCT_FIELD_PREFIX);
            if depth < self.params.max_struct_nesting_depth && self.rng.next_bool() {
                let nested = self.random_structs(tu, depth + 1, next_id);
                fields.push(StructField {
                    name: field_name,
                    ty: Type::Struct(nested[0].name.clone()),
                });
                sub_structs.extend(nested);
            } else {
                fields.push(StructField {
                    name: field_name,
                    ty: Type::Basic(self.random_field_type(tu)),
                });
            }
        }
        let mut result = vec![StructDefinition { name, fields }];
        result.extend(sub_structs);
        result
    }

    fn random_field_type(&mut self, tu: &TranslationUnit) -> BasicType {
        loop {
            let candidate = BasicType::ALL[self.rng.choose_index(BasicType::ALL.len())];
            if candidate.element_type() == BasicType::Uint && !tu.version.supports_unsigned() {
                continue;
            }
            return candidate;
        }
    }

    /// Chooses a nesting path, inserts the original declaration as a field
    /// at a random position along it, and returns the field-access path.
    fn insert_field_into_chain(
        &mut self,
        structs: &mut [StructDefinition],
        original_name: &str,
        original_type: &Type,
    ) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = 0usize;
        loop {
            let nested: Vec<(String, usize)> = structs[current]
                .fields
                .iter()
                .filter_map(|f| match &f.ty {
                    Type::Struct(name) => structs
                        .iter()
                        .position(|s| &s.name == name)
                        .map(|i| (f.name.clone(), i)),
                    _ => None,
                })
                .collect();
            if !nested.is_empty() && self.rng.next_bool() {
                let (field, index) = nested[self.rng.choose_index(nested.len())].clone();
                path.push(field);
                current = index;
            } else {
                let position = self.rng.choose_index(structs[current].fields.len() + 1);
                structs[current].fields.insert(
                    position,
                    StructField {
                        name: original_name.to_string(),
                        ty: original_type.clone(),
                    },
                );
                path.push(original_name.to_string());
                return path;
            }
        }
    }
}

/// Constructor expression initializing the struct chain so that the
/// original declaration's field gets the original initializer and every
/// other field gets a canonical constant.
fn make_struct_initializer(
    definition: &StructDefinition,
    by_name: &HashMap<String, StructDefinition>,
    original_name: &str,
    original_init: &Expr,
) -> Expr {
    let args = definition
        .fields
        .iter()
        .map(|field| {
            if field.name == original_name {
                return original_init.clone_fresh();
            }
            match &field.ty {
                Type::Struct(name) => make_struct_initializer(
                    by_name
                        .get(name)
                        .expect("generated sub-structs are all recorded"),
                    by_name,
                    original_name,
                    original_init,
                ),
                other => other
                    .canonical_constant()
                    .expect("generated fields have basic types"),
            }
        })
        .collect();
    Expr::ctor(definition.name.clone(), args)
}
