//! Vectorization: pack several compatible scalar/vector locals declared in
//! one block scope into a single wider vector and rewrite each variable's
//! uses to the corresponding components.

use std::collections::HashMap;

use shadermorph::ast::{Block, Declaration, Expr, NodeId, Stmt, StmtKind, TranslationUnit};
use shadermorph::consts;
use shadermorph::parent::ParentMap;
use shadermorph::rng::MutationRng;
use shadermorph::scope::Scope;
use shadermorph::types::{BasicType, Type, TypeQualifier};
use shadermorph::walk::{declare_group, substitute_variable_uses};

use crate::mutation::Mutation;
use crate::params::GenerationParams;

const MAX_WIDTH: u32 = 4;
const SWIZZLE: [char; 4] = ['x', 'y', 'z', 'w'];

#[derive(Debug, Clone)]
pub struct MergeEntry {
    pub name: String,
    pub ty: BasicType,
    pub decl_group: NodeId,
}

/// A growable set of same-scope declarations compatible for packing into one
/// vector, capped at the target vector width.
#[derive(Debug, Clone)]
pub struct MergeSet {
    element: BasicType,
    entries: Vec<MergeEntry>,
}

impl MergeSet {
    #[must_use]
    pub fn new(entry: MergeEntry) -> MergeSet {
        MergeSet {
            element: entry.ty.element_type(),
            entries: vec![entry],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.entries.iter().map(|e| e.ty.num_elements()).sum()
    }

    #[must_use]
    pub fn can_accept(&self, entry: &MergeEntry) -> bool {
        entry.ty.element_type() == self.element
            && self.entries.iter().all(|e| e.decl_group != entry.decl_group)
            && self.width() + entry.ty.num_elements() <= MAX_WIDTH
    }

    pub fn add(&mut self, entry: MergeEntry) {
        assert!(self.can_accept(&entry), "merge set cannot accept entry");
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[MergeEntry] {
        &self.entries
    }

    #[must_use]
    pub fn merged_type(&self) -> BasicType {
        BasicType::make_vector(self.element, self.width())
    }

    /// Mangled name encoding, for each packed variable, its offset into the
    /// vector, its width, and the length of its name, followed by all names.
    /// The reducer relies on this encoding to unpack merges.
    #[must_use]
    pub fn merged_name(&self) -> String {
        let mut encoding = String::new();
        let mut names = String::new();
        let mut offset = 0;
        for entry in &self.entries {
            let width = entry.ty.num_elements();
            encoding.push_str(&format!("_{offset}_{width}_{}", entry.name.len()));
            names.push_str(&entry.name);
            offset += width;
        }
        format!("{}{}{encoding}{names}", consts::MERGED_PREFIX, self.entries.len())
    }

    /// The component selection for one packed variable, e.g. `"y"` or `"yz"`.
    #[must_use]
    pub fn swizzle_for(&self, name: &str) -> String {
        let mut offset = 0usize;
        for entry in &self.entries {
            let width = entry.ty.num_elements() as usize;
            if entry.name == name {
                return SWIZZLE[offset..offset + width].iter().collect();
            }
            offset += width;
        }
        unreachable!("{name} is not part of this merge set");
    }
}

pub struct VectorizationMutation {
    block: NodeId,
    set: MergeSet,
}

pub fn find_vectorization_mutations(
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    _params: &GenerationParams,
) -> Vec<VectorizationMutation> {
    struct Walker<'a> {
        tu: &'a TranslationUnit,
        parent_map: ParentMap,
        rng: &'a mut MutationRng,
        scope: Scope,
        group_sizes: HashMap<NodeId, usize>,
        out: Vec<VectorizationMutation>,
    }

    impl Walker<'_> {
        fn candidate(&self, name: &str) -> Option<MergeEntry> {
            let entry = self.scope.lookup(name)?;
            let decl_group = entry.decl_group?;
            // Multi-declarator groups are left alone: rewriting one
            // declarator of a group in place is not expressible as a single
            // statement replacement.
            if self.group_sizes.get(&decl_group) != Some(&1) {
                return None;
            }
            if self.tu.version.initializers_of_const_must_be_const()
                && entry.ty.has_qualifier(TypeQualifier::Const)
            {
                // A merged const would have to stay const for future const
                // initializers that mention it, but components of a merged
                // vector cannot.
                return None;
            }
            let basic = entry.ty.as_basic()?;
            if basic.is_matrix() || basic.is_boolean() {
                return None;
            }
            Some(MergeEntry {
                name: name.to_string(),
                ty: basic,
                decl_group,
            })
        }

        fn leave_block(&mut self, block: &Block) {
            // Blocks that form a switch body hold labelled statements; their
            // declarations do not vectorize cleanly across case boundaries.
            let parent_is_switch = self
                .parent_map
                .parent_of(block.id)
                .and_then(|id| self.tu.find_stmt(id))
                .is_some_and(|stmt| matches!(stmt.kind, StmtKind::Switch { .. }));
            if parent_is_switch {
                return;
            }
            let mut sets: Vec<MergeSet> = Vec::new();
            for name in self.scope.names_in_current_frame() {
                let Some(entry) = self.candidate(&name) else {
                    continue;
                };
                let with_space: Vec<usize> = sets
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.can_accept(&entry))
                    .map(|(i, _)| i)
                    .collect();
                let choice = self.rng.choose_index(with_space.len() + 1);
                if choice == with_space.len() {
                    sets.push(MergeSet::new(entry));
                } else {
                    sets[with_space[choice]].add(entry);
                }
            }
            for set in sets.into_iter().filter(|s| s.len() > 1) {
                self.out.push(VectorizationMutation {
                    block: block.id,
                    set,
                });
            }
        }

        fn visit_block(&mut self, block: &Block) {
            self.scope.push_frame();
            for stmt in &block.stmts {
                self.visit_stmt(stmt);
            }
            self.leave_block(block);
            self.scope.pop_frame();
        }

        fn visit_stmt(&mut self, stmt: &Stmt) {
            match &stmt.kind {
                StmtKind::Decl(group) => {
                    self.group_sizes.insert(group.id, group.decls.len());
                    declare_group(&mut self.scope, group);
                }
                StmtKind::Block(block) | StmtKind::Switch { body: block, .. } => {
                    self.visit_block(block);
                }
                StmtKind::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.visit_stmt(then_branch);
                    if let Some(else_branch) = else_branch {
                        self.visit_stmt(else_branch);
                    }
                }
                StmtKind::For { init, body, .. } => {
                    self.scope.push_frame();
                    if let Some(init) = init {
                        self.visit_stmt(init);
                    }
                    self.visit_stmt(body);
                    self.scope.pop_frame();
                }
                StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                    self.visit_stmt(body);
                }
                _ => {}
            }
        }
    }

    let mut walker = Walker {
        tu,
        parent_map: ParentMap::build(tu),
        rng,
        scope: Scope::new(),
        group_sizes: HashMap::new(),
        out: Vec::new(),
    };
    for declaration in &tu.declarations {
        match declaration {
            Declaration::Function(function) => walker.visit_block(&function.body),
            other => shadermorph::walk::declare_global(&mut walker.scope, other),
        }
    }
    walker.out
}

impl Mutation for VectorizationMutation {
    fn apply(&mut self, tu: &mut TranslationUnit) {
        let merged_name = self.set.merged_name();
        let merged_type = self.set.merged_type();

        let mut substitutions = HashMap::new();
        for entry in self.set.entries() {
            let swizzle = self.set.swizzle_for(&entry.name);
            substitutions.insert(
                entry.decl_group,
                Expr::member(Expr::ident(merged_name.clone()), swizzle),
            );
        }

        let block = tu
            .find_block_mut(self.block)
            .expect("vectorization block vanished between discovery and application");
        substitute_variable_uses(block, &substitutions);

        // Turn each packed declaration into a component assignment (or drop
        // it entirely when it had no initializer), preserving evaluation
        // order of the initializers.
        let group_ids: Vec<NodeId> = self.set.entries().iter().map(|e| e.decl_group).collect();
        for stmt in &mut block.stmts {
            let StmtKind::Decl(group) = &stmt.kind else {
                continue;
            };
            if !group_ids.contains(&group.id) {
                continue;
            }
            assert_eq!(
                group.decls.len(),
                1,
                "merged declaration gained declarators between discovery and application"
            );
            let entry = self
                .set
                .entries()
                .iter()
                .find(|e| e.decl_group == group.id)
                .expect("group id belongs to the set");
            let replacement = match &group.decls[0].init {
                Some(init) => Stmt::expr(Expr::assign(
                    Expr::member(
                        Expr::ident(merged_name.clone()),
                        self.set.swizzle_for(&entry.name),
                    ),
                    init.clone_fresh(),
                )),
                None => Stmt::new(StmtKind::Empty),
            };
            *stmt = replacement;
        }

        block.stmts.insert(
            0,
            Stmt::new(StmtKind::Decl(shadermorph::ast::VarDeclGroup::single(
                Type::Basic(merged_type),
                merged_name,
                None,
            ))),
        );
    }

    fn name(&self) -> &'static str {
        "VectorizationMutation"
    }
}
