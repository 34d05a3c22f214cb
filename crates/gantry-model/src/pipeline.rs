//! One pipeline document: parse, edit, validate, re-serialize.
//!
//! The raw text is authoritative until it parses; once it does, the parsed
//! mapping is kept as the serialization base so unrecognized keys survive a
//! full edit/serialize round trip. When the text stops parsing, the previous
//! children stay around (the diagram keeps rendering the last good state)
//! and structural editing is suspended.

use gantry_doc::line_endings::{self, LineEnding};
use gantry_doc::{locate, mapping};
use gantry_types::{Catalogs, GantryError, LocatedSchemaFailure, Result, SchemaFailure, Uid};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::block::Block;
use crate::dependencies::{BlockDependencies, DependencyRef};
use crate::errors::Errors;
use crate::graph::DirectedGraph;
use crate::promotion::Promotion;
use crate::settings::{
    AfterPipeline, AutoCancel, ExecutionTimeLimit, FailFast, GlobalJobConfig,
};

#[derive(Debug)]
pub struct Pipeline {
    pub uid: Uid,
    pub file_path: String,
    /// Path at load time; consulted when computing which files a commit
    /// should delete after a rename.
    pub initial_file_path: String,
    pub created_in_editor: bool,
    initial_yaml: String,
    line_ending: LineEnding,
    yaml: String,
    yaml_error: Option<String>,
    structure: Mapping,
    pub name: String,
    pub agent: Agent,
    pub execution_time_limit: ExecutionTimeLimit,
    pub fail_fast: FailFast,
    pub auto_cancel: AutoCancel,
    pub global_job_config: GlobalJobConfig,
    pub after_pipeline: AfterPipeline,
    pub blocks: Vec<Block>,
    pub promotions: Vec<Promotion>,
    pub errors: Errors,
    pub schema_failures: Vec<LocatedSchemaFailure>,
}

impl Pipeline {
    pub fn from_yaml(path: impl Into<String>, yaml_content: &str, created_in_editor: bool) -> Self {
        let path = path.into();
        let mut pipeline = Pipeline {
            uid: Uid::new(),
            file_path: path.clone(),
            initial_file_path: path,
            created_in_editor,
            initial_yaml: yaml_content.to_string(),
            line_ending: line_endings::dominant_line_ending(yaml_content),
            yaml: String::new(),
            yaml_error: None,
            structure: Mapping::new(),
            name: String::new(),
            agent: Agent::from_structure(None),
            execution_time_limit: ExecutionTimeLimit::from_structure(None),
            fail_fast: FailFast::default(),
            auto_cancel: AutoCancel::default(),
            global_job_config: GlobalJobConfig::default(),
            after_pipeline: AfterPipeline::default(),
            blocks: Vec::new(),
            promotions: Vec::new(),
            errors: Errors::new(),
            schema_failures: Vec::new(),
        };
        pipeline.update_yaml(yaml_content);
        pipeline
    }

    /// Replace the document text. On a parse failure the previous children
    /// are kept but flagged stale through `has_invalid_yaml`.
    pub fn update_yaml(&mut self, yaml_content: &str) {
        self.yaml = yaml_content.to_string();
        self.yaml_error = None;
        self.errors.reset();

        match serde_yaml::from_str::<Value>(yaml_content) {
            Ok(Value::Mapping(structure)) => {
                self.structure = structure;
                self.rebuild();
            }
            Ok(_) => {
                self.structure = Mapping::new();
                self.yaml_error = Some("document root is not a mapping".to_string());
            }
            Err(e) => {
                self.structure = Mapping::new();
                self.yaml_error = Some(e.to_string());
            }
        }
    }

    fn rebuild(&mut self) {
        let s = &self.structure;

        self.name = mapping::get_str(s, "name").unwrap_or_default().to_string();
        self.agent = Agent::from_structure(mapping::get(s, "agent"));
        self.execution_time_limit =
            ExecutionTimeLimit::from_structure(mapping::get(s, "execution_time_limit"));
        self.fail_fast = FailFast::from_structure(mapping::get(s, "fail_fast"));
        self.auto_cancel = AutoCancel::from_structure(mapping::get(s, "auto_cancel"));
        self.global_job_config =
            GlobalJobConfig::from_structure(mapping::get(s, "global_job_config"));
        self.after_pipeline = AfterPipeline::from_structure(mapping::get(s, "after_pipeline"));

        self.blocks = mapping::get(s, "blocks")
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .map(|v| Block::from_structure(v.as_mapping().cloned().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        self.promotions = mapping::get(s, "promotions")
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .map(|v| Promotion::from_structure(v.as_mapping().cloned().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        self.resolve_dependency_targets();
    }

    pub fn has_invalid_yaml(&self) -> bool {
        self.yaml_error.is_some()
    }

    pub fn yaml_error(&self) -> Option<&str> {
        self.yaml_error.as_deref()
    }

    pub fn has_schema_failures(&self) -> bool {
        !self.schema_failures.is_empty()
    }

    pub fn is_path_changed_from_initial(&self) -> bool {
        self.file_path != self.initial_file_path
    }

    /// Uids of this pipeline's addressable children, in document order.
    pub fn child_uids(&self) -> Vec<Uid> {
        self.blocks
            .iter()
            .map(|b| b.uid)
            .chain(self.promotions.iter().map(|p| p.uid))
            .collect()
    }

    // ---- block lookup ----

    /// The first block with this name, as in validation: the first occurrence
    /// owns the name, later ones are the duplicates.
    pub fn find_block_by_name(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn find_block(&self, uid: Uid) -> Option<&Block> {
        self.blocks.iter().find(|b| b.uid == uid)
    }

    pub fn block_index(&self, uid: Uid) -> Option<usize> {
        self.blocks.iter().position(|b| b.uid == uid)
    }

    pub fn find_block_mut(&mut self, uid: Uid) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.uid == uid)
    }

    pub fn find_promotion(&self, uid: Uid) -> Option<&Promotion> {
        self.promotions.iter().find(|p| p.uid == uid)
    }

    pub fn find_promotion_mut(&mut self, uid: Uid) -> Option<&mut Promotion> {
        self.promotions.iter_mut().find(|p| p.uid == uid)
    }

    // ---- dependencies ----

    pub fn has_implicit_dependencies(&self) -> bool {
        self.blocks.iter().any(|b| b.dependencies.is_implicit())
    }

    /// The effective dependency names of a block: the explicit list, or the
    /// implicit previous-block view. Unknown uids read as no dependencies.
    pub fn dependency_names(&self, uid: Uid) -> Vec<String> {
        self.block_index(uid)
            .map(|index| self.dependency_names_at(index))
            .unwrap_or_default()
    }

    fn dependency_names_at(&self, index: usize) -> Vec<String> {
        match &self.blocks[index].dependencies {
            BlockDependencies::Explicit(refs) => {
                refs.iter().map(|r| r.name.clone()).collect()
            }
            BlockDependencies::Implicit => self.implicit_names(index),
        }
    }

    /// The effective dependency uids of a block.
    pub fn dependency_uids(&self, uid: Uid) -> Vec<Uid> {
        let Some(index) = self.block_index(uid) else {
            return Vec::new();
        };
        match &self.blocks[index].dependencies {
            BlockDependencies::Explicit(refs) => refs.iter().filter_map(|r| r.target).collect(),
            BlockDependencies::Implicit => {
                if index == 0 {
                    Vec::new()
                } else {
                    vec![self.blocks[index - 1].uid]
                }
            }
        }
    }

    fn implicit_names(&self, index: usize) -> Vec<String> {
        if index == 0 {
            Vec::new()
        } else {
            vec![self.blocks[index - 1].name.clone()]
        }
    }

    /// Convert every implicit block to an explicit list equal to its current
    /// implicit view. All blocks convert together so no block's effective
    /// dependencies change.
    pub fn make_dependencies_explicit(&mut self) {
        let materialized: Vec<Option<Vec<DependencyRef>>> = (0..self.blocks.len())
            .map(|i| {
                if self.blocks[i].dependencies.is_implicit() {
                    let target = (i > 0).then(|| self.blocks[i - 1].uid);
                    Some(
                        self.implicit_names(i)
                            .into_iter()
                            .map(|name| DependencyRef {
                                name,
                                target,
                            })
                            .collect(),
                    )
                } else {
                    None
                }
            })
            .collect();

        for (block, refs) in self.blocks.iter_mut().zip(materialized) {
            if let Some(refs) = refs {
                block.dependencies = BlockDependencies::Explicit(refs);
            }
        }
    }

    /// Add a dependency edge to a block. Converts the whole pipeline to
    /// explicit mode first; the target list stays deduplicated and sorted.
    pub fn add_dependency(&mut self, uid: Uid, dependency_name: &str) -> Result<()> {
        let index = self
            .block_index(uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        self.make_dependencies_explicit();

        let target = self.find_block_by_name(dependency_name).map(|b| b.uid);
        if let BlockDependencies::Explicit(refs) = &mut self.blocks[index].dependencies {
            if !refs.iter().any(|r| r.name == dependency_name) {
                refs.push(DependencyRef {
                    name: dependency_name.to_string(),
                    target,
                });
            }
            refs.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(())
    }

    /// Remove a dependency edge from a block, converting the whole pipeline
    /// to explicit mode first.
    pub fn remove_dependency(&mut self, uid: Uid, dependency_name: &str) -> Result<()> {
        let index = self
            .block_index(uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        self.make_dependencies_explicit();

        if let BlockDependencies::Explicit(refs) = &mut self.blocks[index].dependencies {
            refs.retain(|r| r.name != dependency_name);
        }
        Ok(())
    }

    /// Would making the block depend on `dependency_name` create a cycle?
    /// Tested against the effective (implicit or explicit) edges.
    pub fn dependency_introduces_cycle(&self, uid: Uid, dependency_name: &str) -> Result<bool> {
        let index = self
            .block_index(uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        let mut g = DirectedGraph::new();

        for block in &self.blocks {
            g.add_node(&block.name);
        }
        for (i, block) in self.blocks.iter().enumerate() {
            for dep in self.dependency_names_at(i) {
                g.add_edge(&dep, &block.name);
            }
        }
        g.add_edge(dependency_name, &self.blocks[index].name);

        Ok(g.has_cycle())
    }

    /// Rename a block and rewrite every sibling dependency list that refers
    /// to it. Referring entries are matched by uid, not by the old name, so
    /// duplicate names never rewrite the wrong edge.
    pub fn rename_block(&mut self, uid: Uid, new_name: &str) -> Result<()> {
        if self.find_block(uid).is_none() {
            return Err(GantryError::EntityNotFound { uid });
        }

        for block in &mut self.blocks {
            if let BlockDependencies::Explicit(refs) = &mut block.dependencies {
                for r in refs.iter_mut() {
                    if r.target == Some(uid) {
                        r.name = new_name.to_string();
                    }
                }
            }
        }

        if let Some(block) = self.find_block_mut(uid) {
            block.name = new_name.to_string();
        }
        self.resolve_dependency_targets();
        Ok(())
    }

    fn resolve_dependency_targets(&mut self) {
        let names: Vec<(String, Uid)> =
            self.blocks.iter().map(|b| (b.name.clone(), b.uid)).collect();

        for block in &mut self.blocks {
            if let BlockDependencies::Explicit(refs) = &mut block.dependencies {
                for r in refs.iter_mut() {
                    r.target = names.iter().find(|(n, _)| *n == r.name).map(|(_, uid)| *uid);
                }
            }
        }
    }

    // ---- structural edits ----

    /// Append a new block named `Block #N` with one starter job. In an
    /// all-explicit pipeline the new block depends on the selected block
    /// when one is given; in a pipeline with implicit dependencies it joins
    /// the implicit chain.
    pub fn create_new_block(&mut self, selected: Option<Uid>) -> Uid {
        let name = format!("Block #{}", self.blocks.len() + 1);

        let dependencies = if self.has_implicit_dependencies() {
            BlockDependencies::Implicit
        } else {
            let selected_ref = selected
                .and_then(|uid| self.find_block(uid))
                .map(|b| DependencyRef::resolved(b.name.clone(), b.uid));
            BlockDependencies::Explicit(selected_ref.into_iter().collect())
        };

        let block = Block::new(name, dependencies);
        let uid = block.uid;
        self.blocks.push(block);
        uid
    }

    /// Remove a block and drop every explicit dependency entry that pointed
    /// at it.
    pub fn remove_block(&mut self, uid: Uid) -> Result<Block> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.uid == uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        let removed = self.blocks.remove(index);

        for block in &mut self.blocks {
            if let BlockDependencies::Explicit(refs) = &mut block.dependencies {
                refs.retain(|r| r.target != Some(uid));
            }
        }
        Ok(removed)
    }

    pub fn change_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn push_promotion(&mut self, promotion: Promotion) -> Uid {
        let uid = promotion.uid;
        self.promotions.push(promotion);
        uid
    }

    pub fn remove_promotion(&mut self, uid: Uid) -> Result<Promotion> {
        let index = self
            .promotions
            .iter()
            .position(|p| p.uid == uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        Ok(self.promotions.remove(index))
    }

    // ---- validation ----

    pub fn validate(&mut self, catalogs: &Catalogs) {
        if self.has_invalid_yaml() {
            return;
        }

        self.errors.reset();

        if self.name.is_empty() {
            self.errors.add("name", "Pipeline name can't be blank.");
        }

        for i in 0..self.blocks.len() {
            let duplicate = self.blocks[..i].iter().any(|b| b.name == self.blocks[i].name);
            let unknown: Vec<String> = self
                .dependency_names_at(i)
                .into_iter()
                .filter(|name| self.find_block_by_name(name).is_none())
                .collect();

            let block = &mut self.blocks[i];
            block.validate(catalogs, duplicate);

            let mut dep_errors = Errors::new();
            for name in unknown {
                dep_errors.add(
                    "names",
                    format!("Dependency \"{name}\" does not match any block in this pipeline."),
                );
            }
            block.errors.add_nested("dependencies", dep_errors);
        }

        for promotion in &mut self.promotions {
            promotion.validate(catalogs);
        }
    }

    /// Map the external validator's failure records onto text positions in
    /// the re-serialized document. Unresolvable records are dropped.
    pub fn resolve_schema_failures(&mut self, failures: &[SchemaFailure]) {
        self.schema_failures.clear();

        let regenerated = match serde_yaml::to_string(&self.structure) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %self.file_path, error = %e, "cannot regenerate document for failure mapping");
                return;
            }
        };
        let lines: Vec<&str> = regenerated.lines().collect();

        for failure in failures {
            match locate::locate_failure(failure, &lines) {
                Some((line, column)) => self.schema_failures.push(LocatedSchemaFailure {
                    failure: failure.clone(),
                    line,
                    column,
                }),
                None => {
                    debug!(
                        path = %self.file_path,
                        instance_path = %failure.instance_path,
                        "dropping schema failure without a position"
                    );
                }
            }
        }
    }

    // ---- serialization ----

    pub fn to_json(&self) -> Value {
        let mut json = self.structure.clone();

        mapping::set(&mut json, "version", Value::String("v1.0".to_string()));
        mapping::set(&mut json, "name", Value::String(self.name.clone()));
        mapping::set(&mut json, "agent", self.agent.to_json());

        set_section(&mut json, "global_job_config", self.global_job_config.is_defined(), || {
            self.global_job_config.to_json()
        });
        set_section(
            &mut json,
            "execution_time_limit",
            self.execution_time_limit.is_defined(),
            || self.execution_time_limit.to_json(),
        );
        set_section(&mut json, "fail_fast", self.fail_fast.is_defined(), || {
            self.fail_fast.to_json()
        });
        set_section(&mut json, "auto_cancel", self.auto_cancel.is_defined(), || {
            self.auto_cancel.to_json()
        });

        mapping::set(
            &mut json,
            "blocks",
            Value::Sequence(self.blocks.iter().map(Block::to_json).collect()),
        );

        set_section(&mut json, "promotions", !self.promotions.is_empty(), || {
            Value::Sequence(self.promotions.iter().map(Promotion::to_json).collect())
        });
        set_section(&mut json, "after_pipeline", self.after_pipeline.is_defined(), || {
            self.after_pipeline.to_json()
        });

        let ordered = mapping::preferred_key_order(
            json,
            &[
                ("version", 1),
                ("name", 2),
                ("agent", 3),
                ("global_job_config", 97),
                ("blocks", 98),
                ("after_pipeline", 99),
                ("promotions", 100),
            ],
            4,
        );

        Value::Mapping(ordered)
    }

    /// The document text to commit. Invalid documents are returned as the
    /// user typed them; valid ones are regenerated from the model. Either
    /// way the original line-ending style is enforced.
    pub fn to_yaml(&self) -> Result<String> {
        let text = if self.has_invalid_yaml() {
            self.yaml.clone()
        } else {
            serde_yaml::to_string(&self.to_json())?
        };

        Ok(line_endings::enforce_line_ending(&text, self.line_ending))
    }

    pub fn has_commitable_changes(&self) -> Result<bool> {
        Ok(self.created_in_editor || self.initial_yaml != self.to_yaml()?)
    }
}

fn set_section(map: &mut Mapping, k: &str, defined: bool, value: impl FnOnce() -> Value) {
    if defined {
        mapping::set(map, k, value());
    } else {
        mapping::remove(map, k);
    }
}
