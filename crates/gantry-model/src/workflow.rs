//! The editing session root: every pipeline document, the deleted-document
//! list, the selection register, and promotion expansion state.
//!
//! All mutation enters through [`crate::action::Action`] dispatch; the
//! methods here are the operations that dispatch routes to.

use gantry_doc::paths;
use gantry_types::{Catalogs, GantryError, Result, Uid};
use tracing::debug;

use crate::pipeline::Pipeline;
use crate::promotion::Promotion;
use crate::selection::SelectionRegister;

pub struct Workflow {
    pub catalogs: Catalogs,
    pub initial_yaml_path: String,
    pub pipelines: Vec<Pipeline>,
    /// Previously persisted pipelines removed this session, kept for diffing.
    pub deleted_pipelines: Vec<Pipeline>,
    pub selection: SelectionRegister,
    /// Expanded promotions, in chain order from the initial pipeline out.
    expanded: Vec<Uid>,
    observer: Option<Box<dyn FnMut()>>,
}

impl Workflow {
    /// Build a session from `(path, content)` documents. `created_in_editor`
    /// marks documents that do not exist in the commit yet.
    pub fn new(
        catalogs: Catalogs,
        initial_yaml_path: impl Into<String>,
        documents: Vec<(String, String)>,
        created_in_editor: bool,
    ) -> Self {
        let mut workflow = Workflow {
            catalogs,
            initial_yaml_path: initial_yaml_path.into(),
            pipelines: Vec::new(),
            deleted_pipelines: Vec::new(),
            selection: SelectionRegister::new(),
            expanded: Vec::new(),
            observer: None,
        };

        for (path, content) in documents {
            let pipeline = Pipeline::from_yaml(path, &content, created_in_editor);
            workflow.register_pipeline(&pipeline);
            workflow.pipelines.push(pipeline);
        }

        workflow
    }

    /// Install the single change observer. Dispatch notifies it exactly once
    /// per applied action.
    pub fn on_update(&mut self, callback: impl FnMut() + 'static) {
        self.observer = Some(Box::new(callback));
    }

    pub(crate) fn notify(&mut self) {
        if let Some(observer) = &mut self.observer {
            observer();
        }
    }

    fn register_pipeline(&mut self, pipeline: &Pipeline) {
        self.selection.register(pipeline.uid);
        for uid in pipeline.child_uids() {
            self.selection.register(uid);
        }
    }

    fn deregister_pipeline(&mut self, pipeline: &Pipeline) {
        self.selection.deregister(pipeline.uid);
        for uid in pipeline.child_uids() {
            self.selection.deregister(uid);
        }
    }

    // ---- lookup ----

    pub fn find_pipeline_by_path(&self, path: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.file_path == path)
    }

    pub fn pipeline_with_path_exists(&self, path: &str) -> bool {
        self.find_pipeline_by_path(path).is_some()
    }

    pub fn find_pipeline(&self, uid: Uid) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.uid == uid)
    }

    pub fn find_pipeline_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.uid == uid)
            .ok_or(GantryError::EntityNotFound { uid })
    }

    pub fn find_initial_pipeline(&self) -> Result<&Pipeline> {
        self.find_pipeline_by_path(&self.initial_yaml_path)
            .ok_or_else(|| GantryError::PipelineNotFound {
                path: self.initial_yaml_path.clone(),
            })
    }

    /// The pipeline owning the block registered under `uid`.
    pub fn find_pipeline_of_block_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.find_block(uid).is_some())
            .ok_or(GantryError::EntityNotFound { uid })
    }

    /// The pipeline owning the promotion registered under `uid`.
    pub fn find_pipeline_of_promotion_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.find_promotion(uid).is_some())
            .ok_or(GantryError::EntityNotFound { uid })
    }

    fn find_pipeline_of_promotion(&self, uid: Uid) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.find_promotion(uid).is_some())
    }

    /// Pipelines in display order: the initial document first, the rest
    /// sorted by path.
    pub fn naturally_sorted_pipelines(&self) -> Vec<&Pipeline> {
        let mut sorted: Vec<&Pipeline> = self.pipelines.iter().collect();
        sorted.sort_by(|a, b| {
            let a_initial = a.file_path == self.initial_yaml_path;
            let b_initial = b.file_path == self.initial_yaml_path;
            b_initial
                .cmp(&a_initial)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        sorted
    }

    // ---- pipeline lifecycle ----

    /// Delete a pipeline, its referencing promotions, and (recursively) the
    /// targets of its own promotions. The initial pipeline is protected: as
    /// the direct target this is an error, inside a cascade it is skipped.
    pub fn delete_pipeline(&mut self, uid: Uid) -> Result<()> {
        let pipeline = self
            .find_pipeline(uid)
            .ok_or(GantryError::EntityNotFound { uid })?;

        if pipeline.file_path == self.initial_yaml_path {
            return Err(GantryError::CannotDeleteInitialPipeline {
                path: self.initial_yaml_path.clone(),
            });
        }

        self.delete_pipeline_cascading(uid);
        self.prune_dead_expansions();
        Ok(())
    }

    fn delete_pipeline_cascading(&mut self, uid: Uid) {
        let Some(index) = self.pipelines.iter().position(|p| p.uid == uid) else {
            return;
        };

        // Remove from the active list first so promotion loops between
        // documents cannot re-enter this pipeline.
        let pipeline = self.pipelines.remove(index);
        self.deregister_pipeline(&pipeline);

        let path = pipeline.file_path.clone();
        let targets: Vec<String> = pipeline
            .promotions
            .iter()
            .map(|p| p.target_pipeline_path(&pipeline.file_path))
            .collect();

        if !pipeline.created_in_editor {
            self.deleted_pipelines.push(pipeline);
        }

        // Strip promotions in the remaining pipelines that pointed here.
        let doomed: Vec<Uid> = self
            .pipelines
            .iter()
            .flat_map(|p| {
                p.promotions
                    .iter()
                    .filter(|pr| pr.target_pipeline_path(&p.file_path) == path)
                    .map(|pr| pr.uid)
                    .collect::<Vec<_>>()
            })
            .collect();
        for promotion_uid in doomed {
            self.truncate_expansion_at(promotion_uid);
            if let Ok(owner) = self.find_pipeline_of_promotion_mut(promotion_uid) {
                if let Ok(removed) = owner.remove_promotion(promotion_uid) {
                    self.selection.deregister(removed.uid);
                }
            }
        }

        for target in targets {
            if target == self.initial_yaml_path {
                debug!(path = %target, "cascade reached the initial pipeline; skipping");
                continue;
            }
            if let Some(p) = self.find_pipeline_by_path(&target) {
                let target_uid = p.uid;
                self.delete_pipeline_cascading(target_uid);
            }
        }
    }

    /// Add a pipeline document. A path matching a deleted document restores
    /// that document instead of creating a duplicate.
    pub fn add_pipeline(&mut self, file_path: &str) -> Uid {
        if let Some(index) = self
            .deleted_pipelines
            .iter()
            .position(|p| p.file_path == file_path)
        {
            let pipeline = self.deleted_pipelines.remove(index);
            let uid = pipeline.uid;
            self.register_pipeline(&pipeline);
            self.pipelines.push(pipeline);
            return uid;
        }

        let yaml = format!(
            "version: v1.0\n\
             name: Pipeline {}\n\
             blocks:\n  \
               - name: \"Block #1\"\n    \
                 task:\n      \
                   jobs:\n        \
                     - name: \"Job #1\"\n          \
                       commands:\n            \
                         - echo \"job 1\"\n",
            self.pipelines.len() + 1
        );

        let pipeline = Pipeline::from_yaml(file_path, &yaml, true);
        let uid = pipeline.uid;
        self.register_pipeline(&pipeline);
        self.pipelines.push(pipeline);
        uid
    }

    /// Add a promotion to a pipeline together with its target document.
    pub fn add_promotion(&mut self, pipeline_uid: Uid) -> Result<Uid> {
        let next_pipeline = self.pipelines.len() + 1;
        let pipeline = self.find_pipeline_mut(pipeline_uid)?;

        let name = format!("Promotion {}", pipeline.promotions.len() + 1);
        let file = format!("pipeline_{next_pipeline}.yml");

        let promotion = Promotion::new(name, file.clone());
        let promotion_uid = pipeline.push_promotion(promotion);
        self.selection.register(promotion_uid);

        self.add_pipeline(&format!(".semaphore/{file}"));
        Ok(promotion_uid)
    }

    /// Remove a promotion and cascade-delete its target document.
    pub fn remove_promotion(&mut self, promotion_uid: Uid) -> Result<()> {
        let owner = self.find_pipeline_of_promotion_mut(promotion_uid)?;
        let owner_path = owner.file_path.clone();
        let removed = owner.remove_promotion(promotion_uid)?;
        self.selection.deregister(removed.uid);
        self.truncate_expansion_at(promotion_uid);

        let target = removed.target_pipeline_path(&owner_path);
        if target == self.initial_yaml_path {
            debug!(path = %target, "promotion targeted the initial pipeline; keeping it");
        } else if let Some(p) = self.find_pipeline_by_path(&target) {
            let uid = p.uid;
            self.delete_pipeline_cascading(uid);
        }
        self.prune_dead_expansions();
        Ok(())
    }

    /// Move a pipeline document, rewriting every promotion reference to it.
    pub fn change_pipeline_file_path(&mut self, uid: Uid, new_path: &str) -> Result<()> {
        let pipeline = self
            .find_pipeline(uid)
            .ok_or(GantryError::EntityNotFound { uid })?;
        let old_path = pipeline.file_path.clone();

        if old_path == self.initial_yaml_path {
            return Err(GantryError::CannotMoveInitialPipeline { path: old_path });
        }

        for p in &mut self.pipelines {
            let owner_path = p.file_path.clone();
            for promotion in &mut p.promotions {
                if paths::resolve_reference(&owner_path, &promotion.target_pipeline_file) == old_path
                {
                    promotion.retarget(&owner_path, new_path);
                }
            }
        }

        self.find_pipeline_mut(uid)?.file_path = new_path.to_string();
        Ok(())
    }

    /// Replace a pipeline's document text, keeping the selection register in
    /// step with the rebuilt children.
    pub fn update_pipeline_yaml(&mut self, uid: Uid, yaml_content: &str) -> Result<()> {
        let pipeline = self.find_pipeline_mut(uid)?;
        let before = pipeline.child_uids();
        pipeline.update_yaml(yaml_content);
        let after = pipeline.child_uids();

        for gone in &before {
            if !after.contains(gone) {
                self.selection.deregister(*gone);
            }
        }
        for added in after {
            self.selection.register(added);
        }
        Ok(())
    }

    // ---- diffing ----

    /// Paths a commit must delete: removed documents plus the original paths
    /// of renamed documents, unless another document occupies the path now.
    pub fn deleted_pipeline_file_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();

        for p in &self.deleted_pipelines {
            if !self.pipeline_with_path_exists(&p.file_path) && !out.contains(&p.file_path) {
                out.push(p.file_path.clone());
            }
        }
        for p in &self.pipelines {
            if p.is_path_changed_from_initial()
                && !self.pipeline_with_path_exists(&p.initial_file_path)
                && !out.contains(&p.initial_file_path)
            {
                out.push(p.initial_file_path.clone());
            }
        }
        out
    }

    pub fn commitable_change_count(&self) -> Result<usize> {
        let mut changed = 0;
        for p in &self.pipelines {
            if p.has_commitable_changes()? {
                changed += 1;
            }
        }
        Ok(changed + self.deleted_pipelines.len())
    }

    pub fn has_commitable_changes(&self) -> Result<bool> {
        Ok(self.commitable_change_count()? > 0)
    }

    // ---- promotion expansion ----

    pub fn is_expanded(&self, promotion_uid: Uid) -> bool {
        self.expanded.contains(&promotion_uid)
    }

    /// Expand a promotion. An already expanded promotion of the same owning
    /// pipeline is collapsed first, so each pipeline contributes at most one
    /// link to the chain.
    pub fn expand(&mut self, promotion_uid: Uid) -> Result<()> {
        let owner = self
            .find_pipeline_of_promotion(promotion_uid)
            .ok_or(GantryError::EntityNotFound { uid: promotion_uid })?
            .uid;

        let same_owner = self.expanded.iter().copied().find(|&uid| {
            self.find_pipeline_of_promotion(uid)
                .is_some_and(|p| p.uid == owner)
        });
        if let Some(uid) = same_owner {
            self.truncate_expansion_at(uid);
        }

        self.expanded.push(promotion_uid);
        Ok(())
    }

    /// Collapse a promotion and everything expanded after it.
    pub fn collapse(&mut self, promotion_uid: Uid) {
        self.truncate_expansion_at(promotion_uid);
    }

    fn truncate_expansion_at(&mut self, promotion_uid: Uid) {
        if let Some(index) = self.expanded.iter().position(|&uid| uid == promotion_uid) {
            self.expanded.truncate(index);
        }
    }

    fn prune_dead_expansions(&mut self) {
        if let Some(index) = self
            .expanded
            .iter()
            .position(|&uid| !self.selection.is_registered(uid))
        {
            self.expanded.truncate(index);
        }
    }

    /// Drop the expansion chain from the first promotion whose owning
    /// pipeline no longer parses.
    pub fn recalibrate_expansion(&mut self) {
        let stale = self.expanded.iter().position(|&uid| {
            self.find_pipeline_of_promotion(uid)
                .map_or(true, |p| p.has_invalid_yaml())
        });
        if let Some(index) = stale {
            self.expanded.truncate(index);
        }
    }

    /// The displayed chain: the initial pipeline followed by the target of
    /// each expanded promotion.
    pub fn expanded_pipelines(&self) -> Result<Vec<&Pipeline>> {
        let mut out = vec![self.find_initial_pipeline()?];

        for &uid in &self.expanded {
            let Some(owner) = self.find_pipeline_of_promotion(uid) else {
                continue;
            };
            let promotion = owner.find_promotion(uid).expect("owner lookup matched");
            let target = promotion.target_pipeline_path(&owner.file_path);
            match self.find_pipeline_by_path(&target) {
                Some(p) => out.push(p),
                None => debug!(path = %target, "expanded promotion target is missing"),
            }
        }
        Ok(out)
    }

    // ---- validation ----

    pub fn validate(&mut self) {
        self.recalibrate_expansion();

        let catalogs = &self.catalogs;
        for i in 0..self.pipelines.len() {
            // unknown-dependency checks need sibling lookup, so validation
            // runs per pipeline with the catalogs passed in
            self.pipelines[i].validate(catalogs);
        }
    }
}
