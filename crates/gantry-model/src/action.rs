//! Centralized mutation dispatch.
//!
//! Every edit enters the model as one [`Action`] applied through
//! [`Workflow::apply`]. Apply routes the action to the owning entity, and on
//! success notifies the single change observer exactly once, which is what
//! keeps the consumer at one re-render per mutation. A failed action mutates
//! nothing and notifies nobody.
//!
//! While a document's text does not parse, its children are a stale snapshot
//! kept only for rendering; structural actions against such a document are
//! refused with [`GantryError::DocumentUnparsed`]. Replacing the text
//! (`UpdatePipelineYaml`) and document-lifecycle actions stay available.

use gantry_types::{GantryError, Result, Uid};
use tracing::trace;

use crate::agent::{Agent, EnvironmentType};
use crate::block::Block;
use crate::job::MatrixEntry;
use crate::pipeline::Pipeline;
use crate::promotion::Parameter;
use crate::settings::TimeUnit;
use crate::workflow::Workflow;

/// Which agent an agent-editing action addresses: a pipeline's global agent
/// or one block's override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentScope {
    Pipeline(Uid),
    Block(Uid),
}

#[derive(Debug, Clone)]
pub enum Action {
    // document lifecycle
    UpdatePipelineYaml { pipeline: Uid, yaml: String },
    ChangePipelineName { pipeline: Uid, name: String },
    ChangePipelineFilePath { pipeline: Uid, path: String },
    AddPipeline { path: String },
    DeletePipeline { pipeline: Uid },

    // blocks
    CreateBlock { pipeline: Uid },
    RemoveBlock { block: Uid },
    RenameBlock { block: Uid, name: String },
    AddDependency { block: Uid, on: String },
    RemoveDependency { block: Uid, on: String },
    ChangeSkipCondition { block: Uid, condition: String },
    ChangeRunCondition { block: Uid, condition: String },
    ClearConditions { block: Uid },
    SetAgentOverride { block: Uid, enabled: bool },
    ChangeBlockPrologue { block: Uid, commands: Vec<String> },
    ChangeBlockEpilogueAlways { block: Uid, commands: Vec<String> },
    ChangeBlockEpilogueOnPass { block: Uid, commands: Vec<String> },
    ChangeBlockEpilogueOnFail { block: Uid, commands: Vec<String> },

    // jobs
    AddJob { block: Uid },
    RemoveJob { block: Uid, index: usize },
    ChangeJobName { block: Uid, index: usize, name: String },
    ChangeJobCommands { block: Uid, index: usize, commands: Vec<String> },
    ChangeJobParallelism { block: Uid, index: usize, count: i64 },
    DisableJobParallelism { block: Uid, index: usize },
    ChangeJobMatrix { block: Uid, index: usize, matrix: Vec<MatrixEntry> },
    DisableJobMatrix { block: Uid, index: usize },

    // secrets and environment variables
    AddSecret { block: Uid, name: String },
    RemoveSecret { block: Uid, name: String },
    AddEnvVar { block: Uid, name: String, value: String },
    ChangeEnvVar { block: Uid, index: usize, name: String, value: String },
    RemoveEnvVar { block: Uid, index: usize },

    // agents
    ChangeEnvironmentType { scope: AgentScope, target: EnvironmentType },
    ChangeMachineType { scope: AgentScope, machine_type: String },
    ChangeOsImage { scope: AgentScope, os_image: String },
    AddContainer { scope: AgentScope },
    RemoveContainer { scope: AgentScope, index: usize },
    ChangeContainerName { scope: AgentScope, index: usize, name: String },
    ChangeContainerImage { scope: AgentScope, index: usize, image: String },

    // pipeline settings
    SetExecutionTimeLimit { pipeline: Uid, value: i64, unit: TimeUnit },
    ClearExecutionTimeLimit { pipeline: Uid },
    ChangeFailFast { pipeline: Uid, stop_when: String, cancel_when: String },
    ChangeAutoCancel { pipeline: Uid, running_when: String, queued_when: String },
    ChangeGlobalPrologue { pipeline: Uid, commands: Vec<String> },
    ChangeGlobalEpilogueAlways { pipeline: Uid, commands: Vec<String> },
    ChangeGlobalEpilogueOnPass { pipeline: Uid, commands: Vec<String> },
    ChangeGlobalEpilogueOnFail { pipeline: Uid, commands: Vec<String> },

    // promotions
    AddPromotion { pipeline: Uid },
    RemovePromotion { promotion: Uid },
    ChangePromotionName { promotion: Uid, name: String },
    ChangeDeploymentTarget { promotion: Uid, target: String },
    EnableAutoPromote { promotion: Uid },
    DisableAutoPromote { promotion: Uid },
    ChangeAutoPromoteCondition { promotion: Uid, condition: String },
    AddParameter { promotion: Uid, name: String },
    UpdateParameter { promotion: Uid, index: usize, parameter: Parameter },
    RemoveParameter { promotion: Uid, index: usize },

    // selection and expansion
    Select { uid: Uid },
    ClearSelection,
    Expand { promotion: Uid },
    Collapse { promotion: Uid },
}

impl Workflow {
    /// Apply one action. On success the change observer fires once.
    pub fn apply(&mut self, action: Action) -> Result<()> {
        trace!(?action, "applying");
        self.route(action)?;
        self.notify();
        Ok(())
    }

    fn route(&mut self, action: Action) -> Result<()> {
        use Action::*;

        match action {
            UpdatePipelineYaml { pipeline, yaml } => self.update_pipeline_yaml(pipeline, &yaml)?,
            ChangePipelineName { pipeline, name } => {
                self.parsed_pipeline_mut(pipeline)?.change_name(name);
            }
            ChangePipelineFilePath { pipeline, path } => {
                self.change_pipeline_file_path(pipeline, &path)?;
            }
            AddPipeline { path } => {
                self.add_pipeline(&path);
            }
            DeletePipeline { pipeline } => self.delete_pipeline(pipeline)?,

            CreateBlock { pipeline } => {
                let selected = self.selection.selected();
                let uid = self.parsed_pipeline_mut(pipeline)?.create_new_block(selected);
                self.selection.register(uid);
            }
            RemoveBlock { block } => {
                let pipeline = self.parsed_pipeline_of_block_mut(block)?;
                pipeline.remove_block(block)?;
                self.selection.deregister(block);
            }
            RenameBlock { block, name } => {
                self.parsed_pipeline_of_block_mut(block)?.rename_block(block, &name)?;
            }
            AddDependency { block, on } => {
                self.parsed_pipeline_of_block_mut(block)?.add_dependency(block, &on)?;
            }
            RemoveDependency { block, on } => {
                self.parsed_pipeline_of_block_mut(block)?.remove_dependency(block, &on)?;
            }
            ChangeSkipCondition { block, condition } => {
                self.block_mut(block)?.change_skip_condition(condition);
            }
            ChangeRunCondition { block, condition } => {
                self.block_mut(block)?.change_run_condition(condition);
            }
            ClearConditions { block } => self.block_mut(block)?.clear_conditions(),
            SetAgentOverride { block, enabled } => {
                let block = self.block_mut(block)?;
                if enabled {
                    block.enable_agent_override();
                } else {
                    block.disable_agent_override();
                }
            }
            ChangeBlockPrologue { block, commands } => {
                self.block_mut(block)?.prologue = commands;
            }
            ChangeBlockEpilogueAlways { block, commands } => {
                self.block_mut(block)?.epilogue_always = commands;
            }
            ChangeBlockEpilogueOnPass { block, commands } => {
                self.block_mut(block)?.epilogue_on_pass = commands;
            }
            ChangeBlockEpilogueOnFail { block, commands } => {
                self.block_mut(block)?.epilogue_on_fail = commands;
            }

            AddJob { block } => self.block_mut(block)?.add_job(),
            RemoveJob { block, index } => self.block_mut(block)?.remove_job(index),
            ChangeJobName { block, index, name } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.change_name(name);
                }
            }
            ChangeJobCommands { block, index, commands } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.change_commands(commands);
                }
            }
            ChangeJobParallelism { block, index, count } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.change_parallelism(count);
                }
            }
            DisableJobParallelism { block, index } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.disable_parallelism();
                }
            }
            ChangeJobMatrix { block, index, matrix } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.change_matrix(matrix);
                }
            }
            DisableJobMatrix { block, index } => {
                if let Some(job) = self.block_mut(block)?.jobs.get_mut(index) {
                    job.disable_matrix();
                }
            }

            AddSecret { block, name } => self.block_mut(block)?.secrets.add(name),
            RemoveSecret { block, name } => self.block_mut(block)?.secrets.remove(&name),
            AddEnvVar { block, name, value } => {
                self.block_mut(block)?.env_vars.add(name, value);
            }
            ChangeEnvVar { block, index, name, value } => {
                self.block_mut(block)?.env_vars.change(index, name, value);
            }
            RemoveEnvVar { block, index } => self.block_mut(block)?.env_vars.remove(index),

            ChangeEnvironmentType { scope, target } => {
                self.with_agent(scope, |agent, catalog| {
                    agent.change_environment_type(target, catalog)
                })??;
            }
            ChangeMachineType { scope, machine_type } => {
                self.with_agent(scope, |agent, catalog| {
                    agent.change_machine_type(machine_type, catalog);
                })?;
            }
            ChangeOsImage { scope, os_image } => {
                self.with_agent(scope, |agent, _| agent.change_os_image(os_image))?;
            }
            AddContainer { scope } => {
                self.with_agent(scope, |agent, _| agent.add_container())?;
            }
            RemoveContainer { scope, index } => {
                self.with_agent(scope, |agent, _| agent.remove_container(index))?;
            }
            ChangeContainerName { scope, index, name } => {
                self.with_agent(scope, |agent, _| agent.change_container_name(index, name))?;
            }
            ChangeContainerImage { scope, index, image } => {
                self.with_agent(scope, |agent, _| agent.change_container_image(index, image))?;
            }

            SetExecutionTimeLimit { pipeline, value, unit } => {
                self.parsed_pipeline_mut(pipeline)?.execution_time_limit.set(value, unit);
            }
            ClearExecutionTimeLimit { pipeline } => {
                self.parsed_pipeline_mut(pipeline)?.execution_time_limit.clear();
            }
            ChangeFailFast { pipeline, stop_when, cancel_when } => {
                let fail_fast = &mut self.parsed_pipeline_mut(pipeline)?.fail_fast;
                fail_fast.stop_when = stop_when;
                fail_fast.cancel_when = cancel_when;
            }
            ChangeAutoCancel { pipeline, running_when, queued_when } => {
                let auto_cancel = &mut self.parsed_pipeline_mut(pipeline)?.auto_cancel;
                auto_cancel.running_when = running_when;
                auto_cancel.queued_when = queued_when;
            }
            ChangeGlobalPrologue { pipeline, commands } => {
                self.parsed_pipeline_mut(pipeline)?.global_job_config.prologue = commands;
            }
            ChangeGlobalEpilogueAlways { pipeline, commands } => {
                self.parsed_pipeline_mut(pipeline)?.global_job_config.epilogue_always = commands;
            }
            ChangeGlobalEpilogueOnPass { pipeline, commands } => {
                self.parsed_pipeline_mut(pipeline)?.global_job_config.epilogue_on_pass = commands;
            }
            ChangeGlobalEpilogueOnFail { pipeline, commands } => {
                self.parsed_pipeline_mut(pipeline)?.global_job_config.epilogue_on_fail = commands;
            }

            AddPromotion { pipeline } => {
                self.parsed_pipeline_mut(pipeline)?;
                self.add_promotion(pipeline)?;
            }
            RemovePromotion { promotion } => {
                self.parsed_pipeline_of_promotion_mut(promotion)?;
                self.remove_promotion(promotion)?;
            }
            ChangePromotionName { promotion, name } => {
                self.promotion_mut(promotion)?.change_name(name);
            }
            ChangeDeploymentTarget { promotion, target } => {
                self.promotion_mut(promotion)?.change_deployment_target(target);
            }
            EnableAutoPromote { promotion } => {
                self.promotion_mut(promotion)?.auto_promote.enable();
            }
            DisableAutoPromote { promotion } => {
                self.promotion_mut(promotion)?.auto_promote.disable();
            }
            ChangeAutoPromoteCondition { promotion, condition } => {
                self.promotion_mut(promotion)?.auto_promote.set_condition(condition);
            }
            AddParameter { promotion, name } => {
                self.promotion_mut(promotion)?.add_parameter(name);
            }
            UpdateParameter { promotion, index, parameter } => {
                self.promotion_mut(promotion)?.update_parameter(index, parameter);
            }
            RemoveParameter { promotion, index } => {
                self.promotion_mut(promotion)?.remove_parameter(index);
            }

            Select { uid } => {
                if !self.selection.select(uid) {
                    return Err(GantryError::EntityNotFound { uid });
                }
            }
            ClearSelection => self.selection.clear_selection(),
            Expand { promotion } => self.expand(promotion)?,
            Collapse { promotion } => self.collapse(promotion),
        }

        Ok(())
    }

    fn parsed(pipeline: &mut Pipeline) -> Result<&mut Pipeline> {
        if pipeline.has_invalid_yaml() {
            return Err(GantryError::DocumentUnparsed);
        }
        Ok(pipeline)
    }

    fn parsed_pipeline_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        Self::parsed(self.find_pipeline_mut(uid)?)
    }

    fn parsed_pipeline_of_block_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        Self::parsed(self.find_pipeline_of_block_mut(uid)?)
    }

    fn parsed_pipeline_of_promotion_mut(&mut self, uid: Uid) -> Result<&mut Pipeline> {
        Self::parsed(self.find_pipeline_of_promotion_mut(uid)?)
    }

    fn block_mut(&mut self, uid: Uid) -> Result<&mut Block> {
        let pipeline = self.parsed_pipeline_of_block_mut(uid)?;
        Ok(pipeline.find_block_mut(uid).expect("owner lookup matched"))
    }

    fn promotion_mut(&mut self, uid: Uid) -> Result<&mut crate::promotion::Promotion> {
        let pipeline = self.parsed_pipeline_of_promotion_mut(uid)?;
        Ok(pipeline.find_promotion_mut(uid).expect("owner lookup matched"))
    }

    fn with_agent<R>(
        &mut self,
        scope: AgentScope,
        f: impl FnOnce(&mut Agent, &gantry_types::AgentCatalog) -> R,
    ) -> Result<R> {
        let catalog = &self.catalogs.agents;
        let pipelines = &mut self.pipelines;

        match scope {
            AgentScope::Pipeline(uid) => {
                let pipeline = pipelines
                    .iter_mut()
                    .find(|p| p.uid == uid)
                    .ok_or(GantryError::EntityNotFound { uid })?;
                let pipeline = Self::parsed(pipeline)?;
                Ok(f(&mut pipeline.agent, catalog))
            }
            AgentScope::Block(uid) => {
                let pipeline = pipelines
                    .iter_mut()
                    .find(|p| p.find_block(uid).is_some())
                    .ok_or(GantryError::EntityNotFound { uid })?;
                let pipeline = Self::parsed(pipeline)?;
                let block = pipeline.find_block_mut(uid).expect("owner lookup matched");
                Ok(f(&mut block.agent, catalog))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_types::Catalogs;
    use std::cell::Cell;
    use std::rc::Rc;

    const DOC: &str = "\
version: v1.0
name: Build
agent:
  machine:
    type: e1-standard-2
    os_image: ubuntu2004
blocks:
- name: A
  task:
    jobs:
    - name: Job 1
      commands:
      - make
- name: B
  task:
    jobs: []
";

    fn workflow() -> Workflow {
        Workflow::new(
            Catalogs::default(),
            ".semaphore/semaphore.yml",
            vec![(".semaphore/semaphore.yml".to_string(), DOC.to_string())],
            false,
        )
    }

    #[test]
    fn observer_fires_once_per_applied_action() {
        let mut wf = workflow();
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        wf.on_update(move || seen.set(seen.get() + 1));

        let pipeline = wf.find_initial_pipeline().unwrap().uid;
        wf.apply(Action::ChangePipelineName {
            pipeline,
            name: "CI".to_string(),
        })
        .unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(wf.find_initial_pipeline().unwrap().name, "CI");
    }

    #[test]
    fn failed_action_does_not_notify() {
        let mut wf = workflow();
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        wf.on_update(move || seen.set(seen.get() + 1));

        let ghost = Uid::new();
        assert!(wf
            .apply(Action::RenameBlock {
                block: ghost,
                name: "x".to_string(),
            })
            .is_err());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn block_actions_route_by_uid_across_the_workflow() {
        let mut wf = workflow();
        let block = wf.find_initial_pipeline().unwrap().blocks[0].uid;

        wf.apply(Action::AddJob { block }).unwrap();
        wf.apply(Action::ChangeJobCommands {
            block,
            index: 1,
            commands: vec!["make test".to_string()],
        })
        .unwrap();

        let b = wf.find_initial_pipeline().unwrap().find_block(block).unwrap();
        assert_eq!(b.jobs.len(), 2);
        assert_eq!(b.jobs[1].commands, vec!["make test"]);
    }

    #[test]
    fn dependency_actions_materialize_through_dispatch() {
        let mut wf = workflow();
        let block = wf.find_initial_pipeline().unwrap().blocks[1].uid;

        wf.apply(Action::AddDependency {
            block,
            on: "A".to_string(),
        })
        .unwrap();

        let p = wf.find_initial_pipeline().unwrap();
        assert!(!p.has_implicit_dependencies());
        assert_eq!(p.dependency_names(block), vec!["A"]);
    }

    #[test]
    fn create_block_uses_the_current_selection() {
        let mut wf = workflow();
        let pipeline = wf.find_initial_pipeline().unwrap().uid;
        let block = wf.find_initial_pipeline().unwrap().blocks[0].uid;
        let second = wf.find_initial_pipeline().unwrap().blocks[1].uid;

        // explicit mode first, then select A and create
        wf.apply(Action::AddDependency {
            block: second,
            on: "A".to_string(),
        })
        .unwrap();
        wf.apply(Action::Select { uid: block }).unwrap();
        wf.apply(Action::CreateBlock { pipeline }).unwrap();

        let p = wf.find_initial_pipeline().unwrap();
        assert_eq!(p.blocks[2].name, "Block #3");
        assert_eq!(p.dependency_names(p.blocks[2].uid), vec!["A"]);
    }

    #[test]
    fn selecting_an_unregistered_uid_is_an_error() {
        let mut wf = workflow();
        assert!(matches!(
            wf.apply(Action::Select { uid: Uid::new() }),
            Err(GantryError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn agent_scope_reaches_pipeline_and_block_agents() {
        let mut wf = workflow();
        let pipeline = wf.find_initial_pipeline().unwrap().uid;
        let block = wf.find_initial_pipeline().unwrap().blocks[0].uid;

        wf.apply(Action::ChangeOsImage {
            scope: AgentScope::Pipeline(pipeline),
            os_image: "ubuntu1804".to_string(),
        })
        .unwrap();
        wf.apply(Action::SetAgentOverride { block, enabled: true }).unwrap();
        wf.apply(Action::ChangeOsImage {
            scope: AgentScope::Block(block),
            os_image: "ubuntu2204".to_string(),
        })
        .unwrap();

        let p = wf.find_initial_pipeline().unwrap();
        assert_eq!(p.agent.os_image, "ubuntu1804");
        assert_eq!(p.find_block(block).unwrap().agent.os_image, "ubuntu2204");
    }

    #[test]
    fn settings_actions_reach_the_value_objects() {
        let mut wf = workflow();
        let pipeline = wf.find_initial_pipeline().unwrap().uid;

        wf.apply(Action::SetExecutionTimeLimit {
            pipeline,
            value: 2,
            unit: TimeUnit::Hours,
        })
        .unwrap();
        wf.apply(Action::ChangeFailFast {
            pipeline,
            stop_when: "branch != 'master'".to_string(),
            cancel_when: String::new(),
        })
        .unwrap();

        let p = wf.find_initial_pipeline().unwrap();
        assert!(p.execution_time_limit.is_defined());
        assert_eq!(p.fail_fast.stop_when, "branch != 'master'");
    }

    #[test]
    fn promotion_actions_round_trip_through_dispatch() {
        let mut wf = workflow();
        let pipeline = wf.find_initial_pipeline().unwrap().uid;

        wf.apply(Action::AddPromotion { pipeline }).unwrap();
        let promotion = wf.find_initial_pipeline().unwrap().promotions[0].uid;

        wf.apply(Action::EnableAutoPromote { promotion }).unwrap();
        wf.apply(Action::AddParameter {
            promotion,
            name: "ENV".to_string(),
        })
        .unwrap();

        let p = &wf.find_initial_pipeline().unwrap().promotions[0];
        assert!(p.auto_promote.is_enabled());
        assert_eq!(p.parameters[0].name, "ENV");
        assert!(wf.pipeline_with_path_exists(".semaphore/pipeline_2.yml"));
    }

    #[test]
    fn structural_edits_are_refused_while_the_document_does_not_parse() {
        let mut wf = workflow();
        let pipeline = wf.find_initial_pipeline().unwrap().uid;
        let block = wf.find_initial_pipeline().unwrap().blocks[0].uid;

        wf.apply(Action::UpdatePipelineYaml {
            pipeline,
            yaml: "blocks: [oops\n".to_string(),
        })
        .unwrap();
        assert!(wf.find_initial_pipeline().unwrap().has_invalid_yaml());

        // the stale children are a rendering snapshot, not an editing surface
        assert!(matches!(
            wf.apply(Action::CreateBlock { pipeline }),
            Err(GantryError::DocumentUnparsed)
        ));
        assert!(matches!(
            wf.apply(Action::AddJob { block }),
            Err(GantryError::DocumentUnparsed)
        ));
        assert!(matches!(
            wf.apply(Action::ChangeOsImage {
                scope: AgentScope::Pipeline(pipeline),
                os_image: "ubuntu2204".to_string(),
            }),
            Err(GantryError::DocumentUnparsed)
        ));
        assert_eq!(wf.find_initial_pipeline().unwrap().blocks.len(), 2);

        // replacing the text again is the way out
        wf.apply(Action::UpdatePipelineYaml {
            pipeline,
            yaml: DOC.to_string(),
        })
        .unwrap();
        wf.apply(Action::CreateBlock { pipeline }).unwrap();
        assert_eq!(wf.find_initial_pipeline().unwrap().blocks.len(), 3);
    }
}
