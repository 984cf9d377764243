//! Compiles a [`Pipeline`] into the Kubeflow Pipelines v2 intermediate representation.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    PipelineErr, Result,
    graph::{Pipeline, Task},
};

pub const SCHEMA_VERSION: &str = "2.1.0";
pub const SDK_VERSION: &str = concat!("mnist-pipeline-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    pub components: BTreeMap<String, ComponentSpec>,
    pub deployment_spec: DeploymentSpec,
    pub pipeline_info: PipelineInfo,
    pub root: RootSpec,
    pub schema_version: String,
    pub sdk_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub executor_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub executors: BTreeMap<String, ExecutorSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub container: ContainerIr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerIr {
    pub args: Vec<String>,
    pub command: Vec<String>,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootSpec {
    pub dag: DagSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagSpec {
    pub tasks: BTreeMap<String, TaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub caching_options: CachingOptions,
    pub component_ref: ComponentRef,
    pub task_info: TaskInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingOptions {
    pub enable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
}

/// Compiles `pipeline`, one component and one executor per task.
///
/// # Returns
/// An error if the pipeline is unnamed, has no tasks, or two tasks share a name.
pub fn compile(pipeline: &Pipeline) -> Result<PipelineSpec> {
    validate(pipeline)?;

    let mut components = BTreeMap::new();
    let mut executors = BTreeMap::new();
    let mut tasks = BTreeMap::new();

    for task in &pipeline.tasks {
        let component = format!("comp-{}", task.name);
        let executor = format!("exec-{}", task.name);

        components.insert(
            component.clone(),
            ComponentSpec {
                executor_label: executor.clone(),
            },
        );
        executors.insert(executor, executor_of(task));
        tasks.insert(
            task.name.clone(),
            TaskSpec {
                caching_options: CachingOptions { enable_cache: true },
                component_ref: ComponentRef { name: component },
                task_info: TaskInfo {
                    name: task.name.clone(),
                },
            },
        );
    }

    Ok(PipelineSpec {
        components,
        deployment_spec: DeploymentSpec { executors },
        pipeline_info: PipelineInfo {
            name: pipeline.name.clone(),
        },
        root: RootSpec {
            dag: DagSpec { tasks },
        },
        schema_version: SCHEMA_VERSION.to_string(),
        sdk_version: SDK_VERSION.to_string(),
    })
}

/// Compiles `pipeline` and writes it as YAML to `path`.
pub fn compile_to_file(pipeline: &Pipeline, path: &Path) -> Result<PipelineSpec> {
    let spec = compile(pipeline)?;
    fs::write(path, serde_yaml::to_string(&spec)?)?;
    info!("compiled {} to {}", pipeline.name, path.display());
    Ok(spec)
}

fn executor_of(task: &Task) -> ExecutorSpec {
    ExecutorSpec {
        container: ContainerIr {
            args: task.container.args.clone(),
            command: task.container.command.clone(),
            image: task.container.image.clone(),
        },
    }
}

fn validate(pipeline: &Pipeline) -> Result<()> {
    if pipeline.name.is_empty() {
        return Err(PipelineErr::InvalidPipeline("the pipeline has no name".into()));
    }

    if pipeline.tasks.is_empty() {
        return Err(PipelineErr::InvalidPipeline(format!(
            "{} has no tasks",
            pipeline.name
        )));
    }

    let mut seen = HashSet::new();
    for task in &pipeline.tasks {
        if task.name.is_empty() || !seen.insert(task.name.as_str()) {
            return Err(PipelineErr::InvalidPipeline(format!(
                "task name {:?} is empty or repeated",
                task.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::ContainerSpec, mnist::model_pipeline};

    #[test]
    fn one_task_one_component_one_executor() {
        let spec = compile(&model_pipeline()).unwrap();

        assert_eq!(spec.pipeline_info.name, "model-pipeline");
        assert_eq!(spec.schema_version, "2.1.0");
        assert_eq!(spec.components["comp-model-train"].executor_label, "exec-model-train");

        let container = &spec.deployment_spec.executors["exec-model-train"].container;
        assert_eq!(
            container.image,
            "jaganacr10212024.azurecr.io/kubeflow/pipeline-example:latest"
        );
        assert_eq!(container.command, ["/bin/sh"]);
        assert_eq!(container.args, ["-c", "mnist --epochs 2 --no-cuda --save-model"]);

        let task = &spec.root.dag.tasks["model-train"];
        assert_eq!(task.component_ref.name, "comp-model-train");
    }

    #[test]
    fn yaml_uses_ir_field_names() {
        let spec = compile(&model_pipeline()).unwrap();
        let yaml = serde_yaml::to_string(&spec).unwrap();

        for key in ["deploymentSpec:", "executorLabel:", "pipelineInfo:", "schemaVersion:"] {
            assert!(yaml.contains(key), "missing {key} in\n{yaml}");
        }

        let back: PipelineSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn empty_and_duplicated_graphs_are_rejected() {
        let container = ContainerSpec::new("busybox", ["true"], Vec::<String>::new());

        assert!(compile(&Pipeline::new("p")).is_err());
        assert!(
            compile(
                &Pipeline::new("p")
                    .task("a", container.clone())
                    .task("a", container)
            )
            .is_err()
        );
    }
}
