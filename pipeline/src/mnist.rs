use crate::graph::{ContainerSpec, Pipeline};

pub const PIPELINE_NAME: &str = "model-pipeline";
pub const TRAIN_TASK: &str = "model-train";
pub const TRAIN_IMAGE: &str = "jaganacr10212024.azurecr.io/kubeflow/pipeline-example:latest";

/// The compiled package's file name, written next to the invocation.
pub const PACKAGE_FILE: &str = "mnist_pipeline.yaml";

/// The one-step pipeline training the MNIST classifier inside its container.
pub fn model_pipeline() -> Pipeline {
    let train = ContainerSpec::new(
        TRAIN_IMAGE,
        ["/bin/sh"],
        ["-c", "mnist --epochs 2 --no-cuda --save-model"],
    );

    Pipeline::new(PIPELINE_NAME).task(TRAIN_TASK, train)
}
