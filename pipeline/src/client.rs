use std::path::Path;

use chrono::Local;
use log::{debug, info};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{PipelineConfig, PipelineErr, Result};

pub const DEFAULT_EXPERIMENT: &str = "Default";

const EXPERIMENTS: &str = "apis/v2beta1/experiments";
const RUNS: &str = "apis/v2beta1/runs";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExperimentList {
    #[serde(default)]
    experiments: Vec<Experiment>,
}

/// A run as returned by the pipeline service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Run {
    pub run_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
struct CreateRun<'a> {
    display_name: String,
    experiment_id: &'a str,
    pipeline_spec: Value,
    runtime_config: Value,
}

/// A client of the Kubeflow Pipelines v2beta1 REST API.
#[derive(Debug, Clone)]
pub struct KfpClient {
    http: Client,
    api_host: String,
    ui_host: String,
}

impl KfpClient {
    /// Creates a new `KfpClient` talking to the endpoints in `config`.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            ui_host: config.ui_host.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the link to a run's page in the pipelines UI.
    pub fn run_url(&self, run_id: &str) -> String {
        format!("{}/#/runs/details/{run_id}", self.ui_host)
    }

    /// Finds the experiment called `name`, creating it if it doesn't exist.
    pub async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let filter = json!({
            "predicates": [{
                "key": "display_name",
                "operation": "EQUALS",
                "string_value": name,
            }]
        });

        let resp = self
            .http
            .get(self.url(EXPERIMENTS))
            .query(&[("filter", filter.to_string())])
            .send()
            .await?;
        let list: ExperimentList = parse(resp).await?;

        if let Some(experiment) = list.experiments.into_iter().find(|e| e.display_name == name) {
            debug!("found experiment {}", experiment.experiment_id);
            return Ok(experiment);
        }

        info!("creating experiment {name}");
        let resp = self
            .http
            .post(self.url(EXPERIMENTS))
            .json(&json!({ "display_name": name }))
            .send()
            .await?;
        parse(resp).await
    }

    /// Submits a compiled pipeline package as a new run of the `Default` experiment.
    ///
    /// # Arguments
    /// * `package` - The path of the compiled YAML package.
    ///
    /// # Returns
    /// The created run. The run isn't waited for.
    pub async fn create_run_from_pipeline_package(&self, package: &Path) -> Result<Run> {
        let yaml = tokio::fs::read_to_string(package).await?;
        let spec: Value = serde_yaml::from_str(&yaml)?;

        let pipeline_name = spec
            .pointer("/pipelineInfo/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PipelineErr::InvalidPipeline(format!("{} has no pipeline name", package.display()))
            })?;

        let display_name = format!(
            "{pipeline_name} {}",
            Local::now().format("%Y-%m-%d %H-%M-%S")
        );

        let experiment = self.get_or_create_experiment(DEFAULT_EXPERIMENT).await?;

        let body = CreateRun {
            display_name,
            experiment_id: &experiment.experiment_id,
            pipeline_spec: spec,
            runtime_config: json!({ "parameters": {} }),
        };

        let resp = self.http.post(self.url(RUNS)).json(&body).send().await?;
        let run: Run = parse(resp).await?;

        info!("created run {} ({})", run.run_id, run.display_name);
        Ok(run)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_host)
    }
}

/// Deserializes a successful response, turning any other status into `PipelineErr::Api`.
async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(PipelineErr::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}
