use std::{io, path::Path};

use log::info;

use pipeline::{
    KfpClient, PipelineConfig, compiler,
    mnist::{PACKAGE_FILE, model_pipeline},
};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = PipelineConfig::from_env();
    info!("package path {:?}", config.package_path);

    let package = Path::new(PACKAGE_FILE);
    compiler::compile_to_file(&model_pipeline(), package)?;

    let client = KfpClient::new(&config)?;
    let run = client.create_run_from_pipeline_package(package).await?;

    info!("run details: {}", client.run_url(&run.run_id));
    Ok(())
}
