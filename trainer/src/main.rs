use std::io;

use clap::Parser;
use log::info;

use trainer::{
    Args, RunConfig,
    data::{Split, source},
    device,
    metrics::ConsoleSink,
    summary::SummaryWriter,
};

fn main() -> io::Result<()> {
    env_logger::init();

    let config = RunConfig::try_from(Args::parse())?;
    println!("args => {config:?}");

    let device = device::select(config.device, config.no_cuda, device::accelerator_available())?;

    let train_set = source::load(config.dataset, &config.data_dir, Split::Train)?;
    let test_set = source::load(config.dataset, &config.data_dir, Split::Test)?;

    let sink = ConsoleSink::new(SummaryWriter::new(&config.dir));
    let report = trainer::run(&config, device, &train_set, &test_set, sink)?;

    info!("done after {} optimizer steps", report.steps);
    Ok(())
}
