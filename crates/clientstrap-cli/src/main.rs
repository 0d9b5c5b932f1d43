mod config;
mod inputs;
mod logging;
mod outputs;
mod render;
mod workflow;

use anyhow::{bail, Result};
use clap::Parser;
use clientstrap_installer::ClientLayout;
use tracing::info;

use crate::config::Settings;
use crate::inputs::Inputs;
use crate::outputs::OutputSink;
use crate::workflow::RunContext;

#[tokio::main]
async fn main() -> Result<()> {
    let inputs = Inputs::parse();
    logging::init(inputs.is_debug);
    info!("Initializing...");

    inputs.validate()?;
    let settings = Settings::load(inputs.settings.as_deref())?;
    let layout = ClientLayout::from_env()?;
    let ctx = RunContext::new(inputs, settings, layout)?;
    let sink = OutputSink::from_env();

    tokio::select! {
        result = workflow::run(&ctx, &sink) => result?,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    }

    info!("Done!");
    Ok(())
}

#[cfg(test)]
mod tests;
