//! Demo-run command handler.

use clap::Args;
use manifold_core::{config::AppConfig, AppResult};
use manifold_prompt::demo::{dump_demo_results, render_demo, write_demo_results};
use std::path::PathBuf;

/// Render a manifest with demo data to validate prompt outputs
#[derive(Args, Debug)]
pub struct DemoRunCommand {
    /// Manifest path
    #[arg(long)]
    pub manifest: PathBuf,

    /// Demo data JSON path
    #[arg(long)]
    pub data: PathBuf,

    /// Output path (defaults to stdout)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl DemoRunCommand {
    /// Execute the demo-run command.
    pub fn execute(&self, _config: &AppConfig) -> AppResult<()> {
        let results = render_demo(&self.manifest, &self.data)?;
        tracing::info!("Rendered {} demo entries", results.len());

        match &self.out {
            Some(out) => write_demo_results(&results, out)?,
            None => println!("{}", dump_demo_results(&results)?),
        }
        Ok(())
    }
}
