//! Compile command handler.

use clap::Args;
use manifold_core::{config::AppConfig, AppResult};
use manifold_prompt::compile;
use std::path::PathBuf;

/// Compile prompts to a manifest
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// Source prompts root
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Output manifest path
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl CompileCommand {
    /// Execute the compile command.
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let src = match &self.src {
            Some(path) => path.clone(),
            None => config.require_source_root()?.clone(),
        };
        let out = match &self.out {
            Some(path) => path.clone(),
            None => config.require_manifest_out()?.clone(),
        };

        tracing::info!("Compiling {} -> {}", src.display(), out.display());
        let manifest = compile(&src, &out)?;
        println!(
            "Compiled {} prompts -> {}",
            manifest.prompts.len(),
            out.display()
        );
        Ok(())
    }
}
