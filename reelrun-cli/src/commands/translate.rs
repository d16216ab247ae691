// ============================================================================
// reelrun-cli/src/commands/translate.rs
// ============================================================================
//
// TRANSLATE COMMAND: Subtitle Translation With a Required API Key

use std::sync::Arc;

use reelrun_core::pipelines::{TranslateOptions, TranslatePipeline};
use reelrun_core::{batch_job, check_dependencies, CoreConfig, Job, ToolSpawner};

use super::program_of;
use crate::cli::TranslateArgs;
use crate::usage_error;
use crate::error::CliResult;

/// Key variable read when `--api-key` and `GEMINI_API_KEY` are both unset.
pub const FALLBACK_KEY_VAR: &str = "GST_API_KEY";

pub fn build_job(args: TranslateArgs, config: &CoreConfig, spawner: Arc<dyn ToolSpawner>) -> CliResult<Job> {
    let api_key = require_api_key(args.api_key, std::env::var(FALLBACK_KEY_VAR).ok())?;
    check_dependencies(&[program_of(&config.tools.translator)])?;

    let pipeline = TranslatePipeline::new(TranslateOptions {
        inputs: args.inputs,
        language: args.language,
        api_key: Some(api_key),
        api_key2: args.api_key2.filter(|k| !k.trim().is_empty()),
        iso_suffix: args.iso_suffix,
    });
    Ok(batch_job(spawner, Box::new(pipeline)))
}

/// The key from `--api-key`/`GEMINI_API_KEY`, else from the fallback
/// variable. Blank values count as unset; no key at all is an error, since
/// the translator cannot run without one.
fn require_api_key(explicit: Option<String>, fallback: Option<String>) -> CliResult<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(|| fallback.filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| {
            usage_error!("No translator API key: pass --api-key, or set GEMINI_API_KEY or {FALLBACK_KEY_VAR}")
        })
}
