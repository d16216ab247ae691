// ============================================================================
// reelrun-cli/src/config.rs
// ============================================================================
//
// CORE CONFIGURATION: Global Options to `CoreConfig`

use std::time::Duration;

use reelrun_core::{CoreConfig, SuccessPolicy};

use crate::cli::GlobalArgs;
use crate::usage_error;
use crate::error::CliResult;

/// Longest grace window accepted on the command line.
pub const MAX_GRACE_SECS: f64 = 600.0;

pub fn build_core_config(global: &GlobalArgs) -> CliResult<CoreConfig> {
    if !global.grace_secs.is_finite() || global.grace_secs <= 0.0 || global.grace_secs > MAX_GRACE_SECS {
        return Err(usage_error!(
            "--grace-secs must be between 0 and {MAX_GRACE_SECS}, got {}",
            global.grace_secs
        ));
    }

    let mut builder = CoreConfig::builder().grace_window(Duration::from_secs_f64(global.grace_secs));
    if global.strict {
        builder = builder.success_policy(SuccessPolicy::AllSucceeded);
    }
    if let Some(program) = &global.ffmpeg {
        builder = builder.ffmpeg(program);
    }
    if let Some(program) = &global.ffprobe {
        builder = builder.ffprobe(program);
    }
    if let Some(program) = &global.downloader {
        builder = builder.downloader(program);
    }
    if let Some(program) = &global.translator {
        builder = builder.translator(program);
    }
    if let Some(script) = &global.transcriber_script {
        builder = builder.transcriber_script(script);
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn global(args: &[&str]) -> GlobalArgs {
        let mut argv = vec!["reelrun"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["clean", "subs"]);
        Cli::parse_from(argv).global
    }

    #[test]
    fn test_overrides_reach_core_config() {
        let config = build_core_config(&global(&[
            "--grace-secs",
            "1.5",
            "--ffmpeg",
            "/opt/ffmpeg/bin/ffmpeg",
            "--strict",
        ]))
        .unwrap();
        assert_eq!(config.grace_window, Duration::from_millis(1500));
        assert_eq!(config.tools.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.success_policy, SuccessPolicy::AllSucceeded);
    }

    #[test]
    fn test_rejects_out_of_range_grace() {
        assert!(build_core_config(&global(&["--grace-secs", "0"])).is_err());
        assert!(build_core_config(&global(&["--grace-secs", "900"])).is_err());
    }
}
