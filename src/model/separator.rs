use std::{fs, path::Path, process::Command};

use tracing::{debug, info};

use crate::{
    error::{PipelineError, Result},
    model::{StemPaths, StemSeparator},
    utils::{spleeter_command, spleeter_model},
};

/// Five-stem separation through the `spleeter` command line tool.
pub struct SpleeterSeparator {
    command: String,
    model: String,
}

impl SpleeterSeparator {
    pub fn new() -> Self {
        Self {
            command: spleeter_command(),
            model: spleeter_model(),
        }
    }

    pub fn with_command(command: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
        }
    }
}

impl Default for SpleeterSeparator {
    fn default() -> Self {
        Self::new()
    }
}

impl StemSeparator for SpleeterSeparator {
    fn separate(&self, input: &Path, output_dir: &Path) -> Result<StemPaths> {
        fs::create_dir_all(output_dir)?;

        let file_stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::decode(input, "input path has no file name"))?;

        info!(input = %input.display(), model = %self.model, "running stem separation");
        debug!(output = %output_dir.display(), "expecting stems");

        let output = Command::new(&self.command)
            .arg("separate")
            .arg("-p")
            .arg(&self.model)
            .arg("-o")
            .arg(output_dir)
            .arg("-f")
            .arg("{filename}/{instrument}.{codec}")
            .arg(input)
            .output()
            .map_err(|e| {
                PipelineError::Separation(format!("failed to run `{}`: {e}", self.command))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Separation(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(StemPaths::in_dir(&output_dir.join(file_stem)))
    }
}
