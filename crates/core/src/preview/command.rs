use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::config::PreviewConfig;

use super::{PreviewBuilder, PreviewError};

/// Renders the first page of a PDF to PNG with an external program
/// (`pdftoppm` from poppler by default).
#[derive(Debug, Clone)]
pub struct CommandPreviewBuilder {
    program: String,
    dpi: u32,
    timeout_secs: u64,
}

impl CommandPreviewBuilder {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            program: config.program.clone(),
            dpi: config.dpi,
            timeout_secs: config.timeout_secs,
        }
    }

    /// `pdftoppm` appends the extension to the output root itself.
    fn build_args(&self, primary: &Path, output_root: &Path) -> Vec<String> {
        vec![
            "-png".to_string(),
            "-r".to_string(),
            self.dpi.to_string(),
            "-f".to_string(),
            "1".to_string(),
            "-l".to_string(),
            "1".to_string(),
            "-singlefile".to_string(),
            primary.to_string_lossy().to_string(),
            output_root.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl PreviewBuilder for CommandPreviewBuilder {
    async fn build_preview(
        &self,
        primary: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, PreviewError> {
        if !primary.exists() {
            return Err(PreviewError::InputNotFound {
                path: primary.to_path_buf(),
            });
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "preview".to_string());
        let output_root = output_dir.join(format!("{}-cover", stem));
        let output_path = output_root.with_extension("png");

        let child = Command::new(&self.program)
            .args(self.build_args(primary, &output_root))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PreviewError::ProgramNotFound {
                        program: self.program.clone(),
                    }
                } else {
                    PreviewError::Io(e)
                }
            })?;

        let output = match timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            // Dropping the future kills the child.
            Err(_) => {
                return Err(PreviewError::Timeout {
                    timeout_secs: self.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PreviewError::render_failed(
                format!("{} exited with code: {:?}", self.program, output.status.code()),
                if stderr.is_empty() { None } else { Some(stderr) },
            ));
        }

        match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.len() > 0 => {
                debug!("Built preview {}", output_path.display());
                Ok(output_path)
            }
            _ => Err(PreviewError::render_failed(
                "Output image not created",
                None,
            )),
        }
    }
}
