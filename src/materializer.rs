use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::WorkspaceConfig;
use crate::metrics::{RuntimeMetrics, METRICS};
use crate::schema::Payload;
use crate::util;

/// Passing this name writes the samples straight into the root.
pub const CURRENT_DIR: &str = ".";

/// Turns payloads into problem directories.
///
/// Layout of one problem:
///
/// ```text
/// <root>/<name>_<timestamp>/
///     <name>.cpp          (from the template, if any)
///     problem.json
///     sample1.in
///     sample1.out
///     ...
/// ```
pub struct Materializer {
    root: PathBuf,
    template_dir: PathBuf,
    source_extension: String,
    timestamp_dirs: bool,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>, cfg: &WorkspaceConfig) -> Self {
        let root = root.into();
        Self {
            template_dir: root.join(&cfg.template_dir),
            root,
            source_extension: cfg.source_extension.trim_start_matches('.').to_string(),
            timestamp_dirs: cfg.timestamp_dirs,
        }
    }

    /// Directory a problem called `name` is written to.
    pub fn problem_dir(&self, name: &str) -> PathBuf {
        if name == CURRENT_DIR {
            return self.root.clone();
        }
        if self.timestamp_dirs {
            self.root.join(format!("{}_{}", name, util::timestamp_suffix()))
        } else {
            self.root.join(name)
        }
    }

    /// Creates (or reuses) the problem directory and writes the samples.
    ///
    /// An existing directory is reused as is; the template is only
    /// copied into freshly created ones.
    pub fn materialize(&self, payload: &Payload, name: &str) -> Result<PathBuf> {
        let dir = self.problem_dir(name);

        if name == CURRENT_DIR {
            info!("Using current directory...");
        } else if dir.is_dir() {
            info!("Already created problem {}...", name);
        } else {
            info!("Creating problem {}...", name);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            self.apply_template(&dir, name)?;
        }

        info!("Saving samples...");
        save_samples(payload, &dir)?;

        RuntimeMetrics::incr(&METRICS.problems_written);
        Ok(dir)
    }

    fn apply_template(&self, dir: &Path, name: &str) -> Result<()> {
        if !self.template_dir.is_dir() {
            warn!("Template directory '{}' does not exist.", self.template_dir.display());
            return Ok(());
        }

        let entries = fs::read_dir(&self.template_dir)
            .with_context(|| format!("failed to read template {}", self.template_dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let item = entry.path();

            if item.is_dir() {
                let target = dir.join(entry.file_name());
                copy_dir_all(&item, &target)?;
                debug!("Copied directory: {} to {}", item.display(), target.display());
            } else if item.is_file() {
                let target = if self.is_source(&item) {
                    dir.join(format!("{}.{}", name, self.source_extension))
                } else {
                    dir.join(entry.file_name())
                };
                fs::copy(&item, &target)
                    .with_context(|| format!("failed to copy {}", item.display()))?;
                debug!("Copied file: {} to {}", item.display(), target.display());
            }
        }
        Ok(())
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.to_string_lossy() == self.source_extension)
    }
}

/// Writes `problem.json` plus one `sampleN.in`/`sampleN.out` pair per test.
fn save_samples(payload: &Payload, dir: &Path) -> Result<()> {
    let json = serde_json::to_string(payload.as_value())?;
    fs::write(dir.join("problem.json"), json)
        .with_context(|| format!("failed to write problem.json in {}", dir.display()))?;

    let problem = payload
        .problem()
        .context("payload does not describe a problem")?;

    for (i, t) in problem.tests.iter().enumerate() {
        let n = i + 1;
        fs::write(dir.join(format!("sample{n}.in")), &t.input)?;
        fs::write(dir.join(format!("sample{n}.out")), &t.output)?;
    }
    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("failed to copy {}", from.display()))?;
        }
    }
    Ok(())
}
