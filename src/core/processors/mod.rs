// ─── Processor Pipeline ───
// Runs the manifest's post-install tools strictly in order. Each step may
// consume the files produced by the previous one, so the first failure
// stops the chain.

mod jar;
mod runner;
mod tokens;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::downloader::{file_satisfies, Checksum};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::profile::{InstallManifest, InstallerBundle, ProcessorOutput, ProcessorStep, RunCondition, Side};
use crate::core::progress::ProgressSink;

pub use jar::read_main_class;
pub use runner::{Invocation, ProcessOutput, ProcessRunner, SystemRunner, OUTPUT_TAIL};
pub use tokens::{resolve_argument, resolve_data_value, substitute, Tokens, DATA_DIR};

#[cfg(test)]
pub(crate) use runner::testing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorReport {
    pub ran: usize,
    pub skipped: usize,
}

pub struct ProcessorPipeline {
    side: Side,
    root: PathBuf,
    minecraft: String,
    steps: Vec<ProcessorStep>,
    data: Tokens,
    bundle: Option<InstallerBundle>,
    java: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    sink: Arc<dyn ProgressSink>,
}

impl ProcessorPipeline {
    /// Pipeline for the processors of `manifest` that apply to `side`,
    /// installing into `root`.
    pub fn new(
        manifest: &InstallManifest,
        side: Side,
        root: impl Into<PathBuf>,
        runner: Arc<dyn ProcessRunner>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            side,
            root: root.into(),
            minecraft: manifest.minecraft.clone(),
            steps: manifest.processors_for(side).cloned().collect(),
            data: manifest.data_for(side),
            bundle: None,
            java: PathBuf::from("java"),
            runner,
            sink,
        }
    }

    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    pub fn with_bundle(mut self, bundle: Option<InstallerBundle>) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step. Stops at, and reports, the first failing one.
    pub async fn process(&self, libraries_root: &Path, base_artifact: &Path) -> InstallerResult<ProcessorReport> {
        let mut report = ProcessorReport::default();
        if self.steps.is_empty() {
            return Ok(report);
        }

        let tokens = self.tokens(libraries_root, base_artifact)?;
        let total = self.steps.len();

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.jar.to_string();

            if self.outputs_satisfied(step, &tokens, libraries_root).await? {
                info!("Skipping processor {}: outputs already present", name);
                self.sink.message(&format!("Skipping {name}, outputs up to date"));
                report.skipped += 1;
                self.sink.progress((index + 1) as f64 / total as f64);
                continue;
            }

            let invocation = self.invocation(step, &tokens, libraries_root)?;
            self.sink.message(&format!("Running processor {name}"));
            info!("Running processor {} ({}/{})", name, index + 1, total);

            let output = self
                .runner
                .run(&invocation, self.sink.as_ref())
                .await
                .map_err(|e| InstallerError::ProcessorFailed {
                    step: name.clone(),
                    code: None,
                    output: e.to_string(),
                })?;

            if !output.success() {
                return Err(InstallerError::ProcessorFailed {
                    step: name,
                    code: output.code,
                    output: output.tail.join("\n"),
                });
            }

            self.verify_outputs(step, &name, &tokens, libraries_root).await?;
            report.ran += 1;
            self.sink.progress((index + 1) as f64 / total as f64);
        }

        Ok(report)
    }

    /// Manifest data merged with run-time values; run-time values win.
    fn tokens(&self, libraries_root: &Path, base_artifact: &Path) -> InstallerResult<Tokens> {
        let data_dir = self.root.join(DATA_DIR);
        let mut tokens = Tokens::new();
        for (key, value) in &self.data {
            let resolved = resolve_data_value(key, value, libraries_root, self.bundle.as_ref(), &data_dir)?;
            tokens.insert(key.clone(), resolved);
        }

        tokens.insert("SIDE".into(), self.side.to_string());
        tokens.insert("ROOT".into(), path_token(&self.root));
        tokens.insert("LIBRARY_DIR".into(), path_token(libraries_root));
        tokens.insert("MINECRAFT_JAR".into(), path_token(base_artifact));
        tokens.insert("MINECRAFT_VERSION".into(), self.minecraft.clone());
        if let Some(bundle) = &self.bundle {
            tokens.insert("INSTALLER".into(), path_token(bundle.path()));
        }
        Ok(tokens)
    }

    fn invocation(&self, step: &ProcessorStep, tokens: &Tokens, libraries_root: &Path) -> InstallerResult<Invocation> {
        let name = step.jar.to_string();
        let executable = libraries_root.join(step.jar.local_path());
        require_present(&name, &executable)?;

        let args = step
            .args
            .iter()
            .map(|arg| resolve_argument(arg, tokens, libraries_root))
            .collect::<InstallerResult<Vec<_>>>()?;

        if !step.jar.is_jar() {
            return Ok(Invocation {
                program: executable,
                args,
                working_dir: Some(self.root.clone()),
            });
        }

        let mut classpath = vec![executable.clone()];
        for entry in &step.classpath {
            let path = libraries_root.join(entry.local_path());
            require_present(&name, &path)?;
            classpath.push(path);
        }
        let classpath = std::env::join_paths(&classpath)
            .map_err(|e| InstallerError::Other(format!("Invalid classpath for {name}: {e}")))?;

        let main_class = read_main_class(&executable)?;
        debug!("Processor {} main class {}", name, main_class);

        let mut java_args = vec![
            "-cp".to_string(),
            classpath.to_string_lossy().to_string(),
            main_class,
        ];
        java_args.extend(args);

        Ok(Invocation {
            program: self.java.clone(),
            args: java_args,
            working_dir: Some(self.root.clone()),
        })
    }

    async fn outputs_satisfied(&self, step: &ProcessorStep, tokens: &Tokens, libraries_root: &Path) -> InstallerResult<bool> {
        let RunCondition::IfOutputsMissing(outputs) = &step.condition else {
            return Ok(false);
        };
        for output in outputs {
            let (path, checksum) = resolve_output(output, tokens, libraries_root)?;
            if !file_satisfies(&path, checksum.as_ref()).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn verify_outputs(&self, step: &ProcessorStep, name: &str, tokens: &Tokens, libraries_root: &Path) -> InstallerResult<()> {
        let RunCondition::IfOutputsMissing(outputs) = &step.condition else {
            return Ok(());
        };

        let mut problems = Vec::new();
        for output in outputs {
            let (path, checksum) = resolve_output(output, tokens, libraries_root)?;
            if !file_satisfies(&path, checksum.as_ref()).await? {
                problems.push(match checksum {
                    Some(c) if path.exists() => format!("{} does not match {}", path.display(), c),
                    _ => format!("{} was not produced", path.display()),
                });
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(InstallerError::ProcessorFailed {
                step: name.to_string(),
                code: Some(0),
                output: problems.join("\n"),
            })
        }
    }
}

fn resolve_output(
    output: &ProcessorOutput,
    tokens: &Tokens,
    libraries_root: &Path,
) -> InstallerResult<(PathBuf, Option<Checksum>)> {
    let path = PathBuf::from(resolve_argument(&output.path, tokens, libraries_root)?);
    let checksum = match &output.checksum {
        Some(template) => {
            let resolved = resolve_argument(template, tokens, libraries_root)?;
            Checksum::parse_optional(Some(resolved.as_str()))?
        }
        None => None,
    };
    Ok((path, checksum))
}

fn path_token(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn require_present(step: &str, path: &Path) -> InstallerResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(InstallerError::ProcessorFailed {
            step: step.to_string(),
            code: None,
            output: format!("missing {}", path.display()),
        })
    }
}
