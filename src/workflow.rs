//! Running the external workflow engine on generated inputs.

use crate::binary_paths::{
    find_binary, DEFAULT_STATS_BIN, DEFAULT_WORKFLOW_BIN, STATS_BIN_ENV, WORKFLOW_BIN_ENV,
};
use crate::config::TestConfig;
use crate::experiment::ExperimentDescriptor;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const EXPERIMENT_FILE_NAME: &str = "experiment.xml";
pub const WORK_DIR_NAME: &str = "toil";
pub const STATS_FILE_NAME: &str = "toilStats.xml";

/// Options of a single workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub test_config: TestConfig,
    pub build_avgs: bool,
    pub build_reference: bool,
    pub build_hal: bool,
    pub build_fasta: bool,
    /// Ask the job tree for a statistics report after the run.
    pub build_toil_stats: bool,
    pub config_file: Option<PathBuf>,
    pub progressive: bool,
    pub log_level: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        WorkflowOptions {
            test_config: TestConfig::default(),
            build_avgs: false,
            build_reference: false,
            build_hal: false,
            build_fasta: false,
            build_toil_stats: false,
            config_file: None,
            progressive: false,
            log_level: "DEBUG".to_string(),
        }
    }
}

impl WorkflowOptions {
    /// Command-line flags for the workflow entry point.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--batchSystem".to_string(),
            self.test_config.batch_system.name().to_string(),
            "--logLevel".to_string(),
            self.log_level.clone(),
        ];
        let flags = [
            (self.build_avgs, "--buildAvgs"),
            (self.build_reference, "--buildReference"),
            (self.build_hal, "--buildHal"),
            (self.build_fasta, "--buildFasta"),
            (self.build_toil_stats, "--stats"),
        ];
        args.extend(
            flags
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| flag.to_string()),
        );
        args
    }
}

/// The external workflow engine. Implementations block until the run is over.
pub trait WorkflowEngine {
    fn run_workflow(
        &self,
        experiment_file: &Path,
        work_dir: &Path,
        options: &WorkflowOptions,
    ) -> Result<()>;

    /// Write a statistics report for the job tree in `work_dir`.
    fn run_stats(&self, work_dir: &Path, output: &Path) -> Result<()>;
}

/// Runs the engine as subprocesses.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    workflow_bin: PathBuf,
    stats_bin: PathBuf,
}

impl CommandEngine {
    pub fn new(workflow_bin: PathBuf, stats_bin: PathBuf) -> Self {
        CommandEngine {
            workflow_bin,
            stats_bin,
        }
    }

    /// Locate the executables through the environment or `PATH`.
    pub fn from_env() -> Result<Self> {
        Ok(CommandEngine::new(
            find_binary(DEFAULT_WORKFLOW_BIN, WORKFLOW_BIN_ENV)?,
            find_binary(DEFAULT_STATS_BIN, STATS_BIN_ENV)?,
        ))
    }

    fn run(&self, command: &mut Command, what: &str) -> Result<()> {
        debug!("Running {command:?}");
        let output = command
            .output()
            .with_context(|| format!("Failed to launch {what}"))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{what} stdout:\n{}", stdout.trim_end());
        }
        if !output.status.success() {
            bail!(
                "{} failed with {}:\n{}",
                what,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(())
    }
}

impl WorkflowEngine for CommandEngine {
    fn run_workflow(
        &self,
        experiment_file: &Path,
        work_dir: &Path,
        options: &WorkflowOptions,
    ) -> Result<()> {
        let mut command = Command::new(&self.workflow_bin);
        command
            .arg("--experiment")
            .arg(experiment_file)
            .arg(work_dir)
            .args(options.to_args());
        self.run(&mut command, "cactus workflow")
    }

    fn run_stats(&self, work_dir: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.stats_bin);
        command
            .arg("stats")
            .arg(work_dir)
            .arg("--outputFile")
            .arg(output);
        self.run(&mut command, "job tree stats")
    }
}

/// Removes the listed paths when dropped, whichever way the scope exits.
struct ScratchPaths(Vec<PathBuf>);

impl Drop for ScratchPaths {
    fn drop(&mut self) {
        for path in &self.0 {
            let result = if path.is_dir() {
                fs::remove_dir_all(path)
            } else if path.exists() {
                fs::remove_file(path)
            } else {
                continue;
            };
            if let Err(e) = result {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Write the experiment for `sequences`/`newick` into `output_dir`, run the
/// engine on it and optionally collect job statistics.
///
/// The work dir (`output_dir/toil`) and experiment file are removed on every
/// exit path; `output_dir` itself is left to the caller. Engine errors are
/// returned unchanged.
pub fn run_workflow_test_script<E: WorkflowEngine + ?Sized>(
    sequences: &[PathBuf],
    newick: &str,
    output_dir: &Path,
    constraints: Option<&Path>,
    options: &WorkflowOptions,
    engine: &E,
) -> Result<ExperimentDescriptor> {
    info!("Running cactus workflow test script");
    info!(
        "Got the following sequence dirs/files: {}",
        sequences
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    info!("Got the following tree {}", newick.trim());
    info!("Using the output dir: {}", output_dir.display());

    let experiment = ExperimentDescriptor::for_test(
        sequences,
        newick,
        output_dir,
        &options.test_config,
        options.config_file.as_deref(),
        constraints,
        options.progressive,
    );

    let experiment_file = output_dir.join(EXPERIMENT_FILE_NAME);
    let work_dir = output_dir.join(WORK_DIR_NAME);
    let _scratch = ScratchPaths(vec![work_dir.clone(), experiment_file.clone()]);

    experiment.write_xml(&experiment_file)?;
    info!("The experiment file {}", experiment_file.display());
    info!("Got a job tree dir for the test: {}", work_dir.display());

    engine.run_workflow(&experiment_file, &work_dir, options)?;
    info!("Ran the workflow");

    if options.build_toil_stats {
        let stats_file = output_dir.join(STATS_FILE_NAME);
        engine.run_stats(&work_dir, &stats_file)?;
        info!("Wrote job tree stats to {}", stats_file.display());
    }

    Ok(experiment)
}
