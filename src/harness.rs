//! Repeated generate → run → clean up cycles, gated by test length.

use crate::config::TestSize;
use crate::sampler::CactusInputs;
use crate::workflow::{run_workflow_test_script, WorkflowEngine, WorkflowOptions};
use anyhow::{Context, Result};
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct MultipleExamplesOptions {
    pub test_number: usize,
    /// Test lengths at which the examples run.
    pub test_restrictions: Vec<TestSize>,
    /// Run only when the current test length is *not* restricted.
    pub inverse_test_restrictions: bool,
    /// Pass generated constraints on to the workflow.
    pub use_constraints: bool,
    /// Parent of the per-iteration temp dirs; the current dir when `None`.
    pub temp_root: Option<PathBuf>,
    pub workflow: WorkflowOptions,
}

impl Default for MultipleExamplesOptions {
    fn default() -> Self {
        MultipleExamplesOptions {
            test_number: 1,
            test_restrictions: TestSize::ALL.to_vec(),
            inverse_test_restrictions: false,
            use_constraints: false,
            temp_root: None,
            workflow: WorkflowOptions::default(),
        }
    }
}

/// Restriction set for tests that should skip short runs.
pub fn not_short() -> Vec<TestSize> {
    vec![TestSize::Short]
}

impl MultipleExamplesOptions {
    /// Whether a run at `current` should execute the examples.
    pub fn should_run(&self, current: TestSize) -> bool {
        self.test_restrictions.contains(&current) != self.inverse_test_restrictions
    }
}

/// Run `options.test_number` examples of `generator` through the workflow.
///
/// The generator receives the iteration number as region number and a fresh
/// temp dir, which is removed after the iteration whether it succeeds or
/// fails. Returns how many examples ran (zero when the current test length
/// is filtered out).
pub fn run_workflow_multiple_examples<G, E>(
    mut generator: G,
    options: &MultipleExamplesOptions,
    engine: &E,
) -> Result<usize>
where
    G: FnMut(usize, &Path) -> Result<CactusInputs>,
    E: WorkflowEngine + ?Sized,
{
    let current = options.workflow.test_config.test_size;
    if !options.should_run(current) {
        info!(
            "Skipping {} examples at test length {:?}",
            options.test_number, current
        );
        return Ok(0);
    }

    let temp_root = match &options.temp_root {
        Some(root) => root.clone(),
        None => env::current_dir().context("Failed to get current dir")?,
    };

    for test in 0..options.test_number {
        let temp_dir = tempfile::Builder::new()
            .prefix("cactus_test_")
            .tempdir_in(&temp_root)
            .with_context(|| format!("Failed to create temp dir in {}", temp_root.display()))?;
        run_example(&mut generator, test, &temp_dir, options, engine)?;
        info!("Finished random test {test}");
    }
    Ok(options.test_number)
}

fn run_example<G, E>(
    generator: &mut G,
    test: usize,
    temp_dir: &TempDir,
    options: &MultipleExamplesOptions,
    engine: &E,
) -> Result<()>
where
    G: FnMut(usize, &Path) -> Result<CactusInputs>,
    E: WorkflowEngine + ?Sized,
{
    let inputs = generator(test, temp_dir.path())
        .with_context(|| format!("Failed to generate inputs for example {test}"))?;
    let constraints = if options.use_constraints {
        inputs.constraints.as_deref()
    } else {
        None
    };
    run_workflow_test_script(
        &inputs.sequences,
        &inputs.newick,
        temp_dir.path(),
        constraints,
        &options.workflow,
        engine,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_run() {
        let all = MultipleExamplesOptions::default();
        for size in TestSize::ALL {
            assert!(all.should_run(size));
        }

        let long_only = MultipleExamplesOptions {
            test_restrictions: vec![TestSize::Long, TestSize::VeryLong],
            ..MultipleExamplesOptions::default()
        };
        assert!(!long_only.should_run(TestSize::Short));
        assert!(long_only.should_run(TestSize::Long));

        let skip_short = MultipleExamplesOptions {
            test_restrictions: not_short(),
            inverse_test_restrictions: true,
            ..MultipleExamplesOptions::default()
        };
        assert!(!skip_short.should_run(TestSize::Short));
        assert!(skip_short.should_run(TestSize::Medium));
    }
}
