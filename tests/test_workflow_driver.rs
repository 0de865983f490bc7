/// Tests for the workflow driver and the multi-example harness, using a fake
/// engine in place of the real pipeline
use anyhow::Result;
use cactus_testkit::config::{BatchSystem, TestConfig, TestSize};
use cactus_testkit::harness::{run_workflow_multiple_examples, MultipleExamplesOptions};
use cactus_testkit::sampler::{
    get_cactus_inputs_random, get_cactus_inputs_random_with_constraints, RandomInputsConfig,
};
use cactus_testkit::workflow::{
    run_workflow_test_script, WorkflowOptions, EXPERIMENT_FILE_NAME, STATS_FILE_NAME,
    WORK_DIR_NAME,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::path::PathBuf;
use tempfile::TempDir;

use test_utils::{list_files, RecordingEngine};

fn small_inputs() -> RandomInputsConfig {
    RandomInputsConfig {
        sequence_number: Some(4),
        avg_sequence_length: Some(30),
        tree_leaf_number: Some(2),
    }
}

#[test]
fn test_driver_runs_engine_and_cleans_up() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut rng = StdRng::seed_from_u64(3);
    let inputs = get_cactus_inputs_random(temp_dir.path(), &small_inputs(), &mut rng)?;

    let options = WorkflowOptions {
        test_config: TestConfig::default().with_batch_system("parasol")?,
        build_hal: true,
        build_toil_stats: true,
        ..WorkflowOptions::default()
    };
    let engine = RecordingEngine::default();
    let experiment = run_workflow_test_script(
        &inputs.sequences,
        &inputs.newick,
        temp_dir.path(),
        None,
        &options,
        &engine,
    )?;

    let calls = engine.calls.borrow();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert!(call.experiment_existed);
    assert_eq!(call.experiment_file, temp_dir.path().join(EXPERIMENT_FILE_NAME));
    assert_eq!(call.work_dir, temp_dir.path().join(WORK_DIR_NAME));
    assert!(call.experiment_xml.contains("cactus_workflow_experiment"));
    assert!(call.experiment_xml.contains("kyoto_tycoon"));
    assert!(call.args.contains(&"parasol".to_string()));
    assert!(call.args.contains(&"--buildHal".to_string()));

    let stats = engine.stats_calls.borrow();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].1, temp_dir.path().join(STATS_FILE_NAME));

    // scratch removed, stats report and caller's directory kept
    assert!(!call.work_dir.exists());
    assert!(!call.experiment_file.exists());
    assert!(temp_dir.path().join(STATS_FILE_NAME).exists());
    for dir in &inputs.sequences {
        assert!(dir.exists());
    }

    assert_eq!(experiment.hal_file, temp_dir.path().join("test.hal"));
    assert_eq!(experiment.sequences, inputs.sequences);
    Ok(())
}

#[test]
fn test_driver_cleans_up_when_engine_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut rng = StdRng::seed_from_u64(4);
    let inputs = get_cactus_inputs_random(temp_dir.path(), &small_inputs(), &mut rng)?;

    let engine = RecordingEngine::failing("job 7 failed");
    let options = WorkflowOptions {
        build_toil_stats: true,
        ..WorkflowOptions::default()
    };
    let err = run_workflow_test_script(
        &inputs.sequences,
        &inputs.newick,
        temp_dir.path(),
        None,
        &options,
        &engine,
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "job 7 failed");
    assert!(engine.stats_calls.borrow().is_empty());
    assert!(!temp_dir.path().join(WORK_DIR_NAME).exists());
    assert!(!temp_dir.path().join(EXPERIMENT_FILE_NAME).exists());
    Ok(())
}

#[test]
fn test_harness_runs_each_example_in_fresh_dir() -> Result<()> {
    let root = TempDir::new()?;
    let engine = RecordingEngine::default();
    let options = MultipleExamplesOptions {
        test_number: 3,
        temp_root: Some(root.path().to_path_buf()),
        ..MultipleExamplesOptions::default()
    };

    let rng = RefCell::new(StdRng::seed_from_u64(5));
    let seen: RefCell<Vec<(usize, PathBuf)>> = RefCell::new(Vec::new());
    let ran = run_workflow_multiple_examples(
        |region, dir| {
            seen.borrow_mut().push((region, dir.to_path_buf()));
            get_cactus_inputs_random(dir, &small_inputs(), &mut *rng.borrow_mut())
        },
        &options,
        &engine,
    )?;

    assert_eq!(ran, 3);
    let seen = seen.into_inner();
    assert_eq!(
        seen.iter().map(|(r, _)| *r).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    for (_, dir) in &seen {
        assert_eq!(dir.parent(), Some(root.path()));
        assert!(!dir.exists(), "temp dir {} was not removed", dir.display());
    }
    assert_eq!(engine.calls.borrow().len(), 3);
    assert!(list_files(root.path()).is_empty());
    Ok(())
}

#[test]
fn test_harness_removes_temp_dir_on_failure() -> Result<()> {
    let root = TempDir::new()?;
    let engine = RecordingEngine::failing("boom");
    let options = MultipleExamplesOptions {
        test_number: 2,
        temp_root: Some(root.path().to_path_buf()),
        ..MultipleExamplesOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(6);
    let result = run_workflow_multiple_examples(
        |_, dir| get_cactus_inputs_random(dir, &small_inputs(), &mut rng),
        &options,
        &engine,
    );

    assert!(result.is_err());
    assert_eq!(engine.calls.borrow().len(), 1, "failure stops the loop");
    assert!(list_files(root.path()).is_empty());
    Ok(())
}

#[test]
fn test_harness_constraints_only_when_requested() -> Result<()> {
    for use_constraints in [false, true] {
        let root = TempDir::new()?;
        let engine = RecordingEngine::default();
        let options = MultipleExamplesOptions {
            use_constraints,
            temp_root: Some(root.path().to_path_buf()),
            ..MultipleExamplesOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        run_workflow_multiple_examples(
            |_, dir| get_cactus_inputs_random_with_constraints(dir, &small_inputs(), &mut rng),
            &options,
            &engine,
        )?;
        let xml = engine.calls.borrow()[0].experiment_xml.clone();
        assert_eq!(xml.contains("constraints="), use_constraints);
    }
    Ok(())
}

#[test]
fn test_harness_respects_test_length() -> Result<()> {
    let root = TempDir::new()?;
    let engine = RecordingEngine::default();
    let mut workflow = WorkflowOptions::default();
    workflow.test_config.test_size = TestSize::Short;
    workflow.test_config.batch_system = BatchSystem::SingleMachine;

    let options = MultipleExamplesOptions {
        test_number: 4,
        test_restrictions: vec![TestSize::Long, TestSize::VeryLong],
        temp_root: Some(root.path().to_path_buf()),
        workflow,
        ..MultipleExamplesOptions::default()
    };
    let ran = run_workflow_multiple_examples(
        |_, _| panic!("generator must not run for filtered test lengths"),
        &options,
        &engine,
    )?;
    assert_eq!(ran, 0);
    assert!(engine.calls.borrow().is_empty());

    let inverted = MultipleExamplesOptions {
        inverse_test_restrictions: true,
        test_number: 1,
        ..options
    };
    let mut rng = StdRng::seed_from_u64(8);
    let ran = run_workflow_multiple_examples(
        |_, dir| get_cactus_inputs_random(dir, &small_inputs(), &mut rng),
        &inverted,
        &engine,
    )?;
    assert_eq!(ran, 1);
    Ok(())
}
