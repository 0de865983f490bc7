use anyhow::{Context, Result};
use cactus_testkit::capture::silent_on_success;
use cactus_testkit::cigar::check_cigar;
use cactus_testkit::config::TestConfig;
use cactus_testkit::constraints::{make_random_constraints, write_constraints};
use cactus_testkit::harness::{run_workflow_multiple_examples, MultipleExamplesOptions};
use cactus_testkit::sampler::{
    get_cactus_inputs_random, get_cactus_inputs_random_with_constraints,
    get_fastas_from_sequence, RandomInputsConfig,
};
use cactus_testkit::workflow::{CommandEngine, WorkflowOptions};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

/// cactus-testkit - random inputs and test runs for the cactus workflow
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[clap(long = "quiet", global = true)]
    quiet: bool,

    /// Seed for the random generator (fresh entropy if not given)
    #[clap(long = "seed", global = true)]
    seed: Option<u64>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct RandomArgs {
    /// Number of sequences (random in 0..30 if not given)
    #[clap(short = 'n', long = "sequences")]
    sequence_number: Option<usize>,

    /// Average sequence length (random in 1..3000 if not given)
    #[clap(short = 'l', long = "avg-length")]
    avg_sequence_length: Option<usize>,

    /// Number of tree leaves (random in 2..4 if not given)
    #[clap(short = 'k', long = "leaves")]
    tree_leaf_number: Option<usize>,
}

impl RandomArgs {
    fn to_config(&self) -> RandomInputsConfig {
        RandomInputsConfig {
            sequence_number: self.sequence_number,
            avg_sequence_length: self.avg_sequence_length,
            tree_leaf_number: self.tree_leaf_number,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a random tree and sequence directories into a directory
    Random {
        /// Output directory (created if missing)
        #[clap(short = 'o', long = "output")]
        output: PathBuf,

        /// Also write random constraints over the generated sequences
        #[clap(long = "constraints")]
        constraints: bool,

        #[clap(flatten)]
        random: RandomArgs,
    },

    /// Write random single-base constraints between existing sequences
    Constraints {
        /// Sequence directories or FASTA files
        #[clap(value_name = "SEQUENCES", required = true)]
        sequences: Vec<PathBuf>,

        /// Output cigar file
        #[clap(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Check that a file holds only cigar lines, comments and blank lines
    CheckCigar {
        #[clap(value_name = "FILE")]
        file: PathBuf,
    },

    /// Generate random inputs and run the workflow on them
    Run {
        /// Number of examples to run
        #[clap(short = 'N', long = "examples", default_value = "1")]
        examples: usize,

        /// Pass random constraints to the workflow
        #[clap(long = "constraints")]
        constraints: bool,

        /// Batch system: singleMachine, parasol or gridEngine
        #[clap(short = 'b', long = "batch-system", default_value = "singleMachine")]
        batch_system: String,

        /// Database conf XML replacing the default in-memory database
        #[clap(long = "database-conf", conflicts_with = "no_database")]
        database_conf: Option<String>,

        /// Leave the database choice to the workflow config
        #[clap(long = "no-database")]
        no_database: bool,

        /// Workflow config file
        #[clap(short = 'c', long = "config")]
        config_file: Option<PathBuf>,

        #[clap(long = "build-avgs")]
        build_avgs: bool,

        #[clap(long = "build-reference")]
        build_reference: bool,

        #[clap(long = "build-hal")]
        build_hal: bool,

        #[clap(long = "build-fasta")]
        build_fasta: bool,

        /// Write a job tree statistics report after each run
        #[clap(long = "stats")]
        stats: bool,

        #[clap(long = "progressive")]
        progressive: bool,

        /// Directory for per-example temp dirs (current dir if not given)
        #[clap(long = "temp-root")]
        temp_root: Option<PathBuf>,

        /// Hide engine output unless a run fails
        #[clap(long = "silent")]
        silent: bool,

        #[clap(flatten)]
        random: RandomArgs,
    },
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match args.command {
        Command::Random {
            output,
            constraints,
            random,
        } => {
            fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let config = random.to_config();
            let inputs = if constraints {
                get_cactus_inputs_random_with_constraints(&output, &config, &mut rng)?
            } else {
                get_cactus_inputs_random(&output, &config, &mut rng)?
            };
            println!("{}", inputs.newick);
            for dir in &inputs.sequences {
                println!("{}", dir.display());
            }
            if let Some(path) = &inputs.constraints {
                println!("{}", path.display());
            }
        }

        Command::Constraints { sequences, output } => {
            let pool = get_fastas_from_sequence(&sequences)?;
            let constraints = make_random_constraints(&pool, &mut rng);
            write_constraints(&output, &constraints)?;
            info!(
                "Wrote {} constraints over {} sequences to {}",
                constraints.len(),
                pool.len(),
                output.display()
            );
        }

        Command::CheckCigar { file } => {
            check_cigar(&file)?;
            println!("{}: ok", file.display());
        }

        Command::Run {
            examples,
            constraints,
            batch_system,
            database_conf,
            no_database,
            config_file,
            build_avgs,
            build_reference,
            build_hal,
            build_fasta,
            stats,
            progressive,
            temp_root,
            silent,
            random,
        } => {
            // configuration errors surface before any input is generated
            let mut test_config = TestConfig::from_env()?.with_batch_system(&batch_system)?;
            if no_database {
                test_config = test_config.with_database_conf(None)?;
            } else if let Some(xml) = database_conf.as_deref() {
                test_config = test_config.with_database_conf(Some(xml))?;
            }

            let options = MultipleExamplesOptions {
                test_number: examples,
                use_constraints: constraints,
                temp_root,
                workflow: WorkflowOptions {
                    test_config,
                    build_avgs,
                    build_reference,
                    build_hal,
                    build_fasta,
                    build_toil_stats: stats,
                    config_file,
                    progressive,
                    ..WorkflowOptions::default()
                },
                ..MultipleExamplesOptions::default()
            };
            let engine = CommandEngine::from_env()?;
            let config = random.to_config();

            let mut run = || {
                run_workflow_multiple_examples(
                    |_region, dir| {
                        if constraints {
                            get_cactus_inputs_random_with_constraints(dir, &config, &mut rng)
                        } else {
                            get_cactus_inputs_random(dir, &config, &mut rng)
                        }
                    },
                    &options,
                    &engine,
                )
            };
            let ran = if silent {
                silent_on_success(run)?
            } else {
                run()?
            };
            println!("Ran {ran} example(s)");
        }
    }

    Ok(())
}
