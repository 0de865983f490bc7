//! Fixed inputs from the bundled test datasets.
//!
//! All paths hang off the directory named by `SON_TRACE_DATASETS`.

use crate::error::ConfigError;
use crate::fasta::{read_fasta_pairs, FastaWriter};
use crate::sampler::CactusInputs;
use anyhow::{Context, Result};
use log::debug;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const DATASETS_ENV: &str = "SON_TRACE_DATASETS";

pub const BLANCHETTE_REGIONS: usize = 50;
pub const ENCODE_REGIONS: usize = 14;

const BLANCHETTE_SPECIES: [&str; 9] = [
    "HUMAN", "CHIMP", "BABOON", "MOUSE", "RAT", "DOG", "CAT", "PIG", "COW",
];
const ENCODE_SPECIES: [&str; 7] = ["human", "chimp", "baboon", "mouse", "rat", "dog", "cow"];
const CHR_X_FILES: [&str; 5] = ["cow.fa", "dog.fa", "human.fa", "mouse.fa", "rat.fa"];
const EVOLVER_MAMMALS: [&str; 5] = [
    "simHuman.chr6",
    "simMouse.chr6",
    "simRat.chr6",
    "simCow.chr6",
    "simDog.chr6",
];
const EVOLVER_PRIMATES: [&str; 4] = [
    "simHuman.chr6",
    "simChimp.chr6",
    "simGorilla.chr6",
    "simOrang.chr6",
];

/// Headers that parsers tend to mangle. Headers containing whitespace are
/// left out: only the first token of a header survives FASTA parsing.
pub const FUNKY_HEADER_NAMES: [&str; 5] = ["id=1|foo", "test1|1600", "test2|", "|test3", "id=1|bar"];

/// Root of the test datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasets {
    root: PathBuf,
}

/// Read the first line of a Newick tree file.
pub fn parse_newick_tree_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open Newick tree: {}", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("Failed to read Newick tree: {}", path.display()))?;
    Ok(line.trim_end().to_string())
}

fn check_region(dataset: &'static str, region: usize, limit: usize) -> Result<(), ConfigError> {
    if region >= limit {
        return Err(ConfigError::RegionOutOfRange {
            dataset,
            region,
            limit,
        });
    }
    Ok(())
}

fn fixed_inputs(sequences: Vec<PathBuf>, tree_file: &Path) -> Result<CactusInputs> {
    Ok(CactusInputs {
        sequences,
        newick: parse_newick_tree_file(tree_file)?,
        constraints: None,
    })
}

impl Datasets {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Datasets { root: root.into() }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        env::var(DATASETS_ENV)
            .map(Datasets::new)
            .map_err(|_| ConfigError::MissingDatasetRoot(DATASETS_ENV))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sequences `names` under `path` (in tree order) and `path/tree.newick`.
    pub fn get_inputs(&self, path: &str, names: &[&str]) -> Result<CactusInputs> {
        let seq_path = self.root.join(path);
        let sequences = names.iter().map(|name| seq_path.join(name)).collect();
        fixed_inputs(sequences, &seq_path.join("tree.newick"))
    }

    /// Blanchette simulated region `0 <= region < 50`.
    pub fn blanchette(&self, region: usize) -> Result<CactusInputs> {
        check_region("blanchette", region, BLANCHETTE_REGIONS)?;
        let base = self.root.join("blanchettesSimulation");
        let job = base.join(format!("{region:02}.job"));
        let sequences = BLANCHETTE_SPECIES
            .iter()
            .map(|species| job.join(species))
            .collect();
        fixed_inputs(sequences, &base.join("tree.newick"))
    }

    /// Blanchette region rewritten into `temp_dir` with awkward header names.
    pub fn funky_header_names(&self, region: usize, temp_dir: &Path) -> Result<CactusInputs> {
        let mut inputs = self.blanchette(region)?;
        let mut funky = FUNKY_HEADER_NAMES.iter().cycle();
        for (i, sequence) in inputs.sequences.iter_mut().enumerate() {
            let new_path = temp_dir.join(i.to_string());
            let mut writer = FastaWriter::append(&new_path)?;
            for (_, seq) in read_fasta_pairs(&*sequence)? {
                // cycle over a non-empty array never ends
                let header = funky.next().copied().unwrap_or_default();
                writer.write(header, &seq)?;
            }
            writer.close()?;
            debug!("Rewrote {} as {}", sequence.display(), new_path.display());
            *sequence = new_path;
        }
        Ok(inputs)
    }

    /// ENCODE pilot region `0 <= region < 14` (named `ENm001` onwards).
    pub fn encode(&self, region: usize) -> Result<CactusInputs> {
        check_region("encode", region, ENCODE_REGIONS)?;
        let region_name = format!("ENm{:03}", region + 1);
        let base = self.root.join("MAY-2005");
        let sequences = ENCODE_SPECIES
            .iter()
            .map(|species| {
                base.join(&region_name)
                    .join(format!("{species}.{region_name}.fa"))
            })
            .collect();
        fixed_inputs(sequences, &base.join("reducedTree.newick"))
    }

    /// Mammalian X chromosomes.
    pub fn chromosome_x(&self) -> Result<CactusInputs> {
        let base = self.root.join("chr_x");
        let sequences = CHR_X_FILES.iter().map(|f| base.join(f)).collect();
        fixed_inputs(sequences, &base.join("newickTree.txt"))
    }

    /// Simulated half-megabase mammalian chromosomes.
    pub fn evolver_mammals(&self) -> Result<CactusInputs> {
        let base = self.root.join("evolver").join("mammals").join("loci1");
        let sequences = EVOLVER_MAMMALS.iter().map(|f| base.join(f)).collect();
        fixed_inputs(sequences, &base.join("tree.newick"))
    }

    /// Simulated half-megabase primate chromosomes.
    pub fn evolver_primates(&self) -> Result<CactusInputs> {
        let base = self.root.join("evolver").join("primates").join("loci1");
        let sequences = EVOLVER_PRIMATES.iter().map(|f| base.join(f)).collect();
        fixed_inputs(sequences, &base.join("tree.newick"))
    }
}
