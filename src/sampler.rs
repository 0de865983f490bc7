//! Random cactus inputs: a species tree plus one directory of FASTA files
//! per leaf, filled with sequences evolved from shared ancestors.

use crate::constraints::{make_random_constraints, write_constraints};
use crate::fasta::{read_fasta_pairs, FastaWriter};
use crate::sequence::{mutate_sequence, random_alphanumeric, random_sequence, reverse_complement};
use crate::tree::BinaryTree;
use anyhow::{Context, Result};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Marks a FASTA file to which no further sequences will be appended.
pub const COMPLETE_SUFFIX: &str = ".fa.complete";
pub const OPEN_SUFFIX: &str = ".fa";

const SEQUENCE_NAME_LENGTH: usize = 15;

/// Inputs for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CactusInputs {
    /// Sequence directories or files, in the order of the tree's leaves.
    pub sequences: Vec<PathBuf>,
    pub newick: String,
    /// Constraints file in cigar format.
    pub constraints: Option<PathBuf>,
}

/// Parameters of [`get_cactus_inputs_random`]. Unset values are drawn at
/// random: sequences in `0..30`, average length in `1..3000`, leaves in `2..4`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomInputsConfig {
    pub sequence_number: Option<usize>,
    pub avg_sequence_length: Option<usize>,
    pub tree_leaf_number: Option<usize>,
}

struct ResolvedConfig {
    sequence_number: usize,
    avg_sequence_length: usize,
    tree_leaf_number: usize,
}

impl RandomInputsConfig {
    fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> ResolvedConfig {
        ResolvedConfig {
            sequence_number: self
                .sequence_number
                .unwrap_or_else(|| rng.gen_range(0..30)),
            avg_sequence_length: self
                .avg_sequence_length
                .unwrap_or_else(|| rng.gen_range(1..3000))
                .max(1),
            tree_leaf_number: self
                .tree_leaf_number
                .unwrap_or_else(|| rng.gen_range(2..4)),
        }
    }
}

/// Ancestor length, uniform in `1..2 * avg_length` (saturating).
fn ancestor_length<R: Rng + ?Sized>(avg_length: usize, rng: &mut R) -> usize {
    let upper = avg_length.max(1).saturating_mul(2);
    rng.gen_range(1..upper)
}

/// Writes evolved sequences into sequence directories, keeping at most one
/// FASTA file open at a time.
struct SequenceEmitter<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
    avg_length: usize,
    ancestor: String,
    open: Option<FastaWriter>,
    written: usize,
}

impl<'a, R: Rng + ?Sized> SequenceEmitter<'a, R> {
    fn new(avg_length: usize, rng: &'a mut R) -> Self {
        let ancestor = Self::random_ancestor(avg_length, rng);
        SequenceEmitter {
            rng,
            avg_length,
            ancestor,
            open: None,
            written: 0,
        }
    }

    fn random_ancestor(avg_length: usize, rng: &mut R) -> String {
        let length = ancestor_length(avg_length, rng);
        random_sequence(length, rng)
    }

    /// Open a new file in `dir`; half of them are marked complete.
    fn open_file(&mut self, dir: &Path) -> Result<()> {
        let suffix = if self.rng.gen_bool(0.5) {
            COMPLETE_SUFFIX
        } else {
            OPEN_SUFFIX
        };
        let path = loop {
            let candidate = dir.join(format!("{}{}", random_alphanumeric(10, self.rng), suffix));
            if !candidate.exists() {
                break candidate;
            }
        };
        debug!("Opening sequence file {}", path.display());
        self.open = Some(FastaWriter::append(path)?);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Append one evolved sequence to the open file, then close the file
    /// with probability one half.
    fn emit(&mut self) -> Result<()> {
        if self.rng.gen_bool(0.2) {
            self.ancestor = Self::random_ancestor(self.avg_length, self.rng);
        }
        let distance = self.rng.gen::<f64>() * 0.5;
        let mut sequence = mutate_sequence(&self.ancestor, distance, self.rng);
        let name = random_alphanumeric(SEQUENCE_NAME_LENGTH, self.rng);
        if self.rng.gen_bool(0.5) {
            sequence = reverse_complement(&sequence);
        }
        if let Some(writer) = self.open.as_mut() {
            writer.write(&name, &sequence)?;
        }
        self.written += 1;
        if self.rng.gen_bool(0.5) {
            self.close()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.open.take() {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }
}

/// Create one fresh directory per leaf id under `root`.
fn make_sequence_dirs<R: Rng + ?Sized>(
    root: &Path,
    leaf_ids: &[&str],
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    leaf_ids
        .iter()
        .map(|id| loop {
            let dir = root.join(format!("leaf{id}_{}", random_alphanumeric(8, &mut *rng)));
            if dir.exists() {
                continue;
            }
            break fs::create_dir(&dir)
                .with_context(|| format!("Failed to create sequence dir: {}", dir.display()))
                .map(|_| dir);
        })
        .collect()
}

/// Random species tree and sequence directories under `root`.
///
/// Generation runs in two phases: first every leaf directory receives a
/// file (so none stays empty, even for `sequence_number == 0`), then
/// sequences are topped up until at least `sequence_number` were written.
pub fn get_cactus_inputs_random<R: Rng + ?Sized>(
    root: &Path,
    config: &RandomInputsConfig,
    rng: &mut R,
) -> Result<CactusInputs> {
    let resolved = config.resolve(rng);

    let tree = BinaryTree::random(resolved.tree_leaf_number, rng)?;
    let newick = tree.to_newick(true);
    info!("Made random binary tree: {newick}");

    let sequence_dirs = make_sequence_dirs(root, &tree.leaf_ids(), rng)?;
    debug!(
        "Made a set of random directories: {}",
        sequence_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut unvisited: Vec<usize> = (0..sequence_dirs.len()).collect();
    unvisited.shuffle(rng);
    let mut unvisited: VecDeque<usize> = unvisited.into();

    let mut emitter = SequenceEmitter::new(resolved.avg_sequence_length, rng);

    // Phase 1: one file per directory.
    while !unvisited.is_empty() {
        if !emitter.is_open() {
            if let Some(i) = unvisited.pop_front() {
                emitter.open_file(&sequence_dirs[i])?;
            }
        }
        emitter.emit()?;
    }

    // Phase 2: top up to the requested count.
    while emitter.written < resolved.sequence_number {
        if !emitter.is_open() {
            let i = emitter.rng.gen_range(0..sequence_dirs.len());
            emitter.open_file(&sequence_dirs[i])?;
        }
        emitter.emit()?;
    }
    emitter.close()?;

    info!(
        "Made {} sequences in {} directories",
        emitter.written,
        sequence_dirs.len()
    );

    Ok(CactusInputs {
        sequences: sequence_dirs,
        newick,
        constraints: None,
    })
}

/// Read every `(name, sequence)` pair under the given sequence paths.
/// Directories are scanned in file-name order; plain files are read directly.
pub fn get_fastas_from_sequence<P: AsRef<Path>>(sequences: &[P]) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for sequence in sequences {
        let path = sequence.as_ref();
        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("Failed to list sequence dir: {}", path.display()))?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            files.sort();
            for file in files {
                pairs.extend(read_fasta_pairs(&file)?);
            }
        } else {
            pairs.extend(read_fasta_pairs(path)?);
        }
    }
    Ok(pairs)
}

/// Random inputs plus a constraints file over all generated sequences.
pub fn get_cactus_inputs_random_with_constraints<R: Rng + ?Sized>(
    root: &Path,
    config: &RandomInputsConfig,
    rng: &mut R,
) -> Result<CactusInputs> {
    let mut inputs = get_cactus_inputs_random(root, config, rng)?;
    let pool = get_fastas_from_sequence(&inputs.sequences)?;
    let constraints = make_random_constraints(&pool, rng);

    let path = root.join(format!("constraints_{}.cig", random_alphanumeric(8, rng)));
    write_constraints(&path, &constraints)?;
    info!(
        "Wrote {} constraints to {}",
        constraints.len(),
        path.display()
    );

    inputs.constraints = Some(path);
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_uses_given_values() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = RandomInputsConfig {
            sequence_number: Some(7),
            avg_sequence_length: Some(0),
            tree_leaf_number: Some(5),
        };
        let resolved = config.resolve(&mut rng);
        assert_eq!(resolved.sequence_number, 7);
        assert_eq!(resolved.avg_sequence_length, 1, "length is clamped to 1");
        assert_eq!(resolved.tree_leaf_number, 5);
    }

    #[test]
    fn test_resolve_draws_in_range() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let resolved = RandomInputsConfig::default().resolve(&mut rng);
            assert!(resolved.sequence_number < 30);
            assert!((1..3000).contains(&resolved.avg_sequence_length));
            assert!((2..4).contains(&resolved.tree_leaf_number));
        }
    }

    #[test]
    fn test_ancestor_length_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for avg in [0, 1, 2, 1000] {
            for _ in 0..100 {
                let len = ancestor_length(avg, &mut rng);
                assert!(len >= 1 && len < (avg.max(1) * 2), "avg {avg}: {len}");
            }
        }
        // huge averages saturate instead of overflowing
        for _ in 0..100 {
            assert!(ancestor_length(usize::MAX, &mut rng) >= 1);
        }
    }

    #[test]
    fn test_requested_count_is_reached() {
        let temp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let config = RandomInputsConfig {
            sequence_number: Some(25),
            avg_sequence_length: Some(50),
            tree_leaf_number: Some(3),
        };
        let inputs = get_cactus_inputs_random(temp.path(), &config, &mut rng).unwrap();
        let pairs = get_fastas_from_sequence(&inputs.sequences).unwrap();
        assert!(pairs.len() >= 25);
        assert!(pairs.iter().all(|(name, _)| name.len() == SEQUENCE_NAME_LENGTH));
    }

    #[test]
    fn test_file_suffixes() {
        let temp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let config = RandomInputsConfig {
            sequence_number: Some(29),
            avg_sequence_length: Some(10),
            tree_leaf_number: Some(2),
        };
        let inputs = get_cactus_inputs_random(temp.path(), &config, &mut rng).unwrap();
        for dir in &inputs.sequences {
            for entry in fs::read_dir(dir).unwrap() {
                let name = entry.unwrap().file_name().to_string_lossy().to_string();
                assert!(name.ends_with(COMPLETE_SUFFIX) || name.ends_with(OPEN_SUFFIX));
            }
        }
    }
}
