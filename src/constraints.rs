//! Random single-base alignment anchors between sequences of a pool.

use crate::cigar::{cigar_write, AlignmentOperation, OpType, PairwiseAlignment};
use anyhow::{Context, Result};
use log::debug;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Upper bound (inclusive) on the number of draws per pool.
pub const MAX_CONSTRAINT_DRAWS: usize = 1000;

/// Nominal score of every anchor and of its single match operation.
pub const CONSTRAINT_SCORE: f64 = 1000.0;

/// A single-base interval on a sequence of length `len` (which must be > 0):
/// `(i, i + 1, +)` or `(i + 1, i, -)` with equal probability.
pub fn random_interval<R: Rng + ?Sized>(len: usize, rng: &mut R) -> (u64, u64, bool) {
    let start = rng.gen_range(0..len) as u64;
    if rng.gen_bool(0.5) {
        (start, start + 1, true)
    } else {
        (start + 1, start, false)
    }
}

/// Draw up to [`MAX_CONSTRAINT_DRAWS`] anchors between random pairs of the
/// pool. A pair may use the same sequence twice; draws touching an empty
/// sequence are skipped, so the result can be shorter than the draw count.
pub fn make_random_constraints<R: Rng + ?Sized>(
    pool: &[(String, String)],
    rng: &mut R,
) -> Vec<PairwiseAlignment> {
    let mut constraints = Vec::new();
    if pool.is_empty() {
        return constraints;
    }

    let draws = rng.gen_range(0..=MAX_CONSTRAINT_DRAWS);
    for _ in 0..draws {
        let (name1, seq1) = &pool[rng.gen_range(0..pool.len())];
        let (name2, seq2) = &pool[rng.gen_range(0..pool.len())];
        if seq1.is_empty() || seq2.is_empty() {
            continue;
        }
        let (start1, end1, strand1) = random_interval(seq1.len(), rng);
        let (start2, end2, strand2) = random_interval(seq2.len(), rng);
        constraints.push(PairwiseAlignment {
            contig1: name1.clone(),
            start1,
            end1,
            strand1,
            contig2: name2.clone(),
            start2,
            end2,
            strand2,
            score: CONSTRAINT_SCORE,
            operations: vec![AlignmentOperation::new(OpType::Match, 1, CONSTRAINT_SCORE)],
        });
    }
    debug!(
        "Made {} constraints from {} draws over {} sequences",
        constraints.len(),
        draws,
        pool.len()
    );
    constraints
}

/// Write constraints as plain `cigar:` lines (no probability columns).
pub fn write_constraints<P: AsRef<Path>>(path: P, constraints: &[PairwiseAlignment]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create constraints file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for constraint in constraints {
        cigar_write(&mut writer, constraint, false)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write constraints file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_pool_gives_no_constraints() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(make_random_constraints(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_all_empty_sequences_give_no_constraints() {
        let mut rng = StdRng::seed_from_u64(0);
        let pool = vec![("a".to_string(), String::new()), ("b".to_string(), String::new())];
        assert!(make_random_constraints(&pool, &mut rng).is_empty());
    }

    #[test]
    fn test_random_interval_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let (start, end, strand) = random_interval(3, &mut rng);
            if strand {
                assert_eq!(end, start + 1);
                assert!(end <= 3);
            } else {
                assert_eq!(start, end + 1);
                assert!(start <= 3);
            }
        }
    }

    #[test]
    fn test_single_base_sequence() {
        let mut rng = StdRng::seed_from_u64(2);
        let pool = vec![("x".to_string(), "A".to_string())];
        for c in make_random_constraints(&pool, &mut rng) {
            assert!(matches!((c.start1, c.end1), (0, 1) | (1, 0)));
            assert_eq!(c.contig1, "x");
            assert_eq!(c.contig2, "x");
        }
    }
}
