//! Random DNA generation and point mutation.
//!
//! Sequences are plain `String`s over `ACGTN` (upper case as generated, lower
//! case preserved by [`reverse_complement`]).

use rand::seq::SliceRandom;
use rand::Rng;

const BASES: [char; 4] = ['A', 'C', 'T', 'G'];

/// Generated sequences draw `N` once in every 21 symbols.
const WEIGHTED_SYMBOLS: [char; 21] = [
    'A', 'C', 'T', 'G', 'A', 'C', 'T', 'G', 'A', 'C', 'T', 'G', 'A', 'C', 'T', 'G', 'A', 'C',
    'T', 'G', 'N',
];

const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Probability that an insertion or deletion run continues for one more base.
const INDEL_CONTINUE_PROB: f64 = 0.9;

/// Indels happen at this fraction of the substitution rate.
const INDEL_RATE: f64 = 0.05;

/// Generate a random sequence of `length` symbols.
pub fn random_sequence<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    (0..length)
        .map(|_| WEIGHTED_SYMBOLS[rng.gen_range(0..WEIGHTED_SYMBOLS.len())])
        .collect()
}

/// Random string over `[0-9A-Za-z]`.
pub fn random_alphanumeric<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    (0..length)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// Geometric run length: 0 with probability `1 - continue_prob`, and so on.
fn geometric_length<R: Rng + ?Sized>(continue_prob: f64, rng: &mut R) -> usize {
    let mut len = 0;
    while rng.gen::<f64>() < continue_prob {
        len += 1;
    }
    len
}

/// Mutate `sequence` at the given `distance`.
///
/// Each position is substituted with probability `distance` (the new base may
/// equal the old one). After each position an insertion run happens with
/// probability `0.05 * distance`, and a deletion run skips ahead with the
/// same probability. Run lengths are geometric.
pub fn mutate_sequence<R: Rng + ?Sized>(sequence: &str, distance: f64, rng: &mut R) -> String {
    let source: Vec<char> = sequence.chars().collect();
    let indel_prob = INDEL_RATE * distance;
    let mut out = String::with_capacity(source.len());

    let mut i = 0;
    while i < source.len() {
        if rng.gen::<f64>() < distance {
            out.push(*BASES.choose(rng).unwrap_or(&'N'));
        } else {
            out.push(source[i]);
        }
        if rng.gen::<f64>() < indel_prob {
            let insert = geometric_length(INDEL_CONTINUE_PROB, rng);
            out.push_str(&random_sequence(insert, rng));
        }
        if rng.gen::<f64>() < indel_prob {
            i += geometric_length(INDEL_CONTINUE_PROB, rng);
        }
        i += 1;
    }
    out
}

fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'T' => 'A',
        'C' => 'G',
        'G' => 'C',
        'a' => 't',
        't' => 'a',
        'c' => 'g',
        'g' => 'c',
        other => other,
    }
}

/// Reverse complement. Symbols other than `ACGTacgt` are kept as they are.
pub fn reverse_complement(sequence: &str) -> String {
    sequence.chars().rev().map(complement).collect()
}
