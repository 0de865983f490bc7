//! Line-based CIGAR-like pairwise alignment records.
//!
//! ```text
//! cigar: <contig2> <start2> <end2> <+|-> <contig1> <start1> <end1> <+|-> <score> [ops]
//! ```
//!
//! Operations are ` M|D|I <len>` in the plain dialect and
//! ` X|Y|Z <len> <score>` when probabilities are written.

use crate::error::CigarCheckError;
use anyhow::{anyhow, Context, Result};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::{char as nom_char, one_of, space0, space1, u64 as nom_u64};
use nom::combinator::{all_consuming, map, opt, value};
use nom::multi::many0;
use nom::number::complete::double;
use nom::sequence::{preceded, tuple};
use nom::IResult;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Match,
    /// Gap in the second sequence.
    IndelX,
    /// Gap in the first sequence.
    IndelY,
}

impl OpType {
    fn plain_code(self) -> char {
        match self {
            OpType::Match => 'M',
            OpType::IndelX => 'D',
            OpType::IndelY => 'I',
        }
    }

    fn prob_code(self) -> char {
        match self {
            OpType::Match => 'X',
            OpType::IndelX => 'Y',
            OpType::IndelY => 'Z',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            'M' | 'X' => Some(OpType::Match),
            'D' | 'Y' => Some(OpType::IndelX),
            'I' | 'Z' => Some(OpType::IndelY),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOperation {
    pub op_type: OpType,
    pub length: u64,
    pub score: f64,
}

impl AlignmentOperation {
    pub fn new(op_type: OpType, length: u64, score: f64) -> Self {
        AlignmentOperation {
            op_type,
            length,
            score,
        }
    }
}

/// Alignment between `contig1[start1..end1]` and `contig2[start2..end2]`.
///
/// On the reverse strand (`strand == false`) `start > end`: coordinates
/// count down from `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseAlignment {
    pub contig1: String,
    pub start1: u64,
    pub end1: u64,
    pub strand1: bool,
    pub contig2: String,
    pub start2: u64,
    pub end2: u64,
    pub strand2: bool,
    pub score: f64,
    pub operations: Vec<AlignmentOperation>,
}

fn strand_char(strand: bool) -> char {
    if strand {
        '+'
    } else {
        '-'
    }
}

/// Write one alignment as a `cigar:` line.
pub fn cigar_write<W: Write>(
    writer: &mut W,
    alignment: &PairwiseAlignment,
    with_probs: bool,
) -> Result<()> {
    write!(
        writer,
        "cigar: {} {} {} {} {} {} {} {} {:.6}",
        alignment.contig2,
        alignment.start2,
        alignment.end2,
        strand_char(alignment.strand2),
        alignment.contig1,
        alignment.start1,
        alignment.end1,
        strand_char(alignment.strand1),
        alignment.score
    )?;
    for op in &alignment.operations {
        if with_probs {
            write!(writer, " {} {} {:.6}", op.op_type.prob_code(), op.length, op.score)?;
        } else {
            write!(writer, " {} {}", op.op_type.plain_code(), op.length)?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn name(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn strand(input: &str) -> IResult<&str, bool> {
    alt((value(true, nom_char('+')), value(false, one_of("-."))))(input)
}

/// `<name> <start> <end> <strand>`
fn interval(input: &str) -> IResult<&str, (&str, u64, u64, bool)> {
    tuple((
        name,
        preceded(space1, nom_u64),
        preceded(space1, nom_u64),
        preceded(space1, strand),
    ))(input)
}

fn operation(input: &str) -> IResult<&str, AlignmentOperation> {
    map(
        tuple((
            one_of("MDIXYZ"),
            preceded(space1, nom_u64),
            opt(preceded(space1, double)),
        )),
        |(code, length, score)| AlignmentOperation {
            // one_of above only admits known codes
            op_type: OpType::from_code(code).unwrap_or(OpType::Match),
            length,
            score: score.unwrap_or(0.0),
        },
    )(input)
}

fn cigar_line(input: &str) -> IResult<&str, PairwiseAlignment> {
    let (input, _) = tuple((tag("cigar:"), space0))(input)?;
    let (input, (contig2, start2, end2, strand2)) = interval(input)?;
    let (input, (contig1, start1, end1, strand1)) = preceded(space1, interval)(input)?;
    let (input, score) = preceded(space1, double)(input)?;
    let (input, operations) = many0(preceded(space1, operation))(input)?;
    let (input, _) = space0(input)?;
    Ok((
        input,
        PairwiseAlignment {
            contig1: contig1.to_string(),
            start1,
            end1,
            strand1,
            contig2: contig2.to_string(),
            start2,
            end2,
            strand2,
            score,
            operations,
        },
    ))
}

/// Parse a single `cigar:` line.
pub fn parse_cigar_line(line: &str) -> Result<PairwiseAlignment> {
    let line = line.trim_end_matches(['\n', '\r']);
    all_consuming(cigar_line)(line)
        .map(|(_, alignment)| alignment)
        .map_err(|e| anyhow!("Invalid cigar line {line:?}: {e}"))
}

/// Iterator over the alignments of a cigar stream. Blank and `#` lines are skipped.
pub struct CigarReader<R: BufRead> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> CigarReader<R> {
    pub fn new(reader: R) -> Self {
        CigarReader {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for CigarReader<R> {
    type Item = Result<PairwiseAlignment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => return Some(Err(e.into())),
            }
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = self.line_no;
            return Some(parse_cigar_line(line).with_context(|| format!("at line {line_no}")));
        }
    }
}

/// Read every alignment in a cigar file.
pub fn cigar_read<P: AsRef<Path>>(path: P) -> Result<Vec<PairwiseAlignment>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open cigar: {}", path.display()))?;
    CigarReader::new(BufReader::new(file))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to read cigar: {}", path.display()))
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Check that every line of `path` is a `cigar:` record, a `#` comment or
/// blank, and that the file has at least one line.
///
/// Format violations are returned as [`CigarCheckError`]; the first one
/// aborts the check.
pub fn check_cigar<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open cigar: {}", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut lines = 0;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to read cigar: {}", path.display()))?;
        if n == 0 {
            break;
        }
        lines += 1;
        let line = trim_line_end(&buf);
        if !(line.starts_with(b"cigar:") || line.starts_with(b"#") || line.is_empty()) {
            return Err(CigarCheckError::IllegalLine {
                line: lines,
                content: String::from_utf8_lossy(line).into_owned(),
            }
            .into());
        }
    }
    if lines == 0 {
        return Err(CigarCheckError::Empty.into());
    }
    Ok(())
}
