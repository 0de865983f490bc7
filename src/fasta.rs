//! FASTA reading and append-mode writing.
//!
//! Only the first whitespace-delimited token of a header is used as the
//! record name; the remainder is kept as a description. Downstream CIGAR
//! parsing relies on names without whitespace, so headers such as
//! `"bar foo"` collapse to `"bar"`.

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sequence lines are wrapped at this width.
const LINE_WIDTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub name: String,
    pub description: Option<String>,
    pub sequence: String,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Bgzf,
}

/// BGZF blocks are gzip members with FEXTRA set and a `BC` subfield first.
fn detect_compression(header: &[u8]) -> Compression {
    if header.len() < 2 || header[..2] != GZIP_MAGIC {
        return Compression::None;
    }
    if header.len() >= 14 && header[3] & 0x04 != 0 && &header[12..14] == b"BC" {
        Compression::Bgzf
    } else {
        Compression::Gzip
    }
}

/// Open a FASTA file, decoding BGZF or plain gzip as detected from its
/// leading bytes.
pub fn open_fasta_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open FASTA: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let compression = detect_compression(
        reader
            .fill_buf()
            .with_context(|| format!("Failed to read FASTA: {}", path.display()))?,
    );

    let input: Box<dyn BufRead> = match compression {
        Compression::Bgzf => Box::new(BufReader::new(bgzf::io::Reader::new(reader))),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
        Compression::None => Box::new(reader),
    };
    Ok(input)
}

fn parse_header(line: &str) -> (String, Option<String>) {
    let header = line.trim_start_matches('>').trim();
    match header.split_once(char::is_whitespace) {
        Some((name, rest)) => {
            let rest = rest.trim();
            let description = (!rest.is_empty()).then(|| rest.to_string());
            (name.to_string(), description)
        }
        None => (header.to_string(), None),
    }
}

/// Streaming FASTA reader over any `BufRead`.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line_no: usize,
    pending_header: Option<String>,
    buf: String,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        FastaReader {
            reader,
            line_no: 0,
            pending_header: None,
            buf: String::new(),
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Read the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending_header.take() {
            Some(header) => header,
            None => loop {
                match self.read_line()? {
                    None => return Ok(None),
                    Some(line) if line.starts_with('>') => break line,
                    Some(line) if line.trim().is_empty() || line.starts_with('#') => continue,
                    Some(_) => bail!(
                        "FASTA format error at line {}: expected header line starting with '>'",
                        self.line_no
                    ),
                }
            },
        };

        let (name, description) = parse_header(&header);
        let mut sequence = String::new();
        while let Some(line) = self.read_line()? {
            if line.starts_with('>') {
                self.pending_header = Some(line);
                break;
            }
            sequence.push_str(line.trim());
        }

        Ok(Some(FastaRecord {
            name,
            description,
            sequence,
        }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Read every `(name, sequence)` pair from a FASTA file.
pub fn read_fasta_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    FastaReader::new(open_fasta_input(path)?)
        .map(|record| {
            record
                .map(|r| (r.name, r.sequence))
                .with_context(|| format!("Failed to read FASTA: {}", path.display()))
        })
        .collect()
}

/// Write one record to `writer`, wrapping the sequence.
///
/// Sequences may only contain ASCII letters and `-`.
pub fn write_record<W: Write>(writer: &mut W, name: &str, sequence: &str) -> Result<()> {
    if let Some(bad) = sequence
        .chars()
        .find(|c| !(c.is_ascii_alphabetic() || *c == '-'))
    {
        bail!("Invalid FASTA character {bad:?} in sequence {name}");
    }
    writeln!(writer, ">{name}")?;
    for chunk in sequence.as_bytes().chunks(LINE_WIDTH) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Append-mode FASTA file writer.
pub struct FastaWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl FastaWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open FASTA for appending: {}", path.display()))?;
        Ok(FastaWriter {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn write(&mut self, name: &str, sequence: &str) -> Result<()> {
        write_record(&mut self.writer, name, sequence)
            .with_context(|| format!("Failed to write FASTA: {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written through this handle.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and close the file.
    pub fn close(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush FASTA: {}", self.path.display()))
    }
}
