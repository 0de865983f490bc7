/// Tests for the cigar output format checker
use anyhow::Result;
use cactus_testkit::cigar::check_cigar;
use cactus_testkit::error::CigarCheckError;
use std::fs;
use tempfile::TempDir;

fn check_text(text: &str) -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("out.cig");
    fs::write(&path, text)?;
    check_cigar(&path)
}

fn check_error(text: &str) -> CigarCheckError {
    let err = check_text(text).expect_err("checker should reject");
    err.downcast::<CigarCheckError>()
        .expect("format errors are CigarCheckError")
}

#[test]
fn test_accepts_cigar_comments_and_blank_lines() -> Result<()> {
    check_text("cigar: a 0 1 + b 1 0 - 1000.000000 M 1\n")?;
    check_text("# produced by a test\n\ncigar: a 0 1 + b 0 1 + 1.0 M 1\n#done\n")?;
    // blank lines alone still count as lines
    check_text("\n")?;
    check_text("# only a comment")?;
    Ok(())
}

#[test]
fn test_rejects_empty_file() {
    assert_eq!(check_error(""), CigarCheckError::Empty);
}

#[test]
fn test_rejects_other_lines() {
    assert_eq!(
        check_error("cigar: a 0 1 + b 0 1 + 1.0 M 1\nseq1\t100\t0\t50\n"),
        CigarCheckError::IllegalLine {
            line: 2,
            content: "seq1\t100\t0\t50".to_string()
        }
    );
    // prefix check is exact
    assert!(matches!(
        check_error(" cigar: a 0 1 + b 0 1 + 1.0 M 1\n"),
        CigarCheckError::IllegalLine { line: 1, .. }
    ));
    assert!(matches!(
        check_error("CIGAR: a 0 1 + b 0 1 + 1.0 M 1\n"),
        CigarCheckError::IllegalLine { line: 1, .. }
    ));
}

#[test]
fn test_first_violation_aborts() {
    assert_eq!(
        check_error("bad one\nbad two\n"),
        CigarCheckError::IllegalLine {
            line: 1,
            content: "bad one".to_string()
        }
    );
}

#[test]
fn test_non_utf8_line_is_format_violation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("binary.cig");
    fs::write(
        &path,
        b"cigar: a 0 1 + b 0 1 + 1.0 M 1\n\xff\xfe garbage\n".as_slice(),
    )
    .unwrap();
    let err = check_cigar(&path).unwrap_err();
    assert_eq!(
        err.downcast_ref::<CigarCheckError>(),
        Some(&CigarCheckError::IllegalLine {
            line: 2,
            content: "\u{fffd}\u{fffd} garbage".to_string()
        })
    );

    // invalid bytes after a valid prefix are not inspected
    fs::write(&path, b"# caf\xe9\ncigar: a\xff\n".as_slice()).unwrap();
    check_cigar(&path).unwrap();
}

#[test]
fn test_crlf_line_endings() -> Result<()> {
    check_text("cigar: a 0 1 + b 0 1 + 1.0 M 1\r\n\r\n")?;
    assert_eq!(
        check_error("cigar: a 0 1 + b 0 1 + 1.0 M 1\r\nnope\r\n"),
        CigarCheckError::IllegalLine {
            line: 2,
            content: "nope".to_string()
        }
    );
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = check_cigar(temp_dir.path().join("missing.cig")).unwrap_err();
    assert!(err.downcast_ref::<CigarCheckError>().is_none());
    assert!(err.to_string().contains("Failed to open cigar"));
}
