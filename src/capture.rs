//! Silence stdout/stderr of a test body unless it fails.
//!
//! Works on the process file descriptors, so output of child processes
//! (the workflow engine) is captured too.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::panic::{self, AssertUnwindSafe};

/// Saved copies of fds 1 and 2, restored on drop.
struct Redirect {
    saved_stdout: RawFd,
    saved_stderr: RawFd,
}

fn check(ret: libc::c_int, what: &str) -> Result<libc::c_int> {
    if ret < 0 {
        return Err(io::Error::last_os_error()).with_context(|| format!("{what} failed"));
    }
    Ok(ret)
}

impl Redirect {
    fn to(log: &File) -> Result<Self> {
        io::stdout().flush()?;
        io::stderr().flush()?;
        // SAFETY: plain descriptor duplication; every fd used here is owned by
        // this process for the duration of the call.
        unsafe {
            let saved_stdout = check(libc::dup(libc::STDOUT_FILENO), "dup(stdout)")?;
            let saved_stderr = match check(libc::dup(libc::STDERR_FILENO), "dup(stderr)") {
                Ok(fd) => fd,
                Err(e) => {
                    libc::close(saved_stdout);
                    return Err(e);
                }
            };
            let redirect = Redirect {
                saved_stdout,
                saved_stderr,
            };
            check(libc::dup2(log.as_raw_fd(), libc::STDOUT_FILENO), "dup2(stdout)")?;
            check(libc::dup2(log.as_raw_fd(), libc::STDERR_FILENO), "dup2(stderr)")?;
            Ok(redirect)
        }
    }

    /// Write `bytes` to the original stdout.
    fn replay(&self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            // SAFETY: saved_stdout stays open until drop.
            let n = unsafe {
                libc::write(
                    self.saved_stdout,
                    rest.as_ptr() as *const libc::c_void,
                    rest.len(),
                )
            };
            if n <= 0 {
                break;
            }
            rest = &rest[n as usize..];
        }
    }
}

impl Drop for Redirect {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        // SAFETY: restores the descriptors saved in `Redirect::to`.
        unsafe {
            libc::dup2(self.saved_stdout, libc::STDOUT_FILENO);
            libc::dup2(self.saved_stderr, libc::STDERR_FILENO);
            libc::close(self.saved_stdout);
            libc::close(self.saved_stderr);
        }
    }
}

/// Run `body` with stdout and stderr sent to a temp file. When `body`
/// returns an error or panics, the captured output is written to the real
/// stdout before the failure is propagated. The temp file is always removed.
///
/// Not thread-safe: fds 1 and 2 are process-wide, so concurrent callers (or
/// other threads writing output meanwhile) interfere with each other.
pub fn silent_on_success<T, F>(body: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let mut log = tempfile::tempfile().context("Failed to create capture file")?;
    let outcome = {
        let redirect = Redirect::to(&log)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        let failed = !matches!(outcome, Ok(Ok(_)));
        if failed {
            let _ = io::stdout().flush();
            let _ = io::stderr().flush();
            let mut captured = Vec::new();
            if log.seek(SeekFrom::Start(0)).is_ok() && log.read_to_end(&mut captured).is_ok() {
                redirect.replay(&captured);
            }
        }
        outcome
    };
    match outcome {
        Ok(result) => result,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::{Mutex, MutexGuard};

    static FD_LOCK: Mutex<()> = Mutex::new(());

    fn lock_fds() -> MutexGuard<'static, ()> {
        FD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with stdout sent to a temp file and return what reached it.
    fn stdout_of(f: impl FnOnce()) -> String {
        let mut outer = tempfile::tempfile().unwrap();
        let redirect = Redirect::to(&outer).unwrap();
        f();
        drop(redirect);
        let mut text = String::new();
        outer.seek(SeekFrom::Start(0)).unwrap();
        outer.read_to_string(&mut text).unwrap();
        text
    }

    fn write_stdout(line: &str) -> io::Result<()> {
        let mut out = io::stdout();
        writeln!(out, "{line}")?;
        out.flush()
    }

    #[test]
    fn test_success_passes_value_through() {
        let _fds = lock_fds();
        let mut value = 0;
        let seen = stdout_of(|| {
            value = silent_on_success(|| {
                write_stdout("this line is swallowed")?;
                Ok(42)
            })
            .unwrap();
        });
        assert_eq!(value, 42);
        assert!(!seen.contains("swallowed"), "{seen}");
    }

    #[test]
    fn test_failure_replays_captured_output() {
        let _fds = lock_fds();
        let mut result: Result<()> = Ok(());
        let seen = stdout_of(|| {
            result = silent_on_success(|| {
                write_stdout("engine log line")?;
                bail!("workflow failed")
            });
        });
        assert_eq!(result.unwrap_err().to_string(), "workflow failed");
        assert!(seen.contains("engine log line\n"), "{seen}");
    }

    #[test]
    fn test_panic_propagates() {
        let _fds = lock_fds();
        let caught = panic::catch_unwind(|| {
            let _ = silent_on_success(|| -> Result<()> { panic!("boom") });
        });
        assert!(caught.is_err());
    }
}
