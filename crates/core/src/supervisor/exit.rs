//! Exit statuses and stderr.

use ace_protocol::ipc::FailureCategory;
use std::process::ExitStatus;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes of worker stderr kept for diagnostics.
pub(crate) const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Failure category for a worker exit code.
///
/// `None` means the worker died from a signal.
pub fn category_for_exit_code(code: Option<i32>) -> FailureCategory {
    match code {
        Some(2) => FailureCategory::InvalidArguments,
        Some(3) => FailureCategory::BaseModelUnavailable,
        Some(4) => FailureCategory::MalformedTrainingData,
        Some(5) => FailureCategory::ResourceCheckFailed,
        Some(6) => FailureCategory::NetworkFailure,
        Some(7) => FailureCategory::DependencyMissing,
        _ => FailureCategory::OperationFailed,
    }
}

/// Message for a non-zero exit, with the last line of stderr if any.
pub(crate) fn exit_message(status: &ExitStatus, stderr_tail: &str) -> String {
    let head = match status.code() {
        Some(code) => format!("Worker exited with code {code}"),
        None => "Worker was terminated by a signal".to_string(),
    };

    match last_line(stderr_tail) {
        Some(line) => format!("{head}: {line}"),
        None => head,
    }
}

pub(crate) fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

/// Read `reader` to the end, keeping only the last `limit` bytes.
pub(crate) async fn capture_tail<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail: Vec<u8> = Vec::with_capacity(limit.min(1024));
    let mut buf = [0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > limit {
                    let excess = tail.len() - limit;
                    tail.drain(..excess);
                }
            }
        }
    }

    String::from_utf8_lossy(&tail).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_exit_codes() {
        assert_eq!(category_for_exit_code(Some(2)), FailureCategory::InvalidArguments);
        assert_eq!(category_for_exit_code(Some(3)), FailureCategory::BaseModelUnavailable);
        assert_eq!(category_for_exit_code(Some(4)), FailureCategory::MalformedTrainingData);
        assert_eq!(category_for_exit_code(Some(5)), FailureCategory::ResourceCheckFailed);
        assert_eq!(category_for_exit_code(Some(6)), FailureCategory::NetworkFailure);
        assert_eq!(category_for_exit_code(Some(7)), FailureCategory::DependencyMissing);
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        for code in [Some(1), Some(8), Some(127), Some(-1), None] {
            assert_eq!(category_for_exit_code(code), FailureCategory::OperationFailed);
        }
    }

    #[test]
    fn test_last_line() {
        assert_eq!(
            last_line("Traceback\n  File x\nValueError: bad\n\n"),
            Some("ValueError: bad")
        );
        assert_eq!(last_line("  \n"), None);
    }

    #[tokio::test]
    async fn test_capture_tail_keeps_end() {
        let data: Vec<u8> = (0..5000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let tail = capture_tail(&data[..], 100).await;

        assert_eq!(tail.len(), 100);
        assert_eq!(tail.as_bytes(), &data[data.len() - 100..]);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_message() {
        use std::os::unix::process::ExitStatusExt;

        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(
            exit_message(&status, "loading\nbase model missing\n"),
            "Worker exited with code 3: base model missing"
        );

        // SIGKILL
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_message(&status, ""), "Worker was terminated by a signal");
    }
}
