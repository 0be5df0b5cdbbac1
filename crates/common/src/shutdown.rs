//! Bounded shutdown of capture threads.

use crate::error::ZoomcastError;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Join `handle`, giving up after `timeout`.
///
/// On timeout the thread is detached and a [`ZoomcastError::ThreadJoinTimeout`]
/// is returned so the caller can log it and continue shutting down.
/// A panicked thread is reported as a capture error.
pub fn join_with_timeout<T>(
    handle: JoinHandle<T>,
    name: &str,
    timeout: Duration,
) -> Result<T, ZoomcastError> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(
                thread = name,
                timeout_ms = timeout.as_millis() as u64,
                "Thread did not stop in time, continuing shutdown"
            );
            return Err(ZoomcastError::ThreadJoinTimeout {
                thread: name.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }
    handle
        .join()
        .map_err(|_| ZoomcastError::capture(format!("thread '{name}' panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_join_returns_value() {
        let handle = std::thread::spawn(|| 42);
        let value = join_with_timeout(handle, "answer", Duration::from_secs(1)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_join_times_out_on_stuck_thread() {
        let release = Arc::new(AtomicBool::new(false));
        let handle = {
            let release = Arc::clone(&release);
            std::thread::spawn(move || {
                while !release.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(5));
                }
            })
        };
        let err = join_with_timeout(handle, "stuck", Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ZoomcastError::ThreadJoinTimeout { .. }));
        release.store(true, Ordering::SeqCst);
    }
}
