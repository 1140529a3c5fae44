//! drand subprocess supervision.
//!
//! The supervisor owns the child: it starts the daemon, pipes its output into
//! structured logs, restarts it with exponential backoff when it exits, and
//! tears it down with SIGTERM (then SIGKILL after a grace period) on
//! shutdown. The child owns its data directory and long-term keys; nothing
//! else reads or mutates that directory.

use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;
use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{error::ConfigError, metrics::SidecarMetrics};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Configuration for the supervised drand subprocess.
#[derive(Debug, Clone, Default)]
pub struct DrandProcessConfig {
    pub binary_path: String,
    pub data_dir: String,

    pub private_listen: String,
    pub public_listen: String,
    pub control_listen: String,

    pub extra_args: Vec<String>,
}

/// A supervised local drand daemon.
pub struct DrandProcess {
    cancel: CancellationToken,
    pid: Arc<AtomicI32>,
    done: Mutex<Option<oneshot::Receiver<()>>>,
}

impl DrandProcess {
    /// Start the daemon and its supervision loop. Fails if any listen
    /// address or the data dir is blank, if the data dir cannot be created,
    /// or if the first start attempt fails.
    pub fn start(
        parent: &CancellationToken,
        cfg: DrandProcessConfig,
        metrics: SidecarMetrics,
    ) -> Result<Self, ConfigError> {
        if cfg.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("drand data dir must be provided".into()));
        }
        if cfg.private_listen.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "drand private listen address must be provided".into(),
            ));
        }
        if cfg.public_listen.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "drand public listen address must be provided".into(),
            ));
        }
        if cfg.control_listen.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "drand control listen address must be provided".into(),
            ));
        }

        std::fs::create_dir_all(&cfg.data_dir)?;
        std::fs::set_permissions(&cfg.data_dir, std::fs::Permissions::from_mode(0o755))?;

        let cancel = parent.child_token();
        let pid = Arc::new(AtomicI32::new(0));

        // The sidecar only starts when drand starts at least once.
        let child = start_once(&cfg, &metrics, &pid)?;

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(supervise(
            cfg,
            metrics,
            cancel.clone(),
            pid.clone(),
            child,
            done_tx,
        ));

        Ok(Self {
            cancel,
            pid,
            done: Mutex::new(Some(done_rx)),
        })
    }

    /// Terminate the daemon and stop further restarts. Sends SIGTERM, waits
    /// up to the grace period for the supervision loop to drain, then
    /// SIGKILLs and waits unconditionally. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        signal_child(self.pid.load(Ordering::Relaxed), Signal::SIGTERM);

        let done = self.done.lock().expect("done lock poisoned").take();
        let Some(mut done) = done else {
            return;
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, &mut done).await.is_err() {
            warn!("drand did not exit within grace period; killing");
            signal_child(self.pid.load(Ordering::Relaxed), Signal::SIGKILL);
            let _ = done.await;
        }
    }
}

async fn supervise(
    cfg: DrandProcessConfig,
    metrics: SidecarMetrics,
    cancel: CancellationToken,
    pid: Arc<AtomicI32>,
    child: Child,
    done_tx: oneshot::Sender<()>,
) {
    let mut current = Some(child);
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if let Some(child) = current.as_mut() {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = cancel.cancelled() => {
                    signal_child(pid.load(Ordering::Relaxed), Signal::SIGTERM);
                    let _ = child.wait().await;
                    break;
                }
            };

            metrics.set_process_healthy(false);
            if cancel.is_cancelled() {
                break;
            }

            match status {
                Ok(status) => warn!(%status, "drand process exited; restarting"),
                Err(err) => warn!(%err, "waiting on drand process failed; restarting"),
            }
        } else {
            metrics.set_process_healthy(false);
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => break,
        }

        if backoff < MAX_BACKOFF {
            backoff *= 2;
        }

        // Restart failures are not fatal; keep retrying with backoff.
        current = match start_once(&cfg, &metrics, &pid) {
            Ok(child) => Some(child),
            Err(err) => {
                error!(%err, "failed to restart drand; retrying");
                None
            }
        };
    }

    let _ = done_tx.send(());
}

fn start_once(
    cfg: &DrandProcessConfig,
    metrics: &SidecarMetrics,
    pid: &AtomicI32,
) -> Result<Child, ConfigError> {
    let bin = if cfg.binary_path.trim().is_empty() {
        "drand"
    } else {
        cfg.binary_path.trim()
    };

    let mut command = Command::new(bin);
    command
        .arg("start")
        .arg("--folder")
        .arg(&cfg.data_dir)
        .arg("--private-listen")
        .arg(&cfg.private_listen)
        .arg("--public-listen")
        .arg(&cfg.public_listen)
        .arg("--control")
        .arg(&cfg.control_listen)
        .args(&cfg.extra_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| ConfigError::Invalid(format!("starting drand: {err}")))?;

    let child_pid = child.id().map(|p| p as i32).unwrap_or(0);
    pid.store(child_pid, Ordering::Relaxed);

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pipe_to_logger(stdout, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pipe_to_logger(stderr, "stderr"));
    }

    metrics.set_process_healthy(true);
    info!(pid = child_pid, "started drand daemon");

    Ok(child)
}

/// Forward child output into structured logs line by line, skipping blanks.
async fn pipe_to_logger<R: AsyncRead + Unpin>(reader: R, stream: &'static str) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        info!(stream, line, "drand");
    }
}

fn signal_child(pid: i32, signal: Signal) {
    if pid <= 0 {
        return;
    }
    if let Err(err) = nix::sys::signal::kill(Pid::from_raw(pid), signal) {
        // ESRCH after exit is expected
        if err != nix::errno::Errno::ESRCH {
            warn!(pid, %err, "failed to signal drand process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(data_dir: &str, binary: &str) -> DrandProcessConfig {
        DrandProcessConfig {
            binary_path: binary.into(),
            data_dir: data_dir.into(),
            private_listen: "0.0.0.0:4444".into(),
            public_listen: "127.0.0.1:8081".into(),
            control_listen: "127.0.0.1:8881".into(),
            extra_args: Vec::new(),
        }
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let base = config(dir.path().to_str().unwrap(), "sleep");

        let breakages: [fn(&mut DrandProcessConfig); 4] = [
            |c| c.data_dir.clear(),
            |c| c.private_listen.clear(),
            |c| c.public_listen.clear(),
            |c| c.control_listen.clear(),
        ];
        for breakage in breakages {
            let mut cfg = base.clone();
            breakage(&mut cfg);
            assert!(matches!(
                DrandProcess::start(&cancel, cfg, SidecarMetrics::nop()),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_fatal_first_start() {
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(
            dir.path().to_str().unwrap(),
            "/nonexistent/definitely-not-drand",
        );

        assert!(DrandProcess::start(&cancel, cfg, SidecarMetrics::nop()).is_err());
    }

    #[tokio::test]
    async fn creates_data_dir_and_supervises_until_stopped() {
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("drand-data");

        // `sleep start ...` exits immediately with a usage error, which
        // exercises the restart path; stop() must still drain cleanly.
        let cfg = config(data_dir.to_str().unwrap(), "sleep");
        let process = DrandProcess::start(&cancel, cfg, SidecarMetrics::nop()).unwrap();

        assert!(data_dir.is_dir());

        tokio::time::sleep(Duration::from_millis(300)).await;
        process.stop().await;
        // second stop is a no-op
        process.stop().await;
    }

    #[tokio::test]
    async fn stop_terminates_a_long_running_child() {
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();

        // a stand-in daemon that ignores its arguments and runs forever
        let script = dir.path().join("fake-drand.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 60\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cfg = config(dir.path().to_str().unwrap(), script.to_str().unwrap());
        let process = DrandProcess::start(&cancel, cfg, SidecarMetrics::nop()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        process.stop().await;
        // SIGTERM path, not the 10s SIGKILL fallback
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
