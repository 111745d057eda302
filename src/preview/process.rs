//! 预览子进程的启动、输出采集与终止

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::PreviewError;

/// 每个输出流最多保留的字节数
const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// 强制终止后等待回收的时间
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// 进程输出缓冲（只保留最新的部分）
#[derive(Debug, Default, Clone)]
pub struct CapturedOutput {
    stdout: Arc<Mutex<String>>,
    stderr: Arc<Mutex<String>>,
}

impl CapturedOutput {
    pub fn stdout(&self) -> String {
        self.stdout.lock().clone()
    }

    pub fn stderr(&self) -> String {
        self.stderr.lock().clone()
    }
}

fn push_capped(buf: &Mutex<String>, line: &str) {
    let mut buf = buf.lock();
    buf.push_str(line);
    buf.push('\n');
    if buf.len() > MAX_CAPTURED_BYTES {
        let mut cut = buf.len() - MAX_CAPTURED_BYTES;
        while !buf.is_char_boundary(cut) {
            cut += 1;
        }
        buf.drain(..cut);
    }
}

fn spawn_reader<R>(reader: R, buf: Arc<Mutex<String>>, pid: u32, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!("[PREVIEW] pid={} {}: {}", pid, stream, line);
            push_capped(&buf, &line);
        }
    })
}

/// 运行中的预览进程
pub struct PreviewProcess {
    child: Child,
    pid: u32,
    output: CapturedOutput,
    readers: Vec<JoinHandle<()>>,
}

impl PreviewProcess {
    /// 用解释器运行脚本，stdout/stderr 持续读取到缓冲区，避免管道写满阻塞子进程
    pub fn spawn(interpreter: &str, script: &Path) -> Result<Self, PreviewError> {
        let mut child = Command::new(interpreter)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PreviewError::Spawn {
                interpreter: interpreter.to_string(),
                source,
            })?;

        let pid = child.id().unwrap_or_default();
        let output = CapturedOutput::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, output.stdout.clone(), pid, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, output.stderr.clone(), pid, "stderr"));
        }

        Ok(Self {
            child,
            pid,
            output,
            readers,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 进程是否仍在运行；查询失败视为已退出
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// 已退出时返回退出码（被信号终止时为 None）
    pub fn exit_code(&mut self) -> Option<Option<i32>> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            _ => None,
        }
    }

    /// 等待输出读取任务结束并返回采集到的 stdout/stderr
    pub async fn collect_output(&mut self) -> (String, String) {
        for reader in self.readers.drain(..) {
            let _ = tokio::time::timeout(Duration::from_millis(500), reader).await;
        }
        (self.output.stdout(), self.output.stderr())
    }

    /// 请求优雅退出：发送 SIGTERM
    #[cfg(unix)]
    fn request_termination(&mut self) -> Result<(), PreviewError> {
        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(self.pid.to_string())
            .status()
            .map_err(|e| PreviewError::Terminate {
                pid: self.pid,
                message: format!("Failed to send SIGTERM: {e}"),
            })?;
        if !status.success() && self.is_alive() {
            return Err(PreviewError::Terminate {
                pid: self.pid,
                message: format!("kill -TERM exited with {status}"),
            });
        }
        Ok(())
    }

    /// 非 Unix 平台没有 SIGTERM，直接强制终止
    #[cfg(not(unix))]
    fn request_termination(&mut self) -> Result<(), PreviewError> {
        self.child.start_kill().map_err(|e| PreviewError::Terminate {
            pid: self.pid,
            message: e.to_string(),
        })
    }

    /// 终止进程：优雅请求 → 宽限期 → 强制终止。返回是否使用了强制终止。
    pub async fn terminate(&mut self, grace: Duration) -> Result<bool, PreviewError> {
        if !self.is_alive() {
            return Ok(false);
        }

        if let Err(e) = self.request_termination() {
            tracing::warn!("[PREVIEW] {}", e);
        }

        if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
            tracing::debug!("[PREVIEW] pid={} exited after termination request", self.pid);
            return Ok(false);
        }

        tracing::warn!(
            "[PREVIEW] pid={} didn't exit gracefully, forcing kill",
            self.pid
        );
        self.child
            .start_kill()
            .map_err(|e| PreviewError::Terminate {
                pid: self.pid,
                message: e.to_string(),
            })?;

        match tokio::time::timeout(KILL_REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(PreviewError::Terminate {
                pid: self.pid,
                message: e.to_string(),
            }),
            Err(_) => Err(PreviewError::Terminate {
                pid: self.pid,
                message: "process still alive after kill".to_string(),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("script.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_captures_output_of_exited_process() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo hello\necho oops >&2\nexit 3\n");
        let mut process = PreviewProcess::spawn("sh", &path).unwrap();

        let _ = tokio::time::timeout(Duration::from_secs(5), process.child.wait()).await;
        assert_eq!(process.exit_code(), Some(Some(3)));

        let (stdout, stderr) = process.collect_output().await;
        assert_eq!(stdout, "hello\n");
        assert_eq!(stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_terminate_gracefully() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "sleep 30\n");
        let mut process = PreviewProcess::spawn("sh", &path).unwrap();
        assert!(process.is_alive());

        let forced = process.terminate(Duration::from_secs(2)).await.unwrap();
        assert!(!forced);
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn test_terminate_forces_when_term_ignored() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "trap '' TERM\nwhile true; do sleep 1; done\n");
        let mut process = PreviewProcess::spawn("sh", &path).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let forced = process.terminate(Duration::from_millis(300)).await.unwrap();
        assert!(forced);
        assert!(!process.is_alive());
    }

    #[test]
    fn test_push_capped_keeps_tail() {
        let buf = Mutex::new(String::new());
        let line = "x".repeat(1024);
        for _ in 0..100 {
            push_capped(&buf, &line);
        }
        assert!(buf.lock().len() <= MAX_CAPTURED_BYTES);
    }

    #[tokio::test]
    async fn test_spawn_missing_interpreter() {
        let err = PreviewProcess::spawn("/nonexistent/python", Path::new("x.py"))
            .err()
            .unwrap();
        assert!(matches!(err, PreviewError::Spawn { .. }));
    }
}
