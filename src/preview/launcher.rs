//! 预览启动器
//!
//! 持有唯一的预览子进程句柄，生命周期用显式阶段表示：
//!
//! ```text
//! Idle ──start──▶ Starting ──alive──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                    │                                                 ▲
//!                    └──────────────exited early / spawn error─────────┘
//! ```
//!
//! 启动/终止的存活判断都是启发式的（固定等待时间），宁可误报失败也不无限等待。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::check::defines_app_window;
use super::process::PreviewProcess;
use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::prompt::APP_WINDOW_VARIABLE;

/// 预览阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewPhase {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// 预览状态（对外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStatus {
    pub is_running: bool,
    pub pid: Option<u32>,
}

/// 停止结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 没有运行中的预览
    NotRunning,
    /// 已停止；`forced` 表示使用了强制终止
    Stopped { pid: u32, forced: bool },
}

/// 预览启动器
pub struct PreviewLauncher {
    file_path: PathBuf,
    interpreter: String,
    startup_delay: Duration,
    stop_grace: Duration,
    phase: PreviewPhase,
    process: Option<PreviewProcess>,
    /// 最近一次写入失败，文件内容不是最新代码
    stale: bool,
}

impl PreviewLauncher {
    pub fn new(file_path: PathBuf, config: &PreviewConfig) -> Self {
        Self {
            file_path,
            interpreter: config.interpreter.clone(),
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            stop_grace: Duration::from_millis(config.stop_grace_ms),
            phase: PreviewPhase::Idle,
            process: None,
            stale: false,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn phase(&self) -> PreviewPhase {
        self.phase
    }

    /// 同步阶段：Running 状态下进程已自行退出时转为 Stopped
    fn refresh(&mut self) {
        let exited = match self.process.as_mut() {
            Some(process) => !process.is_alive(),
            None => false,
        };
        if exited {
            if let Some(mut process) = self.process.take() {
                tracing::info!(
                    "[PREVIEW] pid={} exited with code {:?}",
                    process.pid(),
                    process.exit_code().flatten()
                );
            }
            self.phase = PreviewPhase::Stopped;
        }
    }

    /// 当前状态
    pub fn status(&mut self) -> PreviewStatus {
        self.refresh();
        match self.process.as_ref() {
            Some(process) if self.phase == PreviewPhase::Running => PreviewStatus {
                is_running: true,
                pid: Some(process.pid()),
            },
            _ => PreviewStatus {
                is_running: false,
                pid: None,
            },
        }
    }

    /// 写入预览文件；已有预览在运行时先尽力终止（失败只记录日志）
    pub async fn save_preview(&mut self, code: &str) -> Result<(), PreviewError> {
        if code.trim().is_empty() {
            tracing::warn!("[PREVIEW] Empty or invalid code provided");
            return Err(PreviewError::EmptyCode);
        }

        if let Err(e) = self.stop_preview().await {
            tracing::warn!("[PREVIEW] Error terminating previous UI process: {}", e);
        }

        if let Err(e) = tokio::fs::write(&self.file_path, code).await {
            tracing::error!("[PREVIEW] Error saving UI code: {}", e);
            self.stale = true;
            if let Err(e) = tokio::fs::remove_file(&self.file_path).await {
                tracing::debug!("[PREVIEW] Could not remove stale preview file: {}", e);
            }
            return Err(PreviewError::Io(e));
        }

        self.stale = false;
        tracing::info!("[PREVIEW] Saved UI code to {:?}", self.file_path);
        Ok(())
    }

    /// 启动预览，成功返回 pid
    pub async fn start_preview(&mut self) -> Result<u32, PreviewError> {
        if self.stale {
            tracing::error!("[PREVIEW] Refusing to launch stale file {:?}", self.file_path);
            return Err(PreviewError::StalePreviewFile(self.file_path.clone()));
        }

        let code = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(code) => code,
            Err(_) => {
                tracing::error!("[PREVIEW] No UI code file found at {:?}", self.file_path);
                return Err(PreviewError::NoPreviewFile(self.file_path.clone()));
            }
        };

        if !defines_app_window(&code) {
            tracing::warn!(
                "[PREVIEW] Code does not define a top-level '{}' variable, launching anyway",
                APP_WINDOW_VARIABLE
            );
        }

        // 同一时间只允许一个预览
        if let Err(e) = self.stop_preview().await {
            tracing::warn!("[PREVIEW] Error terminating previous UI process: {}", e);
        }

        self.phase = PreviewPhase::Starting;
        let mut process = match PreviewProcess::spawn(&self.interpreter, &self.file_path) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!("[PREVIEW] Error launching UI preview: {}", e);
                self.phase = PreviewPhase::Stopped;
                return Err(e);
            }
        };

        tokio::time::sleep(self.startup_delay).await;

        if process.is_alive() {
            let pid = process.pid();
            tracing::info!("[PREVIEW] UI preview started successfully (pid: {})", pid);
            self.process = Some(process);
            self.phase = PreviewPhase::Running;
            return Ok(pid);
        }

        let code = process.exit_code().flatten();
        let (stdout, stderr) = process.collect_output().await;
        tracing::error!("[PREVIEW] UI process exited with code {:?}", code);
        tracing::error!("[PREVIEW] STDOUT: {}", stdout);
        tracing::error!("[PREVIEW] STDERR: {}", stderr);
        self.phase = PreviewPhase::Stopped;
        Err(PreviewError::ExitedEarly {
            code,
            stdout,
            stderr,
        })
    }

    /// 停止预览；没有运行中的预览时直接成功
    pub async fn stop_preview(&mut self) -> Result<StopOutcome, PreviewError> {
        self.refresh();
        let Some(mut process) = self.process.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        let pid = process.pid();
        self.phase = PreviewPhase::Stopping;
        tracing::info!("[PREVIEW] Stopping UI preview (pid: {})", pid);

        match process.terminate(self.stop_grace).await {
            Ok(forced) => {
                self.phase = PreviewPhase::Stopped;
                Ok(StopOutcome::Stopped { pid, forced })
            }
            Err(e) => {
                // 仍保留句柄，后续 stop/status 可以再次尝试
                self.process = Some(process);
                self.phase = PreviewPhase::Running;
                Err(e)
            }
        }
    }

    /// 进程退出前清理
    pub async fn shutdown(&mut self) {
        match self.stop_preview().await {
            Ok(StopOutcome::Stopped { pid, .. }) => {
                tracing::info!("[PREVIEW] Terminated preview pid={} on shutdown", pid)
            }
            Ok(StopOutcome::NotRunning) => {}
            Err(e) => tracing::warn!("[PREVIEW] Failed to stop preview on shutdown: {}", e),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn launcher(dir: &TempDir, startup_delay_ms: u64) -> PreviewLauncher {
        PreviewLauncher::new(
            dir.path().join("ui_preview.py"),
            &PreviewConfig {
                interpreter: "sh".to_string(),
                startup_delay_ms,
                stop_grace_ms: 500,
                file_name: "ui_preview.py".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_stop_without_start_is_success() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 100);
        assert_eq!(l.stop_preview().await.unwrap(), StopOutcome::NotRunning);
        assert_eq!(l.phase(), PreviewPhase::Idle);
        assert_eq!(
            l.status(),
            PreviewStatus {
                is_running: false,
                pid: None
            }
        );
    }

    #[tokio::test]
    async fn test_save_start_stop_status() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 200);
        l.save_preview("app=1\nsleep 30\n").await.unwrap();

        let pid = l.start_preview().await.unwrap();
        assert_eq!(l.phase(), PreviewPhase::Running);
        assert_eq!(
            l.status(),
            PreviewStatus {
                is_running: true,
                pid: Some(pid)
            }
        );

        let outcome = l.stop_preview().await.unwrap();
        assert!(matches!(outcome, StopOutcome::Stopped { pid: p, .. } if p == pid));
        assert_eq!(l.phase(), PreviewPhase::Stopped);
        assert!(!l.status().is_running);

        // 幂等
        assert_eq!(l.stop_preview().await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_start_reports_early_exit_diagnostics() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 300);
        l.save_preview("echo starting\necho 'ModuleNotFoundError' >&2\nexit 1\n")
            .await
            .unwrap();

        match l.start_preview().await {
            Err(PreviewError::ExitedEarly {
                code,
                stdout,
                stderr,
            }) => {
                assert_eq!(code, Some(1));
                assert!(stdout.contains("starting"));
                assert!(stderr.contains("ModuleNotFoundError"));
            }
            other => panic!("expected early exit, got {other:?}"),
        }
        assert_eq!(l.phase(), PreviewPhase::Stopped);
        assert!(!l.status().is_running);
    }

    #[tokio::test]
    async fn test_new_preview_supersedes_old() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 150);
        l.save_preview("sleep 30\n").await.unwrap();
        let first = l.start_preview().await.unwrap();

        l.save_preview("sleep 31\n").await.unwrap();
        // 保存时已终止旧进程
        assert!(!l.status().is_running);

        let second = l.start_preview().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(l.status().pid, Some(second));
        l.shutdown().await;
        assert!(!l.status().is_running);
    }

    #[tokio::test]
    async fn test_start_without_file() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 100);
        assert!(matches!(
            l.start_preview().await,
            Err(PreviewError::NoPreviewFile(_))
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_blank_code() {
        let dir = TempDir::new().unwrap();
        let mut l = launcher(&dir, 100);
        assert!(matches!(
            l.save_preview("  \n").await,
            Err(PreviewError::EmptyCode)
        ));
        assert!(!dir.path().join("ui_preview.py").exists());
    }

    #[tokio::test]
    async fn test_failed_save_blocks_launch_of_old_file() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("preview");
        std::fs::create_dir(&sub).unwrap();
        let mut l = PreviewLauncher::new(
            sub.join("ui_preview.py"),
            &PreviewConfig {
                interpreter: "sh".to_string(),
                startup_delay_ms: 100,
                ..PreviewConfig::default()
            },
        );
        l.save_preview("sleep 30\n").await.unwrap();

        // 目录消失后写入失败
        std::fs::remove_dir_all(&sub).unwrap();
        assert!(matches!(
            l.save_preview("echo new\n").await,
            Err(PreviewError::Io(_))
        ));

        // 旧内容即使重新出现也不能被启动
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("ui_preview.py"), "sleep 30\n").unwrap();
        assert!(matches!(
            l.start_preview().await,
            Err(PreviewError::StalePreviewFile(_))
        ));
        assert!(!l.status().is_running);

        // 再次保存成功后恢复正常
        l.save_preview("sleep 30\n").await.unwrap();
        l.start_preview().await.unwrap();
        l.shutdown().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut l = PreviewLauncher::new(
            dir.path().join("ui_preview.py"),
            &PreviewConfig {
                interpreter: "/nonexistent/python3".to_string(),
                ..PreviewConfig::default()
            },
        );
        l.save_preview("app = 1").await.unwrap();
        assert!(matches!(
            l.start_preview().await,
            Err(PreviewError::Spawn { .. })
        ));
        assert_eq!(l.phase(), PreviewPhase::Stopped);
    }
}
