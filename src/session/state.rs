//! 会话状态
//!
//! `Session` 是纯数据，`SessionHandle` 用一把 `tokio::sync::Mutex` 保护它。
//! 读-改-写序列在整个过程中持有锁，但调用补全服务期间绝不持有。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::PreviewConfig;
use crate::error::PreviewError;
use crate::models::ConversationTurn;
use crate::preview::{PreviewLauncher, PreviewStatus, StopOutcome};

/// 会话数据
pub struct Session {
    history: Vec<ConversationTurn>,
    custom_instructions: String,
    last_code: Option<String>,
    preview: PreviewLauncher,
    /// 预览文件所在目录；drop 时删除
    temp_dir: Option<TempDir>,
}

impl Session {
    /// 创建会话并分配预览临时目录
    pub fn new(config: &PreviewConfig) -> std::io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("uiforge-").tempdir()?;
        let preview_path = temp_dir.path().join(&config.file_name);
        tracing::info!("[SESSION] Preview file: {:?}", preview_path);

        Ok(Self {
            history: Vec::new(),
            custom_instructions: String::new(),
            last_code: None,
            preview: PreviewLauncher::new(preview_path, config),
            temp_dir: Some(temp_dir),
        })
    }

    pub fn append_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn instructions(&self) -> &str {
        &self.custom_instructions
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.custom_instructions = instructions.into();
    }

    pub fn last_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    pub fn set_last_code(&mut self, code: impl Into<String>) {
        self.last_code = Some(code.into());
    }

    /// 记录一次成功生成：保存代码并追加助手回复
    pub fn record_generation(&mut self, code: &str) {
        self.set_last_code(code);
        self.append_turn(ConversationTurn::generated_code(code));
    }

    /// 记录生成结果，代码非空时写入预览文件（不启动）
    pub async fn persist_generation(&mut self, code: &str) -> Result<(), PreviewError> {
        self.record_generation(code);
        if code.trim().is_empty() {
            return Ok(());
        }
        self.preview.save_preview(code).await
    }

    pub fn preview_mut(&mut self) -> &mut PreviewLauncher {
        &mut self.preview
    }

    pub fn preview_path(&self) -> &Path {
        self.preview.file_path()
    }

    pub fn preview_status(&mut self) -> PreviewStatus {
        self.preview.status()
    }

    /// 退出前清理：终止预览进程并删除临时目录
    pub async fn shutdown(&mut self) {
        self.preview.shutdown().await;
        if let Some(dir) = self.temp_dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::info!("[SESSION] Removed temp directory {:?}", path),
                Err(e) => tracing::warn!("[SESSION] Failed to remove {:?}: {}", path, e),
            }
        }
    }
}

/// 共享会话句柄
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.lock().await.history().to_vec()
    }

    pub async fn last_code(&self) -> Option<String> {
        self.lock().await.last_code().map(str::to_string)
    }

    pub async fn preview_path(&self) -> PathBuf {
        self.lock().await.preview_path().to_path_buf()
    }

    pub async fn stop_preview(&self) -> Result<StopOutcome, PreviewError> {
        self.lock().await.preview_mut().stop_preview().await
    }

    pub async fn shutdown(&self) {
        self.lock().await.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn session() -> Session {
        Session::new(&PreviewConfig::default()).unwrap()
    }

    #[test]
    fn test_new_session_is_empty() {
        let s = session();
        assert!(s.history().is_empty());
        assert_eq!(s.instructions(), "");
        assert!(s.last_code().is_none());
        assert!(s.preview_path().ends_with("ui_preview.py"));
        assert!(!s.preview_path().exists());
    }

    #[test]
    fn test_record_generation_appends_assistant_turn() {
        let mut s = session();
        s.append_turn(ConversationTurn::user("a login form"));
        s.record_generation("print('hi')");

        assert_eq!(s.last_code(), Some("print('hi')"));
        assert_eq!(s.history().len(), 2);
        let turn = &s.history()[1];
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "Generated UI code:\n```python\nprint('hi')\n```");
    }

    #[test]
    fn test_instructions_are_replaced() {
        let mut s = session();
        s.set_instructions("dark theme");
        s.set_instructions("blue buttons");
        assert_eq!(s.instructions(), "blue buttons");
    }

    #[tokio::test]
    async fn test_persist_generation_writes_preview_file() {
        let mut s = session();
        s.persist_generation("app = 1").await.unwrap();
        let written = tokio::fs::read_to_string(s.preview_path()).await.unwrap();
        assert_eq!(written, "app = 1");
    }

    #[tokio::test]
    async fn test_persist_empty_generation_skips_file() {
        let mut s = session();
        s.persist_generation("").await.unwrap();
        assert_eq!(s.last_code(), Some(""));
        assert!(!s.preview_path().exists());
    }

    #[tokio::test]
    async fn test_shutdown_removes_temp_dir() {
        let handle = SessionHandle::new(session());
        let path = handle.preview_path().await;
        let dir = path.parent().unwrap().to_path_buf();
        assert!(dir.exists());

        handle.shutdown().await;
        assert!(!dir.exists());
    }
}
