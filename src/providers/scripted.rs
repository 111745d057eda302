//! 脚本化 Provider
//!
//! 按预先给定的文本/分片应答，不访问网络。用于离线演示（`gemini.offline`）和测试。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use super::{CompletionProvider, TextStream};
use crate::error::GenerationError;

/// 单次应答
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// 一次性返回的完整文本（流式时作为单个分片）
    Text(String),
    /// 流式分片，`Err` 模拟中途失败
    Chunks(Vec<Result<String, GenerationError>>),
    /// 直接失败
    Fail(GenerationError),
}

/// 依次返回预设应答的 Provider；应答用完后重复最后一个
pub struct ScriptedProvider {
    replies: Vec<ScriptedReply>,
    cursor: AtomicUsize,
    configured: bool,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies,
            cursor: AtomicUsize::new(0),
            configured: true,
        }
    }

    /// 模拟未配置凭证的 Provider
    pub fn unconfigured() -> Self {
        Self {
            replies: Vec::new(),
            cursor: AtomicUsize::new(0),
            configured: false,
        }
    }

    /// 离线演示用的固定应答
    pub fn demo() -> Self {
        Self::new(vec![ScriptedReply::Text(DEMO_REPLY.to_string())])
    }

    /// 已消费的应答次数
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<ScriptedReply, GenerationError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .ok_or_else(|| GenerationError::upstream("No scripted reply available"))
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        match self.next_reply()? {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Chunks(chunks) => chunks.into_iter().collect(),
            ScriptedReply::Fail(e) => Err(e),
        }
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, GenerationError> {
        match self.next_reply()? {
            ScriptedReply::Text(text) => Ok(Box::pin(stream::iter(vec![Ok(text)]))),
            ScriptedReply::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks))),
            ScriptedReply::Fail(e) => Err(e),
        }
    }
}

const DEMO_REPLY: &str = r#"```python
import customtkinter as ctk

ctk.set_appearance_mode("dark")
ctk.set_default_color_theme("blue")

app = ctk.CTk()
app.title("Login")
app.geometry("400x360")

frame = ctk.CTkFrame(master=app)
frame.pack(pady=20, padx=40, fill="both", expand=True)

ctk.CTkLabel(master=frame, text="Login System", font=("Roboto", 24)).pack(pady=12, padx=10)
ctk.CTkEntry(master=frame, placeholder_text="Username").pack(pady=12, padx=10)
ctk.CTkEntry(master=frame, placeholder_text="Password", show="*").pack(pady=12, padx=10)
ctk.CTkButton(master=frame, text="Login").pack(pady=12, padx=10)

app.mainloop()
```"#;
