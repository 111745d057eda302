//! 对话历史数据模型

use serde::{Deserialize, Serialize};

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// 渲染到 prompt 中使用的前缀
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// 一轮对话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// 助手回复：把生成的代码包进 python 代码块，便于后续 prompt 回顾
    pub fn generated_code(code: &str) -> Self {
        Self::assistant(format!("Generated UI code:\n```python\n{code}\n```"))
    }

    /// 渲染为 `User: ...` / `Assistant: ...`
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}
