//! Prompt 构建
//!
//! 模板顺序固定：角色设定、自定义指令、历史对话、本次请求、硬性要求清单。
//! 清单最后一条要求生成代码定义 [`APP_WINDOW_VARIABLE`]，预览启动前的
//! 静态检查使用同一个常量。

use crate::models::ConversationTurn;

/// 生成代码必须定义的顶层窗口变量名
pub const APP_WINDOW_VARIABLE: &str = "app";

/// 目标 UI 工具包
pub const TARGET_TOOLKIT: &str = "CustomTkinter";

/// 把历史渲染为逐行的 `User:` / `Assistant:` 文本
pub fn render_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(ConversationTurn::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// 构建完整 prompt
pub fn build_prompt(
    user_request: &str,
    custom_instructions: &str,
    history: &[ConversationTurn],
) -> String {
    let conversation_context = render_history(history);

    format!(
        "You are an expert {toolkit} UI developer. Your task is to generate Python code for a desktop application UI based on user descriptions.

Custom instructions:
{custom_instructions}

Previous conversation:
{conversation_context}

User request: {user_request}

Please provide the complete {toolkit} code for this UI. The code should be complete, functional, and ready to run.
Only include the Python code (no explanations). The code should:
1. Use the {toolkit} library
2. Create a complete, standalone application
3. Include all necessary imports
4. Be ready to execute without modification
5. Define a main app window variable called '{app_var}'
",
        toolkit = TARGET_TOOLKIT,
        app_var = APP_WINDOW_VARIABLE,
    )
}
