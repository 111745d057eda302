//! 代码提取器
//!
//! 从模型返回的文本中提取最可能的源代码片段：
//! 1. 三反引号代码块（取第一个）
//! 2. 单反引号片段（全部拼接，每段一行）
//! 3. 都没有时原样返回

use once_cell::sync::Lazy;
use regex::Regex;

/// 三反引号代码块，允许可选的语言标签和紧随其后的换行
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[\w+.#-]*\r?\n)?(.*?)```").expect("valid fence regex"));

/// 单反引号片段
static INLINE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)`(.*?)`").expect("valid inline regex"));

/// 日志预览长度（字符）
const LOG_PREVIEW_CHARS: usize = 50;

/// 提取使用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    Fenced,
    Inline,
    Passthrough,
    Empty,
}

fn preview(s: &str) -> String {
    s.chars().take(LOG_PREVIEW_CHARS).collect()
}

/// 提取代码并返回所用策略
pub fn extract_with_strategy(text: Option<&str>) -> (String, Extraction) {
    let text = match text {
        Some(t) if !t.is_empty() => t,
        _ => {
            tracing::debug!("[EXTRACT] Empty text provided, nothing to extract");
            return (String::new(), Extraction::Empty);
        }
    };

    if let Some(caps) = FENCED_BLOCK.captures(text) {
        let code = caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        tracing::debug!("[EXTRACT] Extracted code block: {}...", preview(&code));
        return (code, Extraction::Fenced);
    }

    let spans: Vec<&str> = INLINE_SPAN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .collect();
    if !spans.is_empty() {
        let code = spans.join("\n");
        tracing::debug!(
            "[EXTRACT] Extracted from single backticks: {}...",
            preview(&code)
        );
        return (code, Extraction::Inline);
    }

    tracing::debug!(
        "[EXTRACT] No code blocks found, using entire text: {}...",
        preview(text)
    );
    (text.to_string(), Extraction::Passthrough)
}

/// 从可能缺失的文本中提取代码，缺失或为空时返回空字符串
pub fn extract(text: Option<&str>) -> String {
    extract_with_strategy(text).0
}

/// `extract` 的 `&str` 便捷版本
pub fn extract_code(text: &str) -> String {
    extract(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_fenced_block_wins() {
        let text = "Here you go:\n```python\nimport customtkinter as ctk\napp = ctk.CTk()\n```\nand another\n```python\nprint('second')\n```";
        assert_eq!(
            extract_code(text),
            "import customtkinter as ctk\napp = ctk.CTk()"
        );
    }

    #[test]
    fn test_fence_without_language_tag() {
        assert_eq!(extract_code("```\n  x = 1  \n```"), "x = 1");
    }

    #[test]
    fn test_fence_with_crlf_and_other_tag() {
        assert_eq!(extract_code("```py\r\nx = 1\r\n```"), "x = 1");
    }

    #[test]
    fn test_fence_on_single_line_keeps_body() {
        assert_eq!(extract_code("```print('hi')```"), "print('hi')");
    }

    #[test]
    fn test_inline_spans_joined_in_order() {
        let text = "Run ` pip install customtkinter ` then `python app.py`.";
        let (code, strategy) = extract_with_strategy(Some(text));
        assert_eq!(strategy, Extraction::Inline);
        assert_eq!(code, "pip install customtkinter\npython app.py");
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = "def main():\n    pass";
        let (code, strategy) = extract_with_strategy(Some(text));
        assert_eq!(strategy, Extraction::Passthrough);
        assert_eq!(code, text);
    }

    #[test]
    fn test_empty_and_missing_input() {
        assert_eq!(extract(None), "");
        assert_eq!(extract(Some("")), "");
        assert_eq!(extract_with_strategy(None).1, Extraction::Empty);
    }

    #[test]
    fn test_unclosed_fence_falls_back() {
        // 未闭合的三反引号不算代码块
        let text = "```python\nimport os";
        assert_ne!(extract_with_strategy(Some(text)).1, Extraction::Fenced);
    }

    proptest! {
        #[test]
        fn prop_text_without_backticks_is_identity(text in "[^`]*") {
            let expected = text.clone();
            prop_assert_eq!(extract(Some(&text)), expected);
        }

        #[test]
        fn prop_first_fence_is_returned_regardless_of_surroundings(
            before in "[^`]{0,40}",
            body in "[^`]{0,80}",
            after in "[^`]{0,40}",
        ) {
            let text = format!("{before}```python\n{body}\n```{after}```\nother\n```");
            prop_assert_eq!(extract_code(&text), body.trim().to_string());
        }

        #[test]
        fn prop_never_panics(text in ".*") {
            let _ = extract_code(&text);
        }
    }
}
