//! 预览前的静态检查
//!
//! 生成代码应当定义顶层窗口变量（见 prompt 清单）。这里只做提示，不阻止启动。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::prompt::APP_WINDOW_VARIABLE;

/// 顶层（无缩进）赋值，允许类型注解：`app = ...` / `app: ctk.CTk = ...`
static TOP_LEVEL_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^{}\s*(?::[^=\n]*)?=[^=]",
        regex::escape(APP_WINDOW_VARIABLE)
    ))
    .expect("valid assignment regex")
});

/// 代码是否在顶层定义了窗口变量
pub fn defines_app_window(code: &str) -> bool {
    TOP_LEVEL_ASSIGNMENT.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_plain_assignment() {
        assert!(defines_app_window("import customtkinter as ctk\napp = ctk.CTk()\n"));
        assert!(defines_app_window("app=ctk.CTk()"));
        assert!(defines_app_window("app: ctk.CTk = ctk.CTk()"));
    }

    #[test]
    fn test_ignores_nested_and_comparisons() {
        assert!(!defines_app_window("def main():\n    app = ctk.CTk()\n"));
        assert!(!defines_app_window("if app == None:\n    pass"));
        assert!(!defines_app_window("application = ctk.CTk()"));
        assert!(!defines_app_window("self.app = ctk.CTk()"));
    }
}
