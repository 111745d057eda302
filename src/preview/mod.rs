//! 预览模块
//!
//! 把生成的代码写入固定的临时文件，并作为独立子进程运行。

pub mod check;
pub mod launcher;
pub mod process;

pub use check::defines_app_window;
pub use launcher::{PreviewLauncher, PreviewPhase, PreviewStatus, StopOutcome};
