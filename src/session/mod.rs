//! 会话模块
//!
//! 进程内唯一的会话上下文：对话历史、自定义指令、最近一次生成的代码、
//! 预览进程句柄以及预览文件所在的临时目录。

mod state;

pub use state::{Session, SessionHandle};
