//! promptsmith - 基于人工反馈迭代改进分类提示词
//!
//! 模块划分：
//! - **classify**: 类别与初始提示词生成、批量推理、结构化结果提取
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与会话上下文
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: tracing 初始化
//! - **refinement**: 反馈分析、提示词精炼、差异可视化、迭代控制

pub mod classify;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod refinement;

pub use crate::core::{SessionContext, WorkflowError};
pub use refinement::{RefinementLoop, ReviewDecision};
