//! 错误类型
//!
//! 核心各环节的错误：补全调用失败（CompletionError）、结构化结果解析失败（ParseError）、
//! 精炼失败（RefineError）、差异计算失败（DiffError）、用户输入错误（InputError），以及工作流层面的 WorkflowError。
//! 分析、精炼、差异三步在内部降级处理，不会把错误抛给调用方；这里的类型主要用于边界与日志。

use thiserror::Error;

/// 委托补全服务的失败（网络、服务端、超时、空回复统一视为失败）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Request build failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Empty completion")]
    Empty,
}

/// 从模型自由文本中提取结构化结果失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJsonRegion,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unexpected structure: {0}")]
    UnexpectedShape(String),
}

/// 精炼失败：补全调用失败，或改进后的提示词没有原样保留全部类别名
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefineError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Improved prompt is missing category names: {}", .0.join(", "))]
    MissingCategoryNames(Vec<String>),
}

/// 差异计算失败；调用方拿到的是降级后的 DiffResult
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("Diff rendering failed: {0}")]
    Render(String),

    #[error("Diff computation panicked")]
    Panicked,
}

/// 用户输入错误（终端录入反馈等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("No feedback provided")]
    EmptyFeedback,

    #[error("Please use format: 'response_number new_category' (got '{0}')")]
    MalformedLine(String),

    #[error("Please enter a valid response number (got '{0}')")]
    InvalidNumber(String),

    #[error("Response number must be between 1 and {max} (got {number})")]
    IndexOutOfRange { number: usize, max: usize },

    #[error("Category must be one of: {allowed} (got '{name}')")]
    UnknownCategory { name: String, allowed: String },

    #[error("Invalid responses file: {0}")]
    InvalidResponses(String),
}

/// 精炼循环的错误：达到上限、无反馈、无待审结果等
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Maximum iteration limit ({max}) reached")]
    IterationLimit { max: usize },

    #[error("No feedback data available for iteration")]
    NoFeedback,

    #[error("No iteration data available")]
    NoPendingRefinement,

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Config error: {0}")]
    Config(String),
}
