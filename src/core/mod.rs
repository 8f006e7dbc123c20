//! 核心层：错误类型与会话上下文

pub mod error;
pub mod session;

pub use error::{CompletionError, DiffError, InputError, ParseError, RefineError, WorkflowError};
pub use session::SessionContext;
