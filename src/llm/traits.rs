//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient。核心只依赖 `complete`，
//! 任何非成功结果都统一视为 CompletionError，不区分状态码。

use async_trait::async_trait;

use crate::core::CompletionError;
use crate::llm::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;

    /// 单条 user 消息的便捷调用：`complete(text) -> text`
    async fn complete_text(&self, prompt: &str) -> Result<String, CompletionError> {
        self.complete(&[Message::user(prompt)]).await
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
