//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 可预置一串回复（成功或失败）按顺序返回，并记录每次调用收到的消息；
//! 脚本用完后回显最后一条 User 消息。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::CompletionError;
use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：按脚本回复，记录调用
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置成功回复，按顺序消费
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for r in replies {
            client.push_reply(r);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    /// 预置一次失败
    pub fn push_failure(&self, err: CompletionError) {
        lock(&self.replies).push_back(Err(err));
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// 第 n 次调用中最后一条 User 消息内容
    pub fn user_prompt(&self, n: usize) -> Option<String> {
        lock(&self.calls).get(n).and_then(|msgs| last_user(msgs).map(String::from))
    }
}

fn last_user(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.as_str())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        lock(&self.calls).push(messages.to_vec());

        if let Some(reply) = lock(&self.replies).pop_front() {
            return reply;
        }

        Ok(format!(
            "Echo from Mock: {}",
            last_user(messages).unwrap_or("(no input)")
        ))
    }
}
