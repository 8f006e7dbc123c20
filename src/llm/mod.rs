//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use traits::LlmClient;

use crate::config::LlmSection;

/// 按 [llm] 配置创建客户端；provider 为 mock 或找不到任何 API Key 时使用 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let timeout = cfg.timeouts.request;

    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }

    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();
    let use_deepseek = (provider == "deepseek" && (has_deepseek_key || has_openai_key))
        || (provider != "openai" && has_deepseek_key);
    let use_openai = has_openai_key && provider == "openai";

    if use_deepseek {
        let model = cfg.deepseek.model.clone().unwrap_or_else(|| cfg.model.clone());
        let client = OpenAiClient::deepseek(Some(&model), timeout);
        tracing::info!(model = client.model(), "Using DeepSeek LLM");
        Arc::new(client)
    } else if use_openai {
        let model = cfg
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let client = OpenAiClient::new(
            cfg.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            timeout,
        );
        tracing::info!(model = client.model(), "Using OpenAI LLM");
        Arc::new(client)
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}
