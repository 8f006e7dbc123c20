//! 批量推理：一次补全调用为整批回答打标签
//!
//! 提示词 = 指令 + 回答 JSON + 输出格式；回复按 "0".."n" 键解析，缺失的条目标为 `error`。
//! 调用或解析失败时整批标为 `error`，不向上报错。

use std::sync::Arc;

use serde_json::Value;

use crate::classify::extract::extract_structured_result;
use crate::classify::{ClassificationResult, Response, ERROR_LABEL};
use crate::llm::LlmClient;
use crate::refinement::prompts;

pub struct BatchClassifier {
    llm: Arc<dyn LlmClient>,
}

impl BatchClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, instructions: &str, responses: &[Response]) -> Vec<ClassificationResult> {
        if responses.is_empty() {
            return Vec::new();
        }

        let batch_prompt = prompts::batch_inference_prompt(instructions, responses);
        tracing::info!(
            responses = responses.len(),
            prompt_chars = batch_prompt.len(),
            "Running batch inference"
        );

        let reply = match self.llm.complete_text(&batch_prompt).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Batch inference call failed");
                return all_errors(responses);
            }
        };

        let scores = match extract_structured_result(&reply) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, reply_chars = reply.len(), "Could not parse batch reply");
                return all_errors(responses);
            }
        };

        let results: Vec<ClassificationResult> = responses
            .iter()
            .map(|r| {
                let label = scores
                    .get(&r.index.to_string())
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                if label.is_none() {
                    tracing::debug!(index = r.index, "Missing from batch response");
                }
                ClassificationResult::new(r.index, r.text.clone(), label.unwrap_or(ERROR_LABEL))
            })
            .collect();

        let errors = results.iter().filter(|r| r.is_error()).count();
        tracing::info!(total = results.len(), errors, "Batch inference finished");
        results
    }
}

fn all_errors(responses: &[Response]) -> Vec<ClassificationResult> {
    responses
        .iter()
        .map(|r| ClassificationResult::new(r.index, r.text.clone(), ERROR_LABEL))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompletionError;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_labels_by_index_and_missing_is_error() {
        let mock = Arc::new(MockLlmClient::with_replies([
            "```json\n{\"0\": \" High \", \"2\": \"Low\"}\n```",
        ]));
        let classifier = BatchClassifier::new(mock.clone());
        let responses = Response::batch(["great", "meh", "bad"]);
        let results = classifier.classify("Classify.", &responses).await;

        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["High", ERROR_LABEL, "Low"]);
        assert_eq!(results[1].response_text, "meh");
        assert_eq!(mock.call_count(), 1);
        assert!(mock.user_prompt(0).unwrap().contains("\"2\": \"bad\""));
    }

    #[tokio::test]
    async fn test_unparsable_reply_marks_all_error() {
        let mock = Arc::new(MockLlmClient::with_replies(["Sorry, I can't do that."]));
        let results = BatchClassifier::new(mock)
            .classify("Classify.", &Response::batch(["a", "b"]))
            .await;
        assert!(results.iter().all(|r| r.is_error()));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_call_failure_marks_all_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure(CompletionError::Timeout(60));
        let results = BatchClassifier::new(mock)
            .classify("Classify.", &Response::batch(["a"]))
            .await;
        assert_eq!(results[0].label, ERROR_LABEL);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_call() {
        let mock = Arc::new(MockLlmClient::new());
        let results = BatchClassifier::new(mock.clone()).classify("x", &[]).await;
        assert!(results.is_empty());
        assert_eq!(mock.call_count(), 0);
    }
}
