//! PromptRefiner：根据反馈分析生成改进后的提示词与改动说明
//!
//! 严格顺序发起两次补全：先生成改进后的提示词，再生成 2-3 条 `—` 开头的改动说明。
//! 改进后的提示词必须原样包含全部类别名，否则视为失败。
//! 任一步失败（网络、超时、空回复、类别名缺失）都降级为返回原提示词与错误描述，调用方永远拿到可用结果。不做重试。

use std::sync::Arc;

use crate::classify::Category;
use crate::core::{CompletionError, RefineError};
use crate::llm::LlmClient;
use crate::refinement::prompts::{self, RefinementRequest};
use crate::refinement::types::FeedbackAnalysis;

pub const NO_PATTERNS_MESSAGE: &str = "No significant patterns found for improvement.";

/// 一次精炼的产出；degraded 表示没有真正生成新提示词（无模式或降级）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub improved_prompt: String,
    pub rationale: String,
    pub degraded: bool,
}

impl Refinement {
    fn unchanged(original_prompt: &str, rationale: String) -> Self {
        Self {
            improved_prompt: original_prompt.to_string(),
            rationale,
            degraded: true,
        }
    }
}

pub struct PromptRefiner {
    llm: Arc<dyn LlmClient>,
}

impl PromptRefiner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 返回 (improved_prompt, rationale)；没有误分类模式时不调用补全服务
    pub async fn refine(
        &self,
        original_prompt: &str,
        analysis: &FeedbackAnalysis,
        categories: &[Category],
        task_description: &str,
    ) -> (String, String) {
        let r = self
            .refine_detailed(original_prompt, analysis, categories, task_description)
            .await;
        (r.improved_prompt, r.rationale)
    }

    pub async fn refine_detailed(
        &self,
        original_prompt: &str,
        analysis: &FeedbackAnalysis,
        categories: &[Category],
        task_description: &str,
    ) -> Refinement {
        if analysis.misclassification_patterns.is_empty() {
            return Refinement::unchanged(original_prompt, NO_PATTERNS_MESSAGE.to_string());
        }

        match self
            .try_refine(original_prompt, analysis, categories, task_description)
            .await
        {
            Ok((improved_prompt, rationale)) => Refinement {
                improved_prompt,
                rationale,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Prompt refinement failed, keeping original prompt");
                Refinement::unchanged(
                    original_prompt,
                    format!("Error generating improvements: {}", e),
                )
            }
        }
    }

    async fn try_refine(
        &self,
        original_prompt: &str,
        analysis: &FeedbackAnalysis,
        categories: &[Category],
        task_description: &str,
    ) -> Result<(String, String), RefineError> {
        let context = prompts::improvement_context(analysis);
        let request = prompts::refinement_request(&RefinementRequest {
            original_prompt,
            task_description,
            categories,
            context: &context,
        });

        tracing::info!(
            patterns = analysis.misclassification_patterns.len(),
            "Requesting refined prompt"
        );
        let improved = non_empty(self.llm.complete_text(&request).await?)?;

        let missing = missing_category_names(&improved, categories);
        if !missing.is_empty() {
            return Err(RefineError::MissingCategoryNames(missing));
        }

        tracing::debug!("Requesting refinement rationale");
        let rationale = non_empty(
            self.llm
                .complete_text(&prompts::rationale_request(&context))
                .await?,
        )?;

        Ok((improved, rationale))
    }
}

/// 未在提示词中原样出现的类别名，按类别顺序
pub fn missing_category_names(prompt: &str, categories: &[Category]) -> Vec<String> {
    categories
        .iter()
        .filter(|c| !prompt.contains(c.name.as_str()))
        .map(|c| c.name.clone())
        .collect()
}

fn non_empty(reply: String) -> Result<String, CompletionError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Err(CompletionError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationResult;
    use crate::llm::MockLlmClient;
    use crate::refinement::analyzer::FeedbackAnalyzer;
    use crate::refinement::types::FeedbackCorrection;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("High", "positive", Some("100")),
            Category::new("Low", "negative", Some("0")),
        ]
    }

    fn analysis() -> FeedbackAnalysis {
        let results = vec![
            ClassificationResult::new(0, "love it", "Low"),
            ClassificationResult::new(1, "really good", "Low"),
        ];
        let corrections = vec![
            FeedbackCorrection::new(0, "Low", "High", Some("positive tone missed")),
            FeedbackCorrection::new(1, "Low", "High", None),
        ];
        FeedbackAnalyzer::new().analyze(&corrections, &results).unwrap()
    }

    fn empty_analysis() -> FeedbackAnalysis {
        FeedbackAnalysis {
            total_corrections: 0,
            misclassification_patterns: Vec::new(),
            category_confusion_matrix: Default::default(),
            common_errors: Vec::new(),
            specific_examples: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_no_patterns_makes_no_calls() {
        let mock = Arc::new(MockLlmClient::new());
        let refiner = PromptRefiner::new(mock.clone());
        let (prompt, rationale) = refiner
            .refine("original", &empty_analysis(), &categories(), "task")
            .await;
        assert_eq!(prompt, "original");
        assert_eq!(rationale, NO_PATTERNS_MESSAGE);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_two_sequential_calls() {
        let mock = Arc::new(MockLlmClient::with_replies([
            "  Improved prompt: answer High or Low  ",
            "— Clarified High vs Low",
        ]));
        let refiner = PromptRefiner::new(mock.clone());
        let (prompt, rationale) = refiner
            .refine("original", &analysis(), &categories(), "battery")
            .await;

        assert_eq!(prompt, "Improved prompt: answer High or Low");
        assert_eq!(rationale, "— Clarified High vs Low");
        assert_eq!(mock.call_count(), 2);

        let first = mock.user_prompt(0).unwrap();
        assert!(first.contains("Using the exact category names: High, Low"));
        assert!(first.contains("Low → High (occurred 2 times)"));
        let second = mock.user_prompt(1).unwrap();
        assert!(second.contains("em dashes"));
    }

    #[tokio::test]
    async fn test_first_call_failure_degrades() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure(CompletionError::Api("503".into()));
        let refiner = PromptRefiner::new(mock.clone());
        let (prompt, rationale) = refiner
            .refine("original", &analysis(), &categories(), "battery")
            .await;
        assert_eq!(prompt, "original");
        assert!(rationale.starts_with("Error generating improvements"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_rationale_degrades() {
        let mock = Arc::new(MockLlmClient::with_replies(["Improved: High or Low", "   "]));
        let refiner = PromptRefiner::new(mock);
        let (prompt, rationale) = refiner
            .refine("original", &analysis(), &categories(), "battery")
            .await;
        assert_eq!(prompt, "original");
        assert!(rationale.contains("Empty completion"));
    }

    #[tokio::test]
    async fn test_dropped_category_name_degrades() {
        let mock = Arc::new(MockLlmClient::with_replies([
            "Classify things as Good or High.",
            "— never requested",
        ]));
        let refiner = PromptRefiner::new(mock.clone());
        let r = refiner
            .refine_detailed("original", &analysis(), &categories(), "battery")
            .await;
        assert!(r.degraded);
        assert_eq!(r.improved_prompt, "original");
        assert_eq!(
            r.rationale,
            "Error generating improvements: Improved prompt is missing category names: Low"
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_successful_refinement_is_not_degraded() {
        let mock = Arc::new(MockLlmClient::with_replies(["Use High and Low.", "— clearer"]));
        let r = PromptRefiner::new(mock)
            .refine_detailed("original", &analysis(), &categories(), "battery")
            .await;
        assert!(!r.degraded);
        assert_eq!(r.improved_prompt, "Use High and Low.");
    }

    #[test]
    fn test_missing_category_names_is_case_sensitive() {
        let cats = categories();
        assert!(missing_category_names("High or Low", &cats).is_empty());
        assert_eq!(missing_category_names("high or Low", &cats), vec!["High"]);
    }
}
