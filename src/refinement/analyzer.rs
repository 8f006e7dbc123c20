//! 反馈分析：把用户更正聚合为误分类模式、混淆矩阵与示例
//!
//! 纯内存聚合，无副作用。分析只是建议性步骤，内部任何意外都记录警告并返回 None，不阻塞后续流程。

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::classify::ClassificationResult;
use crate::refinement::types::{
    CommonError, FeedbackAnalysis, FeedbackCorrection, MisclassificationPattern, PatternExample,
    PatternKey, SpecificExample,
};

/// 回答片段的最大字符数
pub const SNIPPET_CHARS: usize = 100;
/// 每种模式保留的示例数
pub const MAX_PATTERN_EXAMPLES: usize = 2;
/// 索引越界时的片段占位
pub const RESPONSE_UNAVAILABLE: &str = "Response not found";

/// 截取回答前 SNIPPET_CHARS 个字符，被截断时追加 `...`
pub fn response_snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[derive(Debug, Default)]
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// 空批次返回 None：没有信号就无从精炼
    pub fn analyze(
        &self,
        corrections: &[FeedbackCorrection],
        results: &[ClassificationResult],
    ) -> Option<FeedbackAnalysis> {
        if corrections.is_empty() {
            tracing::debug!("No corrections to analyze");
            return None;
        }

        guarded(|| aggregate(corrections, results))
    }
}

/// 聚合中的 panic 降级为 None
fn guarded<F>(aggregate: F) -> Option<FeedbackAnalysis>
where
    F: FnOnce() -> FeedbackAnalysis,
{
    match panic::catch_unwind(AssertUnwindSafe(aggregate)) {
        Ok(analysis) => {
            tracing::info!(
                total = analysis.total_corrections,
                patterns = analysis.misclassification_patterns.len(),
                common = analysis.common_errors.len(),
                "Feedback patterns analyzed"
            );
            Some(analysis)
        }
        Err(_) => {
            tracing::warn!("Feedback analysis failed unexpectedly, skipping");
            None
        }
    }
}

fn aggregate(
    corrections: &[FeedbackCorrection],
    results: &[ClassificationResult],
) -> FeedbackAnalysis {
    let mut patterns: Vec<MisclassificationPattern> = Vec::new();
    let mut slot: HashMap<PatternKey, usize> = HashMap::new();
    let mut analysis = FeedbackAnalysis {
        total_corrections: corrections.len(),
        misclassification_patterns: Vec::new(),
        category_confusion_matrix: Default::default(),
        common_errors: Vec::new(),
        specific_examples: Vec::with_capacity(corrections.len()),
    };

    for correction in corrections {
        let snippet = match results.get(correction.index) {
            Some(r) => response_snippet(&r.response_text),
            None => {
                tracing::warn!(index = correction.index, "Correction references unknown response");
                RESPONSE_UNAVAILABLE.to_string()
            }
        };
        let note = correction.note().map(String::from);

        let key = PatternKey {
            original: correction.original_classification.clone(),
            corrected: correction.new_classification.clone(),
        };
        let pos = *slot.entry(key.clone()).or_insert_with(|| {
            patterns.push(MisclassificationPattern {
                key,
                count: 0,
                examples: Vec::new(),
            });
            patterns.len() - 1
        });
        let pattern = &mut patterns[pos];
        pattern.count += 1;
        if pattern.examples.len() < MAX_PATTERN_EXAMPLES {
            pattern.examples.push(PatternExample {
                index: correction.index,
                response_snippet: snippet.clone(),
                feedback_text: note.clone(),
            });
        }

        *analysis
            .category_confusion_matrix
            .entry(correction.original_classification.clone())
            .or_default()
            .entry(correction.new_classification.clone())
            .or_insert(0) += 1;

        analysis.specific_examples.push(SpecificExample {
            index: correction.index,
            original_classification: correction.original_classification.clone(),
            corrected_classification: correction.new_classification.clone(),
            response_text: snippet,
            user_feedback: note,
        });
    }

    // sort_by 为稳定排序，同次数保持首次出现顺序
    let mut common: Vec<CommonError> = patterns
        .iter()
        .filter(|p| p.count > 1)
        .map(|p| CommonError {
            pattern: p.key.to_string(),
            count: p.count,
            examples: p.examples.clone(),
        })
        .collect();
    common.sort_by(|a, b| b.count.cmp(&a.count));

    analysis.misclassification_patterns = patterns;
    analysis.common_errors = common;
    analysis
}
