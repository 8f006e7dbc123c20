use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 用户对一条分类结果的更正；index 对应 ClassificationResult.response_index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCorrection {
    pub index: usize,
    pub original_classification: String,
    pub new_classification: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl FeedbackCorrection {
    pub fn new(
        index: usize,
        original: impl Into<String>,
        corrected: impl Into<String>,
        feedback: Option<&str>,
    ) -> Self {
        Self {
            index,
            original_classification: original.into(),
            new_classification: corrected.into(),
            feedback: feedback.map(String::from),
        }
    }

    /// 非空的用户说明
    pub fn note(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 一次反馈提交的全部更正
pub type FeedbackBatch = Vec<FeedbackCorrection>;

/// 有序标签对 (original, corrected)，显示为 `original → corrected`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub original: String,
    pub corrected: String,
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.original, self.corrected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternExample {
    pub index: usize,
    pub response_snippet: String,
    pub feedback_text: Option<String>,
}

/// 一种误分类模式：次数与至多 2 个示例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisclassificationPattern {
    pub key: PatternKey,
    pub count: usize,
    pub examples: Vec<PatternExample>,
}

/// original → (corrected → count)
pub type ConfusionMatrix = BTreeMap<String, BTreeMap<String, usize>>;

/// 出现超过一次的模式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonError {
    pub pattern: String,
    pub count: usize,
    pub examples: Vec<PatternExample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificExample {
    pub index: usize,
    pub original_classification: String,
    pub corrected_classification: String,
    pub response_text: String,
    pub user_feedback: Option<String>,
}

/// 反馈分析结果
///
/// misclassification_patterns 按首次出现的顺序保存，common_errors 按次数降序（同次数保持出现顺序）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub total_corrections: usize,
    pub misclassification_patterns: Vec<MisclassificationPattern>,
    pub category_confusion_matrix: ConfusionMatrix,
    pub common_errors: Vec<CommonError>,
    pub specific_examples: Vec<SpecificExample>,
}

impl FeedbackAnalysis {
    /// 按 `original → corrected` 形式的键查找模式
    pub fn pattern(&self, key: &str) -> Option<&MisclassificationPattern> {
        self.misclassification_patterns
            .iter()
            .find(|p| p.key.to_string() == key)
    }

    pub fn confusion(&self, original: &str, corrected: &str) -> usize {
        self.category_confusion_matrix
            .get(original)
            .and_then(|row| row.get(corrected))
            .copied()
            .unwrap_or(0)
    }
}

/// 提示词版本：0 为初始提示词，每次应用精炼后 +1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub text: String,
    pub iteration_number: usize,
}

impl PromptVersion {
    pub fn initial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            iteration_number: 0,
        }
    }

    pub fn next(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            iteration_number: self.iteration_number + 1,
        }
    }
}

/// 关键变更摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyChange {
    Addition { text: String },
    Deletion { text: String },
    Modification { old_text: String, new_text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub changes_count: usize,
    /// 百分比，保留 1 位小数
    pub similarity_ratio: f64,
    pub key_changes: Vec<KeyChange>,
    pub inline_annotated_text: String,
}

/// 一次精炼产出、等待审阅的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRefinement {
    pub iteration_number: usize,
    pub original_prompt: String,
    pub improved_prompt: String,
    pub rationale: String,
    pub feedback_analysis: FeedbackAnalysis,
    pub diff: DiffResult,
    /// 精炼失败、提示词未改变；这样的结果不能被应用
    #[serde(default)]
    pub degraded: bool,
}

/// 已应用的迭代记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub original_prompt: String,
    pub improved_prompt: String,
    pub rationale: String,
    /// RFC 3339
    pub timestamp: String,
}
