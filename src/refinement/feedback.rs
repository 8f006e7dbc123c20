//! 反馈录入与最终统计
//!
//! 终端一行一条更正：`<序号> <类别名>`，可选 `| 说明`；序号从 1 开始。

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::classify::{Category, ClassificationResult};
use crate::core::InputError;
use crate::refinement::types::{FeedbackCorrection, PatternKey};

/// 解析一行更正，例如 `3 High Score` 或 `3 High Score | mentions all-day battery`
pub fn parse_correction_line(
    line: &str,
    results: &[ClassificationResult],
    categories: &[Category],
) -> Result<FeedbackCorrection, InputError> {
    if line.trim().is_empty() {
        return Err(InputError::EmptyFeedback);
    }

    let (body, note) = match line.split_once('|') {
        Some((body, note)) => (body.trim(), Some(note.trim()).filter(|n| !n.is_empty())),
        None => (line.trim(), None),
    };

    let (number, category) = body
        .split_once(char::is_whitespace)
        .map(|(n, c)| (n.trim(), c.trim()))
        .filter(|(_, c)| !c.is_empty())
        .ok_or_else(|| InputError::MalformedLine(line.trim().to_string()))?;

    let number: usize = number
        .parse()
        .map_err(|_| InputError::InvalidNumber(number.to_string()))?;
    if number == 0 || number > results.len() {
        return Err(InputError::IndexOutOfRange {
            number,
            max: results.len(),
        });
    }

    if !categories.iter().any(|c| c.name == category) {
        return Err(InputError::UnknownCategory {
            name: category.to_string(),
            allowed: categories
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let index = number - 1;
    Ok(FeedbackCorrection::new(
        index,
        results[index].label.clone(),
        category,
        note,
    ))
}

/// 设置每条结果的 final_classification：有更正取最后一次更正，否则取模型标签
pub fn apply_corrections(results: &mut [ClassificationResult], corrections: &[FeedbackCorrection]) {
    let lookup: HashMap<usize, &str> = corrections
        .iter()
        .map(|c| (c.index, c.new_classification.as_str()))
        .collect();
    for (i, result) in results.iter_mut().enumerate() {
        let label = lookup.get(&i).copied().unwrap_or(result.label.as_str()).to_string();
        result.final_classification = Some(label);
    }
}

/// 出现最多的更正模式，按次数降序，同次数保持首次出现的顺序
pub fn top_corrections(corrections: &[FeedbackCorrection], limit: usize) -> Vec<(PatternKey, usize)> {
    let mut counted: Vec<(PatternKey, usize)> = Vec::new();
    for c in corrections {
        let key = PatternKey {
            original: c.original_classification.clone(),
            corrected: c.new_classification.clone(),
        };
        match counted.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counted.push((key, 1)),
        }
    }
    counted.sort_by(|a, b| b.1.cmp(&a.1));
    counted.truncate(limit);
    counted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// 按最终标签统计，标签按字典序
pub fn classification_summary(results: &[ClassificationResult]) -> Vec<SummaryRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in results {
        *counts.entry(r.final_label()).or_insert(0) += 1;
    }
    let total = results.len();
    counts
        .into_iter()
        .map(|(label, count)| SummaryRow {
            label: label.to_string(),
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}
