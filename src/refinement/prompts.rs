//! 提示词构建：纯函数，不做 I/O
//!
//! 数据（任务描述、类别、反馈上下文）与指令的拼装都集中在这里，便于在没有补全服务的情况下单独测试。

use crate::classify::{Category, Response};
use crate::refinement::types::FeedbackAnalysis;

/// 精炼上下文中最多引用的常见错误与具体示例数
pub const CONTEXT_TOP_ERRORS: usize = 3;
pub const CONTEXT_TOP_EXAMPLES: usize = 3;
/// 解释改动时只取上下文前若干行
pub const RATIONALE_CONTEXT_LINES: usize = 10;

/// 一次精炼请求的结构化输入
#[derive(Debug, Clone)]
pub struct RefinementRequest<'a> {
    pub original_prompt: &'a str,
    pub task_description: &'a str,
    pub categories: &'a [Category],
    pub context: &'a [String],
}

/// `- 名称: 描述`，每类一行
pub fn category_details(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| format!("- {}: {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn category_names(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 把反馈分析整理成逐行的上下文块：前 3 个常见错误 + 前 3 个具体更正
pub fn improvement_context(analysis: &FeedbackAnalysis) -> Vec<String> {
    let mut lines = Vec::new();

    if !analysis.common_errors.is_empty() {
        lines.push("COMMON MISCLASSIFICATION PATTERNS:".to_string());
        for error in analysis.common_errors.iter().take(CONTEXT_TOP_ERRORS) {
            lines.push(format!("- {} (occurred {} times)", error.pattern, error.count));
            if let Some(example) = error.examples.first() {
                lines.push(format!("  Example: \"{}\"", example.response_snippet));
                if let Some(note) = &example.feedback_text {
                    lines.push(format!("  User noted: \"{}\"", note));
                }
            }
        }
    }

    if !analysis.specific_examples.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("SPECIFIC CORRECTION EXAMPLES:".to_string());
        for example in analysis.specific_examples.iter().take(CONTEXT_TOP_EXAMPLES) {
            lines.push(format!("- Response: \"{}\"", example.response_text));
            lines.push(format!("  AI classified as: {}", example.original_classification));
            lines.push(format!("  Should be: {}", example.corrected_classification));
            if let Some(note) = &example.user_feedback {
                lines.push(format!("  User explanation: \"{}\"", note));
            }
        }
    }

    lines
}

pub fn refinement_request(req: &RefinementRequest<'_>) -> String {
    format!(
        r#"You are tasked with improving a scoring prompt based on user feedback. The current prompt has some classification errors that need to be addressed.

CURRENT PROMPT:
{prompt}

ORIGINAL SCORING CRITERIA:
{task}

CLASSIFICATION CATEGORIES:
{details}

FEEDBACK ANALYSIS:
{context}

Please improve the prompt by:
1. Adding specific guidance to address the misclassification patterns identified above
2. Clarifying distinctions between categories that were frequently confused
3. Maintaining the overall structure and batch processing format
4. Using the exact category names: {names}
5. Minimizing the amount of extra text that is added to the prompt
6. Not including any output format instructions (these are added separately)

Focus on preventing the specific errors identified in the feedback. Be precise and specific in your improvements.

Generate the improved prompt:"#,
        prompt = req.original_prompt,
        task = req.task_description,
        details = category_details(req.categories),
        context = req.context.join("\n"),
        names = category_names(req.categories),
    )
}

pub fn rationale_request(context: &[String]) -> String {
    let limited: Vec<&str> = context
        .iter()
        .take(RATIONALE_CONTEXT_LINES)
        .map(String::as_str)
        .collect();
    format!(
        r#"Based on the feedback analysis provided, explain in 2-3 simple bullet points why the following changes were made to improve the prompt:

ORIGINAL ISSUES IDENTIFIED:
{}

Provide a concise explanation of the key improvements made to address these classification errors. Format your response as plain text using simple em dashes for bullet points, like this:

— Added specific guidance to prevent confusion between X and Y categories
— Clarified edge case handling for ambiguous responses
— Enhanced examples to improve consistency

Use simple, readable formatting with em dashes (—) for bullets. Focus on the technical reasoning behind the specific changes made."#,
        limited.join("\n")
    )
}

pub fn category_generation_request(task_description: &str) -> String {
    format!(
        r#"Based on the following scoring criteria, generate 4 classification categories that would be most relevant for scoring survey responses.

SCORING CRITERIA:
{task_description}

Please generate exactly 4 categories following this pattern:
1. A "high score" category - responses that clearly deserve high scores
2. A "low score" category - responses that clearly deserve low scores
3. A "not relevant" category - responses not related to the scoring criteria
4. An "unclear/ambiguous" category - responses where scoring is difficult to determine

For each category, provide:
- A clear, concise, specific name (1-3 words)
- A detailed description explaining what types of responses belong in this category
- A numeric score (use 100 for high score category, 0 for low score category, leave empty string for not relevant and unclear)

Format your response as JSON like this:
{{
    "high_score": {{
        "name": "Great Battery Performance",
        "description": "Responses that mention the battery lasting a full day or longer, fast charging, or exceptional power management",
        "score": "100"
    }},
    "low_score": {{
        "name": "Poor Battery Performance",
        "description": "Responses that mention battery draining quickly, not lasting through the day, slow charging, or battery-related problems",
        "score": "0"
    }},
    "not_relevant": {{
        "name": "Non-Battery Related",
        "description": "Responses that discuss other product features, general satisfaction, or topics unrelated to battery performance",
        "score": ""
    }},
    "unclear": {{
        "name": "Battery Mentions Unclear",
        "description": "Responses that mention battery but without clear positive or negative sentiment, or with mixed/contradictory battery feedback",
        "score": ""
    }}
}}

Generate categories that are specifically tailored to the scoring criteria provided above."#
    )
}

pub fn initial_prompt_request(task_description: &str, categories: &[Category]) -> String {
    format!(
        r#"Create an expert-level prompt for batch scoring of survey responses. The prompt will be used to classify multiple survey responses simultaneously in a single API call.

SCORING CRITERIA:
{task}

CLASSIFICATION CATEGORIES:
{details}

Please generate a professional prompt that:
1. Clearly explains the scoring task and criteria
2. Provides detailed guidance on how to classify responses consistently across a batch
3. Includes specific instructions for edge cases or ambiguous responses
4. Emphasizes consistency when processing multiple responses together
5. Instructs the AI to process multiple responses provided in JSON format
6. Uses the exact category names: {names}
7. Does NOT include output format instructions (this will be added separately)
8. Is concise and to the point

IMPORTANT: This prompt will be used for BATCH processing where multiple survey responses will be provided in a JSON object with numeric keys (0, 1, 2, etc.) and the AI must return classifications for all responses in a JSON format.

Generate the complete prompt now:"#,
        task = task_description,
        details = category_details(categories),
        names = category_names(categories),
    )
}

/// 补全服务不可用时的模板提示词
pub fn template_prompt(task_description: &str, categories: &[Category]) -> String {
    format!(
        r#"You are tasked with scoring survey responses based on the following criteria:

SCORING CRITERIA:
{task}

CLASSIFICATION CATEGORIES:
{details}

For each survey response, you must:
1. Read the response carefully
2. Classify it into exactly one of the categories above, using the category name verbatim

Please be consistent in your classifications and consider the nuances of each response."#,
        task = task_description,
        details = category_details(categories),
    )
}

/// 指令 + 以 "0".."n" 为键的回答 JSON + 固定的输出格式说明
pub fn batch_inference_prompt(instructions: &str, responses: &[Response]) -> String {
    // 按 index 顺序逐行输出；值经 serde_json 转义
    let body = if responses.is_empty() {
        "{}".to_string()
    } else {
        let entries: Vec<String> = responses
            .iter()
            .map(|r| {
                format!(
                    "    \"{}\": {}",
                    r.index,
                    serde_json::Value::String(r.text.clone())
                )
            })
            .collect();
        format!("{{\n{}\n}}", entries.join(",\n"))
    };

    format!(
        r#"{instructions}

Responses = {body}

Do not return any explanation or pre-amble.
Only return the scores in the format specified.

Return scores in this format:
{{
    "0": <score category>,
    "1": <score category>,
    ...
    "n": <score category>
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::analyzer::FeedbackAnalyzer;
    use crate::refinement::types::FeedbackCorrection;
    use crate::classify::ClassificationResult;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("High", "clearly positive", Some("100")),
            Category::new("Low", "clearly negative", Some("0")),
        ]
    }

    fn analysis() -> FeedbackAnalysis {
        let results = vec![
            ClassificationResult::new(0, "Battery lasts all day", "Low"),
            ClassificationResult::new(1, "Great battery", "Low"),
        ];
        let corrections = vec![
            FeedbackCorrection::new(0, "Low", "High", Some("positive tone missed")),
            FeedbackCorrection::new(1, "Low", "High", None),
        ];
        FeedbackAnalyzer::new().analyze(&corrections, &results).unwrap()
    }

    #[test]
    fn test_improvement_context_lines() {
        let lines = improvement_context(&analysis());
        assert_eq!(lines[0], "COMMON MISCLASSIFICATION PATTERNS:");
        assert_eq!(lines[1], "- Low → High (occurred 2 times)");
        assert_eq!(lines[2], "  Example: \"Battery lasts all day\"");
        assert_eq!(lines[3], "  User noted: \"positive tone missed\"");
        assert!(lines.contains(&"SPECIFIC CORRECTION EXAMPLES:".to_string()));
        assert!(lines.contains(&"  Should be: High".to_string()));
    }

    #[test]
    fn test_refinement_request_uses_exact_names() {
        let context = improvement_context(&analysis());
        let text = refinement_request(&RefinementRequest {
            original_prompt: "Classify battery feedback.",
            task_description: "Battery satisfaction",
            categories: &categories(),
            context: &context,
        });
        assert!(text.contains("Using the exact category names: High, Low"));
        assert!(text.contains("CURRENT PROMPT:\nClassify battery feedback."));
        assert!(text.contains("- High: clearly positive"));
    }

    #[test]
    fn test_rationale_request_limits_context() {
        let context: Vec<String> = (0..20).map(|i| format!("line-{}", i)).collect();
        let text = rationale_request(&context);
        assert!(text.contains("line-9"));
        assert!(!text.contains("line-10"));
        assert!(text.contains('—'));
    }

    #[test]
    fn test_batch_prompt_keys_by_index() {
        let responses = Response::batch(["first", "second"]);
        let text = batch_inference_prompt("Do it.", &responses);
        assert!(text.starts_with("Do it.\n\nResponses = {"));
        assert!(text.contains("\"0\": \"first\""));
        assert!(text.contains("\"1\": \"second\""));
        assert!(text.contains("Return scores in this format:"));
    }
}
