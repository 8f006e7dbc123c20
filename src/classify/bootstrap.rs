//! 初始化：生成分类类别与第 0 版提示词
//!
//! 两者都只调用一次补全服务，失败时分别回落到默认类别与模板提示词。

use serde::Deserialize;

use crate::classify::extract::extract_as;
use crate::classify::Category;
use crate::llm::LlmClient;
use crate::refinement::prompts;

/// 模型返回的四类结构（键名固定）
#[derive(Debug, Deserialize)]
struct CategorySet {
    high_score: Category,
    low_score: Category,
    not_relevant: Category,
    unclear: Category,
}

impl CategorySet {
    fn into_vec(self) -> Vec<Category> {
        vec![self.high_score, self.low_score, self.not_relevant, self.unclear]
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new(
            "High Score",
            "Responses that clearly deserve a high score based on the criteria",
            Some("100"),
        ),
        Category::new(
            "Low Score",
            "Responses that clearly deserve a low score based on the criteria",
            Some("0"),
        ),
        Category::new(
            "Not Relevant",
            "Responses that are not relevant to the scoring criteria",
            None,
        ),
        Category::new(
            "Unclear",
            "Responses where it is unclear whether they should receive a high or low score",
            None,
        ),
    ]
}

/// 名称非空且互不重复
pub fn names_are_usable(categories: &[Category]) -> bool {
    let mut seen = std::collections::HashSet::new();
    categories
        .iter()
        .all(|c| !c.name.trim().is_empty() && seen.insert(c.name.trim()))
}

/// 按任务描述生成四个类别；任何失败都用默认类别
pub async fn generate_categories(llm: &dyn LlmClient, task_description: &str) -> Vec<Category> {
    let reply = match llm
        .complete_text(&prompts::category_generation_request(task_description))
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Category generation failed, using defaults");
            return default_categories();
        }
    };

    match extract_as::<CategorySet>(&reply) {
        Ok(set) => {
            let categories: Vec<Category> = set
                .into_vec()
                .into_iter()
                .map(|mut c| {
                    c.name = c.name.trim().to_string();
                    c
                })
                .collect();
            if names_are_usable(&categories) {
                categories
            } else {
                tracing::warn!("Generated category names are empty or duplicated, using defaults");
                default_categories()
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse generated categories, using defaults");
            default_categories()
        }
    }
}

/// 生成第 0 版提示词（不含输出格式说明）；失败或空回复时用模板
pub async fn generate_initial_prompt(
    llm: &dyn LlmClient,
    task_description: &str,
    categories: &[Category],
) -> String {
    let request = prompts::initial_prompt_request(task_description, categories);
    match llm.complete_text(&request).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Initial prompt reply was empty, using template");
            prompts::template_prompt(task_description, categories)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Initial prompt generation failed, using template");
            prompts::template_prompt(task_description, categories)
        }
    }
}
