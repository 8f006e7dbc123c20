//! 分类层：类别与提示词初始化、批量推理、结构化结果提取

pub mod bootstrap;
pub mod extract;
pub mod inference;
pub mod types;

pub use bootstrap::{default_categories, generate_categories, generate_initial_prompt, names_are_usable};
pub use extract::{extract_as, extract_structured_result};
pub use inference::BatchClassifier;
pub use types::{Category, ClassificationResult, Response, ERROR_LABEL};
