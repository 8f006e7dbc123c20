//! 精炼层：反馈分析、提示词改进、差异可视化、迭代控制

pub mod analyzer;
pub mod controller;
pub mod diff;
pub mod feedback;
pub mod loop_;
pub mod prompts;
pub mod refiner;
pub mod types;

pub use analyzer::FeedbackAnalyzer;
pub use controller::{IterationController, ReviewDecision, MAX_ITERATIONS};
pub use diff::{SequenceMatcher, TextDiffer};
pub use feedback::{
    apply_corrections, classification_summary, parse_correction_line, top_corrections, SummaryRow,
};
pub use loop_::RefinementLoop;
pub use refiner::{missing_category_names, PromptRefiner, Refinement};
pub use types::*;
