//! 会话上下文：一次终端会话内的任务、类别、当前提示词、批次结果与迭代历史

use serde::{Deserialize, Serialize};

use crate::classify::{Category, ClassificationResult, Response};
use crate::refinement::controller::IterationController;
use crate::refinement::types::{FeedbackBatch, IterationRecord, PendingRefinement, PromptVersion};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub task_description: String,
    pub categories: Vec<Category>,
    pub prompt: PromptVersion,
    pub responses: Vec<Response>,
    pub results: Vec<ClassificationResult>,
    pub corrections: FeedbackBatch,
    pub iteration: IterationController,
    pub pending: Option<PendingRefinement>,
    pub history: Vec<IterationRecord>,
}

impl SessionContext {
    pub fn new(
        task_description: impl Into<String>,
        categories: Vec<Category>,
        initial_prompt: impl Into<String>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            task_description: task_description.into(),
            categories,
            prompt: PromptVersion::initial(initial_prompt),
            responses: Vec::new(),
            results: Vec::new(),
            corrections: Vec::new(),
            iteration: IterationController::new(),
            pending: None,
            history: Vec::new(),
        }
    }

    pub fn current_prompt(&self) -> &str {
        &self.prompt.text
    }

    /// 新一轮推理的结果会使旧更正失效
    pub fn record_results(&mut self, results: Vec<ClassificationResult>) {
        self.results = results;
        self.corrections.clear();
    }

    /// 开始新会话：新 id，回到第 0 版提示词并清空一切迭代状态；回答保留
    pub fn reset(&mut self) {
        self.session_id = uuid::Uuid::new_v4().to_string();
        let initial = self
            .history
            .first()
            .map(|r| r.original_prompt.clone())
            .unwrap_or_else(|| self.prompt.text.clone());
        self.prompt = PromptVersion::initial(initial);
        self.results.clear();
        self.corrections.clear();
        self.iteration.reset();
        self.pending = None;
        self.history.clear();
    }
}
