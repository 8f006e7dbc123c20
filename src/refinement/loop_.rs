//! 精炼循环：分析反馈 → 生成改进提示词 → 生成差异 → 等待审阅 → 应用或放弃
//!
//! propose 只产出 PendingRefinement，不改动当前提示词；resolve 才决定是否应用并推进计数。
//! 降级的精炼结果（补全失败、类别名缺失）即使被接受也按拒绝处理，不消耗迭代次数。

use std::sync::Arc;

use crate::core::{SessionContext, WorkflowError};
use crate::llm::LlmClient;
use crate::refinement::analyzer::FeedbackAnalyzer;
use crate::refinement::controller::ReviewDecision;
use crate::refinement::diff::TextDiffer;
use crate::refinement::refiner::PromptRefiner;
use crate::refinement::types::{IterationRecord, PendingRefinement};

pub struct RefinementLoop {
    analyzer: FeedbackAnalyzer,
    refiner: PromptRefiner,
    differ: TextDiffer,
}

impl RefinementLoop {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            analyzer: FeedbackAnalyzer::new(),
            refiner: PromptRefiner::new(llm),
            differ: TextDiffer::new(),
        }
    }

    pub async fn propose(
        &self,
        session: &mut SessionContext,
    ) -> Result<PendingRefinement, WorkflowError> {
        if !session.iteration.can_iterate() {
            return Err(WorkflowError::IterationLimit {
                max: session.iteration.max(),
            });
        }

        let analysis = self
            .analyzer
            .analyze(&session.corrections, &session.results)
            .ok_or(WorkflowError::NoFeedback)?;

        let iteration_number = session.iteration.current() + 1;
        tracing::info!(
            session = %session.session_id,
            iteration = iteration_number,
            corrections = analysis.total_corrections,
            "Proposing prompt refinement"
        );

        let original_prompt = session.prompt.text.clone();
        let refinement = self
            .refiner
            .refine_detailed(
                &original_prompt,
                &analysis,
                &session.categories,
                &session.task_description,
            )
            .await;
        let diff = self.differ.diff(&original_prompt, &refinement.improved_prompt);

        let pending = PendingRefinement {
            iteration_number,
            original_prompt,
            improved_prompt: refinement.improved_prompt,
            rationale: refinement.rationale,
            feedback_analysis: analysis,
            diff,
            degraded: refinement.degraded,
        };
        session.pending = Some(pending.clone());
        Ok(pending)
    }

    /// 返回处理后的迭代计数
    pub fn resolve(
        &self,
        session: &mut SessionContext,
        decision: ReviewDecision,
    ) -> Result<usize, WorkflowError> {
        let pending = session
            .pending
            .take()
            .ok_or(WorkflowError::NoPendingRefinement)?;

        if decision.is_accepted() && pending.degraded {
            tracing::warn!(
                iteration = pending.iteration_number,
                rationale = %pending.rationale,
                "Refinement was not generated, treating acceptance as rejection"
            );
            return Ok(session.iteration.current());
        }

        if !decision.is_accepted() {
            tracing::info!(
                iteration = pending.iteration_number,
                "Refinement rejected, keeping current prompt"
            );
            return Ok(session.iteration.current());
        }

        let count = session.iteration.resolve(decision);
        session.prompt = session.prompt.next(pending.improved_prompt.clone());
        session.history.push(IterationRecord {
            iteration: count,
            original_prompt: pending.original_prompt,
            improved_prompt: pending.improved_prompt,
            rationale: pending.rationale,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
        session.corrections.clear();
        tracing::info!(
            iteration = count,
            decision = ?decision,
            "Refined prompt applied"
        );
        Ok(count)
    }
}
