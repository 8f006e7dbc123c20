//! 迭代计数与上限

use serde::{Deserialize, Serialize};

/// 每个会话允许应用的精炼次数
pub const MAX_ITERATIONS: usize = 3;

/// 用户（或自动模式）对一次精炼结果的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    /// 非交互模式下直接应用
    AutoApplied,
    /// 用户确认应用
    Approved,
    /// 用户放弃
    Rejected,
}

impl ReviewDecision {
    pub fn is_accepted(self) -> bool {
        !matches!(self, ReviewDecision::Rejected)
    }
}

/// 计数器只在精炼被接受时递增；上限只在 can_iterate 处检查，increment 本身不截断
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationController {
    count: usize,
}

impl IterationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.count
    }

    pub fn max(&self) -> usize {
        MAX_ITERATIONS
    }

    pub fn can_iterate(&self) -> bool {
        self.count < MAX_ITERATIONS
    }

    pub fn increment(&mut self) -> usize {
        self.count += 1;
        self.count
    }

    /// 接受则递增，拒绝保持不变；返回处理后的计数
    pub fn resolve(&mut self, decision: ReviewDecision) -> usize {
        if decision.is_accepted() {
            self.increment()
        } else {
            self.count
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
