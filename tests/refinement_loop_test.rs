//! 精炼循环集成测试：Mock LLM 驱动完整会话

use std::sync::Arc;

use promptsmith::classify::{
    generate_categories, generate_initial_prompt, BatchClassifier, Response,
};
use promptsmith::llm::MockLlmClient;
use promptsmith::refinement::{apply_corrections, parse_correction_line};
use promptsmith::{RefinementLoop, ReviewDecision, SessionContext, WorkflowError};

const CATEGORIES: &str = r#"{
    "high_score": {"name": "Long Battery", "description": "lasts all day", "score": 100},
    "low_score": {"name": "Short Battery", "description": "drains quickly", "score": 0},
    "not_relevant": {"name": "Off Topic", "description": "not about battery", "score": ""},
    "unclear": {"name": "Mixed", "description": "hard to tell", "score": ""}
}"#;

const BATCH: &str = r#"```json
{"0": "Short Battery", "1": "Long Battery"}
```"#;

fn version(n: usize) -> String {
    format!("v{}: Long Battery, Short Battery, Off Topic, Mixed", n)
}

async fn start(mock: Arc<MockLlmClient>) -> SessionContext {
    let task = "battery life feedback";
    let categories = generate_categories(mock.as_ref(), task).await;
    let initial = generate_initial_prompt(mock.as_ref(), task, &categories).await;
    let mut session = SessionContext::new(task, categories, initial);
    session.responses = Response::batch(["It lasts two full days", "Great all-day battery"]);
    session
}

async fn classify_and_correct(mock: Arc<MockLlmClient>, session: &mut SessionContext) {
    let results = BatchClassifier::new(mock)
        .classify(session.current_prompt(), &session.responses)
        .await;
    session.record_results(results);
    let correction =
        parse_correction_line("1 Long Battery | lasts two days", &session.results, &session.categories)
            .unwrap();
    session.corrections.push(correction);
    apply_corrections(&mut session.results, &session.corrections);
}

#[tokio::test]
async fn test_three_approved_iterations_reach_the_cap() {
    let mock = Arc::new(MockLlmClient::with_replies([CATEGORIES, "v0"]));
    let mut session = start(mock.clone()).await;
    assert_eq!(session.categories[0].name, "Long Battery");
    assert_eq!(session.current_prompt(), "v0");

    let refinement = RefinementLoop::new(mock.clone());
    for n in 1..=3 {
        mock.push_reply(BATCH);
        mock.push_reply(version(n));
        mock.push_reply("— multi-day battery counts as long");

        classify_and_correct(mock.clone(), &mut session).await;
        assert_eq!(session.results[0].final_label(), "Long Battery");

        let pending = refinement.propose(&mut session).await.unwrap();
        assert_eq!(pending.iteration_number, n);
        assert_eq!(
            pending
                .feedback_analysis
                .confusion("Short Battery", "Long Battery"),
            1
        );
        assert_eq!(refinement.resolve(&mut session, ReviewDecision::Approved).unwrap(), n);
        assert_eq!(session.current_prompt(), version(n));
    }

    assert_eq!(session.prompt.iteration_number, 3);
    assert_eq!(session.history.len(), 3);
    assert_eq!(session.history[2].original_prompt, version(2));
    assert!(!session.iteration.can_iterate());
    assert_eq!(mock.call_count(), 2 + 3 * 3);

    mock.push_reply(BATCH);
    classify_and_correct(mock.clone(), &mut session).await;
    let err = refinement.propose(&mut session).await.unwrap_err();
    assert!(matches!(err, WorkflowError::IterationLimit { max: 3 }));
    assert_eq!(err.to_string(), "Maximum iteration limit (3) reached");
}

#[tokio::test]
async fn test_rejection_keeps_prompt_and_count() {
    let mock = Arc::new(MockLlmClient::with_replies([CATEGORIES, "v0", BATCH]));
    mock.push_reply(version(1));
    mock.push_reply("— tweak");
    let mut session = start(mock.clone()).await;
    classify_and_correct(mock.clone(), &mut session).await;

    let refinement = RefinementLoop::new(mock.clone());
    let pending = refinement.propose(&mut session).await.unwrap();
    assert_eq!(pending.improved_prompt, version(1));
    assert!(!pending.degraded);

    assert_eq!(refinement.resolve(&mut session, ReviewDecision::Rejected).unwrap(), 0);
    assert_eq!(session.current_prompt(), "v0");
    assert_eq!(session.iteration.current(), 0);
    assert!(session.history.is_empty());
    assert_eq!(session.corrections.len(), 1);
}

#[tokio::test]
async fn test_failed_refinement_is_never_applied() {
    let mock = Arc::new(MockLlmClient::with_replies([CATEGORIES, "v0", BATCH]));
    let mut session = start(mock.clone()).await;
    classify_and_correct(mock.clone(), &mut session).await;
    mock.push_failure(promptsmith::core::CompletionError::Timeout(60));

    let refinement = RefinementLoop::new(mock);
    let pending = refinement.propose(&mut session).await.unwrap();
    assert_eq!(pending.improved_prompt, "v0");
    assert!(pending.rationale.starts_with("Error generating improvements:"));
    assert_eq!(pending.diff.changes_count, 0);
    assert_eq!(pending.diff.similarity_ratio, 100.0);
    assert!(pending.degraded);

    assert_eq!(refinement.resolve(&mut session, ReviewDecision::AutoApplied).unwrap(), 0);
    assert_eq!(session.iteration.current(), 0);
    assert_eq!(session.current_prompt(), "v0");
    assert!(session.history.is_empty());
}

#[tokio::test]
async fn test_prompt_that_drops_a_category_is_not_proposed() {
    let mock = Arc::new(MockLlmClient::with_replies([
        CATEGORIES,
        "v0",
        BATCH,
        "Classify things as Long Battery or Short Battery.",
    ]));
    let mut session = start(mock.clone()).await;
    classify_and_correct(mock.clone(), &mut session).await;

    let refinement = RefinementLoop::new(mock.clone());
    let pending = refinement.propose(&mut session).await.unwrap();
    assert!(pending.degraded);
    assert_eq!(pending.improved_prompt, "v0");
    assert!(pending.rationale.ends_with("missing category names: Off Topic, Mixed"));
    assert_eq!(mock.call_count(), 4);

    assert_eq!(refinement.resolve(&mut session, ReviewDecision::Approved).unwrap(), 0);
    assert_eq!(session.prompt.iteration_number, 0);
}
