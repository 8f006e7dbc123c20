//! promptsmith 终端入口
//!
//! 读取回答文件 → 生成并审阅类别与初始提示词 → 批量推理 → 录入更正 → 精炼并审阅 → 回到推理。
//! 结束时可重新开始：沿用任务从第 0 版提示词重跑，或换一个任务。

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use promptsmith::classify::{
    generate_categories, generate_initial_prompt, names_are_usable, BatchClassifier, Category,
    ClassificationResult, Response,
};
use promptsmith::config::load_config;
use promptsmith::llm::{create_llm_from_config, LlmClient};
use promptsmith::refinement::{
    apply_corrections, classification_summary, parse_correction_line, top_corrections, KeyChange,
    PendingRefinement, PromptVersion, RefinementLoop, ReviewDecision,
};
use promptsmith::{observability, SessionContext};

type Input = Lines<BufReader<Stdin>>;

struct Args {
    responses: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        responses: None,
        config: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config requires a path")?;
                args.config = Some(PathBuf::from(path));
            }
            _ if args.responses.is_none() => args.responses = Some(PathBuf::from(arg)),
            other => anyhow::bail!("Unexpected argument: {}", other),
        }
    }
    Ok(args)
}

async fn ask(input: &mut Input, prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|l| l.trim().to_string()))
}

async fn confirm(input: &mut Input, prompt: &str) -> anyhow::Result<bool> {
    let answer = ask(input, prompt).await?.unwrap_or_default();
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

async fn choose(input: &mut Input, prompt: &str, options: &[&str]) -> anyhow::Result<String> {
    loop {
        let answer = ask(input, prompt)
            .await?
            .context("Input closed")?
            .to_lowercase();
        if options.contains(&answer.as_str()) {
            return Ok(answer);
        }
        println!("Please enter one of: {}", options.join(", "));
    }
}

fn show_categories(categories: &[Category]) {
    println!("\nCategories:");
    for c in categories {
        match c.score.as_deref() {
            Some(score) => println!("  - {} ({}): {}", c.name, score, c.description),
            None => println!("  - {}: {}", c.name, c.description),
        }
    }
}

/// 逐个类别修改名称、描述、分数；回车保留原值，分数输入 `-` 清空
async fn edit_categories(input: &mut Input, categories: &mut Vec<Category>) -> anyhow::Result<()> {
    println!("\nPress Enter to keep the current value.");
    let mut edited = categories.clone();
    for c in edited.iter_mut() {
        println!("\n--- {} ---", c.name);
        if let Some(name) = ask(input, "New name: ").await?.filter(|v| !v.is_empty()) {
            c.name = name;
        }
        println!("Current description: {}", c.description);
        if let Some(desc) = ask(input, "New description: ").await?.filter(|v| !v.is_empty()) {
            c.description = desc;
        }
        println!("Current score: {}", c.score.as_deref().unwrap_or(""));
        match ask(input, "New score: ").await?.as_deref() {
            Some("-") => c.score = None,
            Some(score) if !score.is_empty() => c.score = Some(score.to_string()),
            _ => {}
        }
    }

    if names_are_usable(&edited) {
        *categories = edited;
        println!("\nCategories updated.");
    } else {
        println!("\nCategory names must be non-empty and unique; keeping the previous categories.");
    }
    Ok(())
}

/// 多行输入新提示词，`DONE` 结束，`CANCEL` 放弃；返回 None 表示未修改
async fn edit_prompt(input: &mut Input) -> anyhow::Result<Option<String>> {
    println!("\nEnter the new prompt. Type DONE on its own line to finish, or CANCEL to abort.");
    let mut lines = Vec::new();
    while let Some(line) = input.next_line().await? {
        match line.trim() {
            "DONE" => break,
            "CANCEL" => {
                println!("Edit cancelled.");
                return Ok(None);
            }
            _ => lines.push(line),
        }
    }
    let prompt = lines.join("\n").trim().to_string();
    if prompt.is_empty() {
        println!("Empty prompt, edit cancelled.");
        return Ok(None);
    }
    Ok(Some(prompt))
}

/// 任务描述 → 类别（可编辑）→ 初始提示词（可编辑）
async fn prepare(
    llm: &dyn LlmClient,
    input: &mut Input,
) -> anyhow::Result<(String, Vec<Category>, String)> {
    let task = ask(input, "Describe what to classify: ")
        .await?
        .filter(|t| !t.is_empty())
        .context("A task description is required")?;

    let mut categories = generate_categories(llm, &task).await;
    loop {
        show_categories(&categories);
        match choose(input, "\n(c)ontinue or (e)dit categories? ", &["c", "e"]).await?.as_str() {
            "e" => edit_categories(input, &mut categories).await?,
            _ => break,
        }
    }

    let mut prompt = generate_initial_prompt(llm, &task, &categories).await;
    loop {
        println!("\n=== Initial prompt ===\n{}", prompt);
        match choose(input, "\n(c)ontinue or (e)dit the prompt? ", &["c", "e"]).await?.as_str() {
            "e" => {
                if let Some(edited) = edit_prompt(input).await? {
                    prompt = edited;
                }
            }
            _ => break,
        }
    }

    Ok((task, categories, prompt))
}

fn show_results(results: &[ClassificationResult]) {
    let mut labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    for label in labels {
        println!("\n[{}]", label);
        for r in results.iter().filter(|r| r.label == label) {
            println!("  {}. {}", r.response_index + 1, r.response_text);
        }
    }
}

async fn collect_corrections(input: &mut Input, session: &mut SessionContext) -> anyhow::Result<()> {
    println!("\nEnter corrections as '<number> <category>' (optional '| note'); 'done' to finish.");
    loop {
        let Some(line) = ask(input, "> ").await? else {
            break;
        };
        if line.is_empty() || line.eq_ignore_ascii_case("done") || line.eq_ignore_ascii_case("skip") {
            break;
        }
        match parse_correction_line(&line, &session.results, &session.categories) {
            Ok(correction) => {
                println!(
                    "  #{}: {} -> {}",
                    correction.index + 1,
                    correction.original_classification,
                    correction.new_classification
                );
                session.corrections.push(correction);
            }
            Err(e) => println!("  {}", e),
        }
    }
    Ok(())
}

fn show_summary(session: &SessionContext) {
    println!("\nFinal classification summary:");
    for row in classification_summary(&session.results) {
        println!("  {:<20} {:>4} ({:.1}%)", row.label, row.count, row.percentage);
    }

    if !session.corrections.is_empty() {
        println!("\nUser feedback summary:");
        println!("  Total corrections made: {}", session.corrections.len());
        println!("  Most common corrections:");
        for (pattern, count) in top_corrections(&session.corrections, 3) {
            println!("    {}: {} times", pattern, count);
        }
    }
}

fn show_refinement(pending: &PendingRefinement) {
    println!("\n=== Proposed prompt (iteration {}) ===", pending.iteration_number);
    println!("{}", pending.improved_prompt);
    println!("\nWhy:\n{}", pending.rationale);
    println!(
        "\nChanges: {} | similarity {:.1}%",
        pending.diff.changes_count, pending.diff.similarity_ratio
    );
    for change in &pending.diff.key_changes {
        match change {
            KeyChange::Addition { text } => println!("  + {}", text),
            KeyChange::Deletion { text } => println!("  - {}", text),
            KeyChange::Modification { old_text, new_text } => {
                println!("  ~ {} => {}", old_text, new_text)
            }
        }
    }
    println!("\n{}", pending.diff.inline_annotated_text);
}

async fn run(
    llm: Arc<dyn LlmClient>,
    session: &mut SessionContext,
    input: &mut Input,
    auto_apply: bool,
) -> anyhow::Result<()> {
    let classifier = BatchClassifier::new(llm.clone());
    let refinement = RefinementLoop::new(llm);

    loop {
        println!(
            "\n=== Classifying {} responses with prompt v{} ===",
            session.responses.len(),
            session.prompt.iteration_number
        );
        let results = classifier
            .classify(session.current_prompt(), &session.responses)
            .await;
        session.record_results(results);
        show_results(&session.results);

        collect_corrections(input, session).await?;
        apply_corrections(&mut session.results, &session.corrections);
        show_summary(session);

        if session.corrections.is_empty() {
            println!("\nNo corrections, finishing.");
            return Ok(());
        }
        if !session.iteration.can_iterate() {
            println!("\nMaximum iteration limit ({}) reached.", session.iteration.max());
            return Ok(());
        }
        println!(
            "\nCurrent iteration: {}/{}",
            session.iteration.current(),
            session.iteration.max()
        );
        if !auto_apply && !confirm(input, "Refine the prompt with this feedback? [y/N] ").await? {
            return Ok(());
        }

        let pending = refinement
            .propose(session)
            .await
            .context("Failed to propose refinement")?;

        let decision = if pending.degraded {
            println!("\nNo improved prompt was generated: {}", pending.rationale);
            ReviewDecision::Rejected
        } else {
            show_refinement(&pending);
            if auto_apply {
                ReviewDecision::AutoApplied
            } else if confirm(input, "\nApply this prompt? [y/N] ").await? {
                ReviewDecision::Approved
            } else {
                ReviewDecision::Rejected
            }
        };
        let count = refinement.resolve(session, decision)?;
        if !decision.is_accepted() {
            println!("Kept prompt v{}.", session.prompt.iteration_number);
            return Ok(());
        }
        println!("Applied. Iterations used: {}/{}", count, session.iteration.max());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = parse_args()?;
    let cfg = load_config(args.config).context("Failed to load config")?;
    cfg.validate()?;
    let path = args
        .responses
        .or_else(|| cfg.app.responses_path.clone())
        .context("Usage: promptsmith <responses.json> [--config <file>]")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let responses = Response::from_json(&raw)?;
    tracing::info!(count = responses.len(), path = %path.display(), "Loaded responses");

    let llm = create_llm_from_config(&cfg.llm);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("=== {} ===", cfg.app.name.as_deref().unwrap_or("promptsmith"));
    let (task, categories, initial) = prepare(llm.as_ref(), &mut input).await?;
    let mut session = SessionContext::new(task, categories, initial);
    session.responses = responses;

    loop {
        tracing::info!(session = %session.session_id, "Session started");
        run(llm.clone(), &mut session, &mut input, cfg.app.auto_apply).await?;

        println!(
            "\nFinal prompt (v{}):\n{}",
            session.prompt.iteration_number,
            session.current_prompt()
        );
        let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
        tracing::info!(
            session = %session.session_id,
            iterations = session.iteration.current(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "Session finished"
        );

        println!("\n1. Start new workflow\n2. Exit");
        if choose(&mut input, "Enter your choice (1-2): ", &["1", "2"]).await? == "2" {
            return Ok(());
        }

        session.reset();
        if !confirm(&mut input, "Keep the same task and categories? [y/N] ").await? {
            let (task, categories, initial) = prepare(llm.as_ref(), &mut input).await?;
            session.task_description = task;
            session.categories = categories;
            session.prompt = PromptVersion::initial(initial);
        }
    }
}
