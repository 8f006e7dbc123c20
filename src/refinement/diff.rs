//! 提示词词级差异
//!
//! 按空白切词（标点保留在词上），用 Ratcliff/Obershelp 最长匹配块算法求 equal / delete / insert / replace
//! 操作序列，分段结果与 Python difflib.SequenceMatcher（含 200 词以上的 popular 元素启发式）一致。
//! 计算失败时返回零值 DiffResult 与占位文本，从不向调用方报错。

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;

use crate::core::DiffError;
use crate::refinement::types::{DiffResult, KeyChange};

pub const DIFF_PLACEHOLDER: &str = "Error generating diff visualization";
pub const MAX_KEY_CHANGES: usize = 5;

/// 新增/删除片段截断字符数与省略号阈值（词数）
const SPAN_CHARS: usize = 50;
const SPAN_TOKENS: usize = 10;
/// 修改片段每侧截断字符数与省略号阈值（词数）
const SIDE_CHARS: usize = 30;
const SIDE_TOKENS: usize = 5;

/// 启用 popular 元素过滤的最小序列长度
const AUTOJUNK_MIN_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// 操作：a[i1..i2] 对应 b[j1..j2]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: Tag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Match {
    a: usize,
    b: usize,
    size: usize,
}

/// 两个词序列的匹配器
pub struct SequenceMatcher<'a> {
    a: &'a [&'a str],
    b: &'a [&'a str],
    b2j: HashMap<&'a str, Vec<usize>>,
    blocks: Vec<Match>,
}

impl<'a> SequenceMatcher<'a> {
    pub fn new(a: &'a [&'a str], b: &'a [&'a str]) -> Self {
        let mut b2j: HashMap<&'a str, Vec<usize>> = HashMap::new();
        for (j, tok) in b.iter().enumerate() {
            b2j.entry(*tok).or_default().push(j);
        }

        // popular 元素不参与找锚点，但仍可在扩展阶段被匹配
        let n = b.len();
        if n >= AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, idxs| idxs.len() <= ntest);
        }

        let mut matcher = Self {
            a,
            b,
            b2j,
            blocks: Vec::new(),
        };
        matcher.blocks = matcher.matching_blocks();
        matcher
    }

    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(idxs) = self.b2j.get(self.a[i]) {
                for &j in idxs {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = next;
        }

        while besti > alo && bestj > blo && self.a[besti - 1] == self.b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && self.a[besti + bestsize] == self.b[bestj + bestsize]
        {
            bestsize += 1;
        }

        Match {
            a: besti,
            b: bestj,
            size: bestsize,
        }
    }

    fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0, la, 0, lb)];
        let mut found = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size > 0 {
                found.push(m);
                if alo < m.a && blo < m.b {
                    queue.push((alo, m.a, blo, m.b));
                }
                if m.a + m.size < ahi && m.b + m.size < bhi {
                    queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
                }
            }
        }
        found.sort_by_key(|m| (m.a, m.b, m.size));

        // 合并首尾相接的块
        let mut merged: Vec<Match> = Vec::with_capacity(found.len() + 1);
        for m in found {
            match merged.last_mut() {
                Some(last) if last.a + last.size == m.a && last.b + last.size == m.b => {
                    last.size += m.size;
                }
                _ => merged.push(m),
            }
        }
        merged.push(Match {
            a: la,
            b: lb,
            size: 0,
        });
        merged
    }

    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut ops = Vec::new();
        for m in &self.blocks {
            let tag = if i < m.a && j < m.b {
                Some(Tag::Replace)
            } else if i < m.a {
                Some(Tag::Delete)
            } else if j < m.b {
                Some(Tag::Insert)
            } else {
                None
            };
            if let Some(tag) = tag {
                ops.push(Opcode {
                    tag,
                    i1: i,
                    i2: m.a,
                    j1: j,
                    j2: m.b,
                });
            }
            i = m.a + m.size;
            j = m.b + m.size;
            if m.size > 0 {
                ops.push(Opcode {
                    tag: Tag::Equal,
                    i1: m.a,
                    i2: i,
                    j1: m.b,
                    j2: j,
                });
            }
        }
        ops
    }

    /// 2 * M / T；两个序列都为空时为 1.0
    pub fn ratio(&self) -> f64 {
        let matches: usize = self.blocks.iter().map(|m| m.size).sum();
        let total = self.a.len() + self.b.len();
        if total == 0 {
            1.0
        } else {
            2.0 * matches as f64 / total as f64
        }
    }
}

fn cached(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, DiffError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| DiffError::Render(e.to_string()))
}

fn sentence_break() -> Result<&'static Regex, DiffError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    cached(&RE, r"\. ")
}

fn repeated_breaks() -> Result<&'static Regex, DiffError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    cached(&RE, r"\n{2,}")
}

fn truncate(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

fn span(tokens: &[&str], chars: usize, token_limit: usize) -> String {
    let mut s = truncate(&tokens.join(" "), chars);
    if tokens.len() > token_limit {
        s.push_str("...");
    }
    s
}

#[derive(Debug, Default)]
pub struct TextDiffer;

impl TextDiffer {
    pub fn new() -> Self {
        Self
    }

    pub fn diff(&self, old_text: &str, new_text: &str) -> DiffResult {
        settle(|| compute(old_text, new_text))
    }
}

impl DiffResult {
    /// 差异计算失败时的占位结果
    pub fn degraded() -> Self {
        Self {
            changes_count: 0,
            similarity_ratio: 0.0,
            key_changes: Vec::new(),
            inline_annotated_text: DIFF_PLACEHOLDER.to_string(),
        }
    }
}

/// 错误与 panic 都收敛为占位结果
fn settle<F>(compute: F) -> DiffResult
where
    F: FnOnce() -> Result<DiffResult, DiffError>,
{
    match panic::catch_unwind(AssertUnwindSafe(compute)).unwrap_or(Err(DiffError::Panicked)) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "Diff failed, returning placeholder");
            DiffResult::degraded()
        }
    }
}

fn compute(old_text: &str, new_text: &str) -> Result<DiffResult, DiffError> {
    let a: Vec<&str> = old_text.split_whitespace().collect();
    let b: Vec<&str> = new_text.split_whitespace().collect();
    let matcher = SequenceMatcher::new(&a, &b);
    let ops = matcher.opcodes();

    let mut parts: Vec<String> = Vec::with_capacity(ops.len() + 1);
    let mut key_changes = Vec::new();
    let mut changes_count = 0;

    for op in &ops {
        let old = a
            .get(op.i1..op.i2)
            .ok_or_else(|| DiffError::Render(format!("old span {}..{}", op.i1, op.i2)))?;
        let new = b
            .get(op.j1..op.j2)
            .ok_or_else(|| DiffError::Render(format!("new span {}..{}", op.j1, op.j2)))?;

        let change = match op.tag {
            Tag::Equal => {
                parts.push(old.join(" "));
                None
            }
            Tag::Delete => {
                parts.push(format!("[-{}-]", old.join(" ")));
                Some(KeyChange::Deletion {
                    text: span(old, SPAN_CHARS, SPAN_TOKENS),
                })
            }
            Tag::Insert => {
                parts.push(format!("{{+{}+}}", new.join(" ")));
                Some(KeyChange::Addition {
                    text: span(new, SPAN_CHARS, SPAN_TOKENS),
                })
            }
            Tag::Replace => {
                parts.push(format!("[-{}-]", old.join(" ")));
                parts.push(format!("{{+{}+}}", new.join(" ")));
                Some(KeyChange::Modification {
                    old_text: span(old, SIDE_CHARS, SIDE_TOKENS),
                    new_text: span(new, SIDE_CHARS, SIDE_TOKENS),
                })
            }
        };

        if let Some(change) = change {
            changes_count += 1;
            if key_changes.len() < MAX_KEY_CHANGES {
                key_changes.push(change);
            }
        }
    }

    let inline = parts.join(" ");
    let inline = sentence_break()?.replace_all(&inline, ". \n\n");
    let inline = repeated_breaks()?.replace_all(&inline, "\n\n").into_owned();

    Ok(DiffResult {
        changes_count,
        similarity_ratio: (matcher.ratio() * 1000.0).round() / 10.0,
        key_changes,
        inline_annotated_text: inline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(old: &str, new: &str) -> Vec<Tag> {
        let a: Vec<&str> = old.split_whitespace().collect();
        let b: Vec<&str> = new.split_whitespace().collect();
        SequenceMatcher::new(&a, &b)
            .opcodes()
            .into_iter()
            .map(|o| o.tag)
            .collect()
    }

    #[test]
    fn test_identical_text() {
        let d = TextDiffer::new().diff("Classify each response.", "Classify each response.");
        assert_eq!(d.changes_count, 0);
        assert_eq!(d.similarity_ratio, 100.0);
        assert!(d.key_changes.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let d = TextDiffer::new().diff("", "");
        assert_eq!(d.changes_count, 0);
        assert_eq!(d.inline_annotated_text, "");
    }

    #[test]
    fn test_single_insert() {
        let d = TextDiffer::new().diff("a b c", "a b c d");
        assert_eq!(tags("a b c", "a b c d"), vec![Tag::Equal, Tag::Insert]);
        assert_eq!(d.changes_count, 1);
        assert_eq!(
            d.key_changes,
            vec![KeyChange::Addition { text: "d".into() }]
        );
        assert!(d.similarity_ratio > 0.0 && d.similarity_ratio < 100.0);
        assert_eq!(d.similarity_ratio, 85.7);
        assert_eq!(d.inline_annotated_text, "a b c {+d+}");
    }

    #[test]
    fn test_single_replace() {
        let d = TextDiffer::new().diff("The cat sat.", "The dog sat.");
        assert_eq!(
            tags("The cat sat.", "The dog sat."),
            vec![Tag::Equal, Tag::Replace, Tag::Equal]
        );
        assert_eq!(d.changes_count, 1);
        assert!(d.similarity_ratio > 50.0);
        assert_eq!(
            d.key_changes,
            vec![KeyChange::Modification {
                old_text: "cat".into(),
                new_text: "dog".into()
            }]
        );
        assert_eq!(d.inline_annotated_text, "The [-cat-] {+dog+} sat.");
    }

    #[test]
    fn test_disjoint_is_zero() {
        let d = TextDiffer::new().diff("one two", "three four");
        assert_eq!(d.similarity_ratio, 0.0);
        assert_eq!(d.changes_count, 1);
    }

    #[test]
    fn test_delete_and_sentence_breaks() {
        let d = TextDiffer::new().diff("First sentence. Extra words here. Last one.", "First sentence. Last one.");
        assert_eq!(d.changes_count, 1);
        assert!(matches!(d.key_changes[0], KeyChange::Deletion { ref text } if text == "Extra words here."));
        assert_eq!(
            d.inline_annotated_text,
            "First sentence. \n\n[-Extra words here.-] Last one."
        );
    }

    #[test]
    fn test_long_span_gets_ellipsis() {
        let added: Vec<String> = (0..12).map(|i| format!("w{}", i)).collect();
        let new = format!("start {}", added.join(" "));
        let d = TextDiffer::new().diff("start", &new);
        match &d.key_changes[0] {
            KeyChange::Addition { text } => {
                assert!(text.ends_with("..."));
                assert!(text.chars().count() <= SPAN_CHARS + 3);
            }
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_key_changes_capped() {
        let old = "a x b x c x d x e x f x g";
        let new = "a y b y c y d y e y f y g";
        let d = TextDiffer::new().diff(old, new);
        assert_eq!(d.changes_count, 6);
        assert_eq!(d.key_changes.len(), MAX_KEY_CHANGES);
    }

    #[test]
    fn test_matches_reference_segmentation() {
        // 与 difflib 对同一输入给出的分段一致
        assert_eq!(
            tags("a b x c d", "a c b x d"),
            vec![Tag::Equal, Tag::Insert, Tag::Equal, Tag::Delete, Tag::Equal]
        );
    }

    #[test]
    fn test_popular_tokens_in_long_text() {
        let old: Vec<&str> = std::iter::repeat("the").take(250).collect();
        let mut new = old.clone();
        new.push("end");
        let old = old.join(" ");
        let new = new.join(" ");
        let d = TextDiffer::new().diff(&old, &new);
        assert_eq!(d.changes_count, 1);
        assert!(d.similarity_ratio > 99.0);
    }

    #[test]
    fn test_degraded_placeholder() {
        let d = DiffResult::degraded();
        assert_eq!(d.changes_count, 0);
        assert_eq!(d.similarity_ratio, 0.0);
        assert!(d.key_changes.is_empty());
        assert_eq!(d.inline_annotated_text, DIFF_PLACEHOLDER);
    }

    #[test]
    fn test_render_error_and_panic_settle_to_placeholder() {
        assert_eq!(
            settle(|| Err(DiffError::Render("bad span".into()))),
            DiffResult::degraded()
        );
        assert_eq!(settle(|| panic!("matcher bug")), DiffResult::degraded());
    }
}
