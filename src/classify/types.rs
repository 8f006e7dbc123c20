use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::InputError;

/// 模型未给出某条回答的分类时使用的哨兵标签
pub const ERROR_LABEL: &str = "error";

/// 分类类别：名称原样作为分类标签使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: String,
    /// 数值分数或空；模型可能返回数字或字符串
    #[serde(
        default,
        deserialize_with = "score_from_value",
        serialize_with = "score_to_string"
    )]
    pub score: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>, score: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            score: score.map(String::from),
        }
    }
}

fn score_from_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn score_to_string<S>(score: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(score.as_deref().unwrap_or(""))
}

/// 待分类的一条回答；index 在批次内从 0 开始且稳定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub index: usize,
    pub text: String,
}

impl Response {
    /// 按顺序为一组文本编号
    pub fn batch<I, S>(texts: I) -> Vec<Response>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, t)| Response {
                index,
                text: t.into(),
            })
            .collect()
    }

    /// 解析回答文件
    ///
    /// 支持：字符串或对象组成的数组；`{"responses": [...]}`；其余对象取长度超过 10 的字符串值。
    /// 对象条目取第一个非空的文本字段。空白与 `n/a` 之类的占位回答被丢弃。
    pub fn from_json(raw: &str) -> Result<Vec<Response>, InputError> {
        let data: Value =
            serde_json::from_str(raw).map_err(|e| InputError::InvalidResponses(e.to_string()))?;

        let texts: Vec<String> = match &data {
            Value::Array(items) => items.iter().filter_map(|v| entry_text(v, LIST_FIELDS)).collect(),
            Value::Object(map) => match map.get("responses") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| entry_text(v, WRAPPED_FIELDS))
                    .collect(),
                _ => map
                    .values()
                    .filter_map(Value::as_str)
                    .filter(|s| s.chars().count() > LOOSE_MIN_CHARS)
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            _ => {
                return Err(InputError::InvalidResponses(
                    "expected an array or an object with responses".to_string(),
                ))
            }
        };

        let texts: Vec<String> = texts.into_iter().filter(|t| !is_placeholder(t)).collect();
        if texts.is_empty() {
            return Err(InputError::InvalidResponses("no responses".to_string()));
        }
        Ok(Response::batch(texts))
    }
}

const LIST_FIELDS: &[&str] = &["text", "response", "comment", "feedback", "answer"];
const WRAPPED_FIELDS: &[&str] = &["text", "response", "comment"];
const LOOSE_MIN_CHARS: usize = 10;
const PLACEHOLDERS: &[&str] = &["na", "n/a", "null", "none"];

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(text).filter(|s| !s.is_empty())
}

fn entry_text(item: &Value, fields: &[&str]) -> Option<String> {
    match item {
        Value::Object(map) => fields.iter().find_map(|f| map.get(*f).and_then(scalar_text)),
        Value::String(_) => scalar_text(item),
        _ => None,
    }
}

fn is_placeholder(text: &str) -> bool {
    text.is_empty() || PLACEHOLDERS.contains(&text.to_lowercase().as_str())
}

/// 一次批量推理的单条结果；反馈应用后才设置 final_classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub response_index: usize,
    pub response_text: String,
    pub label: String,
    #[serde(default)]
    pub final_classification: Option<String>,
}

impl ClassificationResult {
    pub fn new(response_index: usize, response_text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            response_index,
            response_text: response_text.into(),
            label: label.into(),
            final_classification: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.label == ERROR_LABEL
    }

    /// 反馈后的最终标签，未应用反馈时为模型标签
    pub fn final_label(&self) -> &str {
        self.final_classification.as_deref().unwrap_or(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_file_shapes() {
        let plain = Response::from_json(r#"["good", "bad"]"#).unwrap();
        assert_eq!(plain[1], Response { index: 1, text: "bad".into() });

        let wrapped = Response::from_json(r#"{"responses": ["only"]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);

        assert!(matches!(
            Response::from_json("[]"),
            Err(InputError::InvalidResponses(_))
        ));
        assert!(matches!(
            Response::from_json(r#"{"items": []}"#),
            Err(InputError::InvalidResponses(_))
        ));
    }

    #[test]
    fn test_responses_file_objects_and_placeholders() {
        let raw = r#"[
            {"text": "  Battery lasts two days  "},
            {"comment": "Dies by noon"},
            {"text": "", "answer": "Fine overall"},
            {"id": 7},
            "N/A",
            "   ",
            "none",
            42
        ]"#;
        let texts: Vec<String> = Response::from_json(raw)
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["Battery lasts two days", "Dies by noon", "Fine overall"]);

        let wrapped = Response::from_json(r#"{"responses": [{"response": "ok then"}, "null"]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].text, "ok then");

        let loose = Response::from_json(r#"{"a": "short", "b": "this one is long enough"}"#).unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].text, "this one is long enough");
    }

    #[test]
    fn test_category_score_accepts_number_and_empty() {
        let c: Category =
            serde_json::from_str(r#"{"name": "High", "description": "d", "score": 100}"#).unwrap();
        assert_eq!(c.score.as_deref(), Some("100"));

        let c: Category =
            serde_json::from_str(r#"{"name": "Unclear", "description": "d", "score": ""}"#).unwrap();
        assert_eq!(c.score, None);

        let c: Category = serde_json::from_str(r#"{"name": "X", "description": "d"}"#).unwrap();
        assert_eq!(c.score, None);
    }

    #[test]
    fn test_category_score_serializes_empty_string() {
        let c = Category::new("Unclear", "d", None);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["score"], "");
    }

    #[test]
    fn test_final_label_falls_back_to_model_label() {
        let mut r = ClassificationResult::new(0, "text", "Low");
        assert_eq!(r.final_label(), "Low");
        r.final_classification = Some("High".into());
        assert_eq!(r.final_label(), "High");
    }
}
