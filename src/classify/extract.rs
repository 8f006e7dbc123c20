//! 从模型自由文本中提取结构化结果
//!
//! 去掉 Markdown 代码块标记后，取第一个 `{` 到最后一个 `}` 之间的区域解析为 JSON 对象；
//! 失败再尝试整段文本。两者都不是合法 JSON 对象时返回 ParseError，绝不返回部分结果。

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::ParseError;

fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

fn into_object(value: Value) -> Result<Map<String, Value>, ParseError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::UnexpectedShape(format!(
            "expected JSON object, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 提取 JSON 对象
pub fn extract_structured_result(text: &str) -> Result<Map<String, Value>, ParseError> {
    let cleaned = strip_fences(text);

    let region = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned.get(start..=end),
        _ => None,
    };

    if let Some(region) = region {
        match serde_json::from_str::<Value>(region) {
            Ok(value) => return into_object(value),
            Err(e) => tracing::debug!(error = %e, "JSON region did not parse, trying whole reply"),
        }
    }

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => into_object(value),
        Err(_) if !cleaned.contains('{') => Err(ParseError::NoJsonRegion),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// 提取后反序列化为具体类型
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let map = extract_structured_result(text)?;
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ParseError::UnexpectedShape(e.to_string()))
}
