//! ContentDM API DTO（响应结构体与宽松反序列化工具）
//!
//! ContentDM 的 JSON 里同一个字段可能是数字也可能是字符串（pager.total、pointer、
//! 图片宽高等），空字段有时是 `{}` 或 `null`，这里统一做容错处理。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 反序列化数组字段，处理 null 值
pub(crate) fn deserialize_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// 反序列化数字字段：接受数字、数字字符串或 null（null 和无法解析的值视为 0）
pub(crate) fn deserialize_lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_u64(&value).unwrap_or(0))
}

/// 反序列化字符串字段：接受字符串、数字或 null
pub(crate) fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_string(&value).unwrap_or_default())
}

/// 把标量 JSON 值转换成字符串；数组、对象、null 返回 None
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 把 JSON 值解析为非负整数
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// 一条元数据记录（dmQuery 的行或 dmGetItemInfo 的结果），保留服务器返回的全部字段
pub type RecordMap = Map<String, Value>;

/// 集合字段定义（dmGetCollectionFieldInfo 的数组元素）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// 字段显示名
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub name: String,
    /// 字段简称（nickname），用于 dmQuery 的字段列表
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub nick: String,
    #[serde(rename = "type", default, deserialize_with = "deserialize_lenient_string")]
    pub field_type: String,
    /// 其余字段原样保留（size、req、search、hide、vocab、dc ...）
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// dmQuery 分页信息
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pager {
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub start: u64,
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub maxrecs: u64,
    /// 服务器报告的总条目数
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub total: u64,
}

/// dmQuery 响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub pager: Pager,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub records: Vec<RecordMap>,
}

/// dmGetImageInfo 响应（只关心像素尺寸）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageInfo {
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub width: u64,
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub height: u64,
}

/// 连接校验结果
#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub valid: bool,
    /// dmGetCollectionList 原始返回
    pub collections: Vec<Value>,
    pub total: usize,
}

/// 集合列表中的一项（dmGetCollectionList 的数组元素）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionEntry {
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub alias: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pager_accepts_string_and_numeric_totals() {
        let from_string: QueryResult = serde_json::from_value(json!({
            "pager": {"start": "1", "maxrecs": "100", "total": "1000"},
            "records": [{"pointer": 12, "title": "Harbor"}]
        }))
        .unwrap();
        assert_eq!(from_string.pager.total, 1000);
        assert_eq!(from_string.records.len(), 1);

        let from_number: QueryResult =
            serde_json::from_value(json!({"pager": {"total": 30}, "records": null})).unwrap();
        assert_eq!(from_number.pager.total, 30);
        assert!(from_number.records.is_empty());
    }

    #[test]
    fn field_info_keeps_unknown_keys() {
        let field: FieldInfo = serde_json::from_value(json!({
            "name": "Photographer",
            "nick": "photog",
            "type": "TEXT",
            "size": 0,
            "search": "1"
        }))
        .unwrap();
        assert_eq!(field.nick, "photog");
        assert_eq!(field.field_type, "TEXT");
        assert_eq!(field.extra.get("search"), Some(&json!("1")));
    }

    #[test]
    fn scalar_helpers() {
        assert_eq!(value_as_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_as_string(&json!({})), None);
        assert_eq!(value_as_u64(&json!(" 7 ")), Some(7));
        assert_eq!(value_as_u64(&json!("n/a")), None);
    }
}
