//! 导入内容的 HTML 拼装：集合描述、条目正文、标题清洗

use crate::cdm::types::{FieldInfo, RecordMap};
use serde_json::Value;

/// 不写入条目正文的字段（访问控制、内部时间戳、记录号、文件大小、打印/OCR/报纸标记、检索字段、标题）
pub const SKIPPED_FIELDS: &[&str] = &[
    "dmaccess",
    "dmimage",
    "dmcreated",
    "dmmodified",
    "dmoclcno",
    "dmrecord",
    "restrictionCode",
    "cdmfilesize",
    "cdmfilesizeformatted",
    "cdmprintpdf",
    "cdmhasocr",
    "cdmisnewspaper",
    "find",
    "title",
];

/// 集合描述中最多列出的字段数
const DESCRIBED_FIELD_LIMIT: usize = 10;

/// HTML 转义；标签一律转义，已有的字符实体保持原样
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '&' if starts_with_entity(&text[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// 是否以 `&name;`、`&#NN;`、`&#xHH;` 形式的字符实体开头
fn starts_with_entity(text: &str) -> bool {
    let Some(name) = text
        .strip_prefix('&')
        .and_then(|body| body.split_once(';'))
        .map(|(name, _)| name)
    else {
        return false;
    };
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(dec) = name.strip_prefix('#') {
        !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
    } else {
        name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

/// 去掉所有 HTML 标签（script/style 连同内容一起去掉），并去掉首尾空白
pub fn strip_tags(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["script", "style"] {
        text = remove_element(&text, tag);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn remove_element(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut search = 0;
    while let Some(start) = lower[search..].find(&open).map(|i| search + i) {
        // 标签名后必须是 `>`、`/` 或空白，`<styled>` 之类不算
        let after = lower.as_bytes().get(start + open.len()).copied();
        if !matches!(after, Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r')) {
            search = start + open.len();
            continue;
        }
        out.push_str(&html[cursor..start]);
        cursor = match lower[start..].find(&close) {
            Some(end) => start + end + close.len(),
            None => html.len(),
        };
        search = cursor;
    }
    out.push_str(&html[cursor..]);
    out
}

/// 空值判断：null、false、0、""、"0"、空数组/对象
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// 字段名转展示标签：`_`、`-` 换成空格，每个单词首字母大写
pub fn field_label(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut out = String::with_capacity(spaced.len());
    let mut word_start = true;
    for c in spaced.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = c.is_whitespace();
    }
    out
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        _ => None,
    }
}

/// 由元数据拼装条目正文
pub fn build_item_content(metadata: &RecordMap) -> String {
    let mut content = String::from(r#"<div class="cdm-item-metadata">"#);
    for (key, value) in metadata {
        if SKIPPED_FIELDS.contains(&key.as_str()) || is_empty_value(value) {
            continue;
        }
        let Some(text) = scalar_text(value) else {
            continue;
        };
        content.push_str(&format!(
            "<p><strong>{}:</strong> {}</p>",
            escape_html(&field_label(key)),
            escape_html(&text)
        ));
    }
    content.push_str("</div>");
    content
}

/// 由字段定义和条目总数拼装集合描述
pub fn build_collection_description(item_count: u64, fields: Option<&[FieldInfo]>) -> String {
    let field_list = fields
        .map(|fields| {
            fields
                .iter()
                .take(DESCRIBED_FIELD_LIMIT)
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "<p>Digital collection imported from ContentDM.</p><p><strong>Total Items:</strong> {}</p><p><strong>Fields:</strong> {}</p>",
        item_count, field_list
    )
}

/// 条目标题：详情标题 → 列表行标题 → `Item {pointer}`，去掉 HTML 标签
pub fn derive_title(detail: &RecordMap, row: &RecordMap, pointer: &str) -> String {
    let pick = |record: &RecordMap| {
        record
            .get("title")
            .and_then(scalar_text)
            .map(|t| strip_tags(&t))
            .filter(|t| !t.is_empty())
    };
    pick(detail)
        .or_else(|| pick(row))
        .unwrap_or_else(|| format!("Item {}", pointer))
}
