//! 管理操作的请求与响应

use serde::Serialize;
use serde_json::{json, Map, Value};

/// 一次管理操作请求
///
/// `nonce_verified` 和 `can_manage_options` 由宿主在调用前校验后填入。
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub action: String,
    pub nonce_verified: bool,
    pub can_manage_options: bool,
    pub params: Map<String, Value>,
}

impl ActionRequest {
    /// 未通过任何校验的请求
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// 已通过校验的管理员请求
    pub fn trusted(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            nonce_verified: true,
            can_manage_options: true,
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// 管理操作响应：`{ "success": bool, "data": ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub data: Value,
}

impl ActionResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// 失败响应，`data` 为 `{ "message": ... }`
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: json!({ "message": message.into() }),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}
