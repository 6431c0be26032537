//! 管理操作模块
//!
//! 操作名到处理函数的注册表、统一的成功/失败响应、运行上下文

pub mod context;
pub mod models;
pub mod registry;

pub use context::AdminContext;
pub use models::{ActionRequest, ActionResponse};
pub use registry::{
    ActionHandler, ActionRegistry, ACTION_GET_IMPORT_STATUS, ACTION_IMPORT_COLLECTIONS,
    ACTION_IMPORT_ITEMS, ACTION_SAVE_SETTINGS, ACTION_VALIDATE_URL,
};
