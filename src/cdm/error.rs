//! ContentDM 导入相关的错误类型
//!
//! 远程客户端、同步器和管理操作共用同一个错误枚举；
//! 存储层内部仍使用 anyhow，经由 `Store` 变体向上传递。

use thiserror::Error;

/// ContentDM 错误
#[derive(Debug, Error)]
pub enum CdmError {
    /// 尚未设置服务器地址
    #[error("CDM API 未初始化")]
    NotInitialized,

    /// 服务器地址无法解析出主机名
    #[error("无效的服务器地址: {0}")]
    InvalidServerUrl(String),

    /// 传输层失败（连接、超时、TLS）
    #[error("网络错误: {0}")]
    Network(String),

    /// 响应 body 不是合法 JSON
    #[error("无效的 JSON 响应: {0}")]
    Parse(String),

    /// JSON 合法但结构不符合预期
    #[error("服务器返回的数据格式无效")]
    InvalidResponse,

    /// 集合列表不是数组
    #[error("无效的集合数据")]
    InvalidData,

    /// 导入条目前本地不存在对应集合
    #[error("未找到集合，请先导入集合")]
    NoCollection,

    #[error("集合中没有条目")]
    NoItems,

    #[error("集合缺少 alias")]
    NoAlias,

    #[error("条目缺少 pointer")]
    NoPointer,

    #[error("权限不足")]
    PermissionDenied,

    /// 宿主侧 CSRF 校验未通过
    #[error("安全校验失败")]
    InvalidNonce,

    #[error("请输入服务器地址")]
    MissingUrl,

    #[error("尚未配置 ContentDM 服务器地址")]
    NotConfigured,

    #[error("缺少集合 alias")]
    AliasRequired,

    #[error("未知操作: {0}")]
    UnknownAction(String),

    /// 本地存储失败
    #[error("存储错误: {0}")]
    Store(#[from] anyhow::Error),
}

/// ContentDM 操作结果
pub type CdmResult<T> = Result<T, CdmError>;
