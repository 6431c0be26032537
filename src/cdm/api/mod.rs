//! ContentDM 远程客户端模块
//!
//! 服务器地址规范化、HTTP 传输、dmwebservices 查询

pub mod client;
pub mod server;
pub mod transport;

pub use client::{clean_alias, CdmApi, DEFAULT_QUERY_FIELDS, PAGE_SIZE};
pub use server::ServerConnection;
pub use transport::{CdmTransport, ReqwestTransport, DEFAULT_TIMEOUT};
