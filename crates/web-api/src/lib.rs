//! Web API 层
//!
//! 会话网关（WebSocket）+ 请求/响应 HTTP 面。

pub mod error;
pub mod gateway;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
