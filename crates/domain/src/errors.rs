//! 错误定义
//!
//! 所有错误都是连接级、可恢复的：通过 `error` 出站事件报告给客户端，
//! 连接保持打开，进程永远不会因为单个连接的失败而退出。

use thiserror::Error;

/// 聊天核心的错误分类。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// 用户名或密码错误
    #[error("invalid credentials")]
    InvalidCredentials,

    /// 会话令牌无效或已过期
    #[error("invalid session token")]
    InvalidToken,

    /// 连接尚未认证就尝试执行操作
    #[error("action requires authentication")]
    Unauthorized,

    /// 已认证，但不是目标房间的成员
    #[error("not a member of room {room_id}")]
    Forbidden { room_id: String },

    /// 消息内容为空
    #[error("message content cannot be empty")]
    EmptyContent,

    /// 房间不存在
    #[error("room not found: {room_id}")]
    RoomNotFound { room_id: String },

    /// 同一连接上以不同身份重复认证
    #[error("connection already bound to another identity")]
    AlreadyBound,

    /// 外部存储暂时不可用，请求方可以重试
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    pub fn forbidden(room_id: impl Into<String>) -> Self {
        Self::Forbidden {
            room_id: room_id.into(),
        }
    }

    pub fn room_not_found(room_id: impl Into<String>) -> Self {
        Self::RoomNotFound {
            room_id: room_id.into(),
        }
    }

    /// 错误帧里携带的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "InvalidCredentials",
            Self::InvalidToken => "InvalidToken",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden { .. } => "Forbidden",
            Self::EmptyContent => "EmptyContent",
            Self::RoomNotFound { .. } => "RoomNotFound",
            Self::AlreadyBound => "AlreadyBound",
            Self::Store(_) => "StoreUnavailable",
        }
    }
}

/// 外部存储错误。对触发请求来说是可重试的，
/// 绝不会被当作静默成功处理。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// 核心统一的结果类型。
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ChatError::Unauthorized.code(), "Unauthorized");
        assert_eq!(ChatError::forbidden("g1").code(), "Forbidden");
        assert_eq!(
            ChatError::Store(StoreError::unavailable("down")).code(),
            "StoreUnavailable"
        );
    }
}
