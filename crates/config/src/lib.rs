//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 监听地址
//! - 网关的每连接出站队列容量
//! - 存储适配器设置

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// 网关配置
    pub gateway: GatewayConfig,
    /// 存储适配器配置
    pub store: StoreConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// 每连接出站队列容量。队列满时慢连接丢弃新事件（见注册表的背压约定）
    pub outbound_capacity: usize,
}

/// 存储适配器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub bcrypt_cost: Option<u32>,
}

impl AppConfig {
    /// 从环境变量加载配置，缺省值适合本地开发
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
            },
            gateway: GatewayConfig {
                outbound_capacity: env::var("OUTBOUND_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(256),
            },
            store: StoreConfig {
                bcrypt_cost: env::var("BCRYPT_COST").ok().and_then(|s| s.parse().ok()),
            },
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "server host cannot be empty".to_string(),
            ));
        }

        if self.gateway.outbound_capacity == 0 {
            return Err(ConfigError::InvalidGatewayConfig(
                "outbound capacity must be greater than 0".to_string(),
            ));
        }

        // 验证bcrypt cost（如果设置）
        if let Some(cost) = self.store.bcrypt_cost {
            if !(4..=14).contains(&cost) {
                return Err(ConfigError::InvalidStoreConfig(
                    "bcrypt cost should be between 4-14".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid gateway configuration: {0}")]
    InvalidGatewayConfig(String),
    #[error("Invalid store configuration: {0}")]
    InvalidStoreConfig(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_are_valid() {
        let config = AppConfig::from_env();
        assert!(!config.server.host.is_empty());
        assert!(config.server.port > 0);
        assert!(config.gateway.outbound_capacity > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_outbound_capacity_fails_validation() {
        let mut config = AppConfig::from_env();
        config.gateway.outbound_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bcrypt_cost_validation() {
        let mut config = AppConfig::from_env();

        config.store.bcrypt_cost = Some(12);
        assert!(config.validate().is_ok());

        config.store.bcrypt_cost = Some(2);
        assert!(config.validate().is_err());

        config.store.bcrypt_cost = Some(16);
        assert!(config.validate().is_err());
    }
}
