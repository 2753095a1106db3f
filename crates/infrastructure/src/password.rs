//! 密码哈希适配器
//!
//! bcrypt 计算放进 `spawn_blocking`，避免阻塞异步运行时。

use bcrypt::{hash, verify, DEFAULT_COST};

use domain::{ChatError, StoreError};

#[derive(Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, ChatError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hash(plaintext, cost))
            .await
            .map_err(|err| StoreError::unavailable(err.to_string()))?
            .map_err(|err| StoreError::unavailable(err.to_string()).into())
    }

    pub async fn verify(&self, plaintext: &str, hashed: &str) -> Result<bool, ChatError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.to_owned();
        tokio::task::spawn_blocking(move || verify(plaintext, &hashed))
            .await
            .map_err(|err| StoreError::unavailable(err.to_string()))?
            .map_err(|err| StoreError::unavailable(err.to_string()).into())
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(Some(DEFAULT_COST))
    }
}
