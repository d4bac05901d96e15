use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;

use crate::cache::keys::active_token_key;

/// 会话镜像操作
pub struct SessionMirrorOperations;

impl SessionMirrorOperations {
    /// 将账号当前活跃访问令牌写入镜像存储（登出时传 None 删除）。
    /// 后台任务执行，调用方不等待结果；主存储才是单会话校验的权威来源。
    pub fn set_active_token(redis: Arc<RedisClient>, user_id: i64, token: Option<String>) {
        tokio::spawn(async move {
            match Self::write_active_token(&redis, user_id, token.as_deref()).await {
                Ok(()) => {
                    tracing::info!("Mirror write ok: {}", active_token_key(user_id));
                }
                Err(e) => {
                    tracing::warn!(
                        "Mirror write failed for user {} (ignored): {}",
                        user_id,
                        e
                    );
                }
            }
        });
    }

    async fn write_active_token(
        redis: &Arc<RedisClient>,
        user_id: i64,
        token: Option<&str>,
    ) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;

        let key = active_token_key(user_id);
        match token {
            Some(token) => {
                let _: () = conn.set(key, token).await?;
            }
            None => {
                let _: () = conn.del(key).await?;
            }
        }

        Ok(())
    }
}
