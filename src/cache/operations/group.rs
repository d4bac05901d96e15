use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;

use crate::cache::keys::{group_destinations_key, group_locations_key};

/// 群组镜像操作
pub struct GroupMirrorOperations;

impl GroupMirrorOperations {
    /// 删除群组在镜像存储中的位置与目的地命名空间。
    /// 尽力而为：失败只记日志，绝不阻塞或回滚主存储的级联删除。
    pub fn remove_group_data(redis: Arc<RedisClient>, group_id: i64) {
        tokio::spawn(async move {
            match Self::delete_group_keys(&redis, group_id).await {
                Ok(()) => {
                    tracing::info!("Mirror cleanup ok for group {}", group_id);
                }
                Err(e) => {
                    tracing::warn!(
                        "Mirror cleanup failed for group {} (ignored): {}",
                        group_id,
                        e
                    );
                }
            }
        });
    }

    async fn delete_group_keys(
        redis: &Arc<RedisClient>,
        group_id: i64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(group_locations_key(group_id)).await?;
        let _: () = conn.del(group_destinations_key(group_id)).await?;

        Ok(())
    }
}
