//! 群组生命周期清扫器：固定间隔扫描已过期的群组并触发级联销毁。
//! 独立于请求路径运行；单个群组销毁失败只影响它自己，
//! 群组仍然过期，下个周期会再次命中。

use crate::AppState;
use crate::routes::group::model::Group;

/// 启动周期清扫任务
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval());
        // 错过的滴答不补，照常跳到下一个周期
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    });
}

/// 单次清扫。幂等：并发删除抢先完成时这里删 0 行，不算错误。
pub async fn sweep_once(state: &AppState) {
    let expired = match Group::find_expired(&state.pool).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Sweep scan failed: {:?}", e);
            return;
        }
    };

    if expired.is_empty() {
        return;
    }

    tracing::info!("Sweeping {} expired group(s)", expired.len());

    for group_id in expired {
        match Group::destroy(&state.pool, &state.redis, group_id).await {
            Ok(0) => {
                // 扫描与删除之间被所有者抢先删掉，无事可做
                tracing::debug!("Group {} already gone, skipping", group_id);
            }
            Ok(_) => {
                tracing::info!("Expired group {} destroyed", group_id);
            }
            Err(e) => {
                // 本群组的事务已回滚，其余群组不受影响
                tracing::error!("Failed to destroy expired group {}: {:?}", group_id, e);
            }
        }
    }
}
