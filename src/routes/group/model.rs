use chrono::{DateTime, Utc};
use redis::Client as RedisClient;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::GroupMirrorOperations;

#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group_id: i64,
    pub name: String,
    pub creator_id: i64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub member_count: usize,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub id: i64,
    pub username: String,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub user_id: i64,
    pub username: String,
    pub profile_image_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// 创建群组：群组行、创建者与受邀成员的成员关系、全量放行的共享规则矩阵
    /// 在同一个事务里落库
    pub async fn create(
        pool: &PgPool,
        req: &CreateGroupRequest,
        creator_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let group_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO groups (
                name, creator_id, destination_name, destination_lat,
                destination_lng, start_time, end_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&req.name)
        .bind(creator_id)
        .bind(&req.destination_name)
        .bind(req.destination_lat)
        .bind(req.destination_lng)
        .bind(req.start_time)
        .bind(req.end_time)
        .fetch_one(&mut *tx)
        .await?;

        let mut all_members = vec![creator_id];
        for member_id in &req.member_ids {
            if !all_members.contains(member_id) {
                all_members.push(*member_id);
            }
        }

        for member_id in &all_members {
            sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
                .bind(group_id)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
        }

        SharingRule::initialize(&mut tx, group_id, &all_members).await?;

        tx.commit().await?;

        Ok(group_id)
    }

    pub async fn find_by_id(pool: &PgPool, group_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = $1")
            .bind(group_id)
            .fetch_optional(pool)
            .await
    }

    /// 当前用户所在的全部群组，附成员名单
    pub async fn find_for_user(
        pool: &PgPool,
        user_id: i64,
    ) -> Result<Vec<GroupSummary>, sqlx::Error> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = $1
            ORDER BY g.start_time
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut summaries = Vec::with_capacity(groups.len());
        for group in groups {
            let member_ids: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT u.username FROM group_members m
                JOIN users u ON u.id = m.user_id
                WHERE m.group_id = $1
                ORDER BY u.username
                "#,
            )
            .bind(group.id)
            .fetch_all(pool)
            .await?;

            summaries.push(GroupSummary {
                group_id: group.id,
                name: group.name,
                creator_id: group.creator_id,
                destination_name: group.destination_name,
                destination_lat: group.destination_lat,
                destination_lng: group.destination_lng,
                start_time: group.start_time,
                end_time: group.end_time,
                member_count: member_ids.len(),
                member_ids,
            });
        }

        Ok(summaries)
    }

    pub async fn is_member(
        pool: &PgPool,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count > 0)
    }

    /// 群组成员（设置页用，排除请求者本人）
    pub async fn members_excluding(
        pool: &PgPool,
        group_id: i64,
        excluded_user_id: i64,
    ) -> Result<Vec<MemberInfo>, sqlx::Error> {
        sqlx::query_as::<_, MemberInfo>(
            r#"
            SELECT u.id, u.username, u.profile_image_url
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1 AND m.user_id <> $2
            ORDER BY u.username
            "#,
        )
        .bind(group_id)
        .bind(excluded_user_id)
        .fetch_all(pool)
        .await
    }

    /// 终点时间已过的群组，供清扫器扫描
    pub async fn find_expired(pool: &PgPool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM groups WHERE end_time < NOW()")
            .fetch_all(pool)
            .await
    }

    /// 销毁群组的共享级联，所有者删除与清扫器走同一条路径。
    /// 第 1 步镜像删除尽力而为；第 2~5 步（规则、成员、位置、群组本体）
    /// 在同一事务内执行，每一步都是"存在才删"，并发删除互不影响。
    /// 返回群组本体实际删除的行数，已被抢先删掉时为 0。
    pub async fn destroy(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        GroupMirrorOperations::remove_group_data(Arc::clone(redis), group_id);

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM group_sharing_rules WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM group_members WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM user_locations WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted)
    }
}

/// 位置共享规则矩阵：群组内成员两两之间的有向可见性边
pub struct SharingRule;

impl SharingRule {
    /// 建群时初始化矩阵：成员间每个有序对一条规则，默认放行
    pub async fn initialize(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        group_id: i64,
        member_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        for (sharer, target) in ordered_pairs(member_ids) {
            sqlx::query(
                r#"
                INSERT INTO group_sharing_rules (group_id, sharer_id, target_id, is_allowed)
                VALUES ($1, $2, $3, TRUE)
                "#,
            )
            .bind(group_id)
            .bind(sharer)
            .bind(target)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// 双向互斥更新：A->B 与 B->A 两条边在同一事务里写成同一个值，
    /// 不存在中间状态让两个方向不一致。规则行缺失时直接补建。
    pub async fn update_pairwise(
        pool: &PgPool,
        group_id: i64,
        user_a: i64,
        user_b: i64,
        allow: bool,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        Self::upsert_directed(&mut tx, group_id, user_a, user_b, allow).await?;
        Self::upsert_directed(&mut tx, group_id, user_b, user_a, allow).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn upsert_directed(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        group_id: i64,
        sharer_id: i64,
        target_id: i64,
        allow: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO group_sharing_rules (group_id, sharer_id, target_id, is_allowed)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, sharer_id, target_id)
            DO UPDATE SET is_allowed = EXCLUDED.is_allowed
            "#,
        )
        .bind(group_id)
        .bind(sharer_id)
        .bind(target_id)
        .bind(allow)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// 以 target 为接收方的全部规则：共享者ID -> 是否放行
    pub async fn incoming(
        pool: &PgPool,
        group_id: i64,
        target_id: i64,
    ) -> Result<HashMap<i64, bool>, sqlx::Error> {
        let rows: Vec<(i64, bool)> = sqlx::query_as(
            r#"
            SELECT sharer_id, is_allowed FROM group_sharing_rules
            WHERE group_id = $1 AND target_id = $2
            "#,
        )
        .bind(group_id)
        .bind(target_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// 以 source 为共享方的全部规则：接收者ID -> 是否放行
    pub async fn outgoing(
        pool: &PgPool,
        group_id: i64,
        source_id: i64,
    ) -> Result<HashMap<i64, bool>, sqlx::Error> {
        let rows: Vec<(i64, bool)> = sqlx::query_as(
            r#"
            SELECT target_id, is_allowed FROM group_sharing_rules
            WHERE group_id = $1 AND sharer_id = $2
            "#,
        )
        .bind(group_id)
        .bind(source_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// viewer 能否看到 sharer 的位置。
    /// 自己永远可见，绕过矩阵；其余查 sharer -> viewer 这条边，
    /// 规则缺失按不可见处理（读取侧默认拒绝，写入侧默认补建）。
    pub async fn is_visible(
        pool: &PgPool,
        group_id: i64,
        sharer_id: i64,
        viewer_id: i64,
    ) -> Result<bool, sqlx::Error> {
        if sharer_id == viewer_id {
            return Ok(true);
        }

        let allowed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT is_allowed FROM group_sharing_rules
            WHERE group_id = $1 AND sharer_id = $2 AND target_id = $3
            "#,
        )
        .bind(group_id)
        .bind(sharer_id)
        .bind(viewer_id)
        .fetch_optional(pool)
        .await?;

        Ok(allowed.unwrap_or(false))
    }
}

/// 成员间全部有序对（不含自环），初始化矩阵用
fn ordered_pairs(member_ids: &[i64]) -> Vec<(i64, i64)> {
    let mut pairs = Vec::with_capacity(member_ids.len() * member_ids.len().saturating_sub(1));
    for &sharer in member_ids {
        for &target in member_ids {
            if sharer != target {
                pairs.push((sharer, target));
            }
        }
    }
    pairs
}

/// 每个 (群组, 用户) 的实时位置样本，只保留最新一条
pub struct UserLocation;

impl UserLocation {
    pub async fn upsert(
        pool: &PgPool,
        group_id: i64,
        user_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_locations (group_id, user_id, latitude, longitude, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (group_id, user_id)
            DO UPDATE SET latitude = EXCLUDED.latitude,
                          longitude = EXCLUDED.longitude,
                          updated_at = NOW()
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_group(
        pool: &PgPool,
        group_id: i64,
    ) -> Result<Vec<LocationResponse>, sqlx::Error> {
        sqlx::query_as::<_, LocationResponse>(
            r#"
            SELECT l.user_id, u.username, u.profile_image_url,
                   l.latitude, l.longitude, l.updated_at
            FROM user_locations l
            JOIN users u ON u.id = l.user_id
            WHERE l.group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pairs_covers_every_direction() {
        let pairs = ordered_pairs(&[1, 2, 3]);
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&(1, 2)));
        assert!(pairs.contains(&(2, 1)));
        assert!(pairs.contains(&(2, 3)));
        assert!(pairs.contains(&(3, 2)));
    }

    #[test]
    fn ordered_pairs_has_no_self_edges() {
        assert!(ordered_pairs(&[5, 6]).iter().all(|(a, b)| a != b));
    }

    #[test]
    fn ordered_pairs_of_singleton_is_empty() {
        assert!(ordered_pairs(&[9]).is_empty());
    }
}
