//! 会话权威模块：签发、校验、吊销会话令牌，并执行单活跃会话策略。
//! 令牌槽位的每次变更都会触发一次会话镜像写入（尽力而为，不影响正确性）。

use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;

use crate::cache::SessionMirrorOperations;
use crate::config::Config;
use crate::error::{AppError, AuthError};
use crate::routes::user::model::User;
use crate::utils::{generate_access_token, generate_refresh_token, verify_token};

#[derive(Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// 凭证验证通过后签发新会话。
/// 总是签发新的访问令牌并覆盖旧槽位；remember_me 时附带刷新令牌，
/// 否则清空刷新槽位。
pub async fn issue_session(
    pool: &PgPool,
    redis: &Arc<RedisClient>,
    config: &Config,
    user: &User,
    remember_me: bool,
) -> Result<SessionTokens, AppError> {
    let access_token = generate_access_token(&user.username, config)
        .map_err(|e| AppError::Internal(format!("Failed to generate access token: {}", e)))?;

    let refresh_token = if remember_me {
        Some(
            generate_refresh_token(&user.username, config).map_err(|e| {
                AppError::Internal(format!("Failed to generate refresh token: {}", e))
            })?,
        )
    } else {
        None
    };

    User::store_session_tokens(pool, user.id, &access_token, refresh_token.as_deref()).await?;

    SessionMirrorOperations::set_active_token(
        Arc::clone(redis),
        user.id,
        Some(access_token.clone()),
    );

    Ok(SessionTokens {
        access_token,
        refresh_token,
    })
}

/// 单活跃会话校验：出示的令牌必须与槽位中存储的值逐字节一致。
/// 令牌本身未过期、签名合法也不例外，这一步把"别处新登录"变成"旧会话处处失效"。
pub fn enforce_single_session(user: &User, presented: &str) -> Result<(), AuthError> {
    match user.current_access_token.as_deref() {
        Some(stored) if stored == presented => Ok(()),
        _ => Err(AuthError::Revoked),
    }
}

/// 用刷新令牌换取新的访问令牌。
/// 刷新令牌必须未过期且与槽位存储值一致；成功后旧访问令牌经单会话校验
/// 自动失效。刷新令牌本身不轮换。
pub async fn refresh_access_token(
    pool: &PgPool,
    redis: &Arc<RedisClient>,
    config: &Config,
    refresh_token: &str,
) -> Result<(User, String), AppError> {
    let claims = verify_token(refresh_token, config)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    let user = User::find_by_username(pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if user.current_refresh_token.as_deref() != Some(refresh_token) {
        return Err(AppError::Unauthorized("Invalid refresh token".to_string()));
    }

    let access_token = generate_access_token(&user.username, config)
        .map_err(|e| AppError::Internal(format!("Failed to generate access token: {}", e)))?;

    User::store_access_token(pool, user.id, &access_token).await?;

    SessionMirrorOperations::set_active_token(
        Arc::clone(redis),
        user.id,
        Some(access_token.clone()),
    );

    Ok((user, access_token))
}

/// 登出：清空两个令牌槽位并删除镜像条目
pub async fn revoke_session(
    pool: &PgPool,
    redis: &Arc<RedisClient>,
    user_id: i64,
) -> Result<(), AppError> {
    User::clear_session_tokens(pool, user_id).await?;

    SessionMirrorOperations::set_active_token(Arc::clone(redis), user_id, None);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_with_token(token: Option<&str>) -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            profile_image_url: None,
            current_access_token: token.map(str::to_string),
            current_refresh_token: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matching_token_passes() {
        let user = user_with_token(Some("tokenY"));
        assert!(enforce_single_session(&user, "tokenY").is_ok());
    }

    #[test]
    fn stale_token_is_revoked() {
        // 设备 2 登录后槽位被覆盖，设备 1 的旧令牌即刻失效
        let user = user_with_token(Some("tokenY"));
        assert_eq!(
            enforce_single_session(&user, "tokenX"),
            Err(AuthError::Revoked)
        );
    }

    #[test]
    fn empty_slot_is_revoked() {
        let user = user_with_token(None);
        assert_eq!(
            enforce_single_session(&user, "tokenX"),
            Err(AuthError::Revoked)
        );
    }
}
