use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState, auth,
    error::{AppError, AuthError},
    routes::user::model::User,
    utils::verify_token,
};

/// 认证通过后挂到请求扩展上的身份，业务处理器据此取得当前用户
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// 请求边界的认证网关。公开路由（登录、注册、刷新）挂在本中间件之外，
/// 其余路由必须依次通过令牌解析与单会话校验，任一失败立即 401，不再下行。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = extract_bearer(auth_header).ok_or(AppError::Auth(AuthError::Malformed))?;

    let claims = verify_token(token, &state.config)?;

    // 单会话比对必须读请求时刻的最新槽位值，不做请求级缓存，
    // 并发登录才能确定性地吊销其他会话
    let user = User::find_by_username(&state.pool, &claims.sub)
        .await?
        .ok_or(AppError::Auth(AuthError::Revoked))?;

    auth::enforce_single_session(&user, token)?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });

    Ok(next.run(req).await)
}

fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert_eq!(extract_bearer(Some("Basic dXNlcjpwdw==")), None);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(extract_bearer(Some("Bearer ")), None);
    }
}
