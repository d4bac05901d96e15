use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState, auth,
    error::{AppError, AppJson},
    middleware::AuthUser,
};

use super::model::{
    LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, SignupRequest, StatusResponse,
    User,
};

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() || req.email.trim().is_empty() {
        return Err(AppError::Validation(
            "username, password and email are required".to_string(),
        ));
    }

    match User::create(&state.pool, req).await {
        Ok(user) => {
            tracing::info!("Registered user {}", user.username);
            Ok((
                StatusCode::OK,
                Json(StatusResponse::success("Signup complete.")),
            ))
        }
        // 用户名或邮箱撞唯一约束都按已存在处理
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
            "Username or email already exists.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 账号不存在与密码错误返回同一种 401，不泄露哪一半错了
    let user = User::find_by_username(&state.pool, &req.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password.".to_string()))?;

    let password_ok = user
        .verify_login(&req.password)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
    if !password_ok {
        return Err(AppError::Unauthorized(
            "Invalid username or password.".to_string(),
        ));
    }

    let tokens =
        auth::issue_session(&state.pool, &state.redis, &state.config, &user, req.remember_me)
            .await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            username: user.username,
            profile_image_url: user.profile_image_url,
        }),
    ))
}

#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, access_token) = auth::refresh_access_token(
        &state.pool,
        &state.redis,
        &state.config,
        &req.refresh_token,
    )
    .await?;

    // 刷新令牌不轮换，原样返回
    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            access_token,
            refresh_token: req.refresh_token,
            username: user.username,
            profile_image_url: user.profile_image_url,
        }),
    ))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    auth::revoke_session(&state.pool, &state.redis, auth_user.id).await?;

    tracing::info!("User {} logged out", auth_user.username);
    Ok((
        StatusCode::OK,
        Json(StatusResponse::success("Logged out.")),
    ))
}
