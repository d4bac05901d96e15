use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    AppState,
    error::{AppError, AppJson},
    middleware::AuthUser,
};

use super::model::{
    CreateGroupRequest, Group, SharingRule, UpdateLocationRequest, UserLocation,
};
use crate::routes::user::model::{StatusResponse, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingRuleQuery {
    pub target_user_id: i64,
    pub allow: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingQuery {
    pub target_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingQuery {
    pub source_id: i64,
}

#[axum::debug_handler]
pub async fn get_my_groups(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let groups = Group::find_for_user(&state.pool, auth_user.id).await?;
    Ok((StatusCode::OK, Json(groups)))
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Group name is required.".to_string()));
    }
    if req.end_time <= req.start_time {
        return Err(AppError::Validation(
            "endTime must be after startTime.".to_string(),
        ));
    }
    for member_id in &req.member_ids {
        if User::find_by_id(&state.pool, *member_id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "Unknown member id: {}",
                member_id
            )));
        }
    }

    let group_id = Group::create(&state.pool, &req, auth_user.id).await?;

    tracing::info!("User {} created group {}", auth_user.username, group_id);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "groupId": group_id })),
    ))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::find_by_id(&state.pool, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found.".to_string()))?;

    // 只有群主能删群；清扫器走系统路径，不经过这里
    if group.creator_id != auth_user.id {
        return Err(AppError::Forbidden(
            "Only the group owner can delete this group.".to_string(),
        ));
    }

    Group::destroy(&state.pool, &state.redis, group_id).await?;

    tracing::info!("Group {} deleted by owner {}", group_id, auth_user.username);
    Ok((
        StatusCode::OK,
        Json(StatusResponse::success("Group deleted.")),
    ))
}

#[axum::debug_handler]
pub async fn update_sharing_rule(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Query(query): Query<SharingRuleQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.target_user_id == auth_user.id {
        return Err(AppError::Validation(
            "Cannot set a sharing rule towards yourself.".to_string(),
        ));
    }

    if Group::find_by_id(&state.pool, group_id).await?.is_none() {
        return Err(AppError::NotFound("Group not found.".to_string()));
    }
    if !Group::is_member(&state.pool, group_id, auth_user.id).await? {
        return Err(AppError::Forbidden(
            "Not a member of this group.".to_string(),
        ));
    }

    // 目标账号必须真实存在并且在群内，否则会给群外用户凭空建出矩阵行
    let target_exists = User::find_by_id(&state.pool, query.target_user_id)
        .await?
        .is_some();
    let target_in_group =
        target_exists && Group::is_member(&state.pool, group_id, query.target_user_id).await?;
    check_rule_target(target_exists, target_in_group)?;

    SharingRule::update_pairwise(
        &state.pool,
        group_id,
        auth_user.id,
        query.target_user_id,
        query.allow,
    )
    .await?;

    let message = if query.allow {
        "Location sharing enabled for both directions."
    } else {
        "Location sharing disabled for both directions."
    };
    Ok((StatusCode::OK, Json(StatusResponse::success(message))))
}

/// 缺失的账号按 404 处理，群外账号按 400 拒绝
fn check_rule_target(target_exists: bool, target_in_group: bool) -> Result<(), AppError> {
    if !target_exists {
        return Err(AppError::NotFound("Target user not found.".to_string()));
    }
    if !target_in_group {
        return Err(AppError::Validation(
            "Target user is not a member of this group.".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_incoming_rules(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Query(query): Query<IncomingQuery>,
) -> Result<impl IntoResponse, AppError> {
    // 只能查询自己收到的规则
    if query.target_id != auth_user.id {
        return Err(AppError::Forbidden(
            "Cannot read another user's incoming rules.".to_string(),
        ));
    }

    let rules = SharingRule::incoming(&state.pool, group_id, query.target_id).await?;
    Ok((StatusCode::OK, Json(rules)))
}

#[axum::debug_handler]
pub async fn get_outgoing_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Query(query): Query<OutgoingQuery>,
) -> Result<impl IntoResponse, AppError> {
    // 只能查询自己设置的规则
    if query.source_id != auth_user.id {
        return Err(AppError::Forbidden(
            "Cannot read another user's outgoing status.".to_string(),
        ));
    }

    let rules = SharingRule::outgoing(&state.pool, group_id, query.source_id).await?;
    Ok((StatusCode::OK, Json(rules)))
}

#[axum::debug_handler]
pub async fn get_group_members(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::find_by_id(&state.pool, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found.".to_string()))?;

    // 已结束的群组对设置页视同不存在
    if group.end_time < Utc::now() {
        return Err(AppError::NotFound("Group already ended.".to_string()));
    }

    let members = Group::members_excluding(&state.pool, group_id, auth_user.id).await?;
    Ok((StatusCode::OK, Json(members)))
}

#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    AppJson(req): AppJson<UpdateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if Group::find_by_id(&state.pool, group_id).await?.is_none() {
        return Err(AppError::NotFound("Group not found.".to_string()));
    }
    if !Group::is_member(&state.pool, group_id, auth_user.id).await? {
        return Err(AppError::Forbidden(
            "Not a member of this group.".to_string(),
        ));
    }

    UserLocation::upsert(
        &state.pool,
        group_id,
        auth_user.id,
        req.latitude,
        req.longitude,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(StatusResponse::success("Location updated.")),
    ))
}

#[axum::debug_handler]
pub async fn get_group_locations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if Group::find_by_id(&state.pool, group_id).await?.is_none() {
        return Err(AppError::NotFound("Group not found.".to_string()));
    }

    let samples = UserLocation::list_for_group(&state.pool, group_id).await?;

    // 逐条经过可见性矩阵过滤，自己的位置无条件保留
    let mut visible = Vec::with_capacity(samples.len());
    for sample in samples {
        if SharingRule::is_visible(&state.pool, group_id, sample.user_id, auth_user.id).await? {
            visible.push(sample);
        }
    }

    Ok((StatusCode::OK, Json(visible)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rule_target_is_not_found() {
        // 目标账号不存在要返回 404，不能落到外键冲突变成 500
        let err = check_rule_target(false, false).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn outsider_rule_target_is_rejected() {
        let err = check_rule_target(true, false).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn member_rule_target_passes() {
        assert!(check_rule_target(true, true).is_ok());
    }
}
