use axum::Json;
use axum::{
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 令牌校验失败的具体种类，网关据此返回对应的 401 原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// 令牌已过期
    Expired,
    /// 签名不合法
    InvalidSignature,
    /// 令牌格式错误或无法解析
    Malformed,
    /// 令牌与账号当前活跃令牌不一致（已在别处登录或已登出）
    Revoked,
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Expired => "Token Expired. Please re-login.",
            AuthError::InvalidSignature => "Invalid Token Signature.",
            AuthError::Malformed => "Invalid Token Format.",
            AuthError::Revoked => "Session revoked. Please log in again.",
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Validation(String),
    Internal(String),
    Database(sqlx::Error),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Auth(e) => (StatusCode::UNAUTHORIZED, e.reason().to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Database(e) => {
                // 数据库细节只进日志，不回给客户端
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}

/// 请求体提取器：反序列化失败（缺字段、类型不符）一律按 400 返回。
/// axum 自带的 Json 对这类失败返回 422，只有语法错误才是 400。
#[derive(Debug)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;

    #[derive(Debug, serde::Deserialize)]
    struct Payload {
        name: String,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_required_field_is_bad_request() {
        let err = AppJson::<Payload>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn syntax_error_is_bad_request() {
        let err = AppJson::<Payload>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_payload_passes_through() {
        let AppJson(payload) =
            AppJson::<Payload>::from_request(json_request(r#"{"name":"trip"}"#), &())
                .await
                .unwrap();
        assert_eq!(payload.name, "trip");
    }

    #[test]
    fn auth_errors_map_to_unauthorized() {
        for kind in [
            AuthError::Expired,
            AuthError::InvalidSignature,
            AuthError::Malformed,
            AuthError::Revoked,
        ] {
            let resp = AppError::Auth(kind).into_response();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn handler_errors_map_to_expected_status() {
        let cases = [
            (
                AppError::Forbidden("no".into()),
                StatusCode::FORBIDDEN,
            ),
            (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                AppError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn revoked_reason_is_distinct() {
        assert_ne!(AuthError::Revoked.reason(), AuthError::Expired.reason());
    }
}
