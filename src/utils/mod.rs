use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AuthError;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户名
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

/// 生成访问令牌（短期有效）
pub fn generate_access_token(
    username: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    create_token(
        username,
        Duration::seconds(config.access_token_ttl().as_secs() as i64),
        &config.jwt_secret,
    )
}

/// 生成刷新令牌（长期有效，仅用于换取新的访问令牌）
pub fn generate_refresh_token(
    username: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    create_token(
        username,
        Duration::seconds(config.refresh_token_ttl().as_secs() as i64),
        &config.jwt_secret,
    )
}

fn create_token(
    subject: &str,
    validity: Duration,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(validity)
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: subject.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// 解析并校验令牌，失败时区分过期、签名错误与格式错误
pub fn verify_token(token: &str, config: &Config) -> Result<Claims, AuthError> {
    decode_token(token, &config.jwt_secret)
}

fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: SECRET.to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 30 * 24 * 3600,
            sweep_interval_secs: 60,
            server_host: String::new(),
            server_port: 0,
        }
    }

    #[test]
    fn config_driven_tokens_roundtrip() {
        let config = test_config();
        let access = generate_access_token("alice", &config).unwrap();
        assert_eq!(verify_token(&access, &config).unwrap().sub, "alice");

        let refresh = generate_refresh_token("alice", &config).unwrap();
        let claims = verify_token(&refresh, &config).unwrap();
        // 刷新令牌的有效期要长于访问令牌
        assert!(claims.exp > verify_token(&access, &config).unwrap().exp);
    }

    #[test]
    fn roundtrip_extracts_subject() {
        let token = create_token("alice", Duration::hours(1), SECRET).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_expired() {
        // 默认校验有 60 秒的时钟容差，取更早的过期时间
        let token = create_token("alice", Duration::seconds(-300), SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, SECRET),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = create_token("alice", Duration::hours(1), SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, "other-secret"),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_token("not-a-jwt", SECRET),
            Err(AuthError::Malformed)
        ));
    }

    #[test]
    fn password_hash_roundtrip() {
        let hashed = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hashed).unwrap());
        assert!(!verify_password("hunter3", &hashed).unwrap());
    }
}
