/// 会话镜像键前缀
const USER_SESSIONS_PREFIX: &str = "user_sessions:";

/// 生成账号当前活跃访问令牌的镜像键
/// 路径需与移动端读取路径保持一致，不可随意变更
pub fn active_token_key(user_id: i64) -> String {
    format!("{}{}:active_token", USER_SESSIONS_PREFIX, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_token_key_is_stable() {
        assert_eq!(active_token_key(42), "user_sessions:42:active_token");
    }
}
