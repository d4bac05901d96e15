/// 群组位置镜像键前缀
const GROUP_LOCATIONS_PREFIX: &str = "group_locations:";

/// 群组目的地镜像键前缀
const GROUP_DESTINATIONS_PREFIX: &str = "group_destinations:";

/// 生成群组位置命名空间键（由客户端写入，服务端仅在销毁群组时删除）
pub fn group_locations_key(group_id: i64) -> String {
    format!("{}{}", GROUP_LOCATIONS_PREFIX, group_id)
}

/// 生成群组目的地命名空间键
pub fn group_destinations_key(group_id: i64) -> String {
    format!("{}{}", GROUP_DESTINATIONS_PREFIX, group_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keys_are_stable() {
        assert_eq!(group_locations_key(7), "group_locations:7");
        assert_eq!(group_destinations_key(7), "group_destinations:7");
    }
}
