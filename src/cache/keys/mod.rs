/// 镜像键模块
/// 提供各命名空间下稳定的键生成函数

// 会话镜像键模块
pub mod session_keys;

// 群组镜像键模块
pub mod group_keys;

pub use group_keys::{group_destinations_key, group_locations_key};
pub use session_keys::active_token_key;
