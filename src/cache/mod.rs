// 镜像存储模块
// 将会话与群组状态以尽力而为的方式复制到 Redis，供实时客户端读取。
// 镜像永远不是权威数据源，写入失败只记日志。

pub mod keys;
pub mod operations;

pub use operations::group::GroupMirrorOperations;
pub use operations::session::SessionMirrorOperations;
