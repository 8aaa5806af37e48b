//! 服务注册与发现模块
//!
//! - [`ServiceRegistry`]：注册/注销本进程实例，记录本进程持有的实例
//! - [`ServiceDiscovery`]：查询实例列表并按策略选择实例

pub mod discovery;
pub mod instance;
pub mod load_balancer;
pub mod registry;

pub use discovery::{ServiceDiscovery, ServiceQuery};
pub use instance::{DeregisterRequest, ServiceInstance, ServiceRegisterRequest, instance_id_for};
pub use load_balancer::{CursorKey, LoadBalanceStrategy, LoadBalancer};
pub use registry::ServiceRegistry;

/// 默认分组
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// 默认集群
pub const DEFAULT_CLUSTER: &str = "DEFAULT";
