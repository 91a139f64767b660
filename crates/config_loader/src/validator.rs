//! 配置校验模块
//!
//! 校验规则：
//! - header 非空
//! - delimiter 非空
//! - step_timeout_ms 存在时必须 > 0
//!
//! cache_size 任意整数都合法 (0 = 默认上限, 负数 = 关闭缓存)。

use contracts::{RouteConfig, RouteError};

/// 校验 RouteConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RouteConfig) -> Result<(), RouteError> {
    config.clone().validated().map(|_| ())
}
