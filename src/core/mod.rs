//! 核心层：错误类型与进程关闭

pub mod error;
pub mod shutdown;

pub use error::GatewayError;
pub use shutdown::{ShutdownManager, ShutdownReason};
