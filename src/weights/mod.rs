//! 权重文件模块
//!
//! 控制面与外部 steering agent 之间唯一的接口：按主机划分的权重文件，
//! 整体原子替换。

mod config;
mod writer;

pub use config::{WeightConfig, WeightVector};
pub use writer::{DEFAULT_WEIGHTS_DIR, WeightConfigWriter};
