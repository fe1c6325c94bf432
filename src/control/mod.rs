//! 交换机控制模块
//!
//! 下发接口、内存流表 / 脚本两种通道实现，以及顺序与按交换机并发的下发流程。

mod channel;
mod install;

pub use channel::{FlowTable, OfctlScript, SwitchControl};
pub use install::{InstallReport, install_all, install_by_switch};
