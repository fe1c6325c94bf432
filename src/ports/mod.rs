//! 端口地址空间模块
//!
//! 控制面与 steering agent 之间共享的端口/隧道编码约定。

mod space;

pub use space::{
    DEFAULT_MAX_FLOWS, DEFAULT_MAX_TUNNELS_PER_FLOW, DEFAULT_RECV_BASE, DEFAULT_SEND_BASE,
    PortSpace, PortSpaceConfig, TunnelPort,
};
