//! 端口地址空间
//!
//! 把 16 位传输层端口空间切成互不重叠的接收段与发送段：
//!
//! ```text
//! recv_base + s                          : 来自源主机 s 的流（与隧道无关）
//! send_base + d * max_tunnels + t        : 发往目的主机 d、走隧道 t
//! ```
//!
//! 隧道只在发送端通过源端口区分，接收端口不随隧道变化。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_RECV_BASE: u16 = 10_000;
pub const DEFAULT_SEND_BASE: u16 = 20_000;
pub const DEFAULT_MAX_FLOWS: u16 = 128;
pub const DEFAULT_MAX_TUNNELS_PER_FLOW: u16 = 16;

const PORT_SPACE_END: u32 = 1 << 16;

/// 未校验的端口空间参数（控制面与 steering agent 共享）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSpaceConfig {
    pub recv_base: u16,
    pub send_base: u16,
    pub max_flows: u16,
    pub max_tunnels_per_flow: u16,
}

impl Default for PortSpaceConfig {
    fn default() -> Self {
        Self {
            recv_base: DEFAULT_RECV_BASE,
            send_base: DEFAULT_SEND_BASE,
            max_flows: DEFAULT_MAX_FLOWS,
            max_tunnels_per_flow: DEFAULT_MAX_TUNNELS_PER_FLOW,
        }
    }
}

impl PortSpaceConfig {
    /// 校验端口划分，成功后得到可用的 [`PortSpace`]。
    pub fn validate(self) -> Result<PortSpace, ConfigError> {
        let recv_base = u32::from(self.recv_base);
        let send_base = u32::from(self.send_base);
        let max_flows = u32::from(self.max_flows);
        let max_tunnels = u32::from(self.max_tunnels_per_flow);

        if max_flows == 0 || max_tunnels == 0 {
            return Err(ConfigError::EmptyPortSpace);
        }
        if recv_base + max_flows >= send_base {
            return Err(ConfigError::PortOverlap {
                recv_base,
                max_flows,
                send_base,
            });
        }
        if send_base + max_flows * max_tunnels >= PORT_SPACE_END {
            return Err(ConfigError::PortOverflow {
                send_base,
                max_flows,
                max_tunnels,
            });
        }
        Ok(PortSpace { cfg: self })
    }
}

/// 解码后的发送端口：目的主机 + 隧道号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelPort {
    pub dst: usize,
    pub tunnel: usize,
}

/// 已校验的端口空间。只能通过 [`PortSpaceConfig::validate`] 构造。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpace {
    cfg: PortSpaceConfig,
}

impl PortSpace {
    pub fn config(&self) -> PortSpaceConfig {
        self.cfg
    }

    pub fn recv_base(&self) -> u16 {
        self.cfg.recv_base
    }

    pub fn send_base(&self) -> u16 {
        self.cfg.send_base
    }

    pub fn max_flows(&self) -> usize {
        usize::from(self.cfg.max_flows)
    }

    pub fn max_tunnels_per_flow(&self) -> usize {
        usize::from(self.cfg.max_tunnels_per_flow)
    }

    pub fn check_host(&self, host: usize) -> Result<(), ConfigError> {
        if host >= self.max_flows() {
            return Err(ConfigError::HostOutOfRange {
                host,
                limit: self.max_flows(),
            });
        }
        Ok(())
    }

    pub fn check_tunnel(&self, tunnel: usize) -> Result<(), ConfigError> {
        if tunnel >= self.max_tunnels_per_flow() {
            return Err(ConfigError::TunnelOutOfRange {
                tunnel,
                limit: self.max_tunnels_per_flow(),
            });
        }
        Ok(())
    }

    /// 中心交换机数量不能超过每条流的隧道上限，否则隧道号在端口编码里会冲突。
    pub fn check_tunnel_count(&self, count: usize) -> Result<(), ConfigError> {
        if count > self.max_tunnels_per_flow() {
            return Err(ConfigError::TooManyTunnels {
                count,
                max: self.max_tunnels_per_flow(),
            });
        }
        Ok(())
    }

    /// 发往 `dst`、走隧道 `tunnel` 的 UDP 源端口
    pub fn sender_port(&self, dst: usize, tunnel: usize) -> Result<u16, ConfigError> {
        self.check_host(dst)?;
        self.check_tunnel(tunnel)?;
        // validate() 已保证不会越过 65535
        let port = usize::from(self.cfg.send_base) + dst * self.max_tunnels_per_flow() + tunnel;
        Ok(port as u16)
    }

    /// 接收来自 `src` 的流量所用的端口
    pub fn receiver_port(&self, src: usize) -> Result<u16, ConfigError> {
        self.check_host(src)?;
        Ok((usize::from(self.cfg.recv_base) + src) as u16)
    }

    /// [`sender_port`](Self::sender_port) 的逆映射；不在发送段内返回 `None`。
    pub fn decode_sender_port(&self, port: u16) -> Option<TunnelPort> {
        let offset = usize::from(port).checked_sub(usize::from(self.cfg.send_base))?;
        let tunnels = self.max_tunnels_per_flow();
        let dst = offset / tunnels;
        if dst >= self.max_flows() {
            return None;
        }
        Some(TunnelPort {
            dst,
            tunnel: offset % tunnels,
        })
    }

    /// iperf 会话使用的端口：`(client_port, server_port)`。
    ///
    /// client 端口是尚未被 steering agent 改写的 `send_base + server`，
    /// agent 出方向会把它映射到 `sender_port(server, t)`。
    pub fn iperf_ports(&self, client: usize, server: usize) -> Result<(u16, u16), ConfigError> {
        self.check_host(server)?;
        let client_port = (usize::from(self.cfg.send_base) + server) as u16;
        let server_port = self.receiver_port(client)?;
        Ok((client_port, server_port))
    }
}
