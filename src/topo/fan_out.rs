//! 扇出（intersection）拓扑
//!
//! 每台主机有自己的入口交换机，每台中心交换机与所有入口交换机相连：
//!
//! ```text
//!              s2
//!            /    \
//!   h0 - s0        s1 - h1
//!            \    /
//!              s3
//! ```
//!
//! 共 M + N 台交换机、M + M * N 条链路。

use std::net::Ipv4Addr;

use crate::error::ConfigError;
use crate::ports::PortSpace;

use super::id::{Element, HostId, SwitchId};

/// 模拟器默认给 h0 分配的地址，后续主机依次加一
pub const DEFAULT_HOST_IP_BASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

/// 一条无向链路（按模拟器建链顺序给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub a: Element,
    pub b: Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutTopology {
    host_count: usize,
    central_count: usize,
    host_ip_base: Ipv4Addr,
}

impl FanOutTopology {
    /// 构建拓扑。主机数受端口空间的 `max_flows` 限制，中心交换机数受
    /// `max_tunnels_per_flow` 限制。
    pub fn new(
        host_count: usize,
        central_count: usize,
        ports: &PortSpace,
    ) -> Result<Self, ConfigError> {
        if host_count == 0 {
            return Err(ConfigError::NoHosts);
        }
        if central_count == 0 {
            return Err(ConfigError::NoCentralSwitches);
        }
        if host_count > ports.max_flows() {
            return Err(ConfigError::TooManyHosts {
                count: host_count,
                max: ports.max_flows(),
            });
        }
        ports.check_tunnel_count(central_count)?;
        Ok(Self {
            host_count,
            central_count,
            host_ip_base: DEFAULT_HOST_IP_BASE,
        })
    }

    /// 替换主机地址基址；最后一台主机的地址不能越过 255.255.255.255。
    pub fn with_host_ip_base(mut self, base: Ipv4Addr) -> Result<Self, ConfigError> {
        let last = u32::from(base).checked_add((self.host_count - 1) as u32);
        if last.is_none() {
            return Err(ConfigError::HostIp(format!(
                "{base} + {} hosts overflows",
                self.host_count
            )));
        }
        self.host_ip_base = base;
        Ok(self)
    }

    pub fn host_count(&self) -> usize {
        self.host_count
    }

    pub fn central_count(&self) -> usize {
        self.central_count
    }

    pub fn hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        (0..self.host_count).map(HostId)
    }

    pub fn ingress_switch_of(&self, host: HostId) -> SwitchId {
        debug_assert!(host.0 < self.host_count);
        SwitchId(host.0)
    }

    /// 中心交换机，按隧道号排列（位置即隧道号）
    pub fn central_switches(&self) -> Vec<SwitchId> {
        (0..self.central_count).map(|t| self.central_switch(t)).collect()
    }

    pub fn central_switch(&self, tunnel: usize) -> SwitchId {
        debug_assert!(tunnel < self.central_count);
        SwitchId(self.host_count + tunnel)
    }

    /// 中心交换机对应的隧道号；入口交换机返回 `None`
    pub fn tunnel_of(&self, switch: SwitchId) -> Option<usize> {
        let t = switch.0.checked_sub(self.host_count)?;
        (t < self.central_count).then_some(t)
    }

    pub fn host_ip(&self, host: HostId) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.host_ip_base) + host.0 as u32)
    }

    /// 所有链路：先是主机-入口交换机，再是每台中心交换机到每台入口交换机。
    pub fn links(&self) -> Vec<Link> {
        let mut links = Vec::with_capacity(self.host_count * (1 + self.central_count));
        for h in self.hosts() {
            links.push(Link {
                a: h.into(),
                b: self.ingress_switch_of(h).into(),
            });
        }
        for c in self.central_switches() {
            for h in self.hosts() {
                links.push(Link {
                    a: c.into(),
                    b: self.ingress_switch_of(h).into(),
                });
            }
        }
        links
    }
}
