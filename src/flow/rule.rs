//! 流表规则值类型
//!
//! 匹配字段通过 builder 构造，同一字段写两次、或者没有 `udp` 协议却匹配 UDP
//! 源端口都会直接报错，因此不会出现自相矛盾的过滤条件。
//! 只有在边界处（见 [`super::ofctl`]）才序列化成交换机命令格式。

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::topo::{HostId, SwitchId};

/// OVS 不写 priority 时使用的默认值
pub const OFP_DEFAULT_PRIORITY: u16 = 32_768;
/// 广播抑制用的兜底丢弃规则优先级，低于所有其它规则
pub const DROP_PRIORITY: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Ip,
    Udp,
}

/// 精确匹配条件。全部字段为空即 catch-all。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct MatchSpec {
    protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    src_ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst_ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    udp_src_port: Option<u16>,
}

impl MatchSpec {
    /// 匹配一切流量
    pub fn any() -> Self {
        Self::default()
    }

    pub fn ip() -> Self {
        Self {
            protocol: Some(Protocol::Ip),
            ..Self::default()
        }
    }

    pub fn udp() -> Self {
        Self {
            protocol: Some(Protocol::Udp),
            ..Self::default()
        }
    }

    /// 设置源地址。未指定协议时隐含 `ip`。
    pub fn with_src_ip(mut self, ip: Ipv4Addr) -> Result<Self, ConfigError> {
        if self.src_ip.is_some() {
            return Err(ConfigError::ConflictingMatchField { field: "src_ip" });
        }
        self.protocol.get_or_insert(Protocol::Ip);
        self.src_ip = Some(ip);
        Ok(self)
    }

    /// 设置目的地址。未指定协议时隐含 `ip`。
    pub fn with_dst_ip(mut self, ip: Ipv4Addr) -> Result<Self, ConfigError> {
        if self.dst_ip.is_some() {
            return Err(ConfigError::ConflictingMatchField { field: "dst_ip" });
        }
        self.protocol.get_or_insert(Protocol::Ip);
        self.dst_ip = Some(ip);
        Ok(self)
    }

    pub fn with_udp_src_port(mut self, port: u16) -> Result<Self, ConfigError> {
        if self.protocol != Some(Protocol::Udp) {
            return Err(ConfigError::PortMatchWithoutUdp);
        }
        if self.udp_src_port.is_some() {
            return Err(ConfigError::ConflictingMatchField {
                field: "udp_src_port",
            });
        }
        self.udp_src_port = Some(port);
        Ok(self)
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn src_ip(&self) -> Option<Ipv4Addr> {
        self.src_ip
    }

    pub fn dst_ip(&self) -> Option<Ipv4Addr> {
        self.dst_ip
    }

    pub fn udp_src_port(&self) -> Option<u16> {
        self.udp_src_port
    }

    pub fn is_catch_all(&self) -> bool {
        *self == Self::any()
    }

    /// 报文头是否满足全部已设置的字段
    pub fn matches(&self, hdr: &PacketHeader) -> bool {
        let proto_ok = match self.protocol {
            None | Some(Protocol::Ip) => true,
            Some(Protocol::Udp) => hdr.protocol == Protocol::Udp,
        };
        proto_ok
            && self.src_ip.is_none_or(|ip| ip == hdr.src_ip)
            && self.dst_ip.is_none_or(|ip| ip == hdr.dst_ip)
            && self.udp_src_port.is_none_or(|p| Some(p) == hdr.udp_src_port)
    }
}

/// 用于查表的 IPv4 报文头摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub protocol: Protocol,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub udp_src_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "port", rename_all = "snake_case")]
pub enum Action {
    Output(u16),
    Drop,
}

/// 隧道规则所处的路段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    /// 源入口交换机 -> 中心交换机
    Ingress,
    /// 中心交换机 -> 目的入口交换机
    Central,
}

/// 规则来源，仅用于日志与输出，不参与匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    Tunnel {
        src: HostId,
        dst: HostId,
        tunnel: usize,
        leg: Leg,
    },
    Fallback {
        host: HostId,
    },
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowRule {
    pub switch: SwitchId,
    #[serde(rename = "match")]
    pub match_spec: MatchSpec,
    pub action: Action,
    pub priority: u16,
    pub kind: RuleKind,
}

/// 各类规则的优先级。丢弃规则固定为 [`DROP_PRIORITY`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Priorities {
    pub tunnel: u16,
    pub fallback: u16,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            tunnel: OFP_DEFAULT_PRIORITY,
            fallback: OFP_DEFAULT_PRIORITY,
        }
    }
}

impl Priorities {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.tunnel == DROP_PRIORITY {
            return Err(ConfigError::InvalidPriority { which: "tunnel" });
        }
        if self.fallback == DROP_PRIORITY {
            return Err(ConfigError::InvalidPriority { which: "fallback" });
        }
        Ok(self)
    }
}
