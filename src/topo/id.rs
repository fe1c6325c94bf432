//! 标识符类型
//!
//! 主机、交换机以及两者统一的拓扑元素。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 主机标识符，取值 `[0, M)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId(pub usize);

/// 交换机标识符。`[0, M)` 为各主机的入口交换机，`[M, M+N)` 为中心交换机。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SwitchId(pub usize);

/// 链路端点
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Element {
    Host(HostId),
    Switch(SwitchId),
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Host(h) => h.fmt(f),
            Element::Switch(s) => s.fmt(f),
        }
    }
}

impl From<HostId> for Element {
    fn from(h: HostId) -> Self {
        Element::Host(h)
    }
}

impl From<SwitchId> for Element {
    fn from(s: SwitchId) -> Self {
        Element::Switch(s)
    }
}
