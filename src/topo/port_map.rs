//! 链路端口查询
//!
//! 真实端口号由外部模拟器决定，这里只是 `portOf(a, b)` 的接口，
//! 外加一个按模拟器默认规则编号的离线实现。

use std::collections::HashMap;

use crate::error::ConfigError;

use super::fan_out::Link;
use super::id::Element;

/// `from` 上通往 `to` 的端口号
pub trait PortMap {
    fn port_of(&self, from: Element, to: Element) -> Option<u16>;

    fn require_port(&self, from: Element, to: Element) -> Result<u16, ConfigError> {
        self.port_of(from, to)
            .ok_or(ConfigError::MissingPort { from, to })
    }
}

impl PortMap for HashMap<(Element, Element), u16> {
    fn port_of(&self, from: Element, to: Element) -> Option<u16> {
        self.get(&(from, to)).copied()
    }
}

/// 每个元素按建链顺序从 1 开始给接口编号（与模拟器默认行为一致）
#[derive(Debug, Clone, Default)]
pub struct SequentialPortMap {
    ports: HashMap<(Element, Element), u16>,
}

impl SequentialPortMap {
    pub fn from_links(links: &[Link]) -> Self {
        let mut next: HashMap<Element, u16> = HashMap::new();
        let mut ports = HashMap::with_capacity(links.len() * 2);
        let mut alloc = |e: Element| {
            let n = next.entry(e).or_insert(1);
            let port = *n;
            *n += 1;
            port
        };
        for link in links {
            let pa = alloc(link.a);
            let pb = alloc(link.b);
            ports.insert((link.a, link.b), pa);
            ports.insert((link.b, link.a), pb);
        }
        Self { ports }
    }

    /// `from` 的端口 `port` 连着谁
    pub fn neighbor(&self, from: Element, port: u16) -> Option<Element> {
        self.ports
            .iter()
            .find(|&(&(a, _), &p)| a == from && p == port)
            .map(|(&(_, b), _)| b)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl PortMap for SequentialPortMap {
    fn port_of(&self, from: Element, to: Element) -> Option<u16> {
        self.ports.port_of(from, to)
    }
}
