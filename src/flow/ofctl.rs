//! 交换机命令行格式
//!
//! 把结构化规则渲染成 `ovs-ofctl add-flow` 的流描述。priority 总是显式写出，
//! 不依赖交换机的隐式默认值。

use std::fmt::Write as _;

use super::rule::{Action, FlowRule, MatchSpec, Protocol};

pub const OFCTL_CALL: &str = "ovs-ofctl -O OpenFlow15";

/// 匹配部分，例如 `udp,nw_src=10.0.0.1,nw_dst=10.0.0.2,udp_src=20016`。
/// catch-all 返回空串。
pub fn match_fields(m: &MatchSpec) -> String {
    let mut fields = Vec::with_capacity(4);
    match m.protocol() {
        Some(Protocol::Ip) => fields.push("ip".to_string()),
        Some(Protocol::Udp) => fields.push("udp".to_string()),
        None => {}
    }
    if let Some(ip) = m.src_ip() {
        fields.push(format!("nw_src={ip}"));
    }
    if let Some(ip) = m.dst_ip() {
        fields.push(format!("nw_dst={ip}"));
    }
    if let Some(port) = m.udp_src_port() {
        fields.push(format!("udp_src={port}"));
    }
    fields.join(",")
}

pub fn action_field(action: &Action) -> String {
    match action {
        Action::Output(port) => format!("actions=output:{port}"),
        Action::Drop => "actions=drop".to_string(),
    }
}

/// 完整流描述：`priority=P[,<match>],actions=...`
pub fn flow_spec(rule: &FlowRule) -> String {
    let mut spec = format!("priority={}", rule.priority);
    let fields = match_fields(&rule.match_spec);
    if !fields.is_empty() {
        let _ = write!(spec, ",{fields}");
    }
    let _ = write!(spec, ",{}", action_field(&rule.action));
    spec
}

/// 一条可直接执行的 add-flow 命令
pub fn add_flow_command(rule: &FlowRule) -> String {
    format!("{OFCTL_CALL} add-flow {} {}", rule.switch, flow_spec(rule))
}
