//! 流表模块
//!
//! 规则值类型、隧道规则生成、广播抑制策略，以及到交换机命令格式的渲染。

mod containment;
mod generator;
pub mod ofctl;
mod rule;

pub use containment::BroadcastContainmentPolicy;
pub use generator::FlowRuleGenerator;
pub use rule::{
    Action, DROP_PRIORITY, FlowRule, Leg, MatchSpec, OFP_DEFAULT_PRIORITY, PacketHeader,
    Priorities, Protocol, RuleKind,
};
