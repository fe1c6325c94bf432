//! 广播抑制
//!
//! 并行的中心交换机会让 ARP/广播类流量在 入口 -> 中心 -> 入口 之间成环。
//! 只保留编号最小的一台中心交换机承载默认流量，其余各装一条优先级 0 的丢弃规则。

use super::rule::{Action, DROP_PRIORITY, FlowRule, MatchSpec, RuleKind};
use crate::topo::SwitchId;

#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastContainmentPolicy;

impl BroadcastContainmentPolicy {
    /// 承载默认流量的交换机（编号最小者）
    pub fn retained(&self, central: &[SwitchId]) -> Option<SwitchId> {
        central.iter().copied().min()
    }

    /// 需要装丢弃规则的中心交换机（除编号最小者外的全部）
    pub fn drop_targets(&self, central: &[SwitchId]) -> Vec<SwitchId> {
        let mut targets = central.to_vec();
        targets.sort_unstable();
        targets.dedup();
        targets.into_iter().skip(1).collect()
    }

    pub fn drop_rules(&self, central: &[SwitchId]) -> Vec<FlowRule> {
        self.drop_targets(central)
            .into_iter()
            .map(|switch| FlowRule {
                switch,
                match_spec: MatchSpec::any(),
                action: Action::Drop,
                priority: DROP_PRIORITY,
                kind: RuleKind::Drop,
            })
            .collect()
    }
}
