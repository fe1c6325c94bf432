//! 隧道流表生成
//!
//! 对每个有序主机对 (src, dst)、每个隧道 t 生成两条精确匹配规则：
//! 源入口交换机上把流量送往中心交换机 t，中心交换机 t 上再送往目的入口交换机。
//! 之后为每台主机生成一条回落规则，最后追加广播抑制的丢弃规则。
//!
//! 生成过程是 (topology, port space, port map) 的纯函数，重复调用结果完全相同，
//! 因此重复下发永远是安全的。

use tracing::{debug, info, trace};

use super::containment::BroadcastContainmentPolicy;
use super::rule::{Action, FlowRule, Leg, MatchSpec, Priorities, RuleKind};
use crate::error::ConfigError;
use crate::ports::PortSpace;
use crate::topo::{Element, FanOutTopology, HostId, PortMap, SwitchId};

#[derive(Debug, Clone, Copy)]
pub struct FlowRuleGenerator {
    ports: PortSpace,
    priorities: Priorities,
    containment: BroadcastContainmentPolicy,
}

impl FlowRuleGenerator {
    pub fn new(ports: PortSpace, priorities: Priorities) -> Result<Self, ConfigError> {
        Ok(Self {
            ports,
            priorities: priorities.validate()?,
            containment: BroadcastContainmentPolicy,
        })
    }

    /// `hosts` 台主机、`centrals` 台中心交换机时应生成的规则总数
    pub fn rule_count(hosts: usize, centrals: usize) -> usize {
        2 * hosts * hosts.saturating_sub(1) * centrals + hosts + centrals.saturating_sub(1)
    }

    /// 生成完整规则集：隧道规则、回落规则、丢弃规则（按此顺序）。
    #[tracing::instrument(skip_all, fields(hosts = topo.host_count(), centrals = topo.central_count()))]
    pub fn generate(
        &self,
        topo: &FanOutTopology,
        port_map: &impl PortMap,
    ) -> Result<Vec<FlowRule>, ConfigError> {
        self.ports.check_tunnel_count(topo.central_count())?;
        if topo.host_count() > self.ports.max_flows() {
            return Err(ConfigError::TooManyHosts {
                count: topo.host_count(),
                max: self.ports.max_flows(),
            });
        }

        let mut rules =
            Vec::with_capacity(Self::rule_count(topo.host_count(), topo.central_count()));
        rules.extend(self.tunnel_rules(topo, port_map)?);
        rules.extend(self.fallback_rules(topo, port_map)?);
        rules.extend(self.containment.drop_rules(&topo.central_switches()));

        info!(rules = rules.len(), "🧮 流表生成完成");
        Ok(rules)
    }

    /// 所有 (src, dst, tunnel) 的两段隧道规则
    pub fn tunnel_rules(
        &self,
        topo: &FanOutTopology,
        port_map: &impl PortMap,
    ) -> Result<Vec<FlowRule>, ConfigError> {
        let pairs = topo.host_count() * topo.host_count().saturating_sub(1);
        let mut rules = Vec::with_capacity(2 * pairs * topo.central_count());
        for src in topo.hosts() {
            for dst in topo.hosts() {
                if src == dst {
                    continue;
                }
                debug!(%src, %dst, "生成主机对隧道");
                for tunnel in 0..topo.central_count() {
                    let [ingress, central] = self.tunnel_pair(topo, port_map, src, dst, tunnel)?;
                    rules.push(ingress);
                    rules.push(central);
                }
            }
        }
        Ok(rules)
    }

    /// 单条隧道的两条规则：`[源入口交换机上的, 中心交换机上的]`
    pub fn tunnel_pair(
        &self,
        topo: &FanOutTopology,
        port_map: &impl PortMap,
        src: HostId,
        dst: HostId,
        tunnel: usize,
    ) -> Result<[FlowRule; 2], ConfigError> {
        let sport = self.ports.sender_port(dst.0, tunnel)?;
        let match_spec = MatchSpec::udp()
            .with_src_ip(topo.host_ip(src))?
            .with_dst_ip(topo.host_ip(dst))?
            .with_udp_src_port(sport)?;

        let src_switch = topo.ingress_switch_of(src);
        let dst_switch = topo.ingress_switch_of(dst);
        let central = topo.central_switch(tunnel);

        let to_central = port_map.require_port(src_switch.into(), central.into())?;
        let to_dst = port_map.require_port(central.into(), dst_switch.into())?;
        trace!(%src, %dst, tunnel, sport, to_central, to_dst, "隧道端口");

        let rule = |switch: SwitchId, port: u16, leg: Leg| FlowRule {
            switch,
            match_spec,
            action: Action::Output(port),
            priority: self.priorities.tunnel,
            kind: RuleKind::Tunnel {
                src,
                dst,
                tunnel,
                leg,
            },
        };
        Ok([
            rule(src_switch, to_central, Leg::Ingress),
            rule(central, to_dst, Leg::Central),
        ])
    }

    /// 入口交换机上送往本地主机的回落规则，承接没有隧道端口的流量（ARP、控制流量等）
    pub fn fallback_rules(
        &self,
        topo: &FanOutTopology,
        port_map: &impl PortMap,
    ) -> Result<Vec<FlowRule>, ConfigError> {
        let mut rules = Vec::with_capacity(topo.host_count());
        for host in topo.hosts() {
            let switch = topo.ingress_switch_of(host);
            let port = port_map.require_port(switch.into(), Element::Host(host))?;
            rules.push(FlowRule {
                switch,
                match_spec: MatchSpec::ip().with_dst_ip(topo.host_ip(host))?,
                action: Action::Output(port),
                priority: self.priorities.fallback,
                kind: RuleKind::Fallback { host },
            });
        }
        Ok(rules)
    }
}
