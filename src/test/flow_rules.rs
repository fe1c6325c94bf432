use std::net::Ipv4Addr;

use crate::control::{FlowTable, SwitchControl};
use crate::error::ConfigError;
use crate::flow::{
    Action, DROP_PRIORITY, FlowRule, FlowRuleGenerator, Leg, MatchSpec, PacketHeader, Priorities,
    Protocol, RuleKind,
};
use crate::ports::PortSpaceConfig;
use crate::topo::{Element, FanOutTopology, HostId, PortMap, SwitchId};

use super::{default_ports, fabric};

fn generate(hosts: usize, centrals: usize) -> (FanOutTopology, Vec<FlowRule>) {
    let (ports, topo, map) = fabric(hosts, centrals);
    let generator = FlowRuleGenerator::new(ports, Priorities::default()).expect("generator");
    let rules = generator.generate(&topo, &map).expect("generate");
    (topo, rules)
}

#[test]
fn rule_count_matches_closed_form() {
    for m in 2..=5 {
        for n in 1..=4 {
            let (_, rules) = generate(m, n);
            let tunnel = rules
                .iter()
                .filter(|r| matches!(r.kind, RuleKind::Tunnel { .. }))
                .count();
            let fallback = rules
                .iter()
                .filter(|r| matches!(r.kind, RuleKind::Fallback { .. }))
                .count();
            let drop = rules.iter().filter(|r| r.action == Action::Drop).count();

            assert_eq!(tunnel, 2 * m * (m - 1) * n, "M={m} N={n}");
            assert_eq!(fallback, m, "M={m} N={n}");
            assert_eq!(drop, n - 1, "M={m} N={n}");
            assert_eq!(rules.len(), FlowRuleGenerator::rule_count(m, n));
        }
    }
}

#[test]
fn full_tunnel_width_uses_last_port_of_each_destination_block() {
    let n = 16;
    let (topo, rules) = generate(2, n);
    assert_eq!(rules.len(), FlowRuleGenerator::rule_count(2, n));
    assert_eq!(rules.len(), 4 * n + 2 + (n - 1));

    for dst in topo.hosts() {
        let highest = rules
            .iter()
            .filter(|r| matches!(r.kind, RuleKind::Tunnel { dst: d, .. } if d == dst))
            .filter_map(|r| r.match_spec.udp_src_port())
            .max();
        assert_eq!(highest, Some(20_000 + dst.0 as u16 * 16 + 15), "{dst}");
    }
}

#[test]
fn each_ordered_pair_gets_two_rules_per_tunnel() {
    let (topo, rules) = generate(3, 3);
    for src in topo.hosts() {
        for dst in topo.hosts() {
            let count = rules
                .iter()
                .filter(|r| matches!(r.kind, RuleKind::Tunnel { src: s, dst: d, .. } if s == src && d == dst))
                .count();
            let expected = if src == dst { 0 } else { 2 * topo.central_count() };
            assert_eq!(count, expected, "{src} -> {dst}");
        }
    }
}

#[test]
fn ingress_rule_encodes_sender_port_and_targets_central_switch() {
    let (ports, topo, map) = fabric(4, 3);
    let generator = FlowRuleGenerator::new(ports, Priorities::default()).unwrap();
    let rules = generator.generate(&topo, &map).unwrap();

    let mut seen = 0;
    for rule in &rules {
        let RuleKind::Tunnel {
            src,
            dst,
            tunnel,
            leg,
        } = rule.kind
        else {
            continue;
        };
        let sport = 20_000 + dst.0 as u16 * 16 + tunnel as u16;
        assert_eq!(rule.match_spec.protocol(), Some(Protocol::Udp));
        assert_eq!(rule.match_spec.udp_src_port(), Some(sport));
        assert_eq!(rule.match_spec.src_ip(), Some(topo.host_ip(src)));
        assert_eq!(rule.match_spec.dst_ip(), Some(topo.host_ip(dst)));

        let central = SwitchId(topo.host_count() + tunnel);
        match leg {
            Leg::Ingress => {
                assert_eq!(rule.switch, SwitchId(src.0));
                let port = map
                    .port_of(Element::Switch(rule.switch), Element::Switch(central))
                    .unwrap();
                assert_eq!(rule.action, Action::Output(port));
                seen += 1;
            }
            Leg::Central => {
                assert_eq!(rule.switch, central);
                let port = map
                    .port_of(Element::Switch(central), Element::Switch(SwitchId(dst.0)))
                    .unwrap();
                assert_eq!(rule.action, Action::Output(port));
            }
        }
    }
    assert_eq!(seen, 4 * 3 * 3);
}

#[test]
fn no_rule_targets_its_own_source() {
    let (_, rules) = generate(5, 4);
    for rule in &rules {
        if let RuleKind::Tunnel { src, dst, .. } = rule.kind {
            assert_ne!(src, dst);
            assert_ne!(rule.match_spec.src_ip(), rule.match_spec.dst_ip());
        }
    }
}

#[test]
fn generate_is_deterministic() {
    let (ports, topo, map) = fabric(4, 3);
    let generator = FlowRuleGenerator::new(ports, Priorities::default()).unwrap();
    let a = generator.generate(&topo, &map).unwrap();
    let b = generator.generate(&topo, &map).unwrap();
    assert_eq!(a, b);
}

#[test]
fn fallback_rules_deliver_to_local_host_above_drop_priority() {
    let (topo, rules) = generate(3, 2);
    let fallbacks: Vec<_> = rules
        .iter()
        .filter(|r| matches!(r.kind, RuleKind::Fallback { .. }))
        .collect();
    assert_eq!(fallbacks.len(), 3);
    for (rule, host) in fallbacks.iter().zip(topo.hosts()) {
        assert_eq!(rule.switch, topo.ingress_switch_of(host));
        assert_eq!(rule.match_spec.protocol(), Some(Protocol::Ip));
        assert_eq!(rule.match_spec.dst_ip(), Some(topo.host_ip(host)));
        assert_eq!(rule.match_spec.udp_src_port(), None);
        // 主机连在入口交换机的第一个端口上
        assert_eq!(rule.action, Action::Output(1));
        assert!(rule.priority > DROP_PRIORITY);
    }
}

#[test]
fn installed_rules_carry_each_tunnel_through_its_central_switch() {
    let (ports, topo, map) = fabric(3, 3);
    let rules = FlowRuleGenerator::new(ports, Priorities::default())
        .unwrap()
        .generate(&topo, &map)
        .unwrap();
    let table = FlowTable::new();
    for rule in &rules {
        table.install(rule).unwrap();
    }

    let (src, dst) = (HostId(0), HostId(2));
    for tunnel in 0..topo.central_count() {
        let hdr = PacketHeader {
            protocol: Protocol::Udp,
            src_ip: topo.host_ip(src),
            dst_ip: topo.host_ip(dst),
            udp_src_port: Some(ports.sender_port(dst.0, tunnel).unwrap()),
        };
        let mut at = topo.ingress_switch_of(src);
        let mut path = vec![at];
        let delivered = loop {
            let Some(Action::Output(port)) = table.lookup(at, &hdr) else {
                panic!("no forwarding at {at} for tunnel {tunnel}");
            };
            match map.neighbor(Element::Switch(at), port) {
                Some(Element::Switch(next)) => {
                    at = next;
                    path.push(at);
                    assert!(path.len() < 8, "loop: {path:?}");
                }
                Some(Element::Host(h)) => break h,
                None => panic!("dangling port {port} on {at}"),
            }
        };
        assert_eq!(delivered, dst);
        assert_eq!(
            path,
            vec![SwitchId(0), topo.central_switch(tunnel), SwitchId(2)],
            "tunnel {tunnel}"
        );
    }
}

#[test]
fn untagged_traffic_is_dropped_on_non_default_central_switches() {
    let (_, topo, map) = fabric(2, 3);
    let rules = FlowRuleGenerator::new(default_ports(), Priorities::default())
        .unwrap()
        .generate(&topo, &map)
        .unwrap();
    let table = FlowTable::new();
    for rule in &rules {
        table.install(rule).unwrap();
    }
    let arp_like = PacketHeader {
        protocol: Protocol::Ip,
        src_ip: Ipv4Addr::new(10, 0, 0, 1),
        dst_ip: Ipv4Addr::new(10, 0, 0, 2),
        udp_src_port: None,
    };
    assert_eq!(table.lookup(topo.central_switch(0), &arp_like), None);
    assert_eq!(table.lookup(topo.central_switch(1), &arp_like), Some(Action::Drop));
    assert_eq!(table.lookup(topo.central_switch(2), &arp_like), Some(Action::Drop));
    // 到达目的入口交换机后走回落规则
    assert_eq!(table.lookup(SwitchId(1), &arp_like), Some(Action::Output(1)));
}

#[test]
fn match_builder_rejects_contradictory_fields() {
    let a = Ipv4Addr::new(10, 0, 0, 1);
    let b = Ipv4Addr::new(10, 0, 0, 2);

    let err = MatchSpec::udp()
        .with_src_ip(a)
        .unwrap()
        .with_src_ip(b)
        .expect_err("second src_ip");
    assert!(matches!(err, ConfigError::ConflictingMatchField { field: "src_ip" }));

    let err = MatchSpec::ip()
        .with_dst_ip(a)
        .unwrap()
        .with_dst_ip(a)
        .expect_err("second dst_ip even if equal");
    assert!(matches!(err, ConfigError::ConflictingMatchField { field: "dst_ip" }));

    let err = MatchSpec::udp()
        .with_udp_src_port(1)
        .unwrap()
        .with_udp_src_port(2)
        .expect_err("second port");
    assert!(matches!(
        err,
        ConfigError::ConflictingMatchField { field: "udp_src_port" }
    ));

    let err = MatchSpec::ip().with_udp_src_port(20_000).expect_err("ip + port");
    assert!(matches!(err, ConfigError::PortMatchWithoutUdp));
    assert!(matches!(
        MatchSpec::any().with_udp_src_port(20_000),
        Err(ConfigError::PortMatchWithoutUdp)
    ));
}

#[test]
fn address_match_implies_ip_protocol() {
    let m = MatchSpec::any()
        .with_dst_ip(Ipv4Addr::new(10, 0, 0, 1))
        .unwrap();
    assert_eq!(m.protocol(), Some(Protocol::Ip));
    assert!(!m.is_catch_all());
    assert!(MatchSpec::any().is_catch_all());
}

#[test]
fn zero_priorities_are_rejected() {
    let ports = default_ports();
    let err = FlowRuleGenerator::new(
        ports,
        Priorities {
            tunnel: 0,
            ..Priorities::default()
        },
    )
    .expect_err("tunnel 0");
    assert!(matches!(err, ConfigError::InvalidPriority { which: "tunnel" }));

    let err = FlowRuleGenerator::new(
        ports,
        Priorities {
            fallback: 0,
            ..Priorities::default()
        },
    )
    .expect_err("fallback 0");
    assert!(matches!(err, ConfigError::InvalidPriority { which: "fallback" }));
}

#[test]
fn custom_priorities_are_applied_explicitly() {
    let (ports, topo, map) = fabric(2, 2);
    let prio = Priorities {
        tunnel: 200,
        fallback: 100,
    };
    let rules = FlowRuleGenerator::new(ports, prio)
        .unwrap()
        .generate(&topo, &map)
        .unwrap();
    for rule in &rules {
        let expected = match rule.kind {
            RuleKind::Tunnel { .. } => 200,
            RuleKind::Fallback { .. } => 100,
            RuleKind::Drop => 0,
        };
        assert_eq!(rule.priority, expected);
    }
}

#[test]
fn generator_rejects_topology_wider_than_its_port_space() {
    let (_, topo, map) = fabric(2, 4);
    let narrow = PortSpaceConfig {
        max_tunnels_per_flow: 2,
        ..PortSpaceConfig::default()
    }
    .validate()
    .unwrap();
    let err = FlowRuleGenerator::new(narrow, Priorities::default())
        .unwrap()
        .generate(&topo, &map)
        .expect_err("4 centrals > 2 tunnels");
    assert!(matches!(err, ConfigError::TooManyTunnels { count: 4, max: 2 }));
}

#[test]
fn missing_port_lookup_fails_before_any_rule_is_returned() {
    use std::collections::HashMap;

    let (ports, topo, _) = fabric(2, 1);
    let empty: HashMap<(Element, Element), u16> = HashMap::new();
    let err = FlowRuleGenerator::new(ports, Priorities::default())
        .unwrap()
        .generate(&topo, &empty)
        .expect_err("no ports");
    assert!(matches!(err, ConfigError::MissingPort { .. }));
}
