mod flow_rules;

use crate::ports::{PortSpace, PortSpaceConfig};
use crate::topo::{FanOutTopology, SequentialPortMap};

pub(crate) fn default_ports() -> PortSpace {
    PortSpaceConfig::default()
        .validate()
        .expect("default port space is valid")
}

pub(crate) fn fabric(hosts: usize, centrals: usize) -> (PortSpace, FanOutTopology, SequentialPortMap) {
    let ports = default_ports();
    let topo = FanOutTopology::new(hosts, centrals, &ports).expect("topology");
    let map = SequentialPortMap::from_links(&topo.links());
    (ports, topo, map)
}
