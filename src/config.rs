//! 运行配置
//!
//! 一次运行的全部共享常量（端口划分、拓扑规模、优先级、地址、权重目录）
//! 组成一个不可变的配置值，显式传给各组件的构造函数。
//!
//! ```json
//! {
//!     "schema_version": 1,
//!     "hosts": 3,
//!     "central_switches": 3,
//!     "ports": { "recv_base": 10000, "send_base": 20000 },
//!     "priorities": { "tunnel": 32768, "fallback": 32768 },
//!     "host_ip_base": "10.0.0.1",
//!     "weights_dir": "./flow_weights"
//! }
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::flow::{FlowRule, FlowRuleGenerator, Priorities};
use crate::ports::{PortSpace, PortSpaceConfig};
use crate::topo::{DEFAULT_HOST_IP_BASE, FanOutTopology, SequentialPortMap};
use crate::weights::{DEFAULT_WEIGHTS_DIR, WeightConfigWriter};

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_host_ip_base() -> Ipv4Addr {
    DEFAULT_HOST_IP_BASE
}

fn default_weights_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WEIGHTS_DIR)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub hosts: usize,
    pub central_switches: usize,
    #[serde(default)]
    pub ports: PortSpaceConfig,
    #[serde(default)]
    pub priorities: Priorities,
    #[serde(default = "default_host_ip_base")]
    pub host_ip_base: Ipv4Addr,
    #[serde(default = "default_weights_dir")]
    pub weights_dir: PathBuf,
}

impl FabricConfig {
    pub fn new(hosts: usize, central_switches: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            hosts,
            central_switches,
            ports: PortSpaceConfig::default(),
            priorities: Priorities::default(),
            host_ip_base: DEFAULT_HOST_IP_BASE,
            weights_dir: default_weights_dir(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// 校验全部参数并构造各组件。任何错误都发生在外部调用之前。
    pub fn build(&self) -> Result<Fabric, ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::SchemaVersion(self.schema_version));
        }
        let ports = self.ports.validate()?;
        let topology = FanOutTopology::new(self.hosts, self.central_switches, &ports)?
            .with_host_ip_base(self.host_ip_base)?;
        let port_map = SequentialPortMap::from_links(&topology.links());
        let generator = FlowRuleGenerator::new(ports, self.priorities)?;
        let weights = WeightConfigWriter::new(&self.weights_dir, ports, self.hosts);
        info!(
            hosts = self.hosts,
            central_switches = self.central_switches,
            recv_base = ports.recv_base(),
            send_base = ports.send_base(),
            "🏗️ 拓扑配置校验通过"
        );
        Ok(Fabric {
            ports,
            topology,
            port_map,
            generator,
            weights,
        })
    }
}

/// 校验后的一整套组件
#[derive(Debug, Clone)]
pub struct Fabric {
    pub ports: PortSpace,
    pub topology: FanOutTopology,
    pub port_map: SequentialPortMap,
    pub generator: FlowRuleGenerator,
    pub weights: WeightConfigWriter,
}

impl Fabric {
    pub fn generate_rules(&self) -> Result<Vec<FlowRule>, ConfigError> {
        self.generator.generate(&self.topology, &self.port_map)
    }
}
