//! 拓扑模块
//!
//! M 台主机 / N 台中心交换机的扇出结构，以及链路端口查询。

mod fan_out;
mod id;
mod port_map;

pub use fan_out::{DEFAULT_HOST_IP_BASE, FanOutTopology, Link};
pub use id::{Element, HostId, SwitchId};
pub use port_map::{PortMap, SequentialPortMap};
