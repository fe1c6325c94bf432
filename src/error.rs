//! 错误类型
//!
//! 配置类错误在任何外部调用之前就会被拒绝；外部调用（规则下发、权重文件写入）
//! 失败时携带失败的规则/文件信息返回给调用方，本层不做重试。

use std::path::PathBuf;

use thiserror::Error;

use crate::topo::{Element, SwitchId};

/// 配置校验错误（全部是致命错误）
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "receive and send port ranges overlap: recv_base {recv_base} + max_flows {max_flows} >= send_base {send_base}"
    )]
    PortOverlap {
        recv_base: u32,
        max_flows: u32,
        send_base: u32,
    },
    #[error(
        "send port range overflows: send_base {send_base} + max_flows {max_flows} * max_tunnels_per_flow {max_tunnels} >= 65536"
    )]
    PortOverflow {
        send_base: u32,
        max_flows: u32,
        max_tunnels: u32,
    },
    #[error("max_flows and max_tunnels_per_flow must be non-zero")]
    EmptyPortSpace,
    #[error("{count} tunnels requested but at most {max} fit in the port encoding")]
    TooManyTunnels { count: usize, max: usize },
    #[error("{count} hosts requested but the port space only holds {max} flows")]
    TooManyHosts { count: usize, max: usize },
    #[error("topology needs at least one central switch")]
    NoCentralSwitches,
    #[error("topology needs at least one host")]
    NoHosts,
    #[error("host {host} out of range (limit {limit})")]
    HostOutOfRange { host: usize, limit: usize },
    #[error("tunnel {tunnel} out of range (limit {limit})")]
    TunnelOutOfRange { tunnel: usize, limit: usize },
    #[error("match field `{field}` given twice")]
    ConflictingMatchField { field: &'static str },
    #[error("udp source port match requires protocol udp")]
    PortMatchWithoutUdp,
    #[error("no port on {from} towards {to}")]
    MissingPort { from: Element, to: Element },
    #[error("{which} priority must be non-zero (0 is reserved for drop rules)")]
    InvalidPriority { which: &'static str },
    #[error("unsupported schema_version {0}")]
    SchemaVersion(u32),
    #[error("invalid host ip base: {0}")]
    HostIp(String),
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
}

/// 交换机控制通道返回的失败
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("switch {switch} rejected rule: {reason}")]
    Rejected { switch: SwitchId, reason: String },
    #[error("channel io: {0}")]
    Io(#[from] std::io::Error),
}

/// 某条规则下发失败（`index` 为其在规则序列中的位置）
#[derive(Debug, Error)]
#[error("install of rule #{index} on {switch} failed: {source}")]
pub struct InstallError {
    pub index: usize,
    pub switch: SwitchId,
    #[source]
    pub source: ChannelError,
}

/// 权重文件相关错误
#[derive(Debug, Error)]
pub enum WeightFileError {
    #[error("expected {expected} weight rows, got {got}")]
    RowCount { expected: usize, got: usize },
    #[error("row {row} has {count} weights but at most {max} tunnels exist")]
    TooManyTunnels { row: usize, count: usize, max: usize },
    #[error("{count} rows exceed the {max} flows the steering agent accepts")]
    TooManyRows { count: usize, max: usize },
    #[error("row {row} tunnel {tunnel}: weight {value} is not a finite non-negative number")]
    InvalidWeight { row: usize, tunnel: usize, value: f64 },
    #[error("host {host} out of range (host count {host_count})")]
    HostOutOfRange { host: usize, host_count: usize },
    #[error("row {host} is the host's own placeholder but carries {count} weights")]
    SelfRowNotEmpty { host: usize, count: usize },
    #[error("rendered table is {bytes} bytes, the steering agent reads at most {max}")]
    TooLarge { bytes: usize, max: usize },
    #[error("line {line}: cannot parse `{text}` as a weight")]
    Parse { line: usize, text: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 顶层错误（供二进制入口使用）
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("install error: {0}")]
    Install(#[from] InstallError),
    #[error("weight file error: {0}")]
    WeightFile(#[from] WeightFileError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
