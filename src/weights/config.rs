//! 权重表
//!
//! 一台源主机的权重表：每个目的主机一行（按主机号升序），行内是各隧道的相对权重。
//! 源主机自己那一行是空占位，保证行号 == 目的主机号。
//!
//! 文件格式（steering agent 读取）：
//!
//! ```text
//!                 <- h0 -> h0，占位空行
//! 5,6,7           <- h0 -> h1，三条隧道 5:6:7
//! 2,3             <- h0 -> h2，隧道 2 及以后权重为 0
//! ```

use std::fmt;

use crate::error::WeightFileError;
use crate::ports::PortSpace;

/// 一个目的主机上各隧道的相对权重，缺省的尾部隧道权重为 0，不要求归一化
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    pub fn new(weights: impl Into<Vec<f64>>) -> Self {
        Self(weights.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// 隧道 `tunnel` 的权重，未给出的按 0 处理
    pub fn weight(&self, tunnel: usize) -> f64 {
        self.0.get(tunnel).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for WeightVector {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl fmt::Display for WeightVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{w}")?;
        }
        Ok(())
    }
}

/// 单台源主机的完整权重表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightConfig {
    rows: Vec<WeightVector>,
}

impl WeightConfig {
    /// 直接使用已按目的主机号排好的行
    pub fn from_rows(rows: Vec<WeightVector>) -> Self {
        Self { rows }
    }

    /// 组装 `host` 的权重表。
    ///
    /// `self_placeholder` 为真时 `rows` 只包含其它 `host_count - 1` 台主机，
    /// 会在第 `host` 行插入空占位；否则 `rows` 必须已经有 `host_count` 行。
    pub fn for_host(
        host: usize,
        host_count: usize,
        mut rows: Vec<WeightVector>,
        self_placeholder: bool,
    ) -> Result<Self, WeightFileError> {
        if host >= host_count {
            return Err(WeightFileError::HostOutOfRange { host, host_count });
        }
        let expected = if self_placeholder {
            host_count - 1
        } else {
            host_count
        };
        if rows.len() != expected {
            return Err(WeightFileError::RowCount {
                expected,
                got: rows.len(),
            });
        }
        if self_placeholder {
            rows.insert(host, WeightVector::empty());
        }
        let cfg = Self { rows };
        cfg.check_self_row(host)?;
        Ok(cfg)
    }

    /// 第 `host` 行必须是空占位，保证行号 == 目的主机号
    pub fn check_self_row(&self, host: usize) -> Result<(), WeightFileError> {
        match self.rows.get(host) {
            Some(row) if !row.is_empty() => Err(WeightFileError::SelfRowNotEmpty {
                host,
                count: row.len(),
            }),
            _ => Ok(()),
        }
    }

    /// 每个目的主机的每条隧道权重都为 1（启动时的默认分流）
    pub fn uniform(host: usize, host_count: usize, tunnels: usize) -> Self {
        let rows = (0..host_count)
            .map(|dst| {
                if dst == host {
                    WeightVector::empty()
                } else {
                    WeightVector::new(vec![1.0; tunnels])
                }
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[WeightVector] {
        &self.rows
    }

    pub fn row(&self, dst: usize) -> Option<&WeightVector> {
        self.rows.get(dst)
    }

    /// 检查 steering agent 能接受的范围：行数、每行隧道数、权重取值
    pub fn validate(&self, ports: &PortSpace) -> Result<(), WeightFileError> {
        if self.rows.len() > ports.max_flows() {
            return Err(WeightFileError::TooManyRows {
                count: self.rows.len(),
                max: ports.max_flows(),
            });
        }
        for (row, v) in self.rows.iter().enumerate() {
            if v.len() > ports.max_tunnels_per_flow() {
                return Err(WeightFileError::TooManyTunnels {
                    row,
                    count: v.len(),
                    max: ports.max_tunnels_per_flow(),
                });
            }
            for (tunnel, &value) in v.as_slice().iter().enumerate() {
                check_weight(row, tunnel, value)?;
            }
        }
        let bytes = self.render().len();
        let max = Self::byte_budget(ports);
        if bytes > max {
            return Err(WeightFileError::TooLarge { bytes, max });
        }
        Ok(())
    }

    /// steering agent 一次读取的上限：每条流每条隧道 32 字节
    pub fn byte_budget(ports: &PortSpace) -> usize {
        ports.max_flows() * ports.max_tunnels_per_flow() * 32
    }

    /// 渲染成文件内容：每行一个目的主机，行间用 `\n` 分隔，末尾不带换行
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(WeightVector::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 按 steering agent 的方式解析文件内容：空行表示无权重。
    /// 写入时会被拒绝的权重（NaN、无穷、负数）读回时同样报错。
    pub fn parse(text: &str) -> Result<Self, WeightFileError> {
        let mut rows = Vec::new();
        for (idx, line) in text.split('\n').enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                rows.push(WeightVector::empty());
                continue;
            }
            let mut weights = Vec::new();
            for field in line.split(',') {
                let field = field.trim();
                let value: f64 = field.parse().map_err(|_| WeightFileError::Parse {
                    line: idx + 1,
                    text: field.to_string(),
                })?;
                check_weight(idx, weights.len(), value)?;
                weights.push(value);
            }
            rows.push(WeightVector::new(weights));
        }
        Ok(Self { rows })
    }
}

fn check_weight(row: usize, tunnel: usize, value: f64) -> Result<(), WeightFileError> {
    if !value.is_finite() || value < 0.0 {
        return Err(WeightFileError::InvalidWeight { row, tunnel, value });
    }
    Ok(())
}
