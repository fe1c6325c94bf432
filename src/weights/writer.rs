//! 权重文件写入
//!
//! 每台主机一个文件，只有一个写者；steering agent 只读。
//! 先写同目录下的 `<target>.tmp`，落盘后再 rename 覆盖目标文件，
//! 读者看到的要么是完整的旧内容，要么是完整的新内容。
//! rename 失败时旧文件保持原样，重试方式是整体再写一次。
//!
//! 多台主机的文件之间没有事务：读者可能先看到 A 的新权重、后看到 B 的。

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::config::{WeightConfig, WeightVector};
use crate::error::WeightFileError;
use crate::ports::PortSpace;

/// steering agent 默认读取的目录
pub const DEFAULT_WEIGHTS_DIR: &str = "./flow_weights";

#[derive(Debug, Clone)]
pub struct WeightConfigWriter {
    dir: PathBuf,
    ports: PortSpace,
    host_count: usize,
}

impl WeightConfigWriter {
    pub fn new(dir: impl Into<PathBuf>, ports: PortSpace, host_count: usize) -> Self {
        Self {
            dir: dir.into(),
            ports,
            host_count,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `host` 的权重文件路径：`<dir>/h<host>.txt`
    pub fn path_for(&self, host: usize) -> PathBuf {
        self.dir.join(format!("h{host}.txt"))
    }

    /// 组装并写入 `host` 的权重表，返回目标路径
    pub fn write(
        &self,
        host: usize,
        rows: Vec<WeightVector>,
        self_placeholder: bool,
    ) -> Result<PathBuf, WeightFileError> {
        let cfg = WeightConfig::for_host(host, self.host_count, rows, self_placeholder)?;
        self.write_config(host, &cfg)
    }

    /// 写入一份已组装好的权重表：必须正好 `host_count` 行，且第 `host` 行为空占位
    #[tracing::instrument(skip(self, cfg), fields(rows = cfg.rows().len()))]
    pub fn write_config(&self, host: usize, cfg: &WeightConfig) -> Result<PathBuf, WeightFileError> {
        if host >= self.host_count {
            return Err(WeightFileError::HostOutOfRange {
                host,
                host_count: self.host_count,
            });
        }
        if cfg.rows().len() != self.host_count {
            return Err(WeightFileError::RowCount {
                expected: self.host_count,
                got: cfg.rows().len(),
            });
        }
        cfg.check_self_row(host)?;
        cfg.validate(&self.ports)?;

        let target = self.path_for(host);
        let content = cfg.render();
        debug!(path = %target.display(), bytes = content.len(), "写入权重文件");
        write_atomic(&target, content.as_bytes())?;
        info!(path = %target.display(), "⚖️ 权重已更新");
        Ok(target)
    }

    /// 读取 `host` 当前的权重文件
    pub fn read(&self, host: usize) -> Result<WeightConfig, WeightFileError> {
        let path = self.path_for(host);
        let text = fs::read_to_string(&path).map_err(|source| WeightFileError::Io {
            path: path.clone(),
            source,
        })?;
        WeightConfig::parse(&text)
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// 写临时文件 + rename。任何一步失败都会尽量清理临时文件，目标文件不受影响。
fn write_atomic(target: &Path, content: &[u8]) -> Result<(), WeightFileError> {
    let tmp = tmp_path(target);

    let written = File::create(&tmp).and_then(|mut f| {
        f.write_all(content)?;
        f.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(WeightFileError::Io { path: tmp, source });
    }

    if let Err(source) = fs::rename(&tmp, target) {
        warn!(path = %target.display(), error = %source, "rename 失败，保留旧权重文件");
        let _ = fs::remove_file(&tmp);
        return Err(WeightFileError::Io {
            path: target.to_path_buf(),
            source,
        });
    }
    Ok(())
}
