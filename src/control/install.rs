//! 规则下发
//!
//! 所有匹配都是精确且互不重叠的，下发顺序不影响结果（丢弃规则靠优先级区分），
//! 所以可以按交换机并发下发。任何一条失败都原样上报，不重试、不回滚；
//! 调用方的恢复方式是整体重放生成 + 下发。

use std::collections::BTreeMap;
use std::thread;

use tracing::{debug, info, warn};

use super::channel::SwitchControl;
use crate::error::InstallError;
use crate::flow::FlowRule;
use crate::topo::SwitchId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: usize,
    pub switches: usize,
}

/// 顺序下发，遇到第一条失败即停止
#[tracing::instrument(skip_all, fields(rules = rules.len()))]
pub fn install_all<C>(channel: &C, rules: &[FlowRule]) -> Result<InstallReport, InstallError>
where
    C: SwitchControl + ?Sized,
{
    for (index, rule) in rules.iter().enumerate() {
        channel.install(rule).map_err(|source| {
            warn!(index, switch = %rule.switch, "规则下发失败");
            InstallError {
                index,
                switch: rule.switch,
                source,
            }
        })?;
    }
    let report = InstallReport {
        installed: rules.len(),
        switches: group_by_switch(rules).len(),
    };
    info!(installed = report.installed, switches = report.switches, "✅ 规则下发完成");
    Ok(report)
}

/// 每台交换机一个线程并发下发；同一交换机内保持原顺序。
///
/// 多个交换机失败时返回序号最小的那条。
#[tracing::instrument(skip_all, fields(rules = rules.len()))]
pub fn install_by_switch<C>(channel: &C, rules: &[FlowRule]) -> Result<InstallReport, InstallError>
where
    C: SwitchControl + Sync + ?Sized,
{
    let groups = group_by_switch(rules);
    debug!(switches = groups.len(), "按交换机分组");

    let results: Vec<Result<usize, InstallError>> = thread::scope(|scope| {
        let handles: Vec<_> = groups
            .iter()
            .map(|(&switch, indices)| {
                scope.spawn(move || -> Result<usize, InstallError> {
                    for &index in indices {
                        channel
                            .install(&rules[index])
                            .map_err(|source| InstallError {
                                index,
                                switch,
                                source,
                            })?;
                    }
                    Ok(indices.len())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut installed = 0;
    let mut first_err: Option<InstallError> = None;
    for res in results {
        match res {
            Ok(n) => installed += n,
            Err(e) => {
                warn!(index = e.index, switch = %e.switch, "规则下发失败");
                if first_err.as_ref().is_none_or(|f| e.index < f.index) {
                    first_err = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }

    let report = InstallReport {
        installed,
        switches: groups.len(),
    };
    info!(installed = report.installed, switches = report.switches, "✅ 规则并发下发完成");
    Ok(report)
}

fn group_by_switch(rules: &[FlowRule]) -> BTreeMap<SwitchId, Vec<usize>> {
    let mut groups: BTreeMap<SwitchId, Vec<usize>> = BTreeMap::new();
    for (index, rule) in rules.iter().enumerate() {
        groups.entry(rule.switch).or_default().push(index);
    }
    groups
}
