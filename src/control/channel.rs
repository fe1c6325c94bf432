//! 交换机控制通道
//!
//! `install(rule)` 是唯一的外部调用。相同规则重复下发等价于覆盖写，
//! 因此失败后的恢复方式就是整体重放。

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::ChannelError;
use crate::flow::{Action, FlowRule, MatchSpec, PacketHeader, ofctl};
use crate::topo::SwitchId;

/// 规则下发接口。不同交换机上的下发可以并发进行，因此方法只借用 `&self`。
pub trait SwitchControl {
    fn install(&self, rule: &FlowRule) -> Result<(), ChannelError>;
}

type SwitchTable = HashMap<(MatchSpec, u16), Action>;

/// 内存中的流表，按 (match, priority) 覆盖写。用于 dry-run 和测试。
#[derive(Debug, Default)]
pub struct FlowTable {
    switches: Mutex<HashMap<SwitchId, SwitchTable>>,
    /// 每台交换机最多容纳的规则数，`None` 表示不限
    capacity: Option<usize>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟容量有限的硬件流表，超出时拒绝新规则
    pub fn with_switch_capacity(capacity: usize) -> Self {
        Self {
            switches: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SwitchId, SwitchTable>> {
        // 写入只有单条 insert，中途 panic 不会留下半更新的状态
        self.switches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 全部已安装规则数
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rules_on(&self, switch: SwitchId) -> usize {
        self.lock().get(&switch).map_or(0, HashMap::len)
    }

    /// 稳定排序的快照，便于比较两次下发后的状态
    pub fn snapshot(&self) -> BTreeMap<(SwitchId, MatchSpec, u16), Action> {
        self.lock()
            .iter()
            .flat_map(|(&sw, table)| {
                table
                    .iter()
                    .map(move |(&(m, prio), &action)| ((sw, m, prio), action))
            })
            .collect()
    }

    /// 按优先级查表：返回命中的最高优先级规则的动作
    pub fn lookup(&self, switch: SwitchId, hdr: &PacketHeader) -> Option<Action> {
        let guard = self.lock();
        guard
            .get(&switch)?
            .iter()
            .filter(|((m, _), _)| m.matches(hdr))
            .max_by_key(|((_, prio), _)| *prio)
            .map(|(_, &action)| action)
    }
}

impl SwitchControl for FlowTable {
    fn install(&self, rule: &FlowRule) -> Result<(), ChannelError> {
        let mut guard = self.lock();
        let table = guard.entry(rule.switch).or_default();
        let key = (rule.match_spec, rule.priority);
        if let Some(cap) = self.capacity {
            if !table.contains_key(&key) && table.len() >= cap {
                return Err(ChannelError::Rejected {
                    switch: rule.switch,
                    reason: format!("flow table full ({cap} entries)"),
                });
            }
        }
        trace!(switch = %rule.switch, ?key, "写入流表");
        table.insert(key, rule.action);
        Ok(())
    }
}

/// 把每次下发渲染成一行 `ovs-ofctl add-flow` 命令，写进任意 writer（生成脚本用）
#[derive(Debug)]
pub struct OfctlScript<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> OfctlScript<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write> SwitchControl for OfctlScript<W> {
    fn install(&self, rule: &FlowRule) -> Result<(), ChannelError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", ofctl::add_flow_command(rule))?;
        Ok(())
    }
}
