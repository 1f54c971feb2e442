// crates/cdo_foundation/src/metrics.rs

//! 计时统计
//!
//! 提供累积计时器，以及按“父阶段/名称”组织的 [`TimerStats`]。
//! 方程对象在 `verbosity > 0` 时创建主计时器，在 `verbosity > 1` 时
//! 额外创建 `_pre`、`_solve`、`_extra_op` 子计时器。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// =============================================================================
// 计时器
// =============================================================================

/// 累积计时器
#[derive(Debug)]
pub struct Timer {
    total_ns: AtomicU64,
    count: AtomicU64,
}

impl Timer {
    /// 创建新计时器
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// 开始计时，返回守卫
    ///
    /// ```rust
    /// use cdo_foundation::metrics::Timer;
    ///
    /// let timer = Timer::new();
    /// {
    ///     let _guard = timer.start();
    /// }
    /// assert_eq!(timer.count(), 1);
    /// ```
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    /// 记录一次计时（手动）
    pub fn record(&self, elapsed: Duration) {
        self.total_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取总时间（纳秒）
    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    /// 获取总时间（秒）
    pub fn total_sec(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000_000.0
    }

    /// 获取调用次数
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// 获取平均时间（纳秒）
    pub fn avg_ns(&self) -> f64 {
        let c = self.count();
        if c == 0 {
            0.0
        } else {
            self.total_ns() as f64 / c as f64
        }
    }

    /// 重置计时器
    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// 计时守卫
///
/// 当守卫被 drop 时，自动记录时间。
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

// =============================================================================
// 按名称组织的计时统计
// =============================================================================

/// 计时统计条目句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(usize);

impl TimerId {
    /// 条目序号
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct TimerEntry {
    parent: String,
    name: String,
    plot: bool,
    timer: Timer,
    running: Option<Instant>,
}

/// 计时统计集合
///
/// `start`/`stop` 成对调用；重复 `start` 会重新起算，未启动时 `stop` 无效果。
#[derive(Debug, Default)]
pub struct TimerStats {
    entries: Vec<TimerEntry>,
}

impl TimerStats {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个计时条目，同名条目已存在时返回已有句柄
    pub fn create(&mut self, parent: &str, name: &str) -> TimerId {
        if let Some(id) = self.id_by_name(name) {
            return id;
        }
        self.entries.push(TimerEntry {
            parent: parent.to_string(),
            name: name.to_string(),
            plot: false,
            timer: Timer::new(),
            running: None,
        });
        TimerId(self.entries.len() - 1)
    }

    /// 按名称查找条目
    pub fn id_by_name(&self, name: &str) -> Option<TimerId> {
        self.entries.iter().position(|e| e.name == name).map(TimerId)
    }

    /// 设置是否参与绘图输出
    pub fn set_plot(&mut self, id: TimerId, plot: bool) {
        if let Some(e) = self.entries.get_mut(id.0) {
            e.plot = plot;
        }
    }

    /// 开始计时
    pub fn start(&mut self, id: TimerId) {
        if let Some(e) = self.entries.get_mut(id.0) {
            e.running = Some(Instant::now());
        }
    }

    /// 结束计时并累加
    pub fn stop(&mut self, id: TimerId) {
        if let Some(e) = self.entries.get_mut(id.0) {
            if let Some(t0) = e.running.take() {
                e.timer.record(t0.elapsed());
            }
        }
    }

    /// 获取计时器
    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.entries.get(id.0).map(|e| &e.timer)
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 导出快照
    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        self.entries
            .iter()
            .map(|e| TimerSnapshot {
                parent: e.parent.clone(),
                name: e.name.clone(),
                plot: e.plot,
                count: e.timer.count(),
                total_sec: e.timer.total_sec(),
            })
            .collect()
    }

    /// 以 info 级别输出所有条目
    pub fn log_summary(&self) {
        for s in self.snapshot() {
            log::info!(
                "<timer> {}/{}: {} calls, {:.3e} s",
                s.parent,
                s.name,
                s.count,
                s.total_sec
            );
        }
    }
}

/// 计时条目快照
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimerSnapshot {
    /// 父阶段名称
    pub parent: String,
    /// 条目名称
    pub name: String,
    /// 是否绘图
    pub plot: bool,
    /// 调用次数
    pub count: u64,
    /// 累积时间（秒）
    pub total_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_guard_records() {
        let timer = Timer::new();
        {
            let _g = timer.start();
        }
        {
            let _g = timer.start();
        }
        assert_eq!(timer.count(), 2);
        timer.reset();
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.avg_ns(), 0.0);
    }

    #[test]
    fn test_stats_create_is_idempotent() {
        let mut stats = TimerStats::new();
        let a = stats.create("stages", "heat");
        let b = stats.create("heat", "heat_pre");
        let c = stats.create("stages", "heat");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_stats_start_stop() {
        let mut stats = TimerStats::new();
        let id = stats.create("stages", "heat");
        stats.stop(id);
        assert_eq!(stats.timer(id).map(|t| t.count()), Some(0));
        stats.start(id);
        stats.stop(id);
        stats.start(id);
        stats.stop(id);
        assert_eq!(stats.timer(id).map(|t| t.count()), Some(2));
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut stats = TimerStats::new();
        let id = stats.create("stages", "heat");
        stats.set_plot(id, true);
        let snap = stats.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: Vec<TimerSnapshot> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        assert!(back[0].plot);
    }
}
