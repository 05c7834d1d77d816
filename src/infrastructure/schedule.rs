//! 定时任务与订阅的释放器 - 基础设施层
//!
//! 每个周期任务、延时任务、信号订阅都返回一个 `Disposer`。
//! 持有者负责在状态切换或销毁时统一释放，释放后不会再有任何回调到达。

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// 周期下限；`interval` 不接受零周期
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// 释放器
///
/// drop 时自动释放，`dispose()` 可重复调用。
pub struct Disposer {
    inner: Option<DisposeAction>,
}

enum DisposeAction {
    Task(AbortHandle),
    Callback(Box<dyn FnOnce() + Send>),
}

impl Disposer {
    /// 不需要释放任何东西
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// 释放时中止后台任务
    pub fn from_task<T>(handle: &tokio::task::JoinHandle<T>) -> Self {
        Self {
            inner: Some(DisposeAction::Task(handle.abort_handle())),
        }
    }

    /// 释放时执行回调
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Some(DisposeAction::Callback(Box::new(f))),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn dispose(&mut self) {
        match self.inner.take() {
            Some(DisposeAction::Task(handle)) => handle.abort(),
            Some(DisposeAction::Callback(f)) => f(),
            None => {}
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// 一组活动中的定时任务
///
/// 每个控制器实例独占一组，不做全局共享。
#[derive(Debug, Default)]
pub struct Schedules {
    disposers: Vec<Disposer>,
}

impl Schedules {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前活动的任务数
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// 周期性地向通道投递事件，首次投递在 `first_delay` 之后
    ///
    /// 接收端关闭后任务自行退出。零周期按 `MIN_PERIOD` 处理。
    pub fn every<E, F>(
        &mut self,
        first_delay: Duration,
        period: Duration,
        tx: UnboundedSender<E>,
        make_event: F,
    ) where
        E: Send + 'static,
        F: Fn() -> E + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + first_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(make_event()).is_err() {
                    break;
                }
            }
        });
        self.disposers.push(Disposer::from_task(&handle));
    }

    /// 延时投递一次事件
    pub fn after<E>(&mut self, delay: Duration, tx: UnboundedSender<E>, event: E)
    where
        E: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
        self.disposers.push(Disposer::from_task(&handle));
    }

    /// 释放全部任务
    pub fn dispose_all(&mut self) {
        for mut disposer in self.disposers.drain(..) {
            disposer.dispose();
        }
    }
}

impl Drop for Schedules {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
