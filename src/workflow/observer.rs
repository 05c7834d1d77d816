//! UI 边界
//!
//! 引擎只通过该 trait 通知外部，默认实现全部为空操作。

use tracing::{debug, info, warn};

use crate::models::{SessionSnapshot, SweepSummary, ViolationEvent};

pub trait ExamObserver: Send + Sync {
    /// 快照发生变化
    fn on_snapshot(&self, _snapshot: &SessionSnapshot) {}

    fn on_violation(&self, _event: &ViolationEvent, _count: u32) {}

    /// 违规次数越过阈值（每场考试至多一次）
    fn on_escalation(&self, _count: u32) {}

    /// 平台拒绝进入全屏，需要用户再次操作
    fn on_fullscreen_blocked(&self) {}

    fn on_sweep_complete(&self, _summary: &SweepSummary) {}

    /// 交卷结束后离开考试页面
    fn navigate_away(&self) {}
}

/// 只写日志的观察者
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ExamObserver for LoggingObserver {
    fn on_snapshot(&self, snapshot: &SessionSnapshot) {
        debug!(
            "[考试 {}] 状态: {} | 剩余 {}s | 违规 {}/{}{}",
            snapshot.exam_id,
            snapshot.status,
            snapshot.remaining_seconds,
            snapshot.violation_count,
            snapshot.violation_threshold,
            if snapshot.fullscreen_blocked {
                " | 全屏被拒绝"
            } else {
                ""
            }
        );
    }

    fn on_escalation(&self, count: u32) {
        warn!("🚨 违规累计 {} 次，试卷将被强制提交", count);
    }

    fn on_fullscreen_blocked(&self) {
        warn!("⚠️ 无法进入全屏，请点击重试后继续作答");
    }

    fn on_sweep_complete(&self, summary: &SweepSummary) {
        info!(
            "✅ 已交卷: 成功 {} | 跳过 {} | 失败 {}",
            summary.succeeded(),
            summary.skipped(),
            summary.failed()
        );
    }
}
