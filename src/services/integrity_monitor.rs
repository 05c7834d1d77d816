//! 完整性监控 - 业务能力层
//!
//! 职责：
//! - 按信号类型独立去重
//! - 计数并把事件转发给日志接收端
//! - 达到阈值时给出一次（且仅一次）升级结论
//!
//! 不关心会话状态，调用方决定何时上报。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value as JsonValue};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::{ActivityKind, LogEventRequest, ViolationEvent, ViolationKind, ViolationLedger};
use crate::services::violation_sink::ViolationSink;

/// 一次上报的结论
#[derive(Debug, Clone)]
pub enum Verdict {
    /// 去重窗口内的重复信号
    Dropped,
    Counted {
        event: ViolationEvent,
        count: u32,
    },
    /// 本次计数恰好越过阈值
    Escalated {
        event: ViolationEvent,
        count: u32,
    },
}

impl Verdict {
    pub fn is_escalation(&self) -> bool {
        matches!(self, Verdict::Escalated { .. })
    }
}

pub struct IntegrityMonitor {
    exam_id: String,
    page: String,
    ledger: ViolationLedger,
    dedup_window: Duration,
    sink: Arc<dyn ViolationSink>,
}

impl IntegrityMonitor {
    pub fn new(
        exam_id: impl Into<String>,
        page: impl Into<String>,
        threshold: u32,
        dedup_window: Duration,
        sink: Arc<dyn ViolationSink>,
    ) -> Self {
        Self {
            exam_id: exam_id.into(),
            page: page.into(),
            ledger: ViolationLedger::new(threshold),
            dedup_window,
            sink,
        }
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    pub fn count(&self) -> u32 {
        self.ledger.count()
    }

    /// 上报一次违规信号
    pub fn report(
        &mut self,
        kind: ViolationKind,
        details: Map<String, JsonValue>,
        now: Instant,
    ) -> Verdict {
        if !self.ledger.admit(kind, now, self.dedup_window) {
            debug!("[考试 {}] 去重窗口内的重复信号: {}", self.exam_id, kind);
            return Verdict::Dropped;
        }

        let count = self.ledger.count();
        let event = ViolationEvent::new(kind, details);
        warn!(
            "[考试 {}] ⚠️ 违规 #{}/{}: {}",
            self.exam_id,
            count,
            self.ledger.threshold(),
            kind
        );

        let mut payload = event.details.clone();
        payload.insert("exam_id".to_string(), json!(self.exam_id));
        payload.insert("count".to_string(), json!(count));
        payload.insert("timestamp".to_string(), json!(event.timestamp.to_rfc3339()));
        self.forward(kind.as_str(), payload);

        if self.ledger.try_fire_threshold() {
            warn!(
                "[考试 {}] 🚨 违规次数达到阈值 {}，触发强制交卷",
                self.exam_id,
                self.ledger.threshold()
            );
            Verdict::Escalated { event, count }
        } else {
            Verdict::Counted { event, count }
        }
    }

    /// 成对信号的"回来"一半：只转发，不计数
    pub fn note_activity(&self, kind: ActivityKind, details: Map<String, JsonValue>) {
        let mut payload = details;
        payload.insert("exam_id".to_string(), json!(self.exam_id));
        self.forward(kind.as_str(), payload);
    }

    fn forward(&self, event_type: &str, details: Map<String, JsonValue>) {
        self.sink.forward(LogEventRequest {
            event_type: event_type.to_string(),
            page: self.page.clone(),
            details,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    const WINDOW: Duration = Duration::from_millis(1500);

    fn monitor(threshold: u32) -> (IntegrityMonitor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let monitor = IntegrityMonitor::new("exam-1", "exam", threshold, WINDOW, sink.clone());
        (monitor, sink)
    }

    #[test]
    fn three_spaced_violations_escalate_once() {
        let (mut monitor, sink) = monitor(3);
        let t0 = Instant::now();

        let first = monitor.report(ViolationKind::Copy, Map::new(), t0);
        let second = monitor.report(ViolationKind::Paste, Map::new(), t0 + Duration::from_millis(1600));
        let third = monitor.report(
            ViolationKind::FullscreenExit,
            Map::new(),
            t0 + Duration::from_millis(3200),
        );

        assert!(matches!(first, Verdict::Counted { count: 1, .. }));
        assert!(matches!(second, Verdict::Counted { count: 2, .. }));
        assert!(matches!(third, Verdict::Escalated { count: 3, .. }));
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn repeated_paste_inside_window_counts_once() {
        let (mut monitor, sink) = monitor(3);
        let t0 = Instant::now();

        monitor.report(ViolationKind::Paste, Map::new(), t0);
        let again = monitor.report(ViolationKind::Paste, Map::new(), t0 + Duration::from_millis(500));

        assert!(matches!(again, Verdict::Dropped));
        assert_eq!(monitor.count(), 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "paste");
        assert_eq!(events[0].details["count"], 1);
    }

    #[test]
    fn escalation_never_repeats() {
        let (mut monitor, _sink) = monitor(2);
        let mut now = Instant::now();
        let mut escalations = 0;
        let kinds = [
            ViolationKind::Copy,
            ViolationKind::Cut,
            ViolationKind::Paste,
            ViolationKind::ContextMenu,
            ViolationKind::WindowBlur,
        ];

        for i in 0..12 {
            now += Duration::from_secs(2);
            if monitor.report(kinds[i % kinds.len()], Map::new(), now).is_escalation() {
                escalations += 1;
            }
        }

        assert_eq!(escalations, 1);
        assert_eq!(monitor.count(), 12);
        assert!(monitor.ledger().threshold_fired());
    }

    #[test]
    fn different_kinds_share_no_window() {
        let (mut monitor, _sink) = monitor(5);
        let t0 = Instant::now();
        monitor.report(ViolationKind::VisibilityHidden, Map::new(), t0);
        monitor.report(ViolationKind::WindowBlur, Map::new(), t0);
        monitor.report(ViolationKind::PageHide, Map::new(), t0);
        assert_eq!(monitor.count(), 3);
    }

    #[test]
    fn activity_is_forwarded_but_not_counted() {
        let (monitor, sink) = monitor(1);
        monitor.note_activity(ActivityKind::WindowFocus, Map::new());
        assert_eq!(monitor.count(), 0);
        assert!(!monitor.ledger().threshold_fired());
        assert_eq!(sink.events()[0].event_type, "window_focus");
    }
}
