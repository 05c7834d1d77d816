//! 违规数据模型

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::time::Instant;

/// 计入违规的信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    FullscreenExit,
    VisibilityHidden,
    WindowBlur,
    PageHide,
    Copy,
    Cut,
    Paste,
    ContextMenu,
    DisallowedShortcut,
    DevtoolsOpen,
    ExtensionSuspected,
    NamedToolSuspected,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::VisibilityHidden => "visibility_hidden",
            ViolationKind::WindowBlur => "window_blur",
            ViolationKind::PageHide => "page_hide",
            ViolationKind::Copy => "copy",
            ViolationKind::Cut => "cut",
            ViolationKind::Paste => "paste",
            ViolationKind::ContextMenu => "context_menu",
            ViolationKind::DisallowedShortcut => "disallowed_shortcut",
            ViolationKind::DevtoolsOpen => "devtools_open",
            ViolationKind::ExtensionSuspected => "extension_suspected",
            ViolationKind::NamedToolSuspected => "named_tool_suspected",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 成对信号中"回来"的一半，只记录不计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FullscreenEnter,
    VisibilityVisible,
    WindowFocus,
    PageShow,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::FullscreenEnter => "fullscreen_enter",
            ActivityKind::VisibilityVisible => "visibility_visible",
            ActivityKind::WindowFocus => "window_focus",
            ActivityKind::PageShow => "page_show",
        }
    }
}

/// 单次违规事件，不落盘
#[derive(Debug, Clone, Serialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
    pub details: Map<String, JsonValue>,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, details: Map<String, JsonValue>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// `logEvent` 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEventRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    pub page: String,
    pub details: Map<String, JsonValue>,
}

/// 违规台账
///
/// - `count` 单调不减
/// - `threshold_fired` 至多从 false 变为 true 一次
#[derive(Debug, Clone)]
pub struct ViolationLedger {
    count: u32,
    threshold: u32,
    last_seen_at: HashMap<ViolationKind, Instant>,
    threshold_fired: bool,
}

impl ViolationLedger {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
            last_seen_at: HashMap::new(),
            threshold_fired: false,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn threshold_fired(&self) -> bool {
        self.threshold_fired
    }

    pub fn last_seen_at(&self, kind: ViolationKind) -> Option<Instant> {
        self.last_seen_at.get(&kind).copied()
    }

    /// 去重后计数；窗口内的同类信号返回 false 且不改变台账
    pub fn admit(&mut self, kind: ViolationKind, now: Instant, dedup_window: Duration) -> bool {
        if let Some(last) = self.last_seen_at.get(&kind) {
            if now.saturating_duration_since(*last) < dedup_window {
                return false;
            }
        }
        self.last_seen_at.insert(kind, now);
        self.count = self.count.saturating_add(1);
        true
    }

    /// 达到阈值且尚未触发时置位并返回 true，之后永远返回 false
    pub fn try_fire_threshold(&mut self) -> bool {
        if self.threshold_fired || self.count < self.threshold {
            return false;
        }
        self.threshold_fired = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1500);

    #[test]
    fn same_kind_inside_window_is_dropped() {
        let mut ledger = ViolationLedger::new(3);
        let t0 = Instant::now();
        assert!(ledger.admit(ViolationKind::Paste, t0, WINDOW));
        assert!(!ledger.admit(ViolationKind::Paste, t0 + Duration::from_millis(1499), WINDOW));
        assert_eq!(ledger.count(), 1);
        assert_eq!(ledger.last_seen_at(ViolationKind::Paste), Some(t0));
        assert!(ledger.admit(ViolationKind::Paste, t0 + Duration::from_millis(1500), WINDOW));
        assert_eq!(ledger.count(), 2);
    }

    #[test]
    fn different_kinds_are_tracked_independently() {
        let mut ledger = ViolationLedger::new(3);
        let t0 = Instant::now();
        assert!(ledger.admit(ViolationKind::WindowBlur, t0, WINDOW));
        assert!(ledger.admit(ViolationKind::VisibilityHidden, t0, WINDOW));
        assert_eq!(ledger.count(), 2);
    }

    #[test]
    fn threshold_fires_once() {
        let mut ledger = ViolationLedger::new(2);
        let t0 = Instant::now();
        ledger.admit(ViolationKind::Copy, t0, WINDOW);
        assert!(!ledger.try_fire_threshold());
        ledger.admit(ViolationKind::Cut, t0, WINDOW);
        assert!(ledger.try_fire_threshold());
        ledger.admit(ViolationKind::Paste, t0, WINDOW);
        assert!(!ledger.try_fire_threshold());
        assert!(ledger.threshold_fired());
        assert_eq!(ledger.count(), 3);
    }
}
