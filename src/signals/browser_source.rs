//! 浏览器信号源
//!
//! 在考试页面注入一段桥接脚本，把各类 DOM 事件压入 `window.__examGuard.queue`，
//! 后台任务按固定间隔取走队列并转换为 `RawSignal`。
//! 页面刷新导致桥接丢失（或队列被页面改写）时自动重新注入。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{
    ClipboardAction, EnvironmentSignalSource, EnvironmentState, KeyCombo, PageSnapshot, ProbeSpec,
    RawSignal, SignalSender, ViewportMetrics,
};
use crate::error::ProbeError;
use crate::infrastructure::{Disposer, JsExecutor, MIN_PERIOD};

const BRIDGE_SCRIPT: &str = r#"
(() => {
    if (window.__examGuard && Array.isArray(window.__examGuard.queue)) return true;
    const state = { queue: [], origins: [] };
    window.__examGuard = state;
    const push = (event) => { if (state.queue.length < 1000) state.queue.push(event); };
    const viewport = () => ({
        outer_width: window.outerWidth,
        outer_height: window.outerHeight,
        inner_width: window.innerWidth,
        inner_height: window.innerHeight
    });
    document.addEventListener('fullscreenchange', () => push({ type: 'fullscreen', active: !!document.fullscreenElement }));
    document.addEventListener('visibilitychange', () => push({ type: 'visibility', visible: document.visibilityState === 'visible' }));
    window.addEventListener('blur', () => push({ type: 'focus', focused: false }));
    window.addEventListener('focus', () => push({ type: 'focus', focused: true }));
    window.addEventListener('pagehide', () => push({ type: 'lifecycle', shown: false }));
    window.addEventListener('pageshow', () => push({ type: 'lifecycle', shown: true }));
    ['copy', 'cut', 'paste'].forEach((action) => document.addEventListener(action, () => push({ type: 'clipboard', action })));
    document.addEventListener('contextmenu', () => push({ type: 'context_menu' }));
    document.addEventListener('keydown', (e) => push({
        type: 'key', key: e.key || '', ctrl: e.ctrlKey, shift: e.shiftKey, alt: e.altKey, meta: e.metaKey
    }), true);
    window.addEventListener('resize', () => push(Object.assign({ type: 'resize' }, viewport())));
    window.addEventListener('message', (e) => {
        if (e.origin && e.origin !== location.origin && state.origins.length < 100) state.origins.push(e.origin);
    });
    new MutationObserver((records) => {
        let added = 0;
        records.forEach((r) => { added += r.addedNodes.length; });
        if (added > 0) push({ type: 'mutation', added });
    }).observe(document.documentElement, { childList: true, subtree: true });
    return true;
})()
"#;

const DRAIN_SCRIPT: &str = r#"
(() => {
    const g = window.__examGuard;
    if (!g || !Array.isArray(g.queue)) return null;
    return g.queue.splice(0, g.queue.length);
})()
"#;

const STATE_SCRIPT: &str = r#"
(() => ({ fullscreen: !!document.fullscreenElement, visible: document.visibilityState === 'visible' }))()
"#;

const FULLSCREEN_SCRIPT: &str = r#"
(async () => {
    try {
        await document.documentElement.requestFullscreen();
        return true;
    } catch (e) {
        return false;
    }
})()
"#;

const SNAPSHOT_FN: &str = r#"
(spec) => {
    const urls = [];
    document.querySelectorAll('script[src], iframe[src]').forEach((el) => urls.push(el.src));
    document.querySelectorAll('link[href]').forEach((el) => urls.push(el.href));
    const matched = spec.selectors.filter((sel) => {
        try { return document.querySelector(sel) !== null; } catch (e) { return false; }
    });
    const globals = spec.globals.filter((name) => {
        try { return typeof window[name] !== 'undefined'; } catch (e) { return false; }
    });
    const g = window.__examGuard;
    return {
        page_origin: location.origin,
        resource_urls: urls,
        matched_selectors: matched,
        present_globals: globals,
        message_origins: g ? g.origins.slice() : [],
        viewport: {
            outer_width: window.outerWidth,
            outer_height: window.outerHeight,
            inner_width: window.innerWidth,
            inner_height: window.innerHeight
        }
    };
}
"#;

/// 桥接脚本压入队列的事件
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeEvent {
    Fullscreen {
        active: bool,
    },
    Visibility {
        visible: bool,
    },
    Focus {
        focused: bool,
    },
    Lifecycle {
        shown: bool,
    },
    Clipboard {
        action: ClipboardAction,
    },
    ContextMenu,
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        meta: bool,
    },
    Resize {
        outer_width: u32,
        outer_height: u32,
        inner_width: u32,
        inner_height: u32,
    },
    Mutation {
        added: u32,
    },
}

impl From<BridgeEvent> for RawSignal {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Fullscreen { active } => RawSignal::FullscreenChanged { active },
            BridgeEvent::Visibility { visible } => RawSignal::VisibilityChanged { visible },
            BridgeEvent::Focus { focused } => RawSignal::FocusChanged { focused },
            BridgeEvent::Lifecycle { shown } => RawSignal::PageLifecycle { shown },
            BridgeEvent::Clipboard { action } => RawSignal::Clipboard(action),
            BridgeEvent::ContextMenu => RawSignal::ContextMenu,
            BridgeEvent::Key {
                key,
                ctrl,
                shift,
                alt,
                meta,
            } => RawSignal::KeyPressed(KeyCombo {
                key,
                ctrl,
                shift,
                alt,
                meta,
            }),
            BridgeEvent::Resize {
                outer_width,
                outer_height,
                inner_width,
                inner_height,
            } => RawSignal::Resized(ViewportMetrics {
                outer_width,
                outer_height,
                inner_width,
                inner_height,
            }),
            BridgeEvent::Mutation { added } => RawSignal::DomMutation { added_nodes: added },
        }
    }
}

/// 逐条解码一批桥接事件，无法识别的条目单独丢弃
fn decode_batch(batch: Vec<JsonValue>) -> Vec<RawSignal> {
    batch
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<BridgeEvent>(raw) {
            Ok(event) => Some(event.into()),
            Err(e) => {
                debug!("忽略无法识别的桥接事件: {}", e);
                None
            }
        })
        .collect()
}

/// 基于 chromiumoxide 页面的信号源
pub struct BrowserSignalSource {
    executor: JsExecutor,
    poll_interval: Duration,
}

impl BrowserSignalSource {
    pub fn new(executor: JsExecutor, poll_interval: Duration) -> Self {
        Self {
            executor,
            poll_interval,
        }
    }

    /// 读取浏览器 UA（用于设备信息）
    pub async fn user_agent(&self) -> Option<String> {
        self.executor
            .eval_as::<String>("user_agent", "navigator.userAgent")
            .await
            .ok()
    }

    async fn install_bridge(&self) -> Result<(), ProbeError> {
        self.executor.eval("bridge", BRIDGE_SCRIPT).await?;
        Ok(())
    }
}

#[async_trait]
impl EnvironmentSignalSource for BrowserSignalSource {
    async fn subscribe(&self, sender: SignalSender) -> Result<Disposer, ProbeError> {
        self.install_bridge().await?;
        info!("✓ 已注入页面信号桥接脚本");

        let executor = self.executor.clone();
        let period = self.poll_interval.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if sender.is_closed() {
                    break;
                }
                match executor
                    .eval_as::<Option<Vec<JsonValue>>>("drain", DRAIN_SCRIPT)
                    .await
                {
                    Ok(Some(batch)) => {
                        for signal in decode_batch(batch) {
                            if !sender.send(signal) {
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("桥接脚本已丢失（页面可能刷新），重新注入");
                        if let Err(e) = executor.eval("bridge", BRIDGE_SCRIPT).await {
                            debug!("重新注入失败: {}", e);
                        }
                    }
                    Err(e) => debug!("信号队列读取失败（按无信号处理）: {}", e),
                }
            }
        });

        Ok(Disposer::from_task(&handle))
    }

    async fn current_state(&self) -> Result<EnvironmentState, ProbeError> {
        self.executor.eval_as("state", STATE_SCRIPT).await
    }

    async fn request_fullscreen(&self) -> bool {
        match self.executor.eval_as::<bool>("fullscreen", FULLSCREEN_SCRIPT).await {
            Ok(granted) => granted,
            Err(e) => {
                debug!("全屏请求执行失败，视为被拒绝: {}", e);
                false
            }
        }
    }

    async fn snapshot(&self, probe: &ProbeSpec) -> Result<PageSnapshot, ProbeError> {
        let spec_json = serde_json::to_string(probe).map_err(|source| ProbeError::DecodeFailed {
            probe: "snapshot".to_string(),
            source,
        })?;
        let script = format!("({})({})", SNAPSHOT_FN.trim(), spec_json);
        self.executor.eval_as("snapshot", script).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_events_decode_into_signals() {
        let raw = serde_json::json!([
            { "type": "fullscreen", "active": false },
            { "type": "visibility", "visible": false },
            { "type": "clipboard", "action": "paste" },
            { "type": "context_menu" },
            { "type": "key", "key": "I", "ctrl": true, "shift": true, "alt": false, "meta": false },
            { "type": "resize", "outer_width": 1400, "outer_height": 900, "inner_width": 1000, "inner_height": 880 },
            { "type": "mutation", "added": 3 }
        ]);
        let events: Vec<BridgeEvent> = serde_json::from_value(raw).unwrap();
        let signals: Vec<RawSignal> = events.into_iter().map(RawSignal::from).collect();

        assert_eq!(signals[0], RawSignal::FullscreenChanged { active: false });
        assert_eq!(signals[1], RawSignal::VisibilityChanged { visible: false });
        assert_eq!(signals[2], RawSignal::Clipboard(ClipboardAction::Paste));
        assert_eq!(signals[3], RawSignal::ContextMenu);
        assert_eq!(
            signals[4],
            RawSignal::KeyPressed(KeyCombo::new("I").ctrl().shift())
        );
        assert!(matches!(signals[5], RawSignal::Resized(m) if m.outer_width == 1400));
        assert_eq!(signals[6], RawSignal::DomMutation { added_nodes: 3 });
    }

    #[test]
    fn malformed_entries_do_not_drop_the_rest_of_the_batch() {
        let batch = vec![
            serde_json::json!({ "type": "fullscreen", "active": false }),
            serde_json::json!({ "type": "key", "ctrl": true }),
            serde_json::json!("junk"),
            serde_json::json!({ "type": "teleport" }),
            serde_json::json!({ "type": "visibility", "visible": false }),
        ];
        let signals = decode_batch(batch);
        assert_eq!(
            signals,
            vec![
                RawSignal::FullscreenChanged { active: false },
                RawSignal::VisibilityChanged { visible: false },
            ]
        );
    }

    #[test]
    fn missing_bridge_decodes_as_none() {
        let drained: Option<Vec<JsonValue>> = serde_json::from_value(JsonValue::Null).unwrap();
        assert!(drained.is_none());
    }

    #[test]
    fn snapshot_json_matches_probe_shape() {
        let raw = serde_json::json!({
            "page_origin": "https://exam.example.com",
            "resource_urls": ["chrome-extension://abc/content.js"],
            "matched_selectors": [],
            "present_globals": [],
            "message_origins": [],
            "viewport": { "outer_width": 1, "outer_height": 2, "inner_width": 1, "inner_height": 2 }
        });
        let snapshot: PageSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.resource_urls.len(), 1);
        assert!(snapshot.viewport.is_some());
    }
}
