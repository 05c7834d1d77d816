//! 扩展/开发者工具检测 - 业务能力层
//!
//! 纯启发式，只看快照和窗口尺寸，不接触页面。
//! 每条扩展启发式命中一次后不再参与判断；开发者工具检测按边沿触发。
//! 第一份快照中的外部来源视为页面自带（CDN、字体等），之后新出现的来源才算注入。

use std::collections::HashSet;
use std::sync::OnceLock;

use phf::phf_map;
use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::models::ViolationKind;
use crate::signals::{KeyCombo, PageSnapshot, ProbeSpec, ViewportMetrics};

/// 外框与视口差值超过该值视为开发者工具停靠打开
pub const DEVTOOLS_SIZE_DELTA: u32 = 160;

/// CSS 选择器 → 工具名
static SELECTOR_FINGERPRINTS: phf::Map<&'static str, &'static str> = phf_map! {
    "grammarly-desktop-integration" => "Grammarly",
    "[data-grammarly-shadow-root]" => "Grammarly",
    "#monica-content-root" => "Monica",
    "#merlin-root" => "Merlin",
    "#sider-quick-action-root" => "Sider",
    "[data-copilot-overlay]" => "Copilot",
};

/// 全局变量 → 工具名
static GLOBAL_FINGERPRINTS: phf::Map<&'static str, &'static str> = phf_map! {
    "__grammarlyGlobalSessionId" => "Grammarly",
    "__MONICA_EXTENSION__" => "Monica",
    "__merlinExtension" => "Merlin",
    "__SIDER_BRIDGE__" => "Sider",
};

fn extension_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(chrome-extension|moz-extension|safari-web-extension|ms-browser-extension)://",
            )
            .ok()
        })
        .as_ref()
}

fn is_extension_url(url: &str) -> bool {
    extension_url_pattern().is_some_and(|re| re.is_match(url))
}

/// `scheme://host[:port]`，非 http(s) 返回 None
fn origin_of(url: &str) -> Option<String> {
    let url = url.strip_prefix("blob:").unwrap_or(url);
    let (scheme, rest) = url.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, host.to_ascii_lowercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Heuristic {
    InjectedResource,
    ForeignOrigin,
    CssFingerprint,
    GlobalPollution,
    MessageSniffing,
}

impl Heuristic {
    fn as_str(self) -> &'static str {
        match self {
            Heuristic::InjectedResource => "injected_resource",
            Heuristic::ForeignOrigin => "foreign_origin",
            Heuristic::CssFingerprint => "css_fingerprint",
            Heuristic::GlobalPollution => "global_pollution",
            Heuristic::MessageSniffing => "message_sniffing",
        }
    }
}

/// 一次命中
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: ViolationKind,
    pub details: Map<String, JsonValue>,
}

impl Finding {
    fn new(kind: ViolationKind, details: JsonValue) -> Self {
        let details = match details {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self { kind, details }
    }
}

/// 扩展与开发者工具检测器
#[derive(Debug, Default)]
pub struct ExtensionDetector {
    trusted_origins: Vec<String>,
    /// 首次快照中页面自带的外部来源
    baseline_origins: Option<HashSet<String>>,
    fired: HashSet<Heuristic>,
    devtools_open: bool,
}

impl ExtensionDetector {
    pub fn new(trusted_origins: Vec<String>) -> Self {
        Self {
            trusted_origins: trusted_origins
                .into_iter()
                .map(|o| origin_of(&o).unwrap_or(o))
                .map(|o| o.trim_end_matches('/').to_ascii_lowercase())
                .collect(),
            baseline_origins: None,
            fired: HashSet::new(),
            devtools_open: false,
        }
    }

    /// 快照需要探测的选择器与全局变量
    pub fn probe_spec() -> ProbeSpec {
        let mut selectors: Vec<String> = SELECTOR_FINGERPRINTS
            .keys()
            .map(|s| s.to_string())
            .collect();
        let mut globals: Vec<String> = GLOBAL_FINGERPRINTS.keys().map(|s| s.to_string()).collect();
        selectors.sort();
        globals.sort();
        ProbeSpec { selectors, globals }
    }

    /// 所有扩展启发式都已命中，不必再采集快照
    pub fn is_exhausted(&self) -> bool {
        self.fired.len() == 5
    }

    /// 检查一份快照，返回本次新命中的结果
    pub fn inspect(&mut self, snapshot: &PageSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();

        if !self.fired.contains(&Heuristic::InjectedResource) {
            if let Some(url) = snapshot.resource_urls.iter().find(|u| is_extension_url(u)) {
                findings.push(self.fire(
                    Heuristic::InjectedResource,
                    ViolationKind::ExtensionSuspected,
                    json!({ "url": url }),
                ));
            }
        }

        if !self.fired.contains(&Heuristic::ForeignOrigin) {
            let foreign: Vec<String> = snapshot
                .resource_urls
                .iter()
                .filter_map(|u| origin_of(u))
                .filter(|origin| self.is_foreign(origin, &snapshot.page_origin))
                .collect();
            let first_scan = self.baseline_origins.is_none();
            let baseline = self.baseline_origins.get_or_insert_with(HashSet::new);
            let injected = if first_scan {
                debug!("记录页面自带的外部来源 {} 个", foreign.len());
                baseline.extend(foreign);
                None
            } else {
                foreign.into_iter().find(|origin| !baseline.contains(origin))
            };
            if let Some(origin) = injected {
                findings.push(self.fire(
                    Heuristic::ForeignOrigin,
                    ViolationKind::ExtensionSuspected,
                    json!({ "origin": origin }),
                ));
            }
        }

        if !self.fired.contains(&Heuristic::CssFingerprint) {
            let hit = snapshot
                .matched_selectors
                .iter()
                .find_map(|s| SELECTOR_FINGERPRINTS.get(s.as_str()).map(|tool| (s, *tool)));
            if let Some((selector, tool)) = hit {
                findings.push(self.fire(
                    Heuristic::CssFingerprint,
                    ViolationKind::NamedToolSuspected,
                    json!({ "tool": tool, "selector": selector }),
                ));
            }
        }

        if !self.fired.contains(&Heuristic::GlobalPollution) {
            let hit = snapshot
                .present_globals
                .iter()
                .find_map(|g| GLOBAL_FINGERPRINTS.get(g.as_str()).map(|tool| (g, *tool)));
            if let Some((global, tool)) = hit {
                findings.push(self.fire(
                    Heuristic::GlobalPollution,
                    ViolationKind::NamedToolSuspected,
                    json!({ "tool": tool, "global": global }),
                ));
            }
        }

        if !self.fired.contains(&Heuristic::MessageSniffing) {
            let sniffer = snapshot.message_origins.iter().find(|origin| {
                is_extension_url(origin)
                    || origin_of(origin).is_some_and(|o| self.is_foreign(&o, &snapshot.page_origin))
            });
            if let Some(origin) = sniffer {
                findings.push(self.fire(
                    Heuristic::MessageSniffing,
                    ViolationKind::ExtensionSuspected,
                    json!({ "message_origin": origin }),
                ));
            }
        }

        if let Some(viewport) = snapshot.viewport {
            findings.extend(self.check_viewport(&viewport));
        }

        findings
    }

    /// 开发者工具尺寸启发式：关闭→打开时命中一次，关闭后重新布防
    pub fn check_viewport(&mut self, metrics: &ViewportMetrics) -> Option<Finding> {
        let width_delta = metrics.outer_width.saturating_sub(metrics.inner_width);
        let height_delta = metrics.outer_height.saturating_sub(metrics.inner_height);
        let open = width_delta > DEVTOOLS_SIZE_DELTA || height_delta > DEVTOOLS_SIZE_DELTA;

        let was_open = std::mem::replace(&mut self.devtools_open, open);
        if open && !was_open {
            Some(Finding::new(
                ViolationKind::DevtoolsOpen,
                json!({ "width_delta": width_delta, "height_delta": height_delta }),
            ))
        } else {
            None
        }
    }

    fn is_foreign(&self, origin: &str, page_origin: &str) -> bool {
        let page = page_origin.trim_end_matches('/').to_ascii_lowercase();
        origin != page && !self.trusted_origins.iter().any(|t| t == origin)
    }

    fn fire(&mut self, heuristic: Heuristic, kind: ViolationKind, details: JsonValue) -> Finding {
        self.fired.insert(heuristic);
        debug!("扩展启发式命中: {} -> {}", heuristic.as_str(), kind);
        let mut finding = Finding::new(kind, details);
        finding
            .details
            .insert("heuristic".to_string(), json!(heuristic.as_str()));
        finding
    }
}

/// 打开开发者工具或查看源代码的快捷键
pub fn is_devtools_shortcut(combo: &KeyCombo) -> bool {
    let key = combo.key.to_ascii_uppercase();
    if key == "F12" {
        return true;
    }
    let inspector_key = matches!(key.as_str(), "I" | "J" | "C");
    if combo.ctrl && combo.shift && inspector_key {
        return true;
    }
    if combo.meta && combo.alt && (inspector_key || key == "U") {
        return true;
    }
    combo.ctrl && !combo.shift && !combo.alt && key == "U"
}
