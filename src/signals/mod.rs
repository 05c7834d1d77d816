//! 环境信号源
//!
//! 全屏、可见性、焦点、剪贴板、快捷键、DOM 变化等信号都由外部环境产生，
//! 引擎只消费通知。浏览器之外的宿主（原生壳）可使用 `NoopSignalSource`。

pub mod browser_source;
pub mod noop_source;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::ProbeError;
use crate::infrastructure::Disposer;
use crate::workflow::events::ControllerEvent;

pub use browser_source::BrowserSignalSource;
pub use noop_source::NoopSignalSource;

/// 剪贴板动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// 一次按键组合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    /// `KeyboardEvent.key`
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.meta {
            parts.push("Meta");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(&self.key);
        write!(f, "{}", parts.join("+"))
    }
}

/// 窗口尺寸（外框 vs 视口）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportMetrics {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
}

/// 原始环境信号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSignal {
    FullscreenChanged { active: bool },
    VisibilityChanged { visible: bool },
    FocusChanged { focused: bool },
    PageLifecycle { shown: bool },
    Clipboard(ClipboardAction),
    ContextMenu,
    KeyPressed(KeyCombo),
    Resized(ViewportMetrics),
    /// 一批 DOM 变化
    DomMutation { added_nodes: u32 },
}

/// 页面快照，供扩展检测启发式使用
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// `location.origin`
    #[serde(default)]
    pub page_origin: String,
    /// 页面中 script/link/iframe 引用的 URL
    #[serde(default)]
    pub resource_urls: Vec<String>,
    /// 命中的 CSS 指纹选择器
    #[serde(default)]
    pub matched_selectors: Vec<String>,
    /// 存在的可疑全局变量
    #[serde(default)]
    pub present_globals: Vec<String>,
    /// 监听到的跨上下文消息来源
    #[serde(default)]
    pub message_origins: Vec<String>,
    #[serde(default)]
    pub viewport: Option<ViewportMetrics>,
}

/// 当前环境状态（引擎启动时读取一次，之后由信号维护）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub fullscreen: bool,
    pub visible: bool,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            fullscreen: false,
            visible: true,
        }
    }
}

/// 信号投递端
///
/// 包装控制器的事件通道，信号源只能投递 `RawSignal`。
#[derive(Clone)]
pub struct SignalSender {
    tx: UnboundedSender<ControllerEvent>,
}

impl SignalSender {
    pub(crate) fn new(tx: UnboundedSender<ControllerEvent>) -> Self {
        Self { tx }
    }

    /// 控制器已销毁时返回 false
    pub fn send(&self, signal: RawSignal) -> bool {
        self.tx.send(ControllerEvent::Signal(signal)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 环境信号源
#[async_trait]
pub trait EnvironmentSignalSource: Send + Sync {
    /// 开始投递信号，返回的释放器负责取消订阅
    async fn subscribe(&self, sender: SignalSender) -> Result<Disposer, ProbeError>;

    /// 读取当前全屏/可见状态
    async fn current_state(&self) -> Result<EnvironmentState, ProbeError>;

    /// 请求进入全屏；被平台拒绝时返回 false
    async fn request_fullscreen(&self) -> bool;

    /// 采集页面快照
    async fn snapshot(&self, probe: &ProbeSpec) -> Result<PageSnapshot, ProbeError>;
}

/// 快照需要探测的指纹列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSpec {
    pub selectors: Vec<String>,
    pub globals: Vec<String>,
}
