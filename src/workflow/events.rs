//! 控制器事件
//!
//! 控制器是单个任务，所有输入（用户命令、环境信号、定时器、网络回调）都化为事件逐个处理。
//! 带 `epoch` 的事件在控制器发生状态迁移后自动失效。

use crate::error::{ApiError, ProbeError};
use crate::models::{
    Language, PauseSessionResponse, SessionStatusResponse, StartSessionResponse, SweepSummary,
};
use crate::signals::{PageSnapshot, RawSignal};

/// 来自 UI 的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// 用户显式重试全屏
    RequestFullscreen,
    SelectLanguage {
        question_id: String,
        language: Language,
    },
    Submit,
    Teardown,
}

/// 控制器内部事件
#[derive(Debug)]
pub enum ControllerEvent {
    Signal(RawSignal),

    Tick { epoch: u64 },
    SyncDue { epoch: u64 },
    HeartbeatDue { epoch: u64 },
    ScanDue { epoch: u64 },
    FullscreenRetryDue { epoch: u64 },

    EntryChecked(Result<SessionStatusResponse, ApiError>),
    Started {
        epoch: u64,
        result: Result<StartSessionResponse, ApiError>,
    },
    Resumed {
        epoch: u64,
        result: Result<StartSessionResponse, ApiError>,
    },
    PauseAcked {
        epoch: u64,
        result: Result<PauseSessionResponse, ApiError>,
    },
    Synced {
        epoch: u64,
        result: Result<SessionStatusResponse, ApiError>,
    },
    HeartbeatAcked {
        epoch: u64,
        result: Result<(), ApiError>,
    },
    FullscreenResult { granted: bool },
    /// 快照描述的是页面而不是会话，不随 epoch 失效
    ScanCompleted(Result<PageSnapshot, ProbeError>),

    /// `None` 表示交卷已由别处发起
    SweepFinished(Option<SweepSummary>),
}
