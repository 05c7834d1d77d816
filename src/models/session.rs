//! 考试会话数据模型
//!
//! `ExamSession` 由 SessionController 独占；其余类型是与权威服务端交换的记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Paused,
    Expired,
    Submitted,
}

impl SessionStatus {
    /// 会话是否处于进行中（计入违规、可被暂停或提交）
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }

    /// 是否允许进入 Submitted
    pub fn can_submit(self) -> bool {
        matches!(
            self,
            SessionStatus::Active | SessionStatus::Paused | SessionStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Expired => "expired",
            SessionStatus::Submitted => "submitted",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 考试会话
///
/// `remaining_seconds` 只能被权威响应设置，或由本地 tick 每次减 1，且下限为 0。
#[derive(Debug, Clone)]
pub struct ExamSession {
    pub exam_id: String,
    pub status: SessionStatus,
    remaining_seconds: u32,
    pub last_authoritative_sync_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn new(exam_id: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            status: SessionStatus::NotStarted,
            remaining_seconds: 0,
            last_authoritative_sync_at: None,
            started_at: None,
        }
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// 用权威值覆盖本地剩余时间（不做任何平滑），负值截断为 0
    pub fn apply_authoritative(&mut self, remaining_seconds: i64, at: DateTime<Utc>) -> u32 {
        self.remaining_seconds = clamp_seconds(remaining_seconds);
        self.last_authoritative_sync_at = Some(at);
        self.remaining_seconds
    }

    /// 本地倒计时一步
    pub fn tick(&mut self) -> u32 {
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.remaining_seconds
    }

    pub(crate) fn zero_out(&mut self) {
        self.remaining_seconds = 0;
    }
}

fn clamp_seconds(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// 客户端设备信息（开考时上报）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub client: String,
    pub platform: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    /// 采集本机信息
    pub fn detect(user_agent: Option<String>) -> Self {
        Self {
            client: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            user_agent,
        }
    }
}

/// `getSessionStatus` 响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatusResponse {
    pub has_session: bool,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub remaining_seconds: Option<i64>,
}

impl SessionStatusResponse {
    /// 权威方是否认定时间已到
    pub fn reports_expired(&self) -> bool {
        matches!(
            self.status,
            Some(SessionStatus::Expired) | Some(SessionStatus::Submitted)
        ) || self.remaining_seconds.is_some_and(|s| s <= 0)
    }
}

/// `startSession` 响应（恢复暂停的会话时同样使用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub remaining_seconds: i64,
}

impl StartSessionResponse {
    pub fn reports_expired(&self) -> bool {
        matches!(self.status, SessionStatus::Expired | SessionStatus::Submitted)
            || self.remaining_seconds <= 0
    }
}

/// `pauseSession` 响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PauseSessionResponse {
    pub remaining_seconds: i64,
}

/// 供 UI 渲染的会话快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub exam_id: String,
    pub status: SessionStatus,
    pub remaining_seconds: u32,
    pub violation_count: u32,
    pub violation_threshold: u32,
    pub fullscreen_blocked: bool,
    pub last_authoritative_sync_at: Option<DateTime<Utc>>,
}
