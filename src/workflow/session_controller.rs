//! 会话控制器 - 流程层
//!
//! 核心职责：考试会话的生命周期与时间校准
//!
//! 状态迁移：
//! - NotStarted --start--> Active（需先全屏）
//! - Active --隐藏/退出全屏--> Paused
//! - Paused --可见且全屏--> Active
//! - Active --倒计时归零/权威方判定过期--> Expired（立即以 time_up 交卷）
//! - {Active, Paused, Expired} --submit--> Submitted（终态）
//!
//! 控制器是单个任务，逐个处理事件。网络调用在独立任务中执行，完成后作为事件回到队列；
//! 每次迁移都会递增 epoch 并释放全部定时任务，旧 epoch 的回调一律忽略。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::ExamApi;
use crate::config::{Config, EngineTimings};
use crate::error::ApiError;
use crate::infrastructure::{Disposer, Schedules};
use crate::models::{
    ActivityKind, DeviceInfo, ExamSession, Language, SessionSnapshot, SessionStatus,
    SessionStatusResponse, StartSessionResponse, SubmitReason, SweepSummary, ViolationKind,
};
use crate::services::{
    is_devtools_shortcut, ExtensionDetector, IntegrityMonitor, Verdict, ViolationSink,
};
use crate::signals::{
    ClipboardAction, EnvironmentSignalSource, EnvironmentState, RawSignal, SignalSender,
};
use crate::workflow::auto_submit::AutoSubmitCoordinator;
use crate::workflow::events::{Command, ControllerEvent};
use crate::workflow::observer::ExamObserver;

/// 控制器参数
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub violation_threshold: u32,
    pub trusted_origins: Vec<String>,
    pub timings: EngineTimings,
    pub device: DeviceInfo,
    /// 违规日志中的页面名
    pub page: String,
}

impl ControllerOptions {
    pub fn from_config(config: &Config, device: DeviceInfo) -> Self {
        Self {
            violation_threshold: config.violation_threshold,
            trusted_origins: config.trusted_origins.clone(),
            timings: config.timings.clone(),
            device,
            page: "exam".to_string(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            violation_threshold: 3,
            trusted_origins: Vec::new(),
            timings: EngineTimings::default(),
            device: DeviceInfo::detect(None),
            page: "exam".to_string(),
        }
    }
}

/// UI 侧持有的句柄
///
/// 全部句柄被丢弃时控制器随之销毁。
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn start(&self) -> bool {
        self.send(Command::Start)
    }

    pub fn request_fullscreen(&self) -> bool {
        self.send(Command::RequestFullscreen)
    }

    pub fn select_language(&self, question_id: impl Into<String>, language: Language) -> bool {
        self.send(Command::SelectLanguage {
            question_id: question_id.into(),
            language,
        })
    }

    pub fn submit(&self) -> bool {
        self.send(Command::Submit)
    }

    pub fn teardown(&self) -> bool {
        self.send(Command::Teardown)
    }

    /// 当前快照
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// 订阅快照变化
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// 各类在途请求
#[derive(Debug, Default)]
struct InFlight {
    start: bool,
    resume: bool,
    sync: bool,
    scan: bool,
    fullscreen: bool,
}

pub struct SessionController {
    session: ExamSession,
    api: Arc<dyn ExamApi>,
    source: Arc<dyn EnvironmentSignalSource>,
    coordinator: Arc<AutoSubmitCoordinator>,
    observer: Arc<dyn ExamObserver>,
    monitor: IntegrityMonitor,
    detector: ExtensionDetector,
    timings: EngineTimings,
    device: DeviceInfo,

    env: EnvironmentState,
    fullscreen_blocked: bool,
    /// 倒计时归零时有同步在途，等待同步结果决定是否过期
    expiry_pending: bool,
    /// 用户点了开始但尚未全屏
    start_after_fullscreen: bool,
    in_flight: InFlight,

    epoch: u64,
    schedules: Schedules,
    subscription: Option<Disposer>,
    finished: bool,
    summary: Option<SweepSummary>,

    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        coordinator: Arc<AutoSubmitCoordinator>,
        api: Arc<dyn ExamApi>,
        source: Arc<dyn EnvironmentSignalSource>,
        sink: Arc<dyn ViolationSink>,
        observer: Arc<dyn ExamObserver>,
        options: ControllerOptions,
    ) -> (Self, SessionHandle) {
        let exam_id = coordinator.exam_id().to_string();
        let session = ExamSession::new(exam_id.clone());
        let monitor = IntegrityMonitor::new(
            exam_id,
            options.page,
            options.violation_threshold,
            options.timings.dedup_window(),
            sink,
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let initial = SessionSnapshot {
            exam_id: session.exam_id.clone(),
            status: session.status,
            remaining_seconds: session.remaining_seconds(),
            violation_count: 0,
            violation_threshold: options.violation_threshold,
            fullscreen_blocked: false,
            last_authoritative_sync_at: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let controller = Self {
            session,
            api,
            source,
            coordinator,
            observer,
            monitor,
            detector: ExtensionDetector::new(options.trusted_origins),
            timings: options.timings,
            device: options.device,
            env: EnvironmentState::default(),
            fullscreen_blocked: false,
            expiry_pending: false,
            start_after_fullscreen: false,
            in_flight: InFlight::default(),
            epoch: 0,
            schedules: Schedules::new(),
            subscription: None,
            finished: false,
            summary: None,
            events_tx,
            events_rx,
            commands_rx,
            snapshot_tx,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };
        (controller, handle)
    }

    fn exam_id(&self) -> &str {
        &self.session.exam_id
    }

    /// 运行到交卷完成或被销毁；交卷完成时返回汇总
    pub async fn run(mut self) -> Option<SweepSummary> {
        info!("[考试 {}] 会话控制器启动", self.exam_id());

        let sender = SignalSender::new(self.events_tx.clone());
        match self.source.subscribe(sender).await {
            Ok(disposer) => self.subscription = Some(disposer),
            Err(e) => warn!("[考试 {}] 信号订阅失败（按无信号处理）: {}", self.exam_id(), e),
        }
        match self.source.current_state().await {
            Ok(state) => self.env = state,
            Err(e) => debug!("读取环境状态失败，使用默认值: {}", e),
        }

        self.check_entry();
        self.publish();

        while !self.finished {
            tokio::select! {
                command = self.commands_rx.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("[考试 {}] 所有句柄已释放", self.exam_id());
                        self.finished = true;
                    }
                },
                Some(event) = self.events_rx.recv() => self.on_event(event),
            }
            self.publish();
        }

        self.shutdown();
        info!(
            "[考试 {}] 会话控制器结束 (状态: {})",
            self.exam_id(),
            self.session.status
        );
        self.summary.take()
    }

    // ========== 命令 ==========

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::RequestFullscreen => {
                if self.env.fullscreen {
                    self.maybe_resume();
                } else {
                    self.request_fullscreen();
                }
            }
            Command::SelectLanguage {
                question_id,
                language,
            } => self.coordinator.select_language(&question_id, language),
            Command::Submit => self.submit(SubmitReason::UserRequested),
            Command::Teardown => {
                info!("[考试 {}] 收到销毁命令", self.exam_id());
                self.finished = true;
            }
        }
    }

    fn start(&mut self) {
        if self.session.status != SessionStatus::NotStarted {
            debug!("会话已开始，忽略开始命令 (状态: {})", self.session.status);
            return;
        }
        if self.in_flight.start {
            return;
        }
        if !self.env.fullscreen {
            info!("[考试 {}] 开考前需要进入全屏", self.exam_id());
            self.start_after_fullscreen = true;
            self.request_fullscreen();
            return;
        }

        self.start_after_fullscreen = false;
        self.in_flight.start = true;
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        let device = self.device.clone();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.start_session(&exam_id, &device).await;
            ControllerEvent::Started { epoch, result }
        });
    }

    fn submit(&mut self, reason: SubmitReason) {
        if !self.session.status.can_submit() {
            debug!(
                "当前状态 {} 不允许交卷 (原因: {})",
                self.session.status, reason
            );
            return;
        }

        info!("[考试 {}] 交卷 (原因: {})", self.exam_id(), reason);
        self.transition(SessionStatus::Submitted);
        self.release_subscription();

        let coordinator = Arc::clone(&self.coordinator);
        self.spawn_call(async move {
            ControllerEvent::SweepFinished(coordinator.submit_all(reason).await)
        });
    }

    fn expire(&mut self) {
        if matches!(
            self.session.status,
            SessionStatus::Expired | SessionStatus::Submitted
        ) {
            return;
        }
        warn!("[考试 {}] ⏰ 考试时间已到", self.exam_id());
        self.session.zero_out();
        self.transition(SessionStatus::Expired);
        self.submit(SubmitReason::TimeUp);
    }

    // ========== 事件 ==========

    fn on_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Signal(signal) => self.on_signal(signal),

            ControllerEvent::Tick { epoch } => {
                if self.is_current(epoch, SessionStatus::Active) {
                    self.on_tick();
                }
            }
            ControllerEvent::SyncDue { epoch } => {
                if self.is_current(epoch, SessionStatus::Active) {
                    self.sync_with_authority();
                }
            }
            ControllerEvent::HeartbeatDue { epoch } => {
                if self.is_current(epoch, SessionStatus::Active) {
                    self.heartbeat();
                }
            }
            ControllerEvent::ScanDue { epoch } => {
                if epoch == self.epoch && self.session.status.is_live() {
                    self.scan_extensions();
                }
            }
            ControllerEvent::FullscreenRetryDue { epoch } => {
                if self.is_current(epoch, SessionStatus::Paused) && !self.env.fullscreen {
                    self.request_fullscreen();
                }
            }

            ControllerEvent::EntryChecked(result) => self.on_entry_checked(result),
            ControllerEvent::Started { epoch, result } => {
                self.in_flight.start = false;
                if epoch == self.epoch && self.session.status == SessionStatus::NotStarted {
                    self.on_started(result);
                }
            }
            ControllerEvent::Resumed { epoch, result } => {
                if self.is_current(epoch, SessionStatus::Paused) {
                    self.in_flight.resume = false;
                    self.on_resumed(result);
                }
            }
            ControllerEvent::PauseAcked { epoch, result } => {
                if !self.is_current(epoch, SessionStatus::Paused) {
                    return;
                }
                match result {
                    Ok(response) => {
                        self.session
                            .apply_authoritative(response.remaining_seconds, Utc::now());
                        if response.remaining_seconds <= 0 {
                            self.expire();
                        }
                    }
                    Err(e) => warn!("[考试 {}] 暂停上报失败: {}", self.exam_id(), e),
                }
            }
            ControllerEvent::Synced { epoch, result } => {
                if self.is_current(epoch, SessionStatus::Active) {
                    self.in_flight.sync = false;
                    self.on_synced(result);
                }
            }
            ControllerEvent::HeartbeatAcked { epoch, result } => {
                if !self.is_current(epoch, SessionStatus::Active) {
                    return;
                }
                match result {
                    Ok(()) => self.sync_with_authority(),
                    Err(e) => warn!("[考试 {}] 心跳失败: {}", self.exam_id(), e),
                }
            }
            ControllerEvent::FullscreenResult { granted } => {
                self.in_flight.fullscreen = false;
                self.on_fullscreen_result(granted);
            }
            ControllerEvent::ScanCompleted(result) => {
                self.in_flight.scan = false;
                if !self.session.status.is_live() {
                    return;
                }
                match result {
                    Ok(snapshot) => {
                        for finding in self.detector.inspect(&snapshot) {
                            self.report(finding.kind, finding.details);
                        }
                    }
                    Err(e) => debug!("扩展检测失败（按无信号处理）: {}", e),
                }
            }
            ControllerEvent::SweepFinished(summary) => {
                if let Some(summary) = &summary {
                    self.observer.on_sweep_complete(summary);
                }
                self.observer.navigate_away();
                self.summary = summary;
                self.finished = true;
            }
        }
    }

    fn is_current(&self, epoch: u64, status: SessionStatus) -> bool {
        epoch == self.epoch && self.session.status == status
    }

    fn check_entry(&mut self) {
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        self.spawn_call(async move {
            ControllerEvent::EntryChecked(api.get_session_status(&exam_id).await)
        });
    }

    fn on_entry_checked(&mut self, result: Result<SessionStatusResponse, ApiError>) {
        if self.session.status != SessionStatus::NotStarted {
            return;
        }
        match result {
            Ok(response) if response.has_session && response.reports_expired() => {
                info!(
                    "[考试 {}] 权威方报告会话已过期，恢复缓存答案并交卷",
                    self.exam_id()
                );
                self.expire();
            }
            Ok(response) => {
                if let Some(remaining) = response.remaining_seconds {
                    self.session.apply_authoritative(remaining, Utc::now());
                }
                debug!(
                    "[考试 {}] 入场检查: has_session={}, 剩余 {}s",
                    self.exam_id(),
                    response.has_session,
                    self.session.remaining_seconds()
                );
            }
            Err(e) => warn!("[考试 {}] 入场检查失败: {}", self.exam_id(), e),
        }
    }

    fn on_started(&mut self, result: Result<StartSessionResponse, ApiError>) {
        match result {
            Ok(response) if response.reports_expired() => {
                info!("[考试 {}] 开考时权威方报告已无剩余时间", self.exam_id());
                self.expire();
            }
            Ok(response) => {
                let now = Utc::now();
                self.session
                    .apply_authoritative(response.remaining_seconds, now);
                self.session.started_at = Some(now);
                info!(
                    "[考试 {}] ▶️ 考试开始 (会话 {}, 剩余 {}s)",
                    self.exam_id(),
                    response.session_id,
                    self.session.remaining_seconds()
                );
                self.transition(SessionStatus::Active);
            }
            Err(e) => warn!("[考试 {}] 开考失败，请重试: {}", self.exam_id(), e),
        }
    }

    fn on_resumed(&mut self, result: Result<StartSessionResponse, ApiError>) {
        match result {
            Ok(response) if response.reports_expired() => self.expire(),
            Ok(response) => {
                self.session
                    .apply_authoritative(response.remaining_seconds, Utc::now());
                info!(
                    "[考试 {}] ▶️ 恢复作答 (剩余 {}s)",
                    self.exam_id(),
                    self.session.remaining_seconds()
                );
                self.transition(SessionStatus::Active);
            }
            Err(e) => warn!("[考试 {}] 恢复失败，保持暂停: {}", self.exam_id(), e),
        }
    }

    fn on_tick(&mut self) {
        if self.session.tick() > 0 {
            return;
        }
        if self.in_flight.sync {
            debug!("[考试 {}] 本地倒计时归零，等待在途同步结果", self.exam_id());
            self.expiry_pending = true;
        } else {
            self.expire();
        }
    }

    fn on_synced(&mut self, result: Result<SessionStatusResponse, ApiError>) {
        let pending = std::mem::take(&mut self.expiry_pending);
        match result {
            Ok(response) if response.reports_expired() => self.expire(),
            Ok(response) => match response.remaining_seconds {
                Some(remaining) => {
                    let applied = self.session.apply_authoritative(remaining, Utc::now());
                    debug!("[考试 {}] 时间同步: 剩余 {}s", self.exam_id(), applied);
                }
                None if pending => self.expire(),
                None => debug!("[考试 {}] 同步响应未携带剩余时间", self.exam_id()),
            },
            Err(e) => {
                warn!(
                    "[考试 {}] 时间同步失败，保留本地值 {}s: {}",
                    self.exam_id(),
                    self.session.remaining_seconds(),
                    e
                );
                if pending {
                    self.expire();
                }
            }
        }
    }

    // ========== 网络 ==========

    fn sync_with_authority(&mut self) {
        if self.in_flight.sync {
            return;
        }
        self.in_flight.sync = true;
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.get_session_status(&exam_id).await;
            ControllerEvent::Synced { epoch, result }
        });
    }

    fn heartbeat(&mut self) {
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.update_activity(&exam_id).await;
            ControllerEvent::HeartbeatAcked { epoch, result }
        });
    }

    fn pause(&mut self, cause: &str) {
        info!("[考试 {}] ⏸ 暂停作答 ({})", self.exam_id(), cause);
        self.transition(SessionStatus::Paused);
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.pause_session(&exam_id).await;
            ControllerEvent::PauseAcked { epoch, result }
        });
    }

    /// 可见且全屏时恢复
    fn maybe_resume(&mut self) {
        if self.session.status != SessionStatus::Paused || self.in_flight.resume {
            return;
        }
        if !(self.env.visible && self.env.fullscreen) {
            return;
        }
        self.in_flight.resume = true;
        let api = Arc::clone(&self.api);
        let exam_id = self.exam_id().to_string();
        let device = self.device.clone();
        let epoch = self.epoch;
        self.spawn_call(async move {
            let result = api.start_session(&exam_id, &device).await;
            ControllerEvent::Resumed { epoch, result }
        });
    }

    fn request_fullscreen(&mut self) {
        if self.in_flight.fullscreen {
            return;
        }
        self.in_flight.fullscreen = true;
        let source = Arc::clone(&self.source);
        self.spawn_call(async move {
            ControllerEvent::FullscreenResult {
                granted: source.request_fullscreen().await,
            }
        });
    }

    fn on_fullscreen_result(&mut self, granted: bool) {
        if granted {
            self.on_fullscreen_changed(true);
            return;
        }
        if !self.fullscreen_blocked {
            warn!("[考试 {}] 全屏请求被拒绝", self.exam_id());
        }
        self.fullscreen_blocked = true;
        self.start_after_fullscreen = false;
        self.observer.on_fullscreen_blocked();
    }

    fn scan_extensions(&mut self) {
        if self.in_flight.scan || self.detector.is_exhausted() {
            return;
        }
        self.in_flight.scan = true;
        let source = Arc::clone(&self.source);
        self.spawn_call(async move {
            let probe = ExtensionDetector::probe_spec();
            ControllerEvent::ScanCompleted(source.snapshot(&probe).await)
        });
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = ControllerEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }

    // ========== 信号 ==========

    fn on_signal(&mut self, signal: RawSignal) {
        match signal {
            RawSignal::FullscreenChanged { active } => self.on_fullscreen_changed(active),
            RawSignal::VisibilityChanged { visible } => {
                self.env.visible = visible;
                if visible {
                    self.note_activity(ActivityKind::VisibilityVisible);
                    if self.session.status == SessionStatus::Paused && !self.env.fullscreen {
                        self.schedule_fullscreen_retry();
                    }
                    self.maybe_resume();
                } else {
                    self.report(ViolationKind::VisibilityHidden, Map::new());
                    if self.session.status == SessionStatus::Active {
                        self.pause("页面被隐藏");
                    }
                }
            }
            RawSignal::FocusChanged { focused } => {
                if focused {
                    self.note_activity(ActivityKind::WindowFocus);
                } else {
                    self.report(ViolationKind::WindowBlur, Map::new());
                }
            }
            RawSignal::PageLifecycle { shown } => {
                if shown {
                    self.note_activity(ActivityKind::PageShow);
                } else {
                    self.report(ViolationKind::PageHide, Map::new());
                }
            }
            RawSignal::Clipboard(action) => {
                let kind = match action {
                    ClipboardAction::Copy => ViolationKind::Copy,
                    ClipboardAction::Cut => ViolationKind::Cut,
                    ClipboardAction::Paste => ViolationKind::Paste,
                };
                self.report(kind, Map::new());
            }
            RawSignal::ContextMenu => self.report(ViolationKind::ContextMenu, Map::new()),
            RawSignal::KeyPressed(combo) => {
                if is_devtools_shortcut(&combo) {
                    let details = details(json!({ "key": combo.to_string() }));
                    self.report(ViolationKind::DisallowedShortcut, details);
                }
            }
            RawSignal::Resized(metrics) => {
                if !self.session.status.is_live() {
                    return;
                }
                if let Some(finding) = self.detector.check_viewport(&metrics) {
                    self.report(finding.kind, finding.details);
                }
            }
            RawSignal::DomMutation { added_nodes } => {
                if self.session.status.is_live() && added_nodes > 0 {
                    self.scan_extensions();
                }
            }
        }
    }

    fn on_fullscreen_changed(&mut self, active: bool) {
        let was_fullscreen = std::mem::replace(&mut self.env.fullscreen, active);

        if active {
            self.fullscreen_blocked = false;
            if !was_fullscreen {
                self.note_activity(ActivityKind::FullscreenEnter);
            }
            if self.start_after_fullscreen {
                self.start();
            } else {
                self.maybe_resume();
            }
            return;
        }

        if !was_fullscreen {
            return;
        }
        self.report(ViolationKind::FullscreenExit, Map::new());
        if self.session.status == SessionStatus::Active {
            self.pause("退出全屏");
            self.schedule_fullscreen_retry();
        }
    }

    fn schedule_fullscreen_retry(&mut self) {
        let delay: Duration = self.timings.fullscreen_retry_delay();
        let epoch = self.epoch;
        self.schedules.after(
            delay,
            self.events_tx.clone(),
            ControllerEvent::FullscreenRetryDue { epoch },
        );
    }

    /// 只在会话进行中计入违规
    fn report(&mut self, kind: ViolationKind, details: Map<String, JsonValue>) {
        if !self.session.status.is_live() {
            debug!("会话未在进行中，忽略信号: {}", kind);
            return;
        }
        match self.monitor.report(kind, details, Instant::now()) {
            Verdict::Dropped => {}
            Verdict::Counted { event, count } => self.observer.on_violation(&event, count),
            Verdict::Escalated { event, count } => {
                self.observer.on_violation(&event, count);
                self.observer.on_escalation(count);
                self.submit(SubmitReason::ViolationThreshold);
            }
        }
    }

    fn note_activity(&self, kind: ActivityKind) {
        if self.session.status.is_live() {
            self.monitor.note_activity(kind, Map::new());
        }
    }

    // ========== 迁移与资源 ==========

    /// 递增 epoch，释放全部定时任务后按新状态重建
    fn transition(&mut self, next: SessionStatus) {
        let previous = self.session.status;
        self.epoch += 1;
        self.schedules.dispose_all();
        self.expiry_pending = false;
        self.in_flight.sync = false;
        self.in_flight.resume = false;
        self.session.status = next;
        debug!(
            "[考试 {}] 状态迁移 {} -> {} (epoch {})",
            self.exam_id(),
            previous,
            next,
            self.epoch
        );

        let epoch = self.epoch;
        let tx = self.events_tx.clone();
        match next {
            SessionStatus::Active => {
                let tick = self.timings.tick();
                self.schedules
                    .every(tick, tick, tx.clone(), move || ControllerEvent::Tick { epoch });
                self.schedules.every(
                    Duration::ZERO,
                    self.timings.sync_interval(),
                    tx.clone(),
                    move || ControllerEvent::SyncDue { epoch },
                );
                let heartbeat = self.timings.heartbeat_interval();
                self.schedules.every(heartbeat, heartbeat, tx.clone(), move || {
                    ControllerEvent::HeartbeatDue { epoch }
                });
                self.schedules.every(
                    Duration::ZERO,
                    self.timings.extension_scan_interval(),
                    tx,
                    move || ControllerEvent::ScanDue { epoch },
                );
            }
            SessionStatus::Paused => {
                self.schedules.every(
                    self.timings.extension_scan_interval(),
                    self.timings.extension_scan_interval(),
                    tx,
                    move || ControllerEvent::ScanDue { epoch },
                );
            }
            SessionStatus::NotStarted | SessionStatus::Expired | SessionStatus::Submitted => {}
        }
    }

    fn release_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.dispose();
        }
    }

    fn shutdown(&mut self) {
        self.epoch += 1;
        self.schedules.dispose_all();
        self.release_subscription();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            exam_id: self.session.exam_id.clone(),
            status: self.session.status,
            remaining_seconds: self.session.remaining_seconds(),
            violation_count: self.monitor.count(),
            violation_threshold: self.monitor.ledger().threshold(),
            fullscreen_blocked: self.fullscreen_blocked,
            last_authoritative_sync_at: self.session.last_authoritative_sync_at,
        }
    }

    /// 快照变化时通知 UI
    fn publish(&self) {
        let snapshot = self.snapshot();
        if *self.snapshot_tx.borrow() == snapshot {
            return;
        }
        self.observer.on_snapshot(&snapshot);
        self.snapshot_tx.send_replace(snapshot);
    }
}

fn details(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}
