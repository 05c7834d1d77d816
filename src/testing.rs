//! 单元测试共用的替身实现

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::ExamApi;
use crate::error::{ApiError, ProbeError};
use crate::infrastructure::Disposer;
use crate::models::{
    DeviceInfo, ExamManifest, ExamQuestion, Language, LogEventRequest, PauseSessionResponse,
    SessionSnapshot, SessionStatus, SessionStatusResponse, StartSessionResponse,
    SubmitSolutionRequest, SubmitSolutionResponse, SweepSummary, ViolationEvent,
};
use crate::services::ViolationSink;
use crate::signals::{
    EnvironmentSignalSource, EnvironmentState, PageSnapshot, ProbeSpec, RawSignal, SignalSender,
};
use crate::workflow::ExamObserver;

pub fn manifest(exam_id: &str, question_ids: &[&str]) -> ExamManifest {
    ExamManifest {
        exam_id: exam_id.to_string(),
        title: "测试考试".to_string(),
        default_language: Language::Python,
        questions: question_ids
            .iter()
            .map(|id| ExamQuestion {
                question_id: id.to_string(),
                title: None,
                language: None,
            })
            .collect(),
        file_path: None,
    }
}

pub fn active(remaining_seconds: i64) -> SessionStatusResponse {
    SessionStatusResponse {
        has_session: true,
        status: Some(SessionStatus::Active),
        remaining_seconds: Some(remaining_seconds),
    }
}

pub fn expired() -> SessionStatusResponse {
    SessionStatusResponse {
        has_session: true,
        status: Some(SessionStatus::Expired),
        remaining_seconds: Some(0),
    }
}

pub fn no_session() -> SessionStatusResponse {
    SessionStatusResponse {
        has_session: false,
        status: None,
        remaining_seconds: None,
    }
}

pub fn started(remaining_seconds: i64) -> StartSessionResponse {
    StartSessionResponse {
        session_id: "session-1".to_string(),
        status: SessionStatus::Active,
        remaining_seconds,
    }
}

/// 脚本化回复；`Fail` 以空响应错误返回
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail,
}

impl<T: Clone> Reply<T> {
    fn resolve(&self, endpoint: &str) -> Result<T, ApiError> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Fail => Err(ApiError::EmptyResponse {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

pub struct MockExamApi {
    status_script: Mutex<VecDeque<Reply<SessionStatusResponse>>>,
    default_status: Reply<SessionStatusResponse>,
    status_delay: Duration,
    start_script: Mutex<VecDeque<Reply<StartSessionResponse>>>,
    default_start: Reply<StartSessionResponse>,
    pause_remaining: i64,
    failing_questions: HashSet<String>,
    submit_delay: Duration,
    calls: Mutex<Vec<&'static str>>,
    submissions: Mutex<Vec<SubmitSolutionRequest>>,
    logged: Mutex<Vec<LogEventRequest>>,
}

impl MockExamApi {
    pub fn new() -> Self {
        Self {
            status_script: Mutex::new(VecDeque::new()),
            default_status: Reply::Ok(active(600)),
            status_delay: Duration::ZERO,
            start_script: Mutex::new(VecDeque::new()),
            default_start: Reply::Ok(started(600)),
            pause_remaining: 600,
            failing_questions: HashSet::new(),
            submit_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            logged: Mutex::new(Vec::new()),
        }
    }

    /// 依次消费的状态回复，耗尽后使用默认回复
    pub fn with_status_script(self, replies: Vec<Reply<SessionStatusResponse>>) -> Self {
        *self.status_script.lock().unwrap() = replies.into();
        self
    }

    pub fn with_default_status(mut self, reply: Reply<SessionStatusResponse>) -> Self {
        self.default_status = reply;
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn with_start_script(self, replies: Vec<Reply<StartSessionResponse>>) -> Self {
        *self.start_script.lock().unwrap() = replies.into();
        self
    }

    pub fn with_default_start(mut self, reply: Reply<StartSessionResponse>) -> Self {
        self.default_start = reply;
        self
    }

    pub fn with_pause_remaining(mut self, remaining_seconds: i64) -> Self {
        self.pause_remaining = remaining_seconds;
        self
    }

    pub fn failing_submit(mut self, question_id: &str) -> Self {
        self.failing_questions.insert(question_id.to_string());
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn submissions(&self) -> Vec<SubmitSolutionRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn logged(&self) -> Vec<LogEventRequest> {
        self.logged.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl ExamApi for MockExamApi {
    async fn get_session_status(&self, _exam_id: &str) -> Result<SessionStatusResponse, ApiError> {
        self.record("get_session_status");
        let reply = self
            .status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_status.clone());
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        reply.resolve("session")
    }

    async fn start_session(
        &self,
        _exam_id: &str,
        _device: &DeviceInfo,
    ) -> Result<StartSessionResponse, ApiError> {
        self.record("start_session");
        let reply = self
            .start_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_start.clone());
        reply.resolve("session/start")
    }

    async fn pause_session(&self, _exam_id: &str) -> Result<PauseSessionResponse, ApiError> {
        self.record("pause_session");
        Ok(PauseSessionResponse {
            remaining_seconds: self.pause_remaining,
        })
    }

    async fn update_activity(&self, _exam_id: &str) -> Result<(), ApiError> {
        self.record("update_activity");
        Ok(())
    }

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<SubmitSolutionResponse, ApiError> {
        self.record("submit_solution");
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submissions.lock().unwrap().push(request.clone());
        if self.failing_questions.contains(&request.question_id) {
            return Ok(SubmitSolutionResponse {
                success: false,
                message: Some("编译错误".to_string()),
            });
        }
        Ok(SubmitSolutionResponse {
            success: true,
            message: None,
        })
    }

    async fn log_event(&self, event: &LogEventRequest) -> Result<(), ApiError> {
        self.record("log_event");
        self.logged.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEventRequest>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LogEventRequest> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl ViolationSink for RecordingSink {
    fn forward(&self, event: LogEventRequest) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub snapshots: Mutex<Vec<SessionSnapshot>>,
    pub violations: Mutex<Vec<ViolationEvent>>,
    pub escalations: AtomicUsize,
    pub blocked: AtomicUsize,
    pub sweeps: Mutex<Vec<SweepSummary>>,
    pub navigations: AtomicUsize,
}

impl RecordingObserver {
    pub fn escalations(&self) -> usize {
        self.escalations.load(Ordering::SeqCst)
    }

    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn sweeps(&self) -> Vec<SweepSummary> {
        self.sweeps.lock().unwrap().clone()
    }
}

impl ExamObserver for RecordingObserver {
    fn on_snapshot(&self, snapshot: &SessionSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn on_violation(&self, event: &ViolationEvent, _count: u32) {
        self.violations.lock().unwrap().push(event.clone());
    }

    fn on_escalation(&self, _count: u32) {
        self.escalations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fullscreen_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sweep_complete(&self, summary: &SweepSummary) {
        self.sweeps.lock().unwrap().push(summary.clone());
    }

    fn navigate_away(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// 可由测试注入信号的信号源
pub struct ScriptedSource {
    state: Mutex<EnvironmentState>,
    grant_fullscreen: AtomicBool,
    sender: Mutex<Option<SignalSender>>,
    fullscreen_requests: AtomicUsize,
    snapshot: Mutex<PageSnapshot>,
}

impl ScriptedSource {
    pub fn new(fullscreen: bool) -> Self {
        Self {
            state: Mutex::new(EnvironmentState {
                fullscreen,
                visible: true,
            }),
            grant_fullscreen: AtomicBool::new(true),
            sender: Mutex::new(None),
            fullscreen_requests: AtomicUsize::new(0),
            snapshot: Mutex::new(PageSnapshot::default()),
        }
    }

    pub fn set_grant_fullscreen(&self, grant: bool) {
        self.grant_fullscreen.store(grant, Ordering::SeqCst);
    }

    pub fn set_snapshot(&self, snapshot: PageSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn fullscreen_requests(&self) -> usize {
        self.fullscreen_requests.load(Ordering::SeqCst)
    }

    /// 投递一个信号；尚未订阅时返回 false
    pub fn emit(&self, signal: RawSignal) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.send(signal),
            None => false,
        }
    }
}

#[async_trait]
impl EnvironmentSignalSource for ScriptedSource {
    async fn subscribe(&self, sender: SignalSender) -> Result<Disposer, ProbeError> {
        *self.sender.lock().unwrap() = Some(sender);
        Ok(Disposer::noop())
    }

    async fn current_state(&self) -> Result<EnvironmentState, ProbeError> {
        Ok(*self.state.lock().unwrap())
    }

    async fn request_fullscreen(&self) -> bool {
        self.fullscreen_requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant_fullscreen.load(Ordering::SeqCst);
        if granted {
            self.state.lock().unwrap().fullscreen = true;
        }
        granted
    }

    async fn snapshot(&self, _probe: &ProbeSpec) -> Result<PageSnapshot, ProbeError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}
