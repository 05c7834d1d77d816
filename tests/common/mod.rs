#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_guard::error::ApiError;
use exam_guard::models::{
    parse_exam_manifest, DeviceInfo, ExamManifest, LogEventRequest, PauseSessionResponse,
    SessionStatus, SessionStatusResponse, StartSessionResponse, SubmitSolutionRequest,
    SubmitSolutionResponse, SweepSummary,
};
use exam_guard::services::{AnswerCache, MemoryAnswerCache, ViolationSink};
use exam_guard::signals::NoopSignalSource;
use exam_guard::workflow::{
    AutoSubmitCoordinator, ControllerOptions, ExamObserver, SessionController, SessionHandle,
};
use exam_guard::ExamApi;

pub const MANIFEST: &str = r#"
exam_id = "final-2024"
title = "程序设计期末考试"
default_language = "python"

[[questions]]
question_id = "q1"

[[questions]]
question_id = "q2"

[[questions]]
question_id = "q3"
language = "cpp"
"#;

pub fn manifest() -> ExamManifest {
    parse_exam_manifest(MANIFEST).expect("样例清单应能解析")
}

pub fn status(status: SessionStatus, remaining_seconds: i64) -> SessionStatusResponse {
    SessionStatusResponse {
        has_session: true,
        status: Some(status),
        remaining_seconds: Some(remaining_seconds),
    }
}

/// 按脚本回复会话状态的考试服务
pub struct ScriptedApi {
    statuses: Mutex<VecDeque<SessionStatusResponse>>,
    fallback_status: SessionStatusResponse,
    start_remaining: i64,
    rejected: HashSet<String>,
    pub submissions: Mutex<Vec<SubmitSolutionRequest>>,
    pub status_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(statuses: Vec<SessionStatusResponse>, fallback_status: SessionStatusResponse) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            fallback_status,
            start_remaining: 600,
            rejected: HashSet::new(),
            submissions: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self, question_id: &str) -> Self {
        self.rejected.insert(question_id.to_string());
        self
    }

    pub fn submitted_questions(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.question_id.clone())
            .collect()
    }
}

#[async_trait]
impl ExamApi for ScriptedApi {
    async fn get_session_status(&self, _exam_id: &str) -> Result<SessionStatusResponse, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback_status.clone()))
    }

    async fn start_session(
        &self,
        _exam_id: &str,
        _device: &DeviceInfo,
    ) -> Result<StartSessionResponse, ApiError> {
        Ok(StartSessionResponse {
            session_id: "s-1".to_string(),
            status: SessionStatus::Active,
            remaining_seconds: self.start_remaining,
        })
    }

    async fn pause_session(&self, _exam_id: &str) -> Result<PauseSessionResponse, ApiError> {
        Ok(PauseSessionResponse {
            remaining_seconds: self.start_remaining,
        })
    }

    async fn update_activity(&self, _exam_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<SubmitSolutionResponse, ApiError> {
        self.submissions.lock().unwrap().push(request.clone());
        if self.rejected.contains(&request.question_id) {
            return Err(ApiError::bad_response("submissions", Some(500), None));
        }
        Ok(SubmitSolutionResponse {
            success: true,
            message: None,
        })
    }

    async fn log_event(&self, _event: &LogEventRequest) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingSink {
    pub forwarded: AtomicUsize,
}

impl ViolationSink for CountingSink {
    fn forward(&self, _event: LogEventRequest) {
        self.forwarded.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct SweepObserver {
    pub sweeps: Mutex<Vec<SweepSummary>>,
    pub navigations: AtomicUsize,
}

impl ExamObserver for SweepObserver {
    fn on_sweep_complete(&self, summary: &SweepSummary) {
        self.sweeps.lock().unwrap().push(summary.clone());
    }

    fn navigate_away(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// 用空信号源组装一套引擎
pub fn engine(
    api: Arc<ScriptedApi>,
    cache: Arc<MemoryAnswerCache>,
    observer: Arc<SweepObserver>,
) -> (SessionController, SessionHandle) {
    let cache: Arc<dyn AnswerCache> = cache;
    let coordinator = Arc::new(AutoSubmitCoordinator::new(
        Arc::new(manifest()),
        api.clone(),
        cache,
    ));
    SessionController::new(
        coordinator,
        api,
        Arc::new(NoopSignalSource),
        Arc::new(CountingSink::default()),
        observer,
        ControllerOptions::default(),
    )
}
