use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 编辑器保存的答案（引擎只读）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedAnswer {
    pub exam_id: String,
    pub question_id: String,
    pub language_id: u32,
    pub code: String,
    pub saved_at: DateTime<Utc>,
}

impl SavedAnswer {
    pub fn new(
        exam_id: impl Into<String>,
        question_id: impl Into<String>,
        language_id: u32,
        code: impl Into<String>,
    ) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_id: question_id.into(),
            language_id,
            code: code.into(),
            saved_at: Utc::now(),
        }
    }

    /// 空白答案不提交
    pub fn is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// 交卷原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmitReason {
    #[serde(rename = "user")]
    UserRequested,
    #[serde(rename = "time_up")]
    TimeUp,
    #[serde(rename = "violations")]
    ViolationThreshold,
}

impl SubmitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitReason::UserRequested => "user",
            SubmitReason::TimeUp => "time_up",
            SubmitReason::ViolationThreshold => "violations",
        }
    }
}

impl std::fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `submitSolution` 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitSolutionRequest {
    pub exam_id: String,
    pub question_id: String,
    pub source_code: String,
    pub language_id: u32,
}

/// `submitSolution` 响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitSolutionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// 单题提交结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    /// 缓存中没有答案或答案为空
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub question_id: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl SubmissionOutcome {
    pub fn succeeded(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            status: OutcomeStatus::Succeeded,
        }
    }

    pub fn skipped(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            status: OutcomeStatus::Skipped,
        }
    }

    pub fn failed(question_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            status: OutcomeStatus::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

/// 一次交卷扫描的汇总
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub exam_id: String,
    pub reason: SubmitReason,
    pub outcomes: Vec<SubmissionOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}
