//! 自动交卷协调器 - 流程层
//!
//! 核心职责：把缓存中的答案逐题提交，单题失败不影响其余题目。
//!
//! 流程顺序：
//! 1. 单次执行保护（并发触发只产生一次扫描）
//! 2. 按清单顺序读取缓存 → 空白跳过 → 提交
//! 3. 汇总结果

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::clients::ExamApi;
use crate::models::{
    ExamManifest, ExamQuestion, Language, OutcomeStatus, SubmissionOutcome, SubmitReason,
    SubmitSolutionRequest, SweepSummary,
};
use crate::services::AnswerCache;

pub struct AutoSubmitCoordinator {
    manifest: Arc<ExamManifest>,
    api: Arc<dyn ExamApi>,
    cache: Arc<dyn AnswerCache>,
    started: AtomicBool,
    selected_languages: Mutex<HashMap<String, Language>>,
}

impl AutoSubmitCoordinator {
    pub fn new(
        manifest: Arc<ExamManifest>,
        api: Arc<dyn ExamApi>,
        cache: Arc<dyn AnswerCache>,
    ) -> Self {
        Self {
            manifest,
            api,
            cache,
            started: AtomicBool::new(false),
            selected_languages: Mutex::new(HashMap::new()),
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.manifest.exam_id
    }

    pub fn manifest(&self) -> &ExamManifest {
        &self.manifest
    }

    /// 记录编辑器当前选择的语言
    pub fn select_language(&self, question_id: &str, language: Language) {
        self.selected_languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(question_id.to_string(), language);
    }

    /// 最近一次选择的语言，否则题目语言，否则考试默认语言
    pub fn language_for(&self, question: &ExamQuestion) -> Language {
        let selected = self
            .selected_languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&question.question_id)
            .copied();
        selected.unwrap_or_else(|| self.manifest.language_for(question))
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// 重新允许交卷（会话进入 Submitted 后不应调用）
    pub fn clear(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    /// 交卷扫描；已有扫描时返回 `None`
    pub async fn submit_all(&self, reason: SubmitReason) -> Option<SweepSummary> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(
                "[考试 {}] 交卷已在进行中，忽略重复触发 (原因: {})",
                self.exam_id(),
                reason
            );
            return None;
        }

        let started_at = Utc::now();
        let total = self.manifest.questions.len();
        info!(
            "[考试 {}] 📤 开始交卷 (原因: {})，共 {} 题",
            self.exam_id(),
            reason,
            total
        );

        let mut outcomes = Vec::with_capacity(total);
        for (index, question) in self.manifest.questions.iter().enumerate() {
            let outcome = self.submit_one(question).await;
            match &outcome.status {
                OutcomeStatus::Succeeded => {
                    info!("  [{}/{}] ✓ {} 已提交", index + 1, total, question.question_id)
                }
                OutcomeStatus::Skipped => {
                    info!("  [{}/{}] ⏭ {} 无答案，跳过", index + 1, total, question.question_id)
                }
                OutcomeStatus::Failed { error } => error!(
                    "  [{}/{}] ✗ {} 提交失败: {}",
                    index + 1,
                    total,
                    question.question_id,
                    error
                ),
            }
            outcomes.push(outcome);
        }

        let summary = SweepSummary {
            exam_id: self.exam_id().to_string(),
            reason,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "[考试 {}] 交卷结束: 成功 {} | 跳过 {} | 失败 {}",
            self.exam_id(),
            summary.succeeded(),
            summary.skipped(),
            summary.failed()
        );
        Some(summary)
    }

    async fn submit_one(&self, question: &ExamQuestion) -> SubmissionOutcome {
        let question_id = question.question_id.as_str();
        let language = self.language_for(question);

        let answer = match self.cache.get(self.exam_id(), question_id, language.id()) {
            Ok(Some(answer)) if !answer.is_blank() => answer,
            Ok(_) => return SubmissionOutcome::skipped(question_id),
            Err(e) => {
                warn!("读取缓存失败 ({}): {}", question_id, e);
                return SubmissionOutcome::failed(question_id, e.to_string());
            }
        };

        let request = SubmitSolutionRequest {
            exam_id: self.exam_id().to_string(),
            question_id: question_id.to_string(),
            source_code: answer.code,
            language_id: language.id(),
        };

        match self.api.submit_solution(&request).await {
            Ok(response) if response.success => SubmissionOutcome::succeeded(question_id),
            Ok(response) => SubmissionOutcome::failed(
                question_id,
                response
                    .message
                    .unwrap_or_else(|| "服务端拒绝了提交".to_string()),
            ),
            Err(e) => SubmissionOutcome::failed(question_id, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SavedAnswer;
    use crate::services::MemoryAnswerCache;
    use crate::testing::{manifest, MockExamApi};
    use std::time::Duration;

    fn coordinator(api: Arc<MockExamApi>, cache: Arc<MemoryAnswerCache>) -> AutoSubmitCoordinator {
        AutoSubmitCoordinator::new(Arc::new(manifest("exam-1", &["q1", "q2", "q3"])), api, cache)
    }

    #[tokio::test]
    async fn sweep_records_each_outcome_independently() {
        let api = Arc::new(MockExamApi::new().failing_submit("q3"));
        let cache = Arc::new(MemoryAnswerCache::default());
        cache.set(SavedAnswer::new("exam-1", "q1", 71, "print(1)")).unwrap();
        cache.set(SavedAnswer::new("exam-1", "q3", 71, "print(3)")).unwrap();

        let summary = coordinator(api.clone(), cache)
            .submit_all(SubmitReason::TimeUp)
            .await
            .unwrap();

        let statuses: Vec<_> = summary.outcomes.iter().map(|o| o.status.clone()).collect();
        assert_eq!(statuses[0], OutcomeStatus::Succeeded);
        assert_eq!(statuses[1], OutcomeStatus::Skipped);
        assert!(matches!(statuses[2], OutcomeStatus::Failed { .. }));
        assert_eq!(summary.reason, SubmitReason::TimeUp);
        assert_eq!(api.submissions().len(), 2);
    }

    #[tokio::test]
    async fn blank_answers_are_skipped() {
        let api = Arc::new(MockExamApi::new());
        let cache = Arc::new(MemoryAnswerCache::default());
        cache.set(SavedAnswer::new("exam-1", "q1", 71, "   \n")).unwrap();

        let summary = coordinator(api.clone(), cache)
            .submit_all(SubmitReason::UserRequested)
            .await
            .unwrap();
        assert_eq!(summary.skipped(), 3);
        assert!(api.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_triggers_produce_one_sweep() {
        let api = Arc::new(MockExamApi::new().with_submit_delay(Duration::from_millis(200)));
        let cache = Arc::new(MemoryAnswerCache::default());
        for q in ["q1", "q2", "q3"] {
            cache.set(SavedAnswer::new("exam-1", q, 71, "x = 1")).unwrap();
        }
        let coordinator = Arc::new(coordinator(api.clone(), cache));

        let a = tokio::spawn({
            let c = coordinator.clone();
            async move { c.submit_all(SubmitReason::TimeUp).await }
        });
        let b = tokio::spawn({
            let c = coordinator.clone();
            async move { c.submit_all(SubmitReason::ViolationThreshold).await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
        assert_eq!(api.submissions().len(), 3);
        assert!(coordinator.has_started());
        assert!(coordinator.submit_all(SubmitReason::UserRequested).await.is_none());
    }

    #[tokio::test]
    async fn clear_rearms_the_guard() {
        let api = Arc::new(MockExamApi::new());
        let coordinator = coordinator(api, Arc::new(MemoryAnswerCache::default()));
        assert!(coordinator.submit_all(SubmitReason::UserRequested).await.is_some());
        coordinator.clear();
        assert!(coordinator.submit_all(SubmitReason::UserRequested).await.is_some());
    }

    #[tokio::test]
    async fn submissions_use_the_selected_language() {
        let api = Arc::new(MockExamApi::new());
        let cache = Arc::new(MemoryAnswerCache::default());
        cache.set(SavedAnswer::new("exam-1", "q1", 71, "py")).unwrap();
        cache.set(SavedAnswer::new("exam-1", "q1", 54, "cpp")).unwrap();
        let coordinator = coordinator(api.clone(), cache);

        coordinator.select_language("q1", Language::Cpp);
        coordinator.submit_all(SubmitReason::UserRequested).await.unwrap();

        let submissions = api.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].language_id, 54);
        assert_eq!(submissions[0].source_code, "cpp");
    }

    #[test]
    fn language_falls_back_to_question_then_exam_default() {
        let mut manifest = manifest("exam-1", &["q1", "q2"]);
        manifest.questions[1].language = Some(Language::Rust);
        let coordinator = AutoSubmitCoordinator::new(
            Arc::new(manifest),
            Arc::new(MockExamApi::new()),
            Arc::new(MemoryAnswerCache::default()),
        );
        let q1 = coordinator.manifest().questions[0].clone();
        let q2 = coordinator.manifest().questions[1].clone();

        assert_eq!(coordinator.language_for(&q1), Language::Python);
        assert_eq!(coordinator.language_for(&q2), Language::Rust);
        coordinator.select_language("q2", Language::Go);
        assert_eq!(coordinator.language_for(&q2), Language::Go);
    }
}
