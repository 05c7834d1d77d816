use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{ExamManifest, OutcomeStatus, SweepSummary};

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。重复初始化时静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n考试会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, manifest: &ExamManifest) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 监考会话模式");
    info!("📝 考试: {} ({})", manifest.title, manifest.exam_id);
    info!("📋 题目数: {}", manifest.questions.len());
    info!("🚨 违规阈值: {}", config.violation_threshold);
    info!(
        "⏱️ 同步间隔: {}ms, 心跳间隔: {}ms",
        config.timings.sync_interval_ms, config.timings.heartbeat_interval_ms
    );
    info!("{}", "=".repeat(60));
}

/// 把交卷汇总追加到日志文件
pub fn append_sweep_summary(log_file_path: &str, summary: &SweepSummary) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    let mut lines = format!(
        "[{}] 考试 {} 交卷 (原因: {})\n",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S"),
        summary.exam_id,
        summary.reason
    );
    for outcome in &summary.outcomes {
        let status = match &outcome.status {
            OutcomeStatus::Succeeded => "成功".to_string(),
            OutcomeStatus::Skipped => "跳过".to_string(),
            OutcomeStatus::Failed { error } => format!("失败: {}", error),
        };
        lines.push_str(&format!("  题目 {} | {}\n", outcome.question_id, status));
    }

    file.write_all(lines.as_bytes())?;
    Ok(())
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 交卷汇总
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &SweepSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 交卷统计 (原因: {})", summary.reason);
    info!(
        "完成时间: {}",
        summary.finished_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded(), summary.outcomes.len());
    info!("⏭️ 跳过: {}", summary.skipped());
    info!("❌ 失败: {}", summary.failed());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubmissionOutcome, SubmitReason};
    use chrono::Utc;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("考试会话", 2), "考试...");
        assert_eq!(truncate_text("abc", 3), "abc");
    }

    #[test]
    fn sweep_summary_is_appended() {
        let path = std::env::temp_dir().join(format!("exam_guard_log_{}.txt", std::process::id()));
        let path_str = path.to_string_lossy().to_string();
        init_log_file(&path_str).unwrap();

        let summary = SweepSummary {
            exam_id: "e1".to_string(),
            reason: SubmitReason::TimeUp,
            outcomes: vec![
                SubmissionOutcome::succeeded("q1"),
                SubmissionOutcome::skipped("q2"),
                SubmissionOutcome::failed("q3", "超时"),
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        append_sweep_summary(&path_str, &summary).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("考试会话日志"));
        assert!(content.contains("原因: time_up"));
        assert!(content.contains("题目 q3 | 失败: 超时"));
        let _ = fs::remove_file(&path);
    }
}
