use crate::models::exam::ExamManifest;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载考试清单
pub async fn load_exam_manifest(toml_file_path: &Path) -> Result<ExamManifest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取考试清单: {}", toml_file_path.display()))?;

    let mut manifest = parse_exam_manifest(&content)
        .with_context(|| format!("无法解析考试清单: {}", toml_file_path.display()))?;

    // 设置文件路径
    manifest.file_path = Some(toml_file_path.to_string_lossy().to_string());

    tracing::info!(
        "成功加载考试清单 {}，共 {} 道题目",
        manifest.exam_id,
        manifest.questions.len()
    );

    Ok(manifest)
}

/// 解析并校验考试清单内容
pub fn parse_exam_manifest(content: &str) -> Result<ExamManifest> {
    let manifest: ExamManifest = toml::from_str(content)?;

    if manifest.exam_id.trim().is_empty() {
        anyhow::bail!("考试ID不能为空");
    }
    if manifest.questions.is_empty() {
        anyhow::bail!("考试 {} 没有题目", manifest.exam_id);
    }

    let mut seen = HashSet::new();
    for question in &manifest.questions {
        if !seen.insert(question.question_id.as_str()) {
            anyhow::bail!("题目ID重复: {}", question.question_id);
        }
    }

    Ok(manifest)
}
