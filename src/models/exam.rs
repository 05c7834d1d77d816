use serde::{Deserialize, Serialize};

use crate::models::language::{deserialize_language, deserialize_optional_language, Language};

/// 考试清单中的一道题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub question_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// 题目指定的语言，缺省时使用考试默认语言
    #[serde(default, deserialize_with = "deserialize_optional_language")]
    pub language: Option<Language>,
}

/// 考试清单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamManifest {
    pub exam_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "deserialize_language")]
    pub default_language: Language,
    /// 题目按交卷顺序排列
    pub questions: Vec<ExamQuestion>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl ExamManifest {
    /// 题目自身的语言，否则为考试默认语言
    pub fn language_for(&self, question: &ExamQuestion) -> Language {
        question.language.unwrap_or(self.default_language)
    }

    pub fn question(&self, question_id: &str) -> Option<&ExamQuestion> {
        self.questions.iter().find(|q| q.question_id == question_id)
    }
}
