/// 编程语言枚举
///
/// 数值即判题后端使用的 languageId。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Language {
    /// C (GCC)
    C = 50,
    /// C++ (G++)
    Cpp = 54,
    /// Java
    Java = 62,
    /// JavaScript (Node.js)
    JavaScript = 63,
    /// Python 3
    Python = 71,
    /// Rust
    Rust = 73,
    /// Go
    Go = 60,
}

impl Language {
    /// 获取语言 ID
    pub fn id(self) -> u32 {
        self as u32
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }

    /// 从语言 ID 解析
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            50 => Some(Language::C),
            54 => Some(Language::Cpp),
            62 => Some(Language::Java),
            63 => Some(Language::JavaScript),
            71 => Some(Language::Python),
            73 => Some(Language::Rust),
            60 => Some(Language::Go),
            _ => None,
        }
    }

    /// 从名称解析（忽略大小写，支持常见别名）
    pub fn find(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" => Some(Language::C),
            "cpp" | "c++" | "cxx" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            "python" | "python3" | "py" => Some(Language::Python),
            "rust" | "rs" => Some(Language::Rust),
            "go" | "golang" => Some(Language::Go),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 将语言反序列化为名称或 ID 均可
pub fn deserialize_language<'de, D>(deserializer: D) -> Result<Language, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_any(LanguageVisitor)
}

/// 可选语言字段的反序列化
pub fn deserialize_optional_language<'de, D>(deserializer: D) -> Result<Option<Language>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_any(LanguageVisitor).map(Some)
}

struct LanguageVisitor;

impl<'de> serde::de::Visitor<'de> for LanguageVisitor {
    type Value = Language;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a language name or numeric language id")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Language::find(value).ok_or_else(|| E::custom(format!("未知语言: {}", value)))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u32::try_from(value)
            .ok()
            .and_then(Language::from_id)
            .ok_or_else(|| E::custom(format!("未知语言ID: {}", value)))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u32::try_from(value)
            .ok()
            .and_then(Language::from_id)
            .ok_or_else(|| E::custom(format!("未知语言ID: {}", value)))
    }
}
