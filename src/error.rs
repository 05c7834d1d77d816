use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 考试服务 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 答案缓存错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 环境探测错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 考试服务 API 调用错误
///
/// 全部属于"瞬时网络"类错误：记录日志，下一个周期自然重试，从不致命。
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): code={code:?}, message={message:?}")]
    BadResponse {
        endpoint: String,
        code: Option<u16>,
        message: Option<String>,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 答案缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 读取缓存文件失败
    #[error("读取缓存失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入缓存文件失败
    #[error("写入缓存失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 缓存内容损坏
    #[error("缓存内容损坏 ({path}): {source}")]
    Corrupted {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 内存缓存锁中毒
    #[error("缓存锁已中毒")]
    Poisoned,
}

/// 环境探测错误
///
/// 探测无法执行时一律按"无信号"处理，只在日志中出现。
#[derive(Debug, Error)]
pub enum ProbeError {
    /// 执行探测脚本失败
    #[error("探测脚本执行失败 ({probe}): {source}")]
    ScriptFailed {
        probe: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 探测结果无法解析
    #[error("探测结果解析失败 ({probe}): {source}")]
    DecodeFailed {
        probe: String,
        #[source]
        source: serde_json::Error,
    },
    /// 当前环境不支持该探测
    #[error("当前环境不支持探测: {probe}")]
    Unavailable { probe: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl ApiError {
    /// 创建请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// 创建错误响应
    pub fn bad_response(endpoint: impl Into<String>, code: Option<u16>, message: Option<String>) -> Self {
        ApiError::BadResponse {
            endpoint: endpoint.into(),
            code,
            message,
        }
    }
}

impl ProbeError {
    /// 创建探测脚本失败错误
    pub fn script_failed(
        probe: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProbeError::ScriptFailed {
            probe: probe.into(),
            source: Box::new(source),
        }
    }
}

impl AppError {
    /// 创建配置项不合法错误
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
