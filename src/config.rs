use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult, ConfigError};

/// 引擎时间参数
///
/// 数值均为经验值，只保证"实践中够用"，因此全部可通过环境变量覆盖。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineTimings {
    /// 本地倒计时步长（毫秒）
    pub tick_ms: u64,
    /// 与权威时钟同步的间隔（毫秒）
    pub sync_interval_ms: u64,
    /// 心跳间隔（毫秒）
    pub heartbeat_interval_ms: u64,
    /// 同类违规去重窗口（毫秒）
    pub dedup_window_ms: u64,
    /// 退出全屏后重新请求全屏的延迟（毫秒）
    pub fullscreen_retry_delay_ms: u64,
    /// 扩展检测的固定扫描间隔（毫秒）
    pub extension_scan_interval_ms: u64,
    /// 浏览器信号队列的轮询间隔（毫秒）
    pub signal_poll_interval_ms: u64,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            sync_interval_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            dedup_window_ms: 1_500,
            fullscreen_retry_delay_ms: 100,
            extension_scan_interval_ms: 3_000,
            signal_poll_interval_ms: 250,
        }
    }
}

impl EngineTimings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn fullscreen_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fullscreen_retry_delay_ms)
    }

    pub fn extension_scan_interval(&self) -> Duration {
        Duration::from_millis(self.extension_scan_interval_ms)
    }

    pub fn signal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.signal_poll_interval_ms)
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 考试服务 API 配置 ---
    pub api_base_url: String,
    pub api_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 考试清单 TOML 文件
    pub manifest_path: String,
    // --- 答案缓存 ---
    pub cache_dir: String,
    /// 缓存有效期（秒），0 表示永不过期
    pub cache_ttl_secs: u64,
    // --- 浏览器 ---
    /// 是否接入浏览器信号源（否则使用空信号源）
    pub use_browser: bool,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 考试页面 URL
    pub target_url: String,
    /// 交卷后跳转的 URL
    pub exit_url: String,
    /// 允许页面加载资源的额外源（逗号分隔）
    pub trusted_origins: Vec<String>,
    // --- 完整性监控 ---
    /// 触发强制交卷的违规次数
    pub violation_threshold: u32,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    pub timings: EngineTimings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            api_token: String::new(),
            request_timeout_secs: 10,
            manifest_path: "exam.toml".to_string(),
            cache_dir: "answer_cache".to_string(),
            cache_ttl_secs: 0,
            use_browser: true,
            browser_debug_port: 9222,
            target_url: "http://localhost:3000/exam".to_string(),
            exit_url: "http://localhost:3000/exams".to_string(),
            trusted_origins: Vec::new(),
            violation_threshold: 3,
            verbose_logging: false,
            output_log_file: "exam_session.log".to_string(),
            timings: EngineTimings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let timings = EngineTimings {
            tick_ms: env_parse("EXAM_TICK_MS").unwrap_or(default.timings.tick_ms),
            sync_interval_ms: env_parse("EXAM_SYNC_INTERVAL_MS").unwrap_or(default.timings.sync_interval_ms),
            heartbeat_interval_ms: env_parse("EXAM_HEARTBEAT_INTERVAL_MS").unwrap_or(default.timings.heartbeat_interval_ms),
            dedup_window_ms: env_parse("EXAM_DEDUP_WINDOW_MS").unwrap_or(default.timings.dedup_window_ms),
            fullscreen_retry_delay_ms: env_parse("EXAM_FULLSCREEN_RETRY_MS").unwrap_or(default.timings.fullscreen_retry_delay_ms),
            extension_scan_interval_ms: env_parse("EXAM_EXTENSION_SCAN_MS").unwrap_or(default.timings.extension_scan_interval_ms),
            signal_poll_interval_ms: env_parse("EXAM_SIGNAL_POLL_MS").unwrap_or(default.timings.signal_poll_interval_ms),
        };
        Self {
            api_base_url: std::env::var("EXAM_API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("EXAM_API_TOKEN").unwrap_or(default.api_token),
            request_timeout_secs: env_parse("EXAM_REQUEST_TIMEOUT_SECS").unwrap_or(default.request_timeout_secs),
            manifest_path: std::env::var("EXAM_MANIFEST").unwrap_or(default.manifest_path),
            cache_dir: std::env::var("EXAM_CACHE_DIR").unwrap_or(default.cache_dir),
            cache_ttl_secs: env_parse("EXAM_CACHE_TTL_SECS").unwrap_or(default.cache_ttl_secs),
            use_browser: env_parse("EXAM_USE_BROWSER").unwrap_or(default.use_browser),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            exit_url: std::env::var("EXIT_URL").unwrap_or(default.exit_url),
            trusted_origins: std::env::var("TRUSTED_ORIGINS")
                .map(|v| parse_origin_list(&v))
                .unwrap_or(default.trusted_origins),
            violation_threshold: env_parse("VIOLATION_THRESHOLD").unwrap_or(default.violation_threshold),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            timings,
        }
    }

    /// 校验配置，拒绝会让引擎空转或死循环的取值
    pub fn validate(&self) -> AppResult<()> {
        if self.violation_threshold == 0 {
            return Err(AppError::invalid_config("violation_threshold", "必须大于 0"));
        }
        let periods = [
            ("tick_ms", self.timings.tick_ms),
            ("sync_interval_ms", self.timings.sync_interval_ms),
            ("heartbeat_interval_ms", self.timings.heartbeat_interval_ms),
            ("extension_scan_interval_ms", self.timings.extension_scan_interval_ms),
            ("signal_poll_interval_ms", self.timings.signal_poll_interval_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(AppError::invalid_config(field, "周期不能为 0"));
            }
        }
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::invalid_config("api_base_url", "不能为空"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 缓存有效期，0 表示不过期
    pub fn cache_ttl(&self) -> Option<chrono::Duration> {
        if self.cache_ttl_secs == 0 {
            None
        } else {
            i64::try_from(self.cache_ttl_secs).ok().map(chrono::Duration::seconds)
        }
    }
}

/// 读取并解析环境变量；无法解析时告警并回退到默认值
fn env_parse<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            };
            warn!("{}，使用默认值", err);
            None
        }
    }
}

fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
