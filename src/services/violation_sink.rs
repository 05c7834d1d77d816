//! 违规日志转发 - 业务能力层
//!
//! 只负责把事件"扔出去"，不等待结果，失败一律吞掉

use std::sync::Arc;

use tracing::debug;

use crate::clients::ExamApi;
use crate::models::LogEventRequest;

/// 外部日志接收端
pub trait ViolationSink: Send + Sync {
    /// 即发即弃
    fn forward(&self, event: LogEventRequest);
}

/// 通过 `ExamApi::log_event` 转发
pub struct ApiViolationSink {
    api: Arc<dyn ExamApi>,
}

impl ApiViolationSink {
    pub fn new(api: Arc<dyn ExamApi>) -> Self {
        Self { api }
    }
}

impl ViolationSink for ApiViolationSink {
    fn forward(&self, event: LogEventRequest) {
        // 不在运行时内（例如同步测试）时直接丢弃
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("无可用运行时，丢弃事件 {}", event.event_type);
            return;
        };
        let api = Arc::clone(&self.api);
        runtime.spawn(async move {
            if let Err(e) = api.log_event(&event).await {
                debug!("事件 {} 上报失败（已忽略）: {}", event.event_type, e);
            }
        });
    }
}
