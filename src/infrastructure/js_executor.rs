//! JS 执行器 - 基础设施层
//!
//! 持有考试页面，只暴露"在页面里执行探测脚本"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::ProbeError;

/// JS 执行器
///
/// 职责：
/// - 持有考试页面 Page
/// - 暴露 eval() 能力，错误统一为 `ProbeError`
/// - 不认识会话、违规等业务概念
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于导航等操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行探测脚本并返回 JSON 结果
    ///
    /// # 参数
    /// - `probe`: 探测名称（仅用于日志和错误信息）
    /// - `js_code`: 要执行的 JavaScript 代码
    pub async fn eval(&self, probe: &str, js_code: impl Into<String>) -> Result<JsonValue, ProbeError> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(|e| ProbeError::script_failed(probe, e))?;
        let json_value: JsonValue = result
            .into_value()
            .map_err(|e| ProbeError::script_failed(probe, e))?;
        debug!("探测 {} 返回: {}", probe, json_value);
        Ok(json_value)
    }

    /// 执行探测脚本并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        probe: &str,
        js_code: impl Into<String>,
    ) -> Result<T, ProbeError> {
        let json_value = self.eval(probe, js_code).await?;
        serde_json::from_value(json_value).map_err(|source| ProbeError::DecodeFailed {
            probe: probe.to_string(),
            source,
        })
    }

    /// 跳转到指定 URL
    pub async fn navigate(&self, url: &str) -> Result<(), ProbeError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::script_failed("navigate", e))?;
        Ok(())
    }
}
