/// 考试服务 API 客户端
///
/// `ExamApi` 描述引擎需要的全部远端操作，`HttpExamApi` 是基于 reqwest 的实现
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    DeviceInfo, LogEventRequest, PauseSessionResponse, SessionStatusResponse,
    StartSessionResponse, SubmitSolutionRequest, SubmitSolutionResponse,
};
use crate::utils::logging::truncate_text;

/// 权威服务端暴露的操作
///
/// 所有调用都是一次性请求；失败只意味着"本周期降级"。
#[async_trait]
pub trait ExamApi: Send + Sync {
    async fn get_session_status(&self, exam_id: &str) -> Result<SessionStatusResponse, ApiError>;

    async fn start_session(
        &self,
        exam_id: &str,
        device: &DeviceInfo,
    ) -> Result<StartSessionResponse, ApiError>;

    async fn pause_session(&self, exam_id: &str) -> Result<PauseSessionResponse, ApiError>;

    /// 心跳
    async fn update_activity(&self, exam_id: &str) -> Result<(), ApiError>;

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<SubmitSolutionResponse, ApiError>;

    /// 尽力而为的事件日志
    async fn log_event(&self, event: &LogEventRequest) -> Result<(), ApiError>;
}

/// 基于 HTTP/JSON 的实现
pub struct HttpExamApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpExamApi {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::with_options(&config.api_base_url, &config.api_token, config.request_timeout())
    }

    pub fn with_options(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::request_failed("client", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.authorize(self.client.get(self.url(path)));
        self.send_json(path, builder).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.authorize(self.client.post(self.url(path)).json(body));
        self.send_json(path, builder).await
    }

    /// 发送请求但只关心是否成功
    async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let builder = self.authorize(self.client.post(self.url(path)).json(body));
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::request_failed(path, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::bad_response(path, Some(status.as_u16()), non_empty(text)));
        }
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::request_failed(path, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(path, e))?;

        debug!("{} -> {} {}", path, status, truncate_text(&text, 200));

        if !status.is_success() {
            return Err(ApiError::bad_response(path, Some(status.as_u16()), non_empty(text)));
        }
        if text.trim().is_empty() {
            return Err(ApiError::EmptyResponse {
                endpoint: path.to_string(),
            });
        }
        serde_json::from_str(&text).map_err(|source| ApiError::JsonParseFailed {
            endpoint: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn get_session_status(&self, exam_id: &str) -> Result<SessionStatusResponse, ApiError> {
        self.get_json(&format!("exams/{}/session", exam_id)).await
    }

    async fn start_session(
        &self,
        exam_id: &str,
        device: &DeviceInfo,
    ) -> Result<StartSessionResponse, ApiError> {
        let body = json!({ "device_info": device });
        self.post_json(&format!("exams/{}/session/start", exam_id), &body)
            .await
    }

    async fn pause_session(&self, exam_id: &str) -> Result<PauseSessionResponse, ApiError> {
        self.post_json(&format!("exams/{}/session/pause", exam_id), &json!({}))
            .await
    }

    async fn update_activity(&self, exam_id: &str) -> Result<(), ApiError> {
        self.post_ack(&format!("exams/{}/session/activity", exam_id), &json!({}))
            .await
    }

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<SubmitSolutionResponse, ApiError> {
        self.post_json("submissions", request).await
    }

    async fn log_event(&self, event: &LogEventRequest) -> Result<(), ApiError> {
        self.post_ack("events", event).await
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate_text(trimmed, 200))
    }
}
