//! 空信号源
//!
//! 用于非网页宿主：不产生任何信号，全屏请求总是被接受，快照为空。
//! 原生平台的等价信号尚未定义，这里不做猜测。

use async_trait::async_trait;

use super::{EnvironmentSignalSource, EnvironmentState, PageSnapshot, ProbeSpec, SignalSender};
use crate::error::ProbeError;
use crate::infrastructure::Disposer;

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignalSource;

#[async_trait]
impl EnvironmentSignalSource for NoopSignalSource {
    async fn subscribe(&self, _sender: SignalSender) -> Result<Disposer, ProbeError> {
        Ok(Disposer::noop())
    }

    async fn current_state(&self) -> Result<EnvironmentState, ProbeError> {
        Ok(EnvironmentState {
            fullscreen: true,
            visible: true,
        })
    }

    async fn request_fullscreen(&self) -> bool {
        true
    }

    async fn snapshot(&self, _probe: &ProbeSpec) -> Result<PageSnapshot, ProbeError> {
        Ok(PageSnapshot::default())
    }
}
