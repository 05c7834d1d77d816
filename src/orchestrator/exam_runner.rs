//! 考试运行器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、考试清单、API 客户端、答案缓存、信号源
//! 2. **资源管理**：持有 Browser（如果接入浏览器），确保生命周期覆盖整场考试
//! 3. **运行**：启动会话控制器，等待交卷完成或 Ctrl-C
//! 4. **统计**：把交卷汇总写入日志文件并打印
//! 5. **离场**：等待交卷后的页面导航完成再退出进程

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser;
use crate::clients::{ExamApi, HttpExamApi};
use crate::config::Config;
use crate::infrastructure::JsExecutor;
use crate::models::{load_exam_manifest, DeviceInfo, ExamManifest, SessionSnapshot, SweepSummary};
use crate::services::{AnswerCache, ApiViolationSink, JsonFileCache};
use crate::signals::{BrowserSignalSource, EnvironmentSignalSource, NoopSignalSource};
use crate::utils::logging::{append_sweep_summary, init_log_file, log_startup, print_final_stats};
use crate::workflow::{
    AutoSubmitCoordinator, ControllerOptions, ExamObserver, LoggingObserver, SessionController,
};

/// 离场导航最长等待时间
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);

/// 已发起但尚未完成的后台任务
#[derive(Debug, Default)]
struct PendingTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PendingTask {
    fn track(&self, handle: JoinHandle<()>) {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// 等待任务结束；没有任务或超时返回 false
    async fn wait(&self, limit: Duration) -> bool {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return false;
        };
        match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined.is_ok(),
            Err(_) => {
                warn!("等待离场导航超时 ({}s)", limit.as_secs());
                false
            }
        }
    }
}

/// 浏览器宿主下的观察者：交卷后把页面导航到离场地址
pub struct PageObserver {
    executor: JsExecutor,
    exit_url: String,
    inner: LoggingObserver,
    navigation: PendingTask,
}

impl PageObserver {
    pub fn new(executor: JsExecutor, exit_url: impl Into<String>) -> Self {
        Self {
            executor,
            exit_url: exit_url.into(),
            inner: LoggingObserver,
            navigation: PendingTask::default(),
        }
    }

    /// 等待离场导航完成（进程退出前调用）
    pub async fn wait_for_navigation(&self) -> bool {
        self.navigation.wait(NAVIGATION_TIMEOUT).await
    }
}

impl ExamObserver for PageObserver {
    fn on_snapshot(&self, snapshot: &SessionSnapshot) {
        self.inner.on_snapshot(snapshot);
    }

    fn on_escalation(&self, count: u32) {
        self.inner.on_escalation(count);
    }

    fn on_fullscreen_blocked(&self) {
        self.inner.on_fullscreen_blocked();
    }

    fn on_sweep_complete(&self, summary: &SweepSummary) {
        self.inner.on_sweep_complete(summary);
    }

    fn navigate_away(&self) {
        let executor = self.executor.clone();
        let exit_url = self.exit_url.clone();
        let handle = tokio::spawn(async move {
            match executor.navigate(&exit_url).await {
                Ok(()) => info!("已离开考试页面: {}", exit_url),
                Err(e) => warn!("离开考试页面失败: {}", e),
            }
        });
        self.navigation.track(handle);
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    manifest: Arc<ExamManifest>,
    api: Arc<dyn ExamApi>,
    cache: Arc<dyn AnswerCache>,
    source: Arc<dyn EnvironmentSignalSource>,
    observer: Arc<dyn ExamObserver>,
    page_observer: Option<Arc<PageObserver>>,
    device: DeviceInfo,
    _browser: Option<Browser>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        init_log_file(&config.output_log_file)?;

        let manifest = load_exam_manifest(Path::new(&config.manifest_path))
            .await
            .with_context(|| format!("加载考试清单失败: {}", config.manifest_path))?;
        log_startup(&config, &manifest);

        let api: Arc<dyn ExamApi> = Arc::new(HttpExamApi::new(&config)?);
        let cache: Arc<dyn AnswerCache> =
            Arc::new(JsonFileCache::new(&config.cache_dir, config.cache_ttl()));

        let (browser, source, page_observer, device) = if config.use_browser {
            let (browser, page) =
                browser::connect_to_exam_page(config.browser_debug_port, &config.target_url)
                    .await?;
            let executor = JsExecutor::new(page);
            let source =
                BrowserSignalSource::new(executor.clone(), config.timings.signal_poll_interval());
            let device = DeviceInfo::detect(source.user_agent().await);
            let observer = Arc::new(PageObserver::new(executor, &config.exit_url));
            (
                Some(browser),
                Arc::new(source) as Arc<dyn EnvironmentSignalSource>,
                Some(observer),
                device,
            )
        } else {
            info!("未接入浏览器，使用空信号源");
            (
                None,
                Arc::new(NoopSignalSource) as Arc<dyn EnvironmentSignalSource>,
                None,
                DeviceInfo::detect(None),
            )
        };
        let observer: Arc<dyn ExamObserver> = match &page_observer {
            Some(page) => Arc::clone(page) as Arc<dyn ExamObserver>,
            None => Arc::new(LoggingObserver),
        };

        Ok(Self {
            config,
            manifest: Arc::new(manifest),
            api,
            cache,
            source,
            observer,
            page_observer,
            device,
            _browser: browser,
        })
    }

    /// 运行一场考试，直到交卷完成或被中断
    pub async fn run(self) -> Result<Option<SweepSummary>> {
        let coordinator = Arc::new(AutoSubmitCoordinator::new(
            Arc::clone(&self.manifest),
            Arc::clone(&self.api),
            Arc::clone(&self.cache),
        ));
        let sink = Arc::new(ApiViolationSink::new(Arc::clone(&self.api)));
        let (controller, handle) = SessionController::new(
            coordinator,
            Arc::clone(&self.api),
            Arc::clone(&self.source),
            sink,
            Arc::clone(&self.observer),
            ControllerOptions::from_config(&self.config, self.device.clone()),
        );

        let mut task = tokio::spawn(controller.run());
        handle.start();

        let finished = tokio::select! {
            result = &mut task => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        let summary = match finished {
            Some(result) => result.context("会话控制器异常退出")?,
            None => {
                warn!("收到 Ctrl-C，正在销毁会话");
                handle.teardown();
                task.await.context("会话控制器异常退出")?
            }
        };

        match &summary {
            Some(summary) => {
                append_sweep_summary(&self.config.output_log_file, summary)?;
                print_final_stats(summary, &self.config.output_log_file);
            }
            None => info!("[考试 {}] 会话结束，未发生交卷", self.manifest.exam_id),
        }

        // 浏览器和运行时随进程退出释放，离场导航必须在此之前完成
        if let Some(page) = &self.page_observer {
            page.wait_for_navigation().await;
        }
        Ok(summary)
    }
}
