//! # Exam Guard
//!
//! 在线监考客户端的会话与完整性引擎
//!
//! ## 架构设计
//!
//! 本系统沿用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `Schedules` / `Disposer` - 定时任务与订阅的释放器
//!
//! ### ② 客户端与信号源（Clients / Signals）
//! - `ExamApi` - 权威服务端（会话、提交、事件日志）
//! - `EnvironmentSignalSource` - 全屏、可见性、剪贴板等环境信号
//!
//! ### ③ 业务能力层（Services）
//! - `IntegrityMonitor` - 去重、计数、阈值升级
//! - `ExtensionDetector` - 扩展与开发者工具启发式
//! - `AnswerCache` - 编辑器保存的答案
//! - `ViolationSink` - 即发即弃的事件日志
//!
//! ### ④ 流程层（Workflow）
//! - `SessionController` - 会话生命周期与时间校准
//! - `AutoSubmitCoordinator` - 单次执行的交卷扫描
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/exam_runner` - 组装部件，运行一场考试
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod signals;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出常用类型
pub use browser::connect_to_exam_page;
pub use clients::{ExamApi, HttpExamApi};
pub use config::{Config, EngineTimings};
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{ExamManifest, SessionSnapshot, SessionStatus, SubmitReason, SweepSummary};
pub use orchestrator::App;
pub use workflow::{AutoSubmitCoordinator, SessionController, SessionHandle};
