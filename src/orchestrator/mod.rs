//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 组装整场考试需要的全部部件，是二进制程序的入口。
//!
//! ## 层次关系
//!
//! ```text
//! exam_runner (App: 一场考试)
//!     ↓
//! workflow::SessionController (生命周期 / 时间校准)
//!     ↓                    ↘
//! services (监控 / 检测 / 缓存)   workflow::AutoSubmitCoordinator (交卷)
//!     ↓
//! infrastructure / signals / clients
//! ```
//!
//! 只有编排层持有 Browser。

pub mod exam_runner;

pub use exam_runner::{App, PageObserver};
