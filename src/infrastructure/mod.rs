pub mod js_executor;
pub mod schedule;

pub use js_executor::JsExecutor;
pub use schedule::{Disposer, Schedules, MIN_PERIOD};
