pub mod answer_cache;
pub mod extension_detector;
pub mod integrity_monitor;
pub mod violation_sink;

pub use answer_cache::{AnswerCache, JsonFileCache, MemoryAnswerCache};
pub use extension_detector::{is_devtools_shortcut, ExtensionDetector, Finding};
pub use integrity_monitor::{IntegrityMonitor, Verdict};
pub use violation_sink::{ApiViolationSink, ViolationSink};
