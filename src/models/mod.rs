pub mod answer;
pub mod exam;
pub mod language;
pub mod loaders;
pub mod session;
pub mod violation;

pub use answer::{
    OutcomeStatus, SavedAnswer, SubmissionOutcome, SubmitReason, SubmitSolutionRequest,
    SubmitSolutionResponse, SweepSummary,
};
pub use exam::{ExamManifest, ExamQuestion};
pub use language::Language;
pub use loaders::{load_exam_manifest, parse_exam_manifest};
pub use session::{
    DeviceInfo, ExamSession, PauseSessionResponse, SessionSnapshot, SessionStatus,
    SessionStatusResponse, StartSessionResponse,
};
pub use violation::{ActivityKind, LogEventRequest, ViolationEvent, ViolationKind, ViolationLedger};
