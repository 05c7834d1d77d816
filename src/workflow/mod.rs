pub mod auto_submit;
pub mod events;
pub mod observer;
pub mod session_controller;

pub use auto_submit::AutoSubmitCoordinator;
pub use events::{Command, ControllerEvent};
pub use observer::{ExamObserver, LoggingObserver};
pub use session_controller::{ControllerOptions, SessionController, SessionHandle};
