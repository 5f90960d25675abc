//! Launching analyzer runs and driving several modules over one batch.

pub mod completion;
pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod request;

pub use completion::{CompletionWatch, LogMarkers, Terminal};
pub use error::{LaunchError, OrchestratorError};
pub use launcher::{AnalyzerCommand, ProcessLauncher, RunLauncher};
pub use orchestrator::{
    ModuleOutcome, ModuleResult, OrchestratorConfig, RunAllOrchestrator, RunAllRequest,
    RunAllSummary,
};
pub use request::{CaseManagerSelection, LaunchedRun, RunExit, RunRequest};
