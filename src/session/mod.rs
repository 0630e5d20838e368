// ABOUTME: One remote execution session, from connection to scratch cleanup
// The orchestrator drives workspace management, tree sync and the output relay

pub mod interactive;
pub mod orchestrator;
pub mod progress;
pub mod relay;
pub mod workspace;

pub use interactive::{InteractiveLauncher, LaunchCommand, SystemLauncher};
pub use orchestrator::{Phase, SessionOrchestrator};
pub use progress::{ProgressReporter, Status};
pub use relay::{Console, RelayConfig, StreamRelay};
pub use workspace::WorkspaceManager;
