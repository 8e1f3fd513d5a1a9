use crate::CorePhase;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the synchronization protocol between cores.
///
/// All of them are fatal for the run that observed them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    /// Another core left the protocol before finishing it.
    #[error("Core {core} aborted while entering {phase:?}\nCaused by:\n  core {culprit} left the rendezvous")]
    Poisoned {
        /// The core reporting the error.
        core: usize,
        /// The core that left or timed out.
        culprit: usize,
        /// The phase the reporting core was entering.
        phase: CorePhase,
    },

    /// A core waited longer than the configured timeout at a barrier.
    #[error("Core {core} waited {waited:?} for its siblings before entering {phase:?}")]
    Timeout {
        /// The core that gave up.
        core: usize,
        /// The phase it was entering.
        phase: CorePhase,
        /// How long it waited.
        waited: Duration,
    },

    /// A core tried to skip or repeat a phase.
    #[error("Core {core} tried to enter {requested:?} while in {current:?}")]
    PhaseOrder {
        /// The offending core.
        core: usize,
        /// Its current phase.
        current: CorePhase,
        /// The phase it asked for.
        requested: CorePhase,
    },

    /// Totals were published twice by the same core.
    #[error("Core {core} published its totals twice")]
    AlreadyPublished {
        /// The offending core.
        core: usize,
    },

    /// Totals of a core were read but never published.
    #[error("Totals of core {core} were read but never published")]
    MissingTotals {
        /// The core whose slot is empty.
        core: usize,
    },
}

impl BarrierError {
    /// Whether the error only echoes the failure of a sibling core.
    pub fn is_secondary(&self) -> bool {
        matches!(self, BarrierError::Poisoned { core, culprit, .. } if core != culprit)
    }
}

/// Errors raised while launching or joining the core grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The grid has no core.
    #[error("Cannot launch an empty core grid")]
    EmptyGrid,

    /// The operating system refused to start the thread of a core.
    #[error("Unable to spawn the thread of core {core}\nCaused by:\n  {reason}")]
    ThreadSpawn {
        /// The core that could not start.
        core: usize,
        /// The reason reported by the operating system.
        reason: String,
    },

    /// A core panicked.
    #[error("Core {core} panicked\nCaused by:\n  {reason}")]
    CorePanicked {
        /// The core that panicked.
        core: usize,
        /// The panic payload, when it is a string.
        reason: String,
    },
}

/// Error type returned by the tasks executed on a [CoreGrid](crate::CoreGrid).
pub trait CoreError: From<LaunchError> + Send {
    /// Whether the error only echoes the failure of a sibling core.
    ///
    /// When several cores fail, the grid reports the first error that is not secondary.
    fn is_secondary(&self) -> bool {
        false
    }
}

impl CoreError for LaunchError {}
