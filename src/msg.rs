use crossterm::event::KeyEvent;

use crate::distro::OperationResult;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize,

    // -- Operations
    /// A worker thread finished a long-running operation.
    OperationFinished(OperationResult),

    // -- System
    Tick,
}
