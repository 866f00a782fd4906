//! rigkit-editor-core: everything that changes a `Document` interactively.
//!
//! - `Command`: one reversible mutation with a label
//! - `CommandStack`: linear undo/redo history with grouping and a size limit
//! - `Gesture`: micro-edits applied live during a drag, committed as one
//!   history entry or reverted on cancel
//! - `EditorModeMachine`: the active editing mode and its pointer handling
//! - `EditorSession`: document + history + modes + solver behind one input
//!   entry point

pub mod command;
pub mod commands;
pub mod config;
pub mod gesture;
pub mod mode;
pub mod session;
pub mod stack;

pub use command::{Command, CommandGroup};
pub use config::{EditorConfig, InfluenceBrush};
pub use gesture::Gesture;
pub use mode::{
    EditorMode, EditorModeMachine, InfluenceTool, ModeContext, ModeHandler, ModeKind, ModeOutcome,
    PointerEvent, PoseTool, SrtTool,
};
pub use session::{EditorSession, Feedback, InputEvent};
pub use stack::CommandStack;
