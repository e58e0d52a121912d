//! Command shell engine: registry, modes, resolution and the modal loop

pub mod editor;
pub mod launcher;
pub mod mode;
pub mod negate;
pub mod resolver;
pub mod session;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use editor::EditorSource;
pub use launcher::{launch, MissingPolicy, ObjectKind};
pub use mode::{ExecMode, ModeController, PrivilegeError, PromptContext};
pub use resolver::{resolve, Invocation, ResolveError};
pub use session::{Flow, Frame, LineSource, ModeFrame, Outcome, ScriptSource, Shell, ShellContext, SubMode};
pub use tree::{CommandNode, CommandSet, CommandSpec, Registry, RegistryError, WordTree};
