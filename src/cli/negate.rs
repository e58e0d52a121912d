//! `no <command...>`
//!
//! Negation only flags intent: the remainder of the line resolves like any other command
//! and the bound handler receives `negate = true`. Handlers treat it as "set to the
//! default state", so repeating a negation is harmless.

use crate::cli::resolver::{match_tokens, ResolveError, Resolved};
use crate::cli::tree::CommandNode;
use tracing::debug;

pub const NEGATE_TOKEN: &str = "no";

/// Resolve the words following `no` and mark the invocation negated
pub fn negate<S>(remaining_tokens: &[String], root: &CommandNode<S>) -> Result<Resolved<S>, ResolveError> {
    if remaining_tokens.is_empty() {
        return Err(ResolveError::Incomplete(NEGATE_TOKEN.to_string()));
    }

    let resolved = match_tokens(remaining_tokens, root, true)?;
    if !resolved.negatable {
        debug!("'{}' has no negated form", resolved.command);
        return Err(ResolveError::NoNegateOption(resolved.command));
    }
    Ok(resolved)
}
