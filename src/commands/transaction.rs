//! Transaction commands (MULTI, EXEC, DISCARD, WATCH, UNWATCH)
//!
//! Only parsing lives here; the state machine is in `crate::transaction`.

use super::{Command, Op};
use crate::error::CommandError;
use bytes::Bytes;

/// MULTI command - Start queuing commands
///
/// Syntax: MULTI
pub struct MultiCommand;

impl Command for MultiCommand {
    fn name(&self) -> &'static str {
        "MULTI"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Multi)
    }
}

/// EXEC command - Run every queued command atomically
///
/// Syntax: EXEC
pub struct ExecCommand;

impl Command for ExecCommand {
    fn name(&self) -> &'static str {
        "EXEC"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Exec)
    }
}

/// DISCARD command - Drop the queued commands
///
/// Syntax: DISCARD
pub struct DiscardCommand;

impl Command for DiscardCommand {
    fn name(&self) -> &'static str {
        "DISCARD"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Discard)
    }
}

/// WATCH command - Abort the next EXEC if any of these keys change
///
/// Syntax: WATCH key [key ...]
pub struct WatchCommand;

impl Command for WatchCommand {
    fn name(&self) -> &'static str {
        "WATCH"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn parse(&self, args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Watch(args.to_vec()))
    }
}

/// UNWATCH command - Forget all watched keys
///
/// Syntax: UNWATCH
pub struct UnwatchCommand;

impl Command for UnwatchCommand {
    fn name(&self) -> &'static str {
        "UNWATCH"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn parse(&self, _args: &[Bytes]) -> Result<Op, CommandError> {
        Ok(Op::Unwatch)
    }
}
