//! The instrument contract.
//!
//! A concrete instrument type owns a [`Core`] and declares its capability
//! command sets in fixed precedence order; later sets override earlier
//! bindings at identical paths. The command tree is built from those sets
//! exactly once at startup — each concrete type gets its own tree.

use crate::commands::{diag, scpi};
use crate::config::Identity;
use crate::registry::{CommandRecord, CommandTree};
use crate::state::{Core, ReplyRx};

/// A concrete instrument type.
pub trait Instrument: Send + Sync + Sized + 'static {
    /// Shared engine state.
    fn core(&self) -> &Core;

    /// Capability sets in precedence order.
    fn command_sets() -> Vec<Vec<CommandRecord<Self>>>;

    /// Device-specific reset hook. *RST calls this after cancelling the
    /// non-system tasks and before clearing status.
    fn reset_device(&self) {}

    /// Build this type's command tree from its capability sets.
    fn command_tree() -> CommandTree<Self> {
        CommandTree::build(Self::command_sets())
    }
}

/// The bare profile: command engine, IEEE-488.2 set and diagnostics only.
pub struct Diag {
    core: Core,
}

impl Diag {
    /// Create the instrument plus the receiving end of its reply channel.
    pub fn new(identity: Identity) -> (Self, ReplyRx) {
        let (core, reply_rx) = Core::new(identity);
        (Self { core }, reply_rx)
    }
}

impl Instrument for Diag {
    fn core(&self) -> &Core {
        &self.core
    }

    fn command_sets() -> Vec<Vec<CommandRecord<Self>>> {
        vec![scpi::commands(), diag::commands()]
    }
}
