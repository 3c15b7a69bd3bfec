//! Command registration and the abbreviation-keyed command tree.
//!
//! Capability modules export explicit `Vec<CommandRecord<T>>` registration
//! lists; a concrete instrument type layers its lists in fixed precedence
//! order into one [`CommandTree`], built exactly once at startup. Nothing
//! is scanned or reflected at runtime.
//!
//! The tree is an arena of nodes. Each level keys its children under both
//! the long form (fully upper-cased stem) and the short form (stem minus
//! its lowercase letters), aliased to the same node index, so `SYSTEM` and
//! `SYST` always resolve to the identical child. A node can carry children
//! and a directly bound handler at the same time; the binding lives in the
//! node's leaf slot.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use scpi_proto::{expand_optional, stem_forms, Args, Converter, ScpiError};

/// How a command executes relative to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Inline; the loop accepts no input until the handler returns.
    /// Sync handlers are plain functions and cannot suspend.
    Sync,
    /// Spawned as a cooperative task, registered with the supervisor; the
    /// loop continues immediately.
    Spawn,
    /// Spawned work awaited in place: input acceptance blocks, but
    /// already-spawned tasks keep progressing.
    Await,
}

/// Future returned by Spawn/Await handlers.
pub type TaskFuture = BoxFuture<'static, Result<(), ScpiError>>;

/// Handler binding for one command.
pub enum HandlerFn<T> {
    /// Inline handler for Sync mode.
    Sync(fn(&T, Args) -> Result<(), ScpiError>),
    /// Task-producing handler for Spawn/Await modes.
    Task(fn(Arc<T>, Args) -> TaskFuture),
}

/// One declared command: pattern, execution mode, parameter converters and
/// the bound handler. Immutable once registered.
pub struct CommandRecord<T> {
    /// Declared pattern: mixed-case stems, optional `[...]` segments,
    /// optional trailing `?`.
    pub pattern: &'static str,
    /// Name used for task-supervisor bookkeeping.
    pub name: &'static str,
    /// Execution mode.
    pub mode: ExecMode,
    /// Ordered parameter converters.
    pub params: Vec<Converter>,
    /// The bound handler.
    pub handler: HandlerFn<T>,
}

impl<T> CommandRecord<T> {
    /// A Sync-mode command.
    pub fn sync(
        pattern: &'static str,
        name: &'static str,
        handler: fn(&T, Args) -> Result<(), ScpiError>,
    ) -> Self {
        Self {
            pattern,
            name,
            mode: ExecMode::Sync,
            params: Vec::new(),
            handler: HandlerFn::Sync(handler),
        }
    }

    /// A Spawn-mode command.
    pub fn spawn(
        pattern: &'static str,
        name: &'static str,
        handler: fn(Arc<T>, Args) -> TaskFuture,
    ) -> Self {
        Self {
            pattern,
            name,
            mode: ExecMode::Spawn,
            params: Vec::new(),
            handler: HandlerFn::Task(handler),
        }
    }

    /// An Await-mode command.
    pub fn awaited(
        pattern: &'static str,
        name: &'static str,
        handler: fn(Arc<T>, Args) -> TaskFuture,
    ) -> Self {
        Self {
            pattern,
            name,
            mode: ExecMode::Await,
            params: Vec::new(),
            handler: HandlerFn::Task(handler),
        }
    }

    /// Declare the ordered parameter converters.
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = Converter>,
    {
        self.params = params.into_iter().collect();
        self
    }

    /// Arity-check and convert the raw parameters. Arity mismatches are
    /// raised before any converter (and thus any handler code) runs.
    pub fn convert(&self, raw: &[String]) -> Result<Args, ScpiError> {
        if raw.len() > self.params.len() {
            return Err(ScpiError::TooManyParameters);
        }
        if raw.len() < self.params.len() {
            return Err(ScpiError::TooFewParameters);
        }
        let mut values = Vec::with_capacity(raw.len());
        for (value, converter) in raw.iter().zip(&self.params) {
            values.push(converter.convert(value)?);
        }
        Ok(Args::new(values))
    }
}

/// Index of the root node in the arena.
const ROOT: usize = 0;

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, usize>,
    /// Directly bound handler, present even when the node has children.
    leaf: Option<usize>,
}

/// Per-session relative-addressing state: the node containing the most
/// recently resolved leaf.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cursor {
    current: Option<usize>,
}

/// Hierarchical, abbreviation-keyed command lookup for one instrument type.
pub struct CommandTree<T> {
    records: Vec<CommandRecord<T>>,
    nodes: Vec<Node>,
}

impl<T> CommandTree<T> {
    /// Layer capability sets in precedence order. A later record with an
    /// identical final path silently replaces the earlier binding.
    pub fn build(sets: Vec<Vec<CommandRecord<T>>>) -> Self {
        let mut tree = Self {
            records: Vec::new(),
            nodes: vec![Node::default()],
        };
        for set in sets {
            for record in set {
                tree.insert(record);
            }
        }
        tree
    }

    /// The record at a resolved index.
    pub fn record(&self, ix: usize) -> &CommandRecord<T> {
        &self.records[ix]
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, record: CommandRecord<T>) {
        let record_ix = self.records.len();
        let expansions = expand_optional(record.pattern);
        self.records.push(record);
        for variant in expansions {
            let mut node = ROOT;
            let mut stems = variant
                .split(':')
                .filter(|stem| !stem.is_empty())
                .peekable();
            while let Some(stem) = stems.next() {
                node = self.child(node, stem);
                if stems.peek().is_none() {
                    self.nodes[node].leaf = Some(record_ix);
                }
            }
        }
    }

    /// Get or create the child for a declared stem, keyed under both its
    /// long and short forms.
    fn child(&mut self, parent: usize, stem: &str) -> usize {
        let (long, short) = stem_forms(stem);
        let ix = match self.nodes[parent].children.get(&long) {
            Some(&existing) => existing,
            None => {
                let ix = self.nodes.len();
                self.nodes.push(Node::default());
                self.nodes[parent].children.insert(long.clone(), ix);
                ix
            }
        };
        if short != long {
            self.nodes[parent].children.entry(short).or_insert(ix);
        }
        ix
    }

    /// Resolve an upper-cased command path to its bound record index.
    ///
    /// Paths starting with `:` or `*` — and any lookup with no cached
    /// node — are root-anchored. Otherwise matching continues from the
    /// previously successful node, failing over to a single root-anchored
    /// retry when a stem is not found there.
    pub fn resolve(&self, cursor: &mut Cursor, path: &str) -> Result<usize, ScpiError> {
        loop {
            let (mut node, relative) = match cursor.current {
                Some(ix) if !path.starts_with(':') && !path.starts_with('*') => (ix, true),
                _ => {
                    cursor.current = None;
                    (ROOT, false)
                }
            };
            let trimmed = path.strip_prefix(':').unwrap_or(path);
            let mut stems = trimmed.split(':').peekable();
            let mut missing = false;
            while let Some(stem) = stems.next() {
                match self.nodes[node].children.get(stem) {
                    Some(&child) if stems.peek().is_some() => node = child,
                    Some(&child) => {
                        cursor.current = Some(node);
                        return self.nodes[child].leaf.ok_or(ScpiError::Command);
                    }
                    None => {
                        missing = true;
                        break;
                    }
                }
            }
            if missing && relative {
                // Retry the whole path once from the root.
                cursor.current = None;
                continue;
            }
            return Err(ScpiError::Command);
        }
    }
}
