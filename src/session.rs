//! The dispatch loop.
//!
//! A session reads command lines from a text channel, splits them into
//! sub-commands, resolves each against the instrument's command tree and
//! executes the bound handler under its declared mode. Taxonomy errors are
//! caught at the per-sub-command boundary and appended to the error queue;
//! they never abort the remaining sub-commands on the line or the loop
//! itself.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::instrument::Instrument;
use crate::registry::{CommandTree, Cursor, ExecMode, HandlerFn};
use scpi_proto::line::{split_statements, ParsedCommand};
use scpi_proto::ScpiError;

/// One command session over a line-oriented text channel.
pub struct Session<T: Instrument> {
    instr: Arc<T>,
    tree: Arc<CommandTree<T>>,
    cursor: Cursor,
}

impl<T: Instrument> Session<T> {
    /// Create a session over an instrument and its (pre-built) tree.
    pub fn new(instr: Arc<T>, tree: Arc<CommandTree<T>>) -> Self {
        Self {
            instr,
            tree,
            cursor: Cursor::default(),
        }
    }

    /// The instrument driven by this session.
    pub fn instrument(&self) -> &Arc<T> {
        &self.instr
    }

    /// Run until shutdown is requested or the input closes. Every task is
    /// cancelled on the way out; returns the exit code (the Status Byte at
    /// the moment the loop stops).
    pub async fn run<R>(&mut self, input: R) -> u8
    where
        R: AsyncBufRead + Unpin,
    {
        let mut shutdown = self.instr.core().subscribe_shutdown();
        let mut lines = input.lines();
        let code = loop {
            if let Some(code) = *shutdown.borrow() {
                break code;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break self.instr.core().status.lock().status_byte();
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.execute_line(&line).await,
                    Ok(None) => break self.instr.core().status.lock().status_byte(),
                    Err(err) => {
                        warn!(error = %err, "input read failed");
                        break self.instr.core().status.lock().status_byte();
                    }
                },
            }
        };
        let core = self.instr.core();
        core.tasks.lock().cancel_all();
        core.request_shutdown(code);
        code
    }

    /// Execute one input line: dispatch each `;`-separated sub-command in
    /// order, queueing any taxonomy error, and prune finished tasks after
    /// every sub-command.
    pub async fn execute_line(&mut self, line: &str) {
        for statement in split_statements(line) {
            if let Err(err) = self.execute(statement).await {
                debug!(command = statement, code = err.code(), "command failed");
                self.instr.core().push_error(err);
            }
            self.instr.core().tasks.lock().prune();
        }
    }

    async fn execute(&mut self, statement: &str) -> Result<(), ScpiError> {
        let parsed = ParsedCommand::parse(statement)?;
        let ix = self.tree.resolve(&mut self.cursor, &parsed.path)?;
        let record = self.tree.record(ix);
        let args = record.convert(&parsed.params)?;
        match (record.mode, &record.handler) {
            (ExecMode::Sync, HandlerFn::Sync(handler)) => handler(self.instr.as_ref(), args),
            (ExecMode::Spawn, HandlerFn::Task(handler)) => {
                let future = handler(Arc::clone(&self.instr), args);
                let instr = Arc::clone(&self.instr);
                let name = record.name;
                let handle = tokio::spawn(async move {
                    // A spawned command's errors cannot surface at the
                    // dispatch boundary; queue them from the task itself.
                    if let Err(err) = future.await {
                        debug!(task = name, code = err.code(), "spawned command failed");
                        instr.core().push_error(err);
                    }
                });
                self.instr.core().tasks.lock().register(name, handle);
                Ok(())
            }
            (ExecMode::Await, HandlerFn::Task(handler)) => {
                handler(Arc::clone(&self.instr), args).await
            }
            // The record constructors pair modes with handler shapes.
            _ => Err(ScpiError::Command),
        }
    }
}
