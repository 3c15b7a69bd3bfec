//! Integration test common infrastructure.
//!
//! Drives an instrument through its dispatch loop directly and captures
//! the reply stream.

use std::sync::Arc;

use scpid::config::Identity;
use scpid::instrument::Instrument;
use scpid::session::Session;
use scpid::state::ReplyRx;

/// A session over one instrument plus its captured reply stream.
pub struct Rig<T: Instrument> {
    pub session: Session<T>,
    pub rx: ReplyRx,
}

#[allow(dead_code)]
impl<T: Instrument> Rig<T> {
    pub fn new(instr: T, rx: ReplyRx) -> Self {
        Self::from_arc(Arc::new(instr), rx)
    }

    pub fn from_arc(instr: Arc<T>, rx: ReplyRx) -> Self {
        let tree = Arc::new(T::command_tree());
        Self {
            session: Session::new(instr, tree),
            rx,
        }
    }

    /// Execute one line and return the replies produced so far.
    pub async fn send(&mut self, line: &str) -> Vec<String> {
        self.session.execute_line(line).await;
        self.drain()
    }

    /// Pull everything currently queued on the reply channel.
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    pub fn instrument(&self) -> &Arc<T> {
        self.session.instrument()
    }
}

#[allow(dead_code)]
pub fn identity(model: &str) -> Identity {
    Identity {
        manufacturer: "Straylight".to_string(),
        model: model.to_string(),
        serial: "0042".to_string(),
        firmware: "0.3.0".to_string(),
    }
}
