//! Integration tests for command dispatch: tokenizing, tree resolution,
//! the error boundary and the core SCPI command set.

mod common;

use common::{identity, Rig};
use scpid::instrument::Diag;
use scpid::registry::CommandRecord;
use scpid::state::{Core, ReplyRx};

fn diag() -> Rig<Diag> {
    let (instr, rx) = Diag::new(identity("DIAG"));
    Rig::new(instr, rx)
}

#[tokio::test]
async fn idn_and_version_reply_in_order() {
    let mut rig = diag();
    let replies = rig.send("*IDN?; SYSTem:VERSion?").await;
    assert_eq!(replies, vec!["Straylight,DIAG,0042,0.3.0", "1999.1"]);
}

#[tokio::test]
async fn paths_match_case_insensitively_in_long_and_short_form() {
    let mut rig = diag();
    for path in ["SYSTEM:VERSION?", "syst:vers?", "SYST:VERSION?", ":SYSTEM:VERS?"] {
        assert_eq!(rig.send(path).await, vec!["1999.1"], "{path}");
    }
}

#[tokio::test]
async fn failed_subcommand_does_not_abort_its_siblings() {
    let mut rig = diag();
    // First sub-command fails parameter conversion, second still runs.
    let replies = rig.send("SYSTem:SLEEP potato; *TST").await;
    assert_eq!(replies, vec!["0"]);
    // Exactly one queued error, reported once.
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-104,Data Type Error"]);
    assert_eq!(rig.send("SYST:ERR?").await, vec!["0,No Error"]);
}

#[tokio::test]
async fn unknown_path_queues_a_command_error() {
    let mut rig = diag();
    assert!(rig.send("FOO:BAR 1").await.is_empty());
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-100,Command Error"]);
}

#[tokio::test]
async fn error_queue_reports_most_recent_first() {
    let mut rig = diag();
    rig.send("FOO:BAR").await;
    rig.send("SYSTem:SLEEP potato").await;
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-104,Data Type Error"]);
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-100,Command Error"]);
    assert_eq!(rig.send("SYST:ERR?").await, vec!["0,No Error"]);
}

#[tokio::test]
async fn arity_mismatches_are_queued_before_handlers_run() {
    let mut rig = diag();
    rig.send("*ESE").await;
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-109,Missing parameter"]);
    rig.send("*TST 1").await;
    assert_eq!(rig.send("SYST:ERR?").await, vec!["-108,Parameter not allowed"]);
}

#[tokio::test]
async fn clear_status_empties_the_error_queue() {
    let mut rig = diag();
    rig.send("NO:SUCH:NODE").await;
    rig.send("*CLS").await;
    assert_eq!(rig.send("SYST:ERR?").await, vec!["0,No Error"]);
}

#[tokio::test]
async fn status_byte_reflects_error_queue_occupancy() {
    let mut rig = diag();
    assert_eq!(rig.send("*STB?").await, vec!["0"]);
    rig.send("NO:SUCH:NODE").await;
    assert_eq!(rig.send("*STB?").await, vec!["4"]);
    rig.send("SYST:ERR?").await;
    assert_eq!(rig.send("*STB?").await, vec!["0"]);
}

#[tokio::test]
async fn relative_addressing_continues_from_the_last_node() {
    let mut rig = diag();
    rig.send("STATus:OPERation:ENABle 8").await;
    // Resolves under STATUS:OPERATION without restating the path.
    assert_eq!(rig.send("ENABle?").await, vec!["8"]);
    // A miss under the cached node falls back to the root.
    assert_eq!(rig.send("SYST:VERS?").await, vec!["1999.1"]);
}

#[tokio::test]
async fn enable_masks_gate_event_latching() {
    let mut rig = diag();
    rig.send("STATus:QUEStionable:ENABle 5").await;
    assert_eq!(rig.send("STATus:QUEStionable:ENABle?").await, vec!["5"]);
    // Nothing has driven the condition register: event stays clear.
    assert_eq!(rig.send("STATus:QUEStionable:EVENt?").await, vec!["0"]);
    assert_eq!(rig.send("STATus:QUEStionable:CONDition?").await, vec!["0"]);
}

#[tokio::test]
async fn quoted_strings_pass_through_statement_and_parameter_splitting() {
    let mut rig = diag();
    let replies = rig.send("SYSTem:PRINt \"a,b;c\"; SYSTem:PRINt plain").await;
    assert_eq!(replies, vec!["a,b;c", "plain"]);
}

#[tokio::test]
async fn enable_mask_out_of_range_is_queued() {
    let mut rig = diag();
    rig.send("*SRE 300").await;
    assert_eq!(
        rig.send("SYST:ERR?").await,
        vec!["-222,Parameter Out of Range"]
    );
}

// A capability layered after the core set overrides an identical path.
struct Custom {
    core: Core,
}

fn tst_override(instr: &Custom, _args: scpi_proto::Args) -> Result<(), scpi_proto::ScpiError> {
    instr.core.reply("override");
    Ok(())
}

impl scpid::instrument::Instrument for Custom {
    fn core(&self) -> &Core {
        &self.core
    }

    fn command_sets() -> Vec<Vec<CommandRecord<Self>>> {
        vec![
            scpid::commands::scpi::commands(),
            scpid::commands::diag::commands(),
            vec![CommandRecord::sync("*TST", "tst_custom", tst_override)],
        ]
    }
}

impl Custom {
    fn new() -> (Self, ReplyRx) {
        let (core, rx) = Core::new(identity("CUSTOM"));
        (Self { core }, rx)
    }
}

#[tokio::test]
async fn later_capability_set_overrides_identical_paths() {
    let (instr, rx) = Custom::new();
    let mut rig = Rig::new(instr, rx);
    assert_eq!(rig.send("*TST").await, vec!["override"]);
    // Everything else from the core set still resolves.
    assert_eq!(rig.send("SYST:VERS?").await, vec!["1999.1"]);
}
