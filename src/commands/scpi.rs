//! The IEEE-488.2 common commands and the required SCPI-99 subsystem
//! commands.
//!
//! Generic over any [`Instrument`]; every concrete profile layers this set
//! first, so overriding one of these bindings only takes re-declaring the
//! same path in a later capability set.

use std::sync::Arc;
use std::time::Duration;

use crate::instrument::Instrument;
use crate::registry::{CommandRecord, TaskFuture};
use crate::status::{ErrorRecord, Family};
use scpi_proto::{Args, IntSpec, ScpiError};

/// Standard-Event bit latched by *OPC: operation complete.
pub const ESR_OPC: u16 = 0x01;

/// Poll interval of the blocking-wait commands.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// SCPI standard revision reported by SYSTem:VERSion?.
const SCPI_VERSION: &str = "1999.1";

/// The core command set.
pub fn commands<T: Instrument>() -> Vec<CommandRecord<T>> {
    vec![
        CommandRecord::sync("*CLS", "cls", cls),
        CommandRecord::sync("*ESE", "ese", ese).params([IntSpec::new().min(0).max(255).build()]),
        CommandRecord::sync("*ESE?", "eseq", eseq),
        CommandRecord::sync("*ESR?", "esrq", esrq),
        CommandRecord::sync("*IDN?", "idnq", idnq),
        CommandRecord::spawn("*OPC", "opc", opc),
        CommandRecord::awaited("*OPC?", "opcq", opcq),
        CommandRecord::sync("*RST", "rst", rst),
        CommandRecord::sync("*SRE", "sre", sre).params([IntSpec::new().min(0).max(255).build()]),
        CommandRecord::sync("*SRE?", "sreq", sreq),
        CommandRecord::sync("*STB?", "stbq", stbq),
        CommandRecord::sync("*TST", "tst", tst),
        CommandRecord::awaited("*WAI", "wai", wai),
        CommandRecord::sync("SYSTem:ERRor[:NEXT]?", "errq", errq),
        CommandRecord::sync("SYSTem:VERSion?", "versq", versq),
        CommandRecord::sync("STATus:OPERation[:EVENt]?", "oper_eventq", oper_eventq),
        CommandRecord::sync("STATus:OPERation:CONDition?", "oper_condq", oper_condq),
        CommandRecord::sync("STATus:OPERation:ENABle", "oper_enab", oper_enab)
            .params([IntSpec::new().min(0).max(0xFFFF).build()]),
        CommandRecord::sync("STATus:OPERation:ENABle?", "oper_enabq", oper_enabq),
        CommandRecord::sync("STATus:QUEStionable[:EVENt]?", "ques_eventq", ques_eventq),
        CommandRecord::sync("STATus:QUEStionable:CONDition?", "ques_condq", ques_condq),
        CommandRecord::sync("STATus:QUEStionable:ENABle", "ques_enab", ques_enab)
            .params([IntSpec::new().min(0).max(0xFFFF).build()]),
        CommandRecord::sync("STATus:QUEStionable:ENABle?", "ques_enabq", ques_enabq),
        CommandRecord::sync("STATus:PRESet", "status_preset", status_preset),
    ]
}

fn cls<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    instr.core().status.lock().clear();
    Ok(())
}

fn ese<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    let mask = args.int(0)? as u16;
    instr.core().status.lock().write_enable(Family::Standard, mask);
    Ok(())
}

fn eseq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let mask = core.status.lock().enable(Family::Standard);
    core.reply(mask.to_string());
    Ok(())
}

fn esrq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let value = core.status.lock().read_event(Family::Standard);
    core.reply(value.to_string());
    Ok(())
}

fn idnq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    core.reply(core.identity.idn_string());
    Ok(())
}

/// Poll the supervisor until every user task has finished.
async fn wait_for_user_tasks<T: Instrument>(instr: &Arc<T>) {
    loop {
        if instr.core().tasks.lock().user_tasks_done() {
            return;
        }
        tokio::time::sleep(WAIT_POLL).await;
    }
}

fn opc<T: Instrument>(instr: Arc<T>, _args: Args) -> TaskFuture {
    Box::pin(async move {
        wait_for_user_tasks(&instr).await;
        instr
            .core()
            .status
            .lock()
            .set_condition_bits(Family::Standard, ESR_OPC);
        Ok(())
    })
}

fn opcq<T: Instrument>(instr: Arc<T>, _args: Args) -> TaskFuture {
    Box::pin(async move {
        wait_for_user_tasks(&instr).await;
        instr.core().reply("1");
        Ok(())
    })
}

fn rst<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    instr.core().tasks.lock().cancel_user();
    instr.reset_device();
    instr.core().status.lock().clear();
    Ok(())
}

fn sre<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    let mask = args.int(0)? as u8;
    instr.core().status.lock().set_sre(mask);
    Ok(())
}

fn sreq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let mask = core.status.lock().sre();
    core.reply(mask.to_string());
    Ok(())
}

fn stbq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let byte = core.status.lock().status_byte();
    core.reply(byte.to_string());
    Ok(())
}

fn tst<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    instr.core().reply("0");
    Ok(())
}

fn wai<T: Instrument>(instr: Arc<T>, _args: Args) -> TaskFuture {
    Box::pin(async move {
        wait_for_user_tasks(&instr).await;
        Ok(())
    })
}

fn errq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let popped = core.status.lock().pop_error();
    match popped {
        Some(record) => core.reply(record.report()),
        None => core.reply(ErrorRecord::no_error()),
    }
    Ok(())
}

fn versq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    instr.core().reply(SCPI_VERSION);
    Ok(())
}

fn oper_eventq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let value = core.status.lock().read_event(Family::Operation);
    core.reply(value.to_string());
    Ok(())
}

fn oper_condq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let value = core.status.lock().condition(Family::Operation);
    core.reply(value.to_string());
    Ok(())
}

fn oper_enab<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    let mask = args.int(0)? as u16;
    instr
        .core()
        .status
        .lock()
        .write_enable(Family::Operation, mask);
    Ok(())
}

fn oper_enabq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let mask = core.status.lock().enable(Family::Operation);
    core.reply(mask.to_string());
    Ok(())
}

fn ques_eventq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let value = core.status.lock().read_event(Family::Questionable);
    core.reply(value.to_string());
    Ok(())
}

fn ques_condq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let value = core.status.lock().condition(Family::Questionable);
    core.reply(value.to_string());
    Ok(())
}

fn ques_enab<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    let mask = args.int(0)? as u16;
    instr
        .core()
        .status
        .lock()
        .write_enable(Family::Questionable, mask);
    Ok(())
}

fn ques_enabq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let mask = core.status.lock().enable(Family::Questionable);
    core.reply(mask.to_string());
    Ok(())
}

fn status_preset<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    rst(instr, args)
}
