//! Diagnostics commands: sleep, echo, task listing and instrument exit.

use std::sync::Arc;
use std::time::Duration;

use crate::instrument::Instrument;
use crate::registry::{CommandRecord, TaskFuture};
use scpi_proto::{Args, Converter, FloatSpec, ScpiError};

/// Status Byte bit held while SYSTem:SLEEP runs.
pub const STB_SLEEPING: u8 = 0x01;

/// The diagnostics command set.
pub fn commands<T: Instrument>() -> Vec<CommandRecord<T>> {
    vec![
        CommandRecord::spawn("SYSTem:SLEEP", "sleep", sleep)
            .params([FloatSpec::new().min(0.0).build()]),
        CommandRecord::sync("SYSTem:EXIT", "exit", exit),
        CommandRecord::sync("SYSTem:PRINt", "print", print).params([Converter::Str]),
        CommandRecord::sync("SYSTem:DEBUg?", "debugq", debugq),
    ]
}

/// Sleep for the requested number of seconds, holding a Status Byte bit
/// for the duration. A second sleep while one is running is refused busy.
fn sleep<T: Instrument>(instr: Arc<T>, args: Args) -> TaskFuture {
    Box::pin(async move {
        let seconds = args.float(0)?;
        let core = instr.core();
        {
            let mut status = core.status.lock();
            if status.stb() & STB_SLEEPING != 0 {
                return Err(ScpiError::Busy);
            }
            status.set_stb_bits(STB_SLEEPING);
        }
        core.reply("Sleepy time....");
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        core.status.lock().clear_stb_bits(STB_SLEEPING);
        core.reply("Done");
        Ok(())
    })
}

fn exit<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    let code = core.status.lock().status_byte();
    core.request_shutdown(code);
    Ok(())
}

fn print<T: Instrument>(instr: &T, args: Args) -> Result<(), ScpiError> {
    instr.core().reply(args.text(0)?.to_string());
    Ok(())
}

fn debugq<T: Instrument>(instr: &T, _args: Args) -> Result<(), ScpiError> {
    let core = instr.core();
    for (name, finished) in core.tasks.lock().snapshot() {
        core.reply(format!("{name} {finished}"));
    }
    Ok(())
}
