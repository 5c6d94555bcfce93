use std::io;
use std::process;
use std::thread;

use log::warn;

use crate::engine::orchestrator::CancelToken;

/// Exit status after a second Ctrl-C, as a shell reports SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Stop starting files; the ones running finish and are reported.
    FinishInFlight,
    /// The user asked twice; give up without a report.
    Abort,
}

/// What one Ctrl-C means for a run that owns `cancel`.
pub fn on_interrupt(cancel: &CancelToken) -> Interrupt {
    if cancel.is_cancelled() {
        return Interrupt::Abort;
    }
    cancel.cancel();
    Interrupt::FinishInFlight
}

/// Watches for Ctrl-C on a background thread and cancels `cancel`.
pub fn cancel_on_interrupt(cancel: CancelToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("audio-lint-interrupt".into())
        .spawn(move || {
            runtime.block_on(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    match on_interrupt(&cancel) {
                        Interrupt::FinishInFlight => {
                            warn!("Interrupted: finishing files in progress (Ctrl-C again to abort)")
                        }
                        Interrupt::Abort => {
                            warn!("Interrupted again, aborting");
                            process::exit(EXIT_INTERRUPTED);
                        }
                    }
                }
            });
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_interrupt_cancels_second_aborts() {
        let cancel = CancelToken::new();
        assert_eq!(on_interrupt(&cancel), Interrupt::FinishInFlight);
        assert!(cancel.is_cancelled());
        assert_eq!(on_interrupt(&cancel), Interrupt::Abort);
    }
}
