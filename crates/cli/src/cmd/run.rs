//! Run command implementation.
//!
//! Starts every loadable task and prints scheduler events until Ctrl-C.

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::Session;
use crate::output::{print_event, print_info, print_warning};

pub fn cmd_run(tasks_file: Option<PathBuf>) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let total = session.registry.list().len();
  if total == 0 {
    print_info("No tasks configured. Add one with 'ottopie add'.");
    return Ok(());
  }

  let mut events = session.registry.subscribe();
  let started = session.registry.start_all();
  if started == 0 {
    print_warning("No task could be started");
    return Ok(());
  }
  print_info(&format!("Running {started} of {total} task(s), press Ctrl-C to stop"));

  session.runtime.block_on(async {
    loop {
      tokio::select! {
        signal = tokio::signal::ctrl_c() => {
          if let Err(e) = signal {
            warn!(error = %e, "failed to listen for Ctrl-C");
          }
          break;
        }
        event = events.recv() => match event {
          Ok(event) => print_event(&event),
          Err(RecvError::Lagged(missed)) => warn!(missed, "event output fell behind"),
          Err(RecvError::Closed) => break,
        },
      }
    }
  });

  session.registry.stop_all();
  print_info("Stopped");
  Ok(())
}
