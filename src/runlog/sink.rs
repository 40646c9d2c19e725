//! Line-oriented byte sink for process output

use std::io::{self, Write};

use super::RunLog;

/// Collects raw output bytes and records each complete line as client code
///
/// A trailing partial line is held until more bytes arrive, the sink is
/// flushed, or it is dropped.
#[derive(Debug)]
pub struct ClientSink {
    log: RunLog,
    pending: Vec<u8>,
}

impl ClientSink {
    pub(super) fn new(log: RunLog) -> Self {
        Self {
            log,
            pending: Vec::new(),
        }
    }

    fn emit_pending(&mut self) {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.log.log_client_code(&text);
        }
    }
}

impl Write for ClientSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') {
            let rest = self.pending.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut self.pending, rest);
            self.log.log_client_code(&String::from_utf8_lossy(&complete));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_pending();
        Ok(())
    }
}

impl Drop for ClientSink {
    fn drop(&mut self) {
        self.emit_pending();
    }
}
