//! Console child process attached to a pseudo-terminal.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::{debug, trace};

use crate::session::console::LineChannel;
use crate::session::decode::Utf8Carry;
use crate::session::error::TransportError;

const READ_BUFFER_BYTES: usize = 8 * 1024;

/// Ctrl-C then Ctrl-D, which the console treats as a break.
const BREAK_SEQUENCE: &[u8] = &[0x03, 0x04];

/// [`LineChannel`] backed by a console binary running on a pty.
///
/// The console only prints its prompt and echoes through a terminal. A
/// reader thread forwards decoded output over a channel, so reads never
/// block past their timeout.
pub struct ProcessChannel {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output: Receiver<String>,
    _master: Box<dyn MasterPty + Send>,
}

impl ProcessChannel {
    /// Spawns `program` with `args` on a fresh pty.
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self, TransportError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 255,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|error| TransportError::pty("opening pty", error))?;

        let mut command = CommandBuilder::new(program);
        command.args(args);
        if let Ok(dir) = std::env::current_dir() {
            command.cwd(dir);
        }
        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|error| TransportError::pty(format!("spawning {program}"), error))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|error| TransportError::pty("cloning pty reader", error))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|error| TransportError::pty("taking pty writer", error))?;

        let (sender, output) = mpsc::channel();
        forward(reader, sender);
        debug!(program, pid = ?child.process_id(), "console process spawned");

        Ok(Self {
            child,
            writer,
            output,
            _master: pair.master,
        })
    }

    fn write_bytes(&mut self, bytes: &[u8], context: &'static str) -> Result<(), TransportError> {
        self.writer
            .write_all(bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|source| TransportError::io(context, source))
    }
}

fn forward(mut reader: Box<dyn Read + Send>, sender: Sender<String>) {
    thread::spawn(move || {
        let mut buffer = [0u8; READ_BUFFER_BYTES];
        let mut carry = Utf8Carry::new();
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    let text = carry.decode(&buffer[..read]);
                    trace!(bytes = read, held = carry.held_back(), "process output");
                    if !text.is_empty() && sender.send(text).is_err() {
                        return;
                    }
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) if error.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
        let rest = carry.finish();
        if !rest.is_empty() {
            let _ = sender.send(rest);
        }
    });
}

impl LineChannel for ProcessChannel {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write_bytes(&bytes, "writing to console")
    }

    fn send_break(&mut self) -> Result<(), TransportError> {
        self.write_bytes(BREAK_SEQUENCE, "sending break to console")
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        match self.output.recv_timeout(timeout) {
            Ok(text) => Ok(Some(text)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.child.try_wait() {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                self.child
                    .kill()
                    .map_err(|source| TransportError::io("killing console", source))?;
                self.child
                    .wait()
                    .map(|_| ())
                    .map_err(|source| TransportError::io("waiting for console", source))
            }
            Err(source) => Err(TransportError::io("polling console", source)),
        }
    }
}
