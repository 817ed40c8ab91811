//! Single-writer log relay
//!
//! Any thread may emit log lines; none of them touch the sink. Each formatted
//! event is buffered in a [`RelayWriter`] and sent whole over a channel to one
//! listener thread, which owns the sink and writes lines in arrival order.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};
use tracing_subscriber::fmt::MakeWriter;

enum RelayMessage {
    Line(Vec<u8>),
    /// Flush the sink, then acknowledge
    Flush(Sender<()>),
    Shutdown,
}

/// Owns the listener thread; dropping it drains the queue and joins
pub struct LogRelay {
    sender: Sender<RelayMessage>,
    listener: Option<JoinHandle<()>>,
}

impl LogRelay {
    /// Starts a listener that owns `sink`
    pub fn spawn<W>(sink: W) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let listener = thread::Builder::new()
            .name("log-relay".to_string())
            .spawn(move || listen(sink, receiver))?;

        Ok(Self {
            sender,
            listener: Some(listener),
        })
    }

    /// Starts a listener appending to the file at `path`
    pub fn to_file(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::spawn(BufWriter::new(file))
    }

    /// A `MakeWriter` feeding this relay
    pub fn make_writer(&self) -> RelayMakeWriter {
        RelayMakeWriter {
            sender: self.sender.clone(),
        }
    }

    /// Blocks until every line queued so far has been written and flushed
    pub fn flush(&self) {
        let (ack, done) = unbounded();
        if self.sender.send(RelayMessage::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for LogRelay {
    fn drop(&mut self) {
        let _ = self.sender.send(RelayMessage::Shutdown);
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
    }
}

fn listen<W: Write>(mut sink: W, receiver: Receiver<RelayMessage>) {
    for message in receiver.iter() {
        match message {
            RelayMessage::Line(line) => {
                if let Err(e) = sink.write_all(&line) {
                    eprintln!("log relay: write failed: {}", e);
                }
            }
            RelayMessage::Flush(ack) => {
                let _ = sink.flush();
                let _ = ack.send(());
            }
            RelayMessage::Shutdown => break,
        }
    }

    // Lines sent before shutdown but behind it in the queue
    for message in receiver.try_iter() {
        if let RelayMessage::Line(line) = message {
            let _ = sink.write_all(&line);
        }
    }
    let _ = sink.flush();
}

/// Hands out one [`RelayWriter`] per log event
#[derive(Clone)]
pub struct RelayMakeWriter {
    sender: Sender<RelayMessage>,
}

impl<'a> MakeWriter<'a> for RelayMakeWriter {
    type Writer = RelayWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RelayWriter {
            sender: self.sender.clone(),
            buffer: Vec::with_capacity(256),
        }
    }
}

/// Buffers one event and sends it to the listener when dropped
pub struct RelayWriter {
    sender: Sender<RelayMessage>,
    buffer: Vec<u8>,
}

impl Write for RelayWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RelayWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let _ = self.sender.send(RelayMessage::Line(line));
        }
    }
}
