//! Incremental rendering of streamed replies
//!
//! The use case publishes cumulative snapshots; a terminal wants only the
//! new text. [`StreamPrinter`] remembers how much of the current reply is
//! already on screen and writes the remainder.

use chatstream_application::ChatCompletionOutput;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Writes the unseen suffix of each snapshot to `out`.
pub struct StreamPrinter<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    /// Render one snapshot.
    ///
    /// A snapshot shorter than the text already shown belongs to a new
    /// reply: it starts a new line and is printed whole.
    pub fn render(&mut self, snapshot: &ChatCompletionOutput) -> io::Result<()> {
        let content = snapshot.content.as_str();
        let start = if content.is_char_boundary(self.printed) {
            self.printed
        } else {
            writeln!(self.out)?;
            0
        };
        self.out.write_all(content[start..].as_bytes())?;
        self.out.flush()?;
        self.printed = content.len();
        Ok(())
    }

    /// Render snapshots until the channel closes; returns how many arrived.
    pub async fn consume(
        &mut self,
        rx: &mut mpsc::Receiver<ChatCompletionOutput>,
    ) -> io::Result<usize> {
        let mut received = 0;
        while let Some(snapshot) = rx.recv().await {
            self.render(&snapshot)?;
            received += 1;
        }
        Ok(received)
    }

    /// End the current reply.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.printed > 0 {
            writeln!(self.out)?;
            self.printed = 0;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Print snapshots from `rx` to stdout on a background task.
pub fn spawn_stdout_printer(
    mut rx: mpsc::Receiver<ChatCompletionOutput>,
) -> JoinHandle<io::Result<usize>> {
    tokio::spawn(async move {
        let mut printer = StreamPrinter::new(io::stdout());
        let received = printer.consume(&mut rx).await?;
        printer.finish()?;
        Ok(received)
    })
}
