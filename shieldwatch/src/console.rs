use crate::operator::Operator;
use crate::runnable::Runnable;
use async_trait::async_trait;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;

const CONSOLE_NAME: &str = "Console";

/// Line-oriented operator console.
///
/// Reads one command per line, runs it and writes the status back. Stops at
/// end of input or on shutdown.
pub struct Console<R, W> {
    operator: Operator,
    reader: R,
    writer: W,
    shutdown_rx: watch::Receiver<bool>,
}

impl Console<BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio(operator: Operator, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self::new(operator, BufReader::new(io::stdin()), io::stdout(), shutdown_rx)
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(operator: Operator, reader: R, writer: W, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            operator,
            reader,
            writer,
            shutdown_rx,
        }
    }

    async fn reply(&mut self, status: &str) -> io::Result<()> {
        self.writer.write_all(status.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

#[async_trait]
impl<R, W> Runnable for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn run(&mut self) {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                read = self.reader.read_until(b'\n', &mut buf) => read,
                _ = self.shutdown_rx.changed() => {
                    tracing::info!("{}: Shutdown signal received", CONSOLE_NAME);
                    break;
                }
            };

            match read {
                Ok(0) => {
                    tracing::info!("{}: input closed", CONSOLE_NAME);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("{}: failed to read command: {}", CONSOLE_NAME, e);
                    break;
                }
            }

            // a line that isn't valid UTF-8 still gets a reply
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            let status = self.operator.execute(&line);
            if let Err(e) = self.reply(&status).await {
                tracing::error!("{}: failed to write reply: {}", CONSOLE_NAME, e);
                break;
            }
        }
    }

    fn name(&self) -> &str {
        CONSOLE_NAME
    }
}
