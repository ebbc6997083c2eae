//! Terminal input for user proxies.

use async_trait::async_trait;
use rondo_agents::InputSource;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Reads one line from stdin per user proxy turn.
pub struct StdinInput {
    reader: Mutex<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn read_message(&self, prompt: &str) -> io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{} - enter your response: ", prompt).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = self.reader.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line)
    }
}
