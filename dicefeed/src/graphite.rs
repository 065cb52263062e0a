//! The graphite plaintext transport.
//!
//! One connection per submission: the stream is opened, the whole batch is
//! written, and the stream is shut down and released. Nothing is pooled or
//! retried here; the caller decides what a failed submission means.

use tokio::{io::AsyncWriteExt, net::TcpStream};
use tracing::debug;

use crate::sample::Sample;

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Client`].
pub enum Error {
    /// Error connecting to the graphite endpoint
    #[error("Failed to connect to graphite at {addr}: {source}")]
    Connect {
        /// Target address
        addr: String,
        /// Underlying IO error
        #[source]
        source: Box<std::io::Error>,
    },
    /// Error writing the submission to the graphite endpoint
    #[error("Failed to write {bytes} byte submission to graphite at {addr}: {source}")]
    Write {
        /// Target address
        addr: String,
        /// Size of the submission payload
        bytes: usize,
        /// Underlying IO error
        #[source]
        source: Box<std::io::Error>,
    },
}

#[derive(Debug, Clone)]
/// Client for the graphite plaintext line protocol.
pub struct Client {
    host: String,
    port: u16,
}

impl Client {
    /// Create a new [`Client`] for the given endpoint.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
        }
    }

    /// Submit a batch of samples over a fresh connection.
    ///
    /// An empty batch performs no network operation. The connection is
    /// released when the submission completes or fails.
    ///
    /// # Errors
    ///
    /// Function will return an error if the endpoint cannot be connected
    /// to or written to.
    pub async fn submit(&self, samples: &[Sample]) -> Result<(), Error> {
        if samples.is_empty() {
            return Ok(());
        }

        let addr = format!("{host}:{port}", host = self.host, port = self.port);
        let mut stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|source| Error::Connect {
                addr: addr.clone(),
                source: Box::new(source),
            })?;

        let payload = encode(samples);
        stream
            .write_all(payload.as_bytes())
            .await
            .map_err(|source| Error::Write {
                addr: addr.clone(),
                bytes: payload.len(),
                source: Box::new(source),
            })?;
        stream.shutdown().await.map_err(|source| Error::Write {
            addr,
            bytes: payload.len(),
            source: Box::new(source),
        })?;
        debug!("wrote {bytes} byte submission", bytes = payload.len());

        // The stream drops here on every path, releasing the connection.
        Ok(())
    }
}

/// Encode a batch as protocol lines: `name value timestamp`, one record
/// per line, newline-terminated.
fn encode(samples: &[Sample]) -> String {
    let mut out = String::with_capacity(samples.len() * 64);
    for sample in samples {
        out.push_str(&format!(
            "{name} {value} {timestamp}\n",
            name = sample.name,
            value = sample.value,
            timestamp = sample.timestamp
        ));
    }
    out
}
