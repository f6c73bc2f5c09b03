use std::{
    fs,
    io::ErrorKind,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::runtime::CoreRuntime;

/// One NDJSON line from the broker sidecar: a topic-tagged delivery with
/// its key, correlation header and raw payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireDelivery {
    topic: String,
    key: String,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    offset: Option<u64>,
    value: serde_json::Value,
}

/// One NDJSON line back to the sidecar once the lane has acked (or the
/// delivery was rejected before entering a lane).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAck {
    acked: bool,
    topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Process boundary of the core: an NDJSON-over-unix-socket ingress a
/// broker sidecar connects to. Not a broker client: partitioning, offsets
/// and redelivery stay on the sidecar's side of the socket; the bridge
/// only forwards deliveries into lanes and reports acks back.
pub struct BrokerBridge {
    socket_path: PathBuf,
}

impl BrokerBridge {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub async fn run(&self, runtime: Arc<CoreRuntime>, shutdown: CancellationToken) -> Result<()> {
        remove_stale_socket(&self.socket_path)?;
        let listener = UnixListener::bind(&self.socket_path).with_context(|| {
            format!("failed to bind bridge socket {}", self.socket_path.display())
        })?;
        tracing::info!(socket = %self.socket_path.display(), "bridge_listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let runtime = Arc::clone(&runtime);
                            let connection_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, runtime, connection_shutdown).await;
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "bridge_accept_failed");
                        }
                    }
                }
            }
        }

        let _ = fs::remove_file(&self.socket_path);
        Ok(())
    }
}

fn remove_stale_socket(socket_path: &Path) -> Result<()> {
    match fs::metadata(socket_path) {
        Ok(metadata) if metadata.file_type().is_socket() => {
            fs::remove_file(socket_path).with_context(|| {
                format!("failed to remove stale socket {}", socket_path.display())
            })?;
            Ok(())
        }
        Ok(_) => bail!(
            "bridge socket path {} exists and is not a socket",
            socket_path.display()
        ),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| {
            format!("failed to inspect bridge socket path {}", socket_path.display())
        }),
    }
}

async fn handle_connection(
    stream: UnixStream,
    runtime: Arc<CoreRuntime>,
    shutdown: CancellationToken,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<WireAck>();

    let writer = tokio::spawn(async move {
        while let Some(ack) = ack_rx.recv().await {
            let Ok(mut line) = serde_json::to_vec(&ack) else {
                continue;
            };
            line.push(b'\n');
            if write_half.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "bridge_read_failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let delivery: WireDelivery = match serde_json::from_str(&line) {
            Ok(delivery) => delivery,
            Err(err) => {
                let _ = ack_tx.send(WireAck {
                    acked: false,
                    topic: String::new(),
                    offset: None,
                    error: Some(format!("unparseable delivery line: {err}")),
                });
                continue;
            }
        };

        let WireDelivery {
            topic,
            key,
            correlation_id,
            offset,
            value,
        } = delivery;
        match runtime
            .dispatch_raw(&topic, key, correlation_id, value)
            .await
        {
            Ok(ack_ready) => {
                let ack_tx = ack_tx.clone();
                let ack_topic = topic;
                tokio::spawn(async move {
                    let _ = ack_ready.await;
                    let _ = ack_tx.send(WireAck {
                        acked: true,
                        topic: ack_topic,
                        offset,
                        error: None,
                    });
                });
            }
            Err(err) => {
                let _ = ack_tx.send(WireAck {
                    acked: false,
                    topic,
                    offset,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    drop(ack_tx);
    let _ = writer.await;
}
