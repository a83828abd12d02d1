//! Objects repository: the bridge for streaming chunks between the service
//! and the object store, plus the analysis queue.
//!
//! Two independent consumers, one per concern. The streaming consumer owns
//! the store (and with it the open-handle map), so writes and discards for
//! all objects serialize through it; that is acceptable because each write is
//! a short hand-off of an already-buffered chunk. Retrievals spawn onto their
//! own tasks so one slow download cannot stall another. The analysis
//! consumer is the [`EnrichmentWorker`](super::EnrichmentWorker).

use bytes::Bytes;
use obscura_core::models::ImageMeta;
use obscura_core::AppError;
use obscura_storage::{Chunk, ObjectStore};
use tokio::sync::{mpsc, oneshot};

use super::data::DataRepository;
use super::enrichment::EnrichmentWorker;

/// Depth of the analysis queue. Enqueueing suspends when the backlog hits
/// this bound, pushing back on the upload path instead of growing without
/// limit.
pub const ANALYSIS_QUEUE_DEPTH: usize = 64;

enum StreamCommand {
    Store {
        id: String,
        bytes: Bytes,
        ack: oneshot::Sender<()>,
    },
    Fetch {
        id: String,
        reply: oneshot::Sender<mpsc::Receiver<Chunk>>,
    },
    Discard {
        id: String,
        ack: oneshot::Sender<()>,
    },
}

/// Handle to the streaming and analysis consumers. Cheap to clone.
#[derive(Clone)]
pub struct ObjectsRepository {
    stream_tx: mpsc::Sender<StreamCommand>,
    analyze_tx: mpsc::Sender<ImageMeta>,
}

fn consumer_gone<T>(_: T) -> AppError {
    AppError::Internal("objects repository consumer is gone".to_string())
}

impl ObjectsRepository {
    /// Spawn both consumers. The data handle flows one way, objects to data,
    /// so the analysis worker can write back enriched metadata.
    pub fn spawn(store: Box<dyn ObjectStore>, data: DataRepository) -> Self {
        let (stream_tx, stream_rx) = mpsc::channel(1);
        let (analyze_tx, analyze_rx) = mpsc::channel(ANALYSIS_QUEUE_DEPTH);

        let worker = EnrichmentWorker::new(store.source(), data);
        tokio::spawn(worker.run(analyze_rx));
        tokio::spawn(run_streaming(store, stream_rx));

        ObjectsRepository {
            stream_tx,
            analyze_tx,
        }
    }

    /// Forward one chunk of the object `id` to the store. The chunk must be
    /// an owned copy; an empty chunk marks the end of the object. The call
    /// returns once the store has taken the chunk.
    pub async fn store_chunk(&self, id: &str, bytes: Bytes) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.stream_tx
            .send(StreamCommand::Store {
                id: id.to_string(),
                bytes,
                ack,
            })
            .await
            .map_err(consumer_gone)?;
        done.await.map_err(consumer_gone)
    }

    /// Open a chunk stream over the object `id`. The receiver is handed back
    /// immediately; the reads happen on a task of their own.
    pub async fn fetch_chunks(&self, id: &str) -> Result<mpsc::Receiver<Chunk>, AppError> {
        let (reply, result) = oneshot::channel();
        self.stream_tx
            .send(StreamCommand::Fetch {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(consumer_gone)?;
        result.await.map_err(consumer_gone)
    }

    /// Best-effort removal of the object `id`.
    pub async fn discard(&self, id: &str) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.stream_tx
            .send(StreamCommand::Discard {
                id: id.to_string(),
                ack,
            })
            .await
            .map_err(consumer_gone)?;
        done.await.map_err(consumer_gone)
    }

    /// Queue an image for metadata analysis. No acknowledgement: queued items
    /// are lost if the process dies, which is fine because the bytes and the
    /// initial metadata row are already durable.
    pub async fn queue_analysis(&self, meta: ImageMeta) -> Result<(), AppError> {
        self.analyze_tx.send(meta).await.map_err(consumer_gone)
    }
}

async fn run_streaming(mut store: Box<dyn ObjectStore>, mut rx: mpsc::Receiver<StreamCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StreamCommand::Store { id, bytes, ack } => {
                let is_final = bytes.is_empty();
                if let Err(err) = store.store_chunk(&id, bytes, is_final).await {
                    // The uploader keeps going; the handle is already closed.
                    tracing::warn!(id, error = %err, "storing chunk failed");
                }
                let _ = ack.send(());
            }

            StreamCommand::Fetch { id, reply } => {
                let (chunk_tx, chunk_rx) = mpsc::channel(1);
                tokio::spawn(store.retrieve_chunks(&id, chunk_tx));
                let _ = reply.send(chunk_rx);
            }

            StreamCommand::Discard { id, ack } => {
                store.discard(&id).await;
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("streaming consumer stopping");
}
