use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::{Event, Property, PropertyUpdate};
use crate::observability::{WAL_FLUSH_BATCH_SIZE, WAL_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

use super::{PropertyStore, StoreError};

// ── Group-commit writer ──────────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the log. Appends that queue up while a flush is running are written
/// together and share a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_control(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut wal, batch);
        // Control commands run after the appends queued ahead of them.
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
    tracing::debug!("wal writer: channel closed, exiting");
}

fn commit_batch(wal: &mut Wal, batch: Vec<Pending>) {
    metrics::histogram!(WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();
    let result = write_batch(wal, &batch);
    metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    if let Err(ref e) = result {
        tracing::error!(events = batch.len(), "wal flush failed: {e}");
    }
    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

/// All or nothing: on error the log is cut back to where the batch began, so
/// no frame of a rejected write is left in front of the next batch.
fn write_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err() {
        let _ = wal.rollback();
    }
    result
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

// ── Store ────────────────────────────────────────────────

/// Property store backed by an in-memory map and an append-only log.
///
/// Every write is logged and fsynced before it becomes visible. On open the
/// log is replayed to rebuild the map.
pub struct WalStore {
    properties: DashMap<Ulid, Property>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Writers hold this shared; compaction holds it exclusively so the
    /// snapshot it writes cannot miss an in-flight append.
    compact_gate: RwLock<()>,
}

fn apply_event(properties: &DashMap<Ulid, Property>, event: Event) {
    match event {
        Event::PropertyRegistered { property } => {
            properties.insert(property.id, property);
        }
        Event::PropertyUpdated { id, update } => match properties.get_mut(&id) {
            Some(mut entry) => update.apply(entry.value_mut()),
            None => tracing::warn!(%id, "wal replay: update for unknown property, skipped"),
        },
    }
}

impl WalStore {
    /// Replay `path` and start the writer task. Must be called inside a Tokio
    /// runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, events) = Wal::recover(path)?;
        let replayed = events.len();
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let properties = DashMap::new();
        for event in events {
            apply_event(&properties, event);
        }
        tracing::info!(
            path = %path.display(),
            events = replayed,
            properties = properties.len(),
            "wal store opened"
        );

        Ok(Self {
            properties,
            wal_tx,
            compact_gate: RwLock::new(()),
        })
    }

    /// Send a command to the writer task and wait for its reply.
    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> WalCommand) -> Result<T, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(command(tx))
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))
    }

    async fn wal_append(&self, event: Event) -> Result<(), StoreError> {
        self.ask(|response| WalCommand::Append { event, response })
            .await?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// Rewrite the log as one registration per property.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let _exclusive = self.compact_gate.write().await;
        let events: Vec<Event> = self
            .properties
            .iter()
            .map(|e| Event::PropertyRegistered {
                property: e.value().clone(),
            })
            .collect();
        let count = events.len();
        self.ask(|response| WalCommand::Compact { events, response })
            .await?
            .map_err(|e| StoreError::Wal(e.to_string()))?;
        Ok(count)
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.ask(|response| WalCommand::AppendsSinceCompact { response })
            .await
            .unwrap_or(0)
    }
}

#[async_trait]
impl PropertyStore for WalStore {
    async fn load_property(&self, id: Ulid) -> Result<Option<Property>, StoreError> {
        Ok(self.properties.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_property(&self, property: Property) -> Result<(), StoreError> {
        let _shared = self.compact_gate.read().await;
        let id = property.id;
        if self.properties.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        self.wal_append(Event::PropertyRegistered {
            property: property.clone(),
        })
        .await?;
        self.properties.insert(id, property);
        Ok(())
    }

    async fn save_property(&self, id: Ulid, update: PropertyUpdate) -> Result<Property, StoreError> {
        let _shared = self.compact_gate.read().await;
        let mut next = self
            .properties
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))?;
        update.clone().apply(&mut next);
        self.wal_append(Event::PropertyUpdated { id, update }).await?;
        self.properties.insert(id, next.clone());
        Ok(next)
    }

    fn property_count(&self) -> usize {
        self.properties.len()
    }

    fn active_property_count(&self) -> usize {
        self.properties.iter().filter(|e| e.value().active).count()
    }
}
