//! Background tile fetching on a fixed thread pool.
//!
//! Requests are queued on a bounded channel, fetched and decoded by worker
//! threads with bounded retry, and delivered back through a second bounded
//! channel that the main thread drains once per tick. A request whose
//! [`CancelToken`] is set is skipped before fetching and its result discarded
//! after. A panic while fetching or decoding is reported as a failed load and
//! the worker keeps serving the queue.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use geotile_coords::TileCoordinate;
use geotile_provider::{Attempted, HeightRaster, ProviderError, RetryPolicy, retry_with_backoff};

use crate::{CancelToken, LoadKind, LoadOutcome, LoadPayload, LoadRequest, TileLoadError};

/// Sizing and retry behaviour of a [`TileLoader`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoaderSettings {
    /// Worker threads. Tile fetching is I/O bound, so this may exceed core count.
    pub worker_threads: usize,
    /// Queued-but-unstarted requests before `submit` rejects.
    pub queue_capacity: usize,
    /// Completed outcomes buffered before workers block.
    pub result_capacity: usize,
    /// Retry policy applied to every fetch.
    pub retry: RetryPolicy,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().clamp(2, 8),
            queue_capacity: 256,
            result_capacity: 256,
            retry: RetryPolicy::default(),
        }
    }
}

type TaskKey = (TileCoordinate, LoadKind);

/// Thread pool that turns [`LoadRequest`]s into [`LoadOutcome`]s.
pub struct TileLoader {
    task_sender: Sender<LoadRequest>,
    result_receiver: Receiver<LoadOutcome>,
    /// Token and cancellation flag of the latest submitted request per tile and kind.
    active_tasks: Arc<DashMap<TaskKey, (u64, CancelToken)>>,
    in_flight: Arc<AtomicU64>,
    worker_threads: usize,
}

impl TileLoader {
    /// Spawn the worker pool.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn new(settings: LoaderSettings) -> std::io::Result<Self> {
        let worker_threads = settings.worker_threads.max(1);
        let (task_sender, task_receiver) = bounded::<LoadRequest>(settings.queue_capacity.max(1));
        let (result_sender, result_receiver) = bounded::<LoadOutcome>(settings.result_capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));

        for index in 0..worker_threads {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let retry = settings.retry.clone();

            std::thread::Builder::new()
                .name(format!("tile-loader-{index}"))
                .spawn(move || {
                    while let Ok(request) = receiver.recv() {
                        if request.cancel.is_cancelled() {
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }

                        let outcome = catch_unwind(AssertUnwindSafe(|| execute(&request, &retry)))
                            .unwrap_or_else(|payload| Some(panicked(&request, payload.as_ref())));

                        if let Some(outcome) = outcome {
                            if !request.cancel.is_cancelled() {
                                let _ = sender.send(outcome);
                            }
                        }

                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                })?;
        }

        log::debug!("tile loader started with {worker_threads} workers");

        Ok(Self {
            task_sender,
            result_receiver,
            active_tasks: Arc::new(DashMap::new()),
            in_flight,
            worker_threads,
        })
    }

    /// Spawn a pool with [`LoaderSettings::default`].
    ///
    /// # Errors
    ///
    /// See [`TileLoader::new`].
    pub fn with_defaults() -> std::io::Result<Self> {
        Self::new(LoaderSettings::default())
    }

    /// Queue a request for background fetching.
    ///
    /// Returns `Err(request)` if the queue is full; the caller may resubmit later.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, request: LoadRequest) -> Result<(), LoadRequest> {
        let key = (request.coordinate, request.kind);
        let entry = (request.token, request.cancel.clone());
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        match self.task_sender.try_send(request) {
            Ok(()) => {
                if let Some((_, previous)) = self.active_tasks.insert(key, entry) {
                    previous.cancel();
                }
                Ok(())
            }
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                Err(e.into_inner())
            }
        }
    }

    /// Cancel the latest request for a tile and kind, if one is active.
    pub fn cancel(&self, coordinate: &TileCoordinate, kind: LoadKind) {
        if let Some((_, (_, cancel))) = self.active_tasks.remove(&(*coordinate, kind)) {
            cancel.cancel();
        }
    }

    /// Cancel every active request.
    pub fn cancel_all(&self) {
        self.active_tasks.retain(|_, (_, cancel)| {
            cancel.cancel();
            false
        });
    }

    /// Drain all completed outcomes. Call once per tick on the main thread.
    pub fn drain_results(&self) -> Vec<LoadOutcome> {
        let mut results = Vec::new();
        while let Ok(outcome) = self.result_receiver.try_recv() {
            self.active_tasks
                .remove_if(&(outcome.coordinate, outcome.kind), |_, (token, _)| *token == outcome.token);
            results.push(outcome);
        }
        results
    }

    /// Requests queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Whether a request for the tile and kind is active.
    pub fn is_pending(&self, coordinate: &TileCoordinate, kind: LoadKind) -> bool {
        self.active_tasks.contains_key(&(*coordinate, kind))
    }

    /// Number of worker threads.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Fetch and decode one request on the calling thread.
///
/// Returns `None` when cancellation was observed before an attempt started.
fn execute(request: &LoadRequest, retry: &RetryPolicy) -> Option<LoadOutcome> {
    let coordinate = request.coordinate;
    let kind = request.kind;
    let attempted = retry_with_backoff(
        retry,
        || request.cancel.is_cancelled(),
        ProviderError::is_transient,
        |attempt| {
            if attempt > 1 {
                log::debug!("retrying {kind} tile {coordinate} (attempt {attempt})");
            }
            request.provider.fetch_tile(&coordinate)
        },
    );

    let result = match attempted {
        Attempted::Cancelled => return None,
        Attempted::Failed { error, attempts } => Err(TileLoadError::Provider {
            coordinate,
            kind,
            attempts,
            source: error,
        }),
        Attempted::Succeeded { value, .. } if value.width() == 0 || value.height() == 0 => {
            Err(TileLoadError::EmptyTile { coordinate, kind })
        }
        Attempted::Succeeded { value, .. } => match kind {
            LoadKind::Texture => Ok(LoadPayload::Texture(Arc::new(value))),
            LoadKind::Height => match request.height.validate() {
                Ok(()) => Ok(LoadPayload::Height(HeightRaster::decode(
                    &value,
                    request.height.decoder,
                    request.height.resolution,
                    request.height.exaggeration,
                ))),
                Err(source) => Err(TileLoadError::InvalidSettings { coordinate, source }),
            },
        },
    };

    Some(LoadOutcome {
        coordinate,
        kind,
        token: request.token,
        result,
    })
}

/// Failed outcome for a request whose execution panicked.
fn panicked(request: &LoadRequest, payload: &(dyn Any + Send)) -> LoadOutcome {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    log::error!(
        "{} load for tile {} panicked: {message}",
        request.kind,
        request.coordinate
    );
    LoadOutcome {
        coordinate: request.coordinate,
        kind: request.kind,
        token: request.token,
        result: Err(TileLoadError::Panicked {
            coordinate: request.coordinate,
            kind: request.kind,
            message,
        }),
    }
}
