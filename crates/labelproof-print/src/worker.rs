// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The print worker: a single long-lived consumer draining a bounded queue of
// accepted jobs in FIFO order.  The physical printer takes one job at a
// time, so there is exactly one worker and no parallel dispatch; the bounded
// channel between intake and the worker is the system's backpressure signal.
//
// Ownership rule: after the initial pending write at intake, only this
// worker mutates a job record.  The one exception is the intake timeout
// path, which force-fails a job the worker never received; the two writers
// cannot race because the request was never enqueued.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use labelproof_core::config::AppConfig;
use labelproof_core::error::{LabelproofError, Result};
use labelproof_core::types::{JobId, JobRecord, JobTimestamp, PrintRequest, PLACEHOLDER_PNG};

use crate::camera::PhotoSource;
use crate::driver;
use crate::store::JobStore;
use crate::thumbnail;

/// Producer-side handle: accepts jobs for the worker with a bounded wait and
/// serves status reads.
///
/// Cheap to clone; every HTTP handler task holds one.
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<PrintRequest>,
    store: Arc<Mutex<JobStore>>,
    timeout: Duration,
}

impl JobSender {
    /// Accept a print request: assign an id, persist the initial `PENDING`
    /// record so the caller can poll immediately, then hand the request to
    /// the worker within the configured bound.
    ///
    /// When the queue stays full past the bound the job is force-failed with
    /// the overload message, persisted, and `QueueTimeout` is returned.
    /// Submission never hangs indefinitely.
    pub async fn submit(&self, zpl: &str, author: &str) -> Result<JobId> {
        if author.trim().is_empty() {
            return Err(LabelproofError::Validation("author must not be empty".into()));
        }

        let request = PrintRequest::new(zpl, author);
        let job_id = request.id;
        let mut record = JobRecord::new(&request);
        self.persist(&record);

        match self.tx.send_timeout(request, self.timeout).await {
            Ok(()) => {
                info!(job_id = %job_id, author = %record.author, "job queued");
                Ok(job_id)
            }
            Err(_) => {
                warn!(job_id = %job_id, "queue hand-off timed out; failing job");
                let err = LabelproofError::QueueTimeout { job_id };
                record.finish_failure(err.to_string());
                self.persist(&record);
                Err(err)
            }
        }
    }

    /// Pass-through status read.  Never mutates.
    pub fn status(&self, jobid: &str) -> Result<JobRecord> {
        self.store.lock().expect("job store lock poisoned").get(jobid)
    }

    // Post-creation persists are best-effort: a failed write must not take
    // the request path down with it.
    fn persist(&self, record: &JobRecord) {
        if let Err(e) = self.store.lock().expect("job store lock poisoned").put(record) {
            error!(job_id = %record.jobid, error = %e, "failed to persist job record");
        }
    }
}

/// The consumer half: owns the queue receiver, the camera, and exclusive
/// write access to records past `PENDING`.
pub struct PrintWorker<C: PhotoSource> {
    rx: mpsc::Receiver<PrintRequest>,
    store: Arc<Mutex<JobStore>>,
    camera: C,
    config: Arc<AppConfig>,
}

/// Create the bounded queue and spawn the worker task.
///
/// Returns the producer handle and the worker's join handle.  The worker
/// runs until every `JobSender` clone is dropped and the queue drains.
pub fn spawn<C: PhotoSource>(
    store: Arc<Mutex<JobStore>>,
    camera: C,
    config: Arc<AppConfig>,
) -> (JobSender, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let sender = JobSender {
        tx,
        store: Arc::clone(&store),
        timeout: config.enqueue_timeout(),
    };
    let worker = PrintWorker {
        rx,
        store,
        camera,
        config,
    };
    let handle = tokio::spawn(worker.run());
    (sender, handle)
}

impl<C: PhotoSource> PrintWorker<C> {
    /// Drain the queue until it closes at shutdown.  A failed job never
    /// stops the loop; the worker moves on to the next queued request.
    pub async fn run(mut self) {
        info!("print worker started");
        while let Some(request) = self.rx.recv().await {
            self.process(request).await;
        }
        info!("print worker stopped: queue closed");
    }

    async fn process(&mut self, request: PrintRequest) {
        let job_id = request.id;
        info!(job_id = %job_id, "job dequeued");

        if let Err(e) = self.put(&JobTimestamp::started(job_id)) {
            warn!(job_id = %job_id, error = %e, "failed to record job start time");
        }

        // Claim the job before any device I/O, so a poller never observes
        // PENDING on a job that is already executing.
        let mut record = match self.fetch(job_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "pending record unreadable; rebuilding");
                JobRecord::new(&request)
            }
        };
        record.begin_processing();
        self.persist(&record);

        match self.drive(&request).await {
            Ok(photo) => {
                let image_b64 = BASE64.encode(&photo);
                match thumbnail::shrink_to_width(&photo, self.config.thumbnail_width) {
                    Ok(small) => record.finish_success(image_b64, BASE64.encode(small)),
                    Err(e) => {
                        // Tolerated: the full-resolution photo is the
                        // verification artifact; the preview can be derived
                        // again on the read path.
                        warn!(job_id = %job_id, error = %e, "thumbnail derivation failed");
                        record.finish_success(image_b64, PLACEHOLDER_PNG.to_string());
                    }
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "job failed");
                record.finish_failure(e.to_string());
            }
        }

        self.persist(&record);
        info!(job_id = %job_id, status = ?record.status, "job finished");
    }

    /// Run the device protocol: reset, payload, settle, photo.
    ///
    /// An empty payload skips the printer transport entirely (photo-only
    /// job), and the outcome then rests solely on the capture.  Any transport
    /// failure returns before the capture is attempted.
    async fn drive(&self, request: &PrintRequest) -> Result<Vec<u8>> {
        if !request.zpl.is_empty() {
            let addr = &self.config.printer_address;
            let connect_timeout = self.config.connect_timeout();

            driver::reset_printer(addr, connect_timeout).await?;
            driver::send_zpl(addr, &request.zpl, connect_timeout).await?;

            debug!(
                job_id = %request.id,
                settle = ?self.config.print_settle(),
                "payload sent; settling before photo"
            );
            tokio::time::sleep(self.config.print_settle()).await;
        }

        self.camera.capture().await
    }

    fn fetch(&self, job_id: JobId) -> Result<JobRecord> {
        self.store
            .lock()
            .expect("job store lock poisoned")
            .get(&job_id.to_string())
    }

    fn put<R: crate::store::Record>(&self, record: &R) -> Result<()> {
        self.store.lock().expect("job store lock poisoned").put(record)
    }

    // Same best-effort policy as the producer side: a job that printed (or
    // failed) but could not be persisted must not kill the worker.
    fn persist(&self, record: &JobRecord) {
        if let Err(e) = self.put(record) {
            error!(job_id = %record.jobid, error = %e, "failed to persist job record");
        }
    }
}
