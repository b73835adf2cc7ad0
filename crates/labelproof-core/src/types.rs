// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelproof print service: the print request, the
// durable job record with its lifecycle state machine, and the audit
// timestamp record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 1x1 transparent PNG, base64-encoded.  Placeholder for the verification
/// photo until one exists (or when capture never happened).
pub const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a print job.
///
/// Serialized in SCREAMING case (`"PENDING"`, ...), the wire format clients
/// already poll against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Created at intake, not yet claimed by the worker.
    Pending,
    /// Claimed by the worker; device I/O may be in flight.
    Processing,
    /// Printed (or photo-only) and photographed.
    Succeeded,
    /// Device, capture, or hand-off failure; see the record's message.
    Failed,
    /// Reserved sentinel. Never produced by the normal lifecycle.
    Missing,
}

impl JobState {
    /// Whether this state ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// An accepted print request on its way to the worker.
///
/// Ephemeral: never persisted directly.  The `id` is assigned at intake and
/// carries over to the durable [`JobRecord`].
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub id: JobId,
    /// Raw ZPL payload.  Empty means "photo-only": the printer transport is
    /// skipped entirely and only the verification photo is taken.
    pub zpl: String,
    /// Identity supplied by the authentication layer.
    pub author: String,
}

impl PrintRequest {
    pub fn new(zpl: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            zpl: zpl.into(),
            author: author.into(),
        }
    }
}

/// The durable status record for one print job.
///
/// Field names match the polling wire format.  Only the worker mutates a
/// record past `PENDING` (the intake timeout path being the one exception,
/// for jobs the worker never received); once `done` is set the record is
/// immutable and every transition method becomes a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub jobid: JobId,
    pub status: JobState,
    #[serde(rename = "ZPL")]
    pub zpl: String,
    /// Full-resolution verification photo, base64 PNG.
    #[serde(rename = "image")]
    pub image_b64: String,
    /// Thumbnail derived from `image`, base64 PNG.
    #[serde(rename = "image_small")]
    pub image_small_b64: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub author: String,
    /// Latest human-readable status line.
    pub message: String,
    /// Every distinct consecutive `message` this record has carried.
    pub log: Vec<String>,
    pub done: bool,
}

impl JobRecord {
    /// Create the initial `PENDING` record for an accepted request.
    pub fn new(request: &PrintRequest) -> Self {
        let now = Utc::now();
        let mut record = Self {
            jobid: request.id,
            status: JobState::Pending,
            zpl: request.zpl.clone(),
            image_b64: PLACEHOLDER_PNG.to_string(),
            image_small_b64: PLACEHOLDER_PNG.to_string(),
            created: now,
            updated: now,
            author: request.author.clone(),
            message: String::new(),
            log: Vec::new(),
            done: false,
        };
        record.set_message("Job created");
        record
    }

    /// Set the status line, appending to `log` only when it differs from the
    /// last entry.  Re-setting the same message never duplicates the tail.
    pub fn set_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !message.is_empty() && self.log.last() != Some(&message) {
            self.log.push(message.clone());
        }
        self.message = message;
        self.touch();
    }

    /// Bump `updated`, keeping it non-decreasing even against clock slew.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated {
            self.updated = now;
        }
    }

    /// `PENDING` -> `PROCESSING`.  Called by the worker immediately on
    /// dequeue, before any device I/O, so a concurrent poller never sees
    /// `PENDING` on a job that has started executing.
    pub fn begin_processing(&mut self) {
        if self.done {
            return;
        }
        self.status = JobState::Processing;
        self.set_message("Job started");
    }

    /// `PROCESSING` -> `SUCCEEDED` with the captured photo and its thumbnail.
    pub fn finish_success(&mut self, image_b64: String, image_small_b64: String) {
        if self.done {
            return;
        }
        self.status = JobState::Succeeded;
        self.image_b64 = image_b64;
        self.image_small_b64 = image_small_b64;
        self.done = true;
        self.set_message("Successfully processed request");
    }

    /// Transition to terminal `FAILED`, recording the underlying error text.
    /// The verification image keeps whatever it held (usually the
    /// placeholder, since capture is not attempted after a transport failure).
    pub fn finish_failure(&mut self, message: impl Into<String>) {
        if self.done {
            return;
        }
        self.status = JobState::Failed;
        self.done = true;
        self.set_message(message);
    }
}

/// Audit record mapping a job start time to its job id, kept in a separate
/// table from the status records.
///
/// Keyed by `"{timestamp}/{jobid}"` rather than the bare timestamp so that
/// two jobs starting within the same second both keep their audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTimestamp {
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
}

impl JobTimestamp {
    /// Record that `job_id` started now.
    pub fn started(job_id: JobId) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id,
        }
    }
}
