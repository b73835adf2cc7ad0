// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelproof.

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all Labelproof operations.
#[derive(Debug, Error)]
pub enum LabelproofError {
    // -- Intake errors --
    #[error("invalid request: {0}")]
    Validation(String),

    /// The queue did not accept the job within the bound.  Carries the job
    /// id: the force-failed record is still pollable under it.
    #[error("timed out handing job to worker; is the system overloaded?")]
    QueueTimeout { job_id: JobId },

    // -- Device errors --
    #[error("printer connect failed: {0}")]
    Connect(String),

    #[error("printer write failed: {0}")]
    Write(String),

    #[error("photo capture failed: {0}")]
    Capture(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Storage / persistence --
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("stored record failed to decode: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Store(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelproofError>;
