// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelproof Print — the print-job pipeline: the persistent job store, the
// raw TCP printer transport, photo capture, thumbnail derivation, the single
// sequential worker, and mDNS advertisement.  This crate bridges between the
// core domain types in `labelproof-core` and the actual devices.

pub mod advertise;
pub mod camera;
pub mod driver;
pub mod store;
pub mod thumbnail;
pub mod worker;

pub use advertise::ServiceAdvertiser;
pub use camera::{CommandCamera, PhotoSource};
pub use store::JobStore;
pub use worker::JobSender;
