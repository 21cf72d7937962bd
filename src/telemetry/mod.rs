// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging for the agent itself.
//!
//! The agent logs through `tracing`. Embedding applications that already
//! install a subscriber need nothing from here; the CLI calls
//! [`init_logging`] once at startup.
//!
//! # Guidelines
//!
//! 1. **trace** for per-sample detail (rule parsing, each recorded sample)
//! 2. **debug** for transaction lifecycle and harvests
//! 3. **warn** for dropped or invalid measurements and sink failures

mod init;

pub use init::{init_logging, LoggingConfig, LoggingGuard};
