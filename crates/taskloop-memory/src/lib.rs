// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Optional long-run memory: middle-region summarization with a
//! source-range cache, plus a tagged-experience retrieval stub. Off by
//! default; enable via `MemoryConfig::enabled` and the `memory` cargo
//! feature.

mod backend;
mod cache;
mod compact;
mod retrieval;

pub use backend::{SummaryBackend, SummaryError};
pub use cache::{range_key, SummaryCache};
pub use compact::{maybe_compact, CompactOutcome};
pub use retrieval::{Experience, ExperienceStore};
