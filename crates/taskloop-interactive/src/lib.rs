// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The interactive variant of the agent loop: human / confirm /
//! yolo modes layered over [`taskloop_core::Agent`].

pub mod driver;
pub mod interrupt;
pub mod prompter;

pub use driver::InteractiveAgent;
pub use interrupt::InterruptSignal;
pub use prompter::{Prompter, ScriptedPrompter, StdPrompter};
