// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Keyboard-interrupt wiring: forwards Ctrl+C onto an `mpsc` channel, raced
//! against the in-flight step via `tokio::select!` in
//! [`crate::driver::InteractiveAgent::run`].

use tokio::sync::mpsc;

/// Receiving half of the interrupt channel; `run()` races this against
/// `Agent::think()`/`Agent::act()`.
pub struct InterruptSignal(pub(crate) mpsc::Receiver<()>);

impl InterruptSignal {
    /// Spawn a task that forwards Ctrl+C to a fresh channel.
    pub fn from_ctrl_c() -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self(rx)
    }

    /// Build from a caller-owned channel (tests simulate Ctrl+C by sending
    /// on the paired `Sender`).
    pub fn from_receiver(rx: mpsc::Receiver<()>) -> Self {
        Self(rx)
    }

    /// A signal that never fires — used for `yolo`/batch contexts that
    /// don't want interactive interrupt handling.
    pub fn never() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self(rx)
    }
}
