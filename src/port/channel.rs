// src/port/channel.rs

//! Runtime port halves backed by bounded `tokio::sync::mpsc` channels.
//!
//! Every input port owns exactly one channel. The output port it is
//! connected to holds the `Sender` for it, so an output port with several
//! downstream inputs broadcasts by sending one copy per target.
//!
//! Both directions take a [`CancellationToken`]: once the run is cancelled,
//! blocked reads and writes return [`FlowError::Cancelled`] instead of
//! waiting forever.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{FlowError, Result};
use crate::port::Token;

/// Receiving end of a port connection.
#[derive(Debug)]
pub struct InPort {
    name: String,
    rx: mpsc::Receiver<Token>,
}

impl InPort {
    pub fn new(name: impl Into<String>, rx: mpsc::Receiver<Token>) -> Self {
        Self {
            name: name.into(),
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next token.
    ///
    /// Returns `Ok(None)` once the connected output port has closed and the
    /// buffer is drained.
    pub async fn recv(&mut self, cancel: &CancellationToken) -> Result<Option<Token>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FlowError::Cancelled),
            token = self.rx.recv() => Ok(token),
        }
    }
}

/// Sending end of one or more port connections.
#[derive(Debug)]
pub struct OutPort {
    name: String,
    targets: Vec<mpsc::Sender<Token>>,
    panic_cancel: Option<CancellationToken>,
}

impl OutPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            panic_cancel: None,
        }
    }

    /// Cancel `token` if this port is dropped while its owner unwinds from
    /// a panic, so downstream reads fail with `Cancelled` instead of seeing
    /// an ordinary end of stream.
    pub fn cancel_on_panic(mut self, token: CancellationToken) -> Self {
        self.panic_cancel = Some(token);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a new bounded channel from this output to a fresh input port.
    pub fn connect(&mut self, in_name: impl Into<String>, capacity: usize) -> InPort {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.targets.push(tx);
        InPort::new(in_name, rx)
    }

    /// Broadcast a single token to every connected input.
    pub async fn send(&mut self, token: Token, cancel: &CancellationToken) -> Result<()> {
        send_tuple(std::slice::from_mut(self), vec![token], cancel).await
    }
}

impl Drop for OutPort {
    // Runs before `targets` is dropped, so the token is cancelled while
    // every channel is still open.
    fn drop(&mut self) {
        if let Some(token) = &self.panic_cancel {
            if std::thread::panicking() {
                debug!(port = %self.name, "output port dropped during panic; cancelling run");
                token.cancel();
            }
        }
    }
}

/// Send one token per output port as a single atomic step.
///
/// Capacity is reserved on every target of every port first; only then are
/// the tokens committed. A consumer reading one token from each of these
/// ports in lockstep therefore never observes half of a tuple.
///
/// Targets whose receiver has gone away are dropped from their port.
pub async fn send_tuple(
    ports: &mut [OutPort],
    tokens: Vec<Token>,
    cancel: &CancellationToken,
) -> Result<()> {
    if ports.len() != tokens.len() {
        return Err(FlowError::Other(anyhow::anyhow!(
            "tuple arity mismatch: {} ports, {} tokens",
            ports.len(),
            tokens.len()
        )));
    }

    let mut closed: Vec<(usize, usize)> = Vec::new();

    {
        let reserve_all = async {
            let mut permits = Vec::new();
            for (port_idx, port) in ports.iter().enumerate() {
                for (target_idx, tx) in port.targets.iter().enumerate() {
                    match tx.reserve().await {
                        Ok(permit) => permits.push((port_idx, permit)),
                        Err(_) => closed.push((port_idx, target_idx)),
                    }
                }
            }
            permits
        };

        let permits = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            permits = reserve_all => permits,
        };

        for (port_idx, permit) in permits {
            permit.send(tokens[port_idx].clone());
        }
    }

    for (port_idx, target_idx) in closed.into_iter().rev() {
        let port = &mut ports[port_idx];
        debug!(port = %port.name, "downstream input closed; dropping target");
        port.targets.remove(target_idx);
    }

    Ok(())
}
