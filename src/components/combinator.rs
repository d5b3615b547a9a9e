// src/components/combinator.rs

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{FlowError, Result};
use crate::port::{InPort, OutPort, Token, send_tuple};

/// Buffer every input stream, then emit their Cartesian product.
///
/// `inputs[k]` pairs with `outputs[k]`. Combinations are emitted in
/// nested-loop order with `inputs[0]` outermost, each one as an atomic
/// tuple (one token per output port). If any input is empty nothing is
/// emitted. Output ports close when the caller drops them.
///
/// Returns the number of combinations emitted.
pub async fn run_combinator(
    process: &str,
    inputs: Vec<InPort>,
    outputs: &mut [OutPort],
    cancel: &CancellationToken,
) -> Result<usize> {
    if inputs.len() != outputs.len() {
        return Err(FlowError::config(format!(
            "combinator '{process}' has {} inputs but {} outputs",
            inputs.len(),
            outputs.len()
        )));
    }

    let buffers = drain_all(inputs, cancel).await?;
    let lens: Vec<usize> = buffers.iter().map(Vec::len).collect();
    debug!(process = %process, streams = ?lens, "all combinator inputs drained");

    let mut emitted = 0;
    for combo in cartesian_indices(&lens) {
        let tuple: Vec<Token> = combo
            .iter()
            .enumerate()
            .map(|(stream, &idx)| buffers[stream][idx].clone())
            .collect();
        send_tuple(outputs, tuple, cancel).await?;
        emitted += 1;
    }

    info!(process = %process, combinations = emitted, "combinator finished");
    Ok(emitted)
}

/// Read every input to completion concurrently.
///
/// Draining one stream at a time could deadlock against a producer that
/// writes to several of our inputs in lockstep.
async fn drain_all(inputs: Vec<InPort>, cancel: &CancellationToken) -> Result<Vec<Vec<Token>>> {
    let count = inputs.len();
    let mut set = JoinSet::new();

    for (idx, mut port) in inputs.into_iter().enumerate() {
        let cancel = cancel.clone();
        set.spawn(async move {
            let mut buf = Vec::new();
            while let Some(token) = port.recv(&cancel).await? {
                buf.push(token);
            }
            debug!(port = %port.name(), tokens = buf.len(), "input drained");
            Ok::<_, FlowError>((idx, buf))
        });
    }

    let mut buffers: Vec<Vec<Token>> = vec![Vec::new(); count];
    while let Some(joined) = set.join_next().await {
        let (idx, buf) = joined.map_err(|e| FlowError::Other(e.into()))??;
        buffers[idx] = buf;
    }
    Ok(buffers)
}

/// Index tuples of the Cartesian product of sequences with the given
/// lengths, in nested-loop order (last position varies fastest).
///
/// Yields nothing when `lens` is empty or any length is zero.
pub fn cartesian_indices(lens: &[usize]) -> CartesianIndices {
    let done = lens.is_empty() || lens.contains(&0);
    CartesianIndices {
        lens: lens.to_vec(),
        next: if done { None } else { Some(vec![0; lens.len()]) },
    }
}

/// Iterator returned by [`cartesian_indices`].
#[derive(Debug, Clone)]
pub struct CartesianIndices {
    lens: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Iterator for CartesianIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut advanced = current.clone();
        for pos in (0..advanced.len()).rev() {
            advanced[pos] += 1;
            if advanced[pos] < self.lens[pos] {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[pos] = 0;
        }

        // Odometer rolled over: `current` was the last tuple.
        Some(current)
    }
}
