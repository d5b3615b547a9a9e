// tests/combinator_ports.rs

use std::error::Error;

use tokio_util::sync::CancellationToken;

use fileflow::components::run_combinator;
use fileflow::errors::FlowError;
use fileflow::port::{InPort, OutPort, Token};
use fileflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Feed `items` into a fresh port and close it.
async fn source(name: &str, items: &[&str], cancel: &CancellationToken) -> InPort {
    let mut out = OutPort::new(name);
    let input = out.connect(name, 16);
    for item in items {
        out.send(Token::new(*item), cancel).await.unwrap();
    }
    input
}

async fn drain(mut port: InPort, cancel: &CancellationToken) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(token) = port.recv(cancel).await.unwrap() {
        seen.push(token.path_str());
    }
    seen
}

/// Combinator outputs plus a downstream input attached to each.
fn sinks(names: &[&str]) -> (Vec<OutPort>, Vec<InPort>) {
    let mut outs = Vec::new();
    let mut ins = Vec::new();
    for name in names {
        let mut out = OutPort::new(*name);
        ins.push(out.connect(*name, 64));
        outs.push(out);
    }
    (outs, ins)
}

#[tokio::test]
async fn emits_product_in_nested_loop_order() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();

    let letters = source("letters", &["a", "b"], &cancel).await;
    let numbers = source("numbers", &["1", "2", "3"], &cancel).await;
    let (mut outs, mut ins) = sinks(&["letters", "numbers"]);

    let emitted = with_timeout(run_combinator(
        "combiner",
        vec![letters, numbers],
        &mut outs,
        &cancel,
    ))
    .await?;
    assert_eq!(emitted, 6);
    drop(outs);

    let numbers_out = drain(ins.pop().unwrap(), &cancel).await;
    let letters_out = drain(ins.pop().unwrap(), &cancel).await;
    let pairs: Vec<(String, String)> = letters_out.into_iter().zip(numbers_out).collect();

    let expected: Vec<(String, String)> = [
        ("a", "1"),
        ("a", "2"),
        ("a", "3"),
        ("b", "1"),
        ("b", "2"),
        ("b", "3"),
    ]
    .iter()
    .map(|(l, n)| (l.to_string(), n.to_string()))
    .collect();
    assert_eq!(pairs, expected);
    Ok(())
}

#[tokio::test]
async fn empty_input_emits_nothing_and_closes_outputs() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();

    let letters = source("letters", &["a", "b"], &cancel).await;
    let numbers = source("numbers", &[], &cancel).await;
    let (mut outs, ins) = sinks(&["letters", "numbers"]);

    let emitted = with_timeout(run_combinator(
        "combiner",
        vec![letters, numbers],
        &mut outs,
        &cancel,
    ))
    .await?;
    assert_eq!(emitted, 0);
    drop(outs);

    for port in ins {
        assert!(drain(port, &cancel).await.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn single_stream_is_a_pass_through() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();

    let only = source("only", &["x", "y", "z"], &cancel).await;
    let (mut outs, mut ins) = sinks(&["only"]);

    let emitted = with_timeout(run_combinator("combiner", vec![only], &mut outs, &cancel)).await?;
    assert_eq!(emitted, 3);
    drop(outs);

    assert_eq!(drain(ins.remove(0), &cancel).await, vec!["x", "y", "z"]);
    Ok(())
}

#[tokio::test]
async fn every_downstream_receives_each_tuple() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();

    let left = source("left", &["a", "b"], &cancel).await;
    let right = source("right", &["1"], &cancel).await;

    let mut left_out = OutPort::new("left");
    let first = left_out.connect("first", 8);
    let second = left_out.connect("second", 8);
    let mut outs = vec![left_out, OutPort::new("right")];

    let emitted = with_timeout(run_combinator("combiner", vec![left, right], &mut outs, &cancel)).await?;
    assert_eq!(emitted, 2);
    drop(outs);

    assert_eq!(drain(first, &cancel).await, vec!["a", "b"]);
    assert_eq!(drain(second, &cancel).await, vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn cancellation_unblocks_a_waiting_combinator() -> TestResult {
    init_tracing();
    let cancel = CancellationToken::new();

    // Upstream that never closes.
    let mut upstream = OutPort::new("open");
    let open = upstream.connect("open", 4);
    let (mut outs, _ins) = sinks(&["open"]);

    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        run_combinator("combiner", vec![open], &mut outs, &task_cancel).await
    });

    cancel.cancel();
    let result = with_timeout(handle).await?;
    assert!(matches!(result, Err(FlowError::Cancelled)), "got {result:?}");
    drop(upstream);
    Ok(())
}

#[tokio::test]
async fn mismatched_port_counts_are_rejected() {
    let cancel = CancellationToken::new();
    let only = source("only", &["x"], &cancel).await;
    let (mut outs, _ins) = sinks(&["a", "b"]);

    let err = run_combinator("combiner", vec![only], &mut outs, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ConfigError(_)), "got {err:?}");
}
