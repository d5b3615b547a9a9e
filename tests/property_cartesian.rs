// tests/property_cartesian.rs

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use fileflow::components::{cartesian_indices, run_combinator};
use fileflow::port::{OutPort, Token};

proptest! {
    #[test]
    fn yields_every_index_tuple_once_in_lexicographic_order(
        lens in proptest::collection::vec(0usize..5, 1..4)
    ) {
        let tuples: Vec<Vec<usize>> = cartesian_indices(&lens).collect();
        let expected_count: usize = lens.iter().product();

        prop_assert_eq!(tuples.len(), expected_count);
        for tuple in &tuples {
            prop_assert_eq!(tuple.len(), lens.len());
            for (idx, len) in tuple.iter().zip(&lens) {
                prop_assert!(idx < len);
            }
        }
        // Strictly increasing lexicographically: nested-loop order, no repeats.
        for pair in tuples.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn two_streams_of_m_and_n_yield_m_times_n_pairs(m in 0usize..6, n in 0usize..6) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let pairs = rt.block_on(async move {
            let cancel = CancellationToken::new();

            let mut left_src = OutPort::new("left");
            let left = left_src.connect("left", 8);
            let mut right_src = OutPort::new("right");
            let right = right_src.connect("right", 8);
            for i in 0..m {
                left_src.send(Token::new(format!("l{i}")), &cancel).await.unwrap();
            }
            for j in 0..n {
                right_src.send(Token::new(format!("r{j}")), &cancel).await.unwrap();
            }
            drop(left_src);
            drop(right_src);

            let mut left_out = OutPort::new("left");
            let mut left_sink = left_out.connect("left", 64);
            let mut right_out = OutPort::new("right");
            let mut right_sink = right_out.connect("right", 64);
            let mut outs = vec![left_out, right_out];

            run_combinator("combiner", vec![left, right], &mut outs, &cancel)
                .await
                .unwrap();
            drop(outs);

            let mut pairs = Vec::new();
            while let Some(l) = left_sink.recv(&cancel).await.unwrap() {
                let r = right_sink.recv(&cancel).await.unwrap().unwrap();
                pairs.push((l.path_str(), r.path_str()));
            }
            pairs
        });

        let expected: Vec<(String, String)> = (0..m)
            .flat_map(|i| (0..n).map(move |j| (format!("l{i}"), format!("r{j}"))))
            .collect();
        prop_assert_eq!(pairs, expected);
    }
}
