//! Property tests for retrieval ranking.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use recall_store::embeddings::providers::TrigramProvider;
use recall_store::retrieval::rank;
use recall_store::{DistanceMetric, Document, InMemoryBackend, VectorStore};

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-4))
}

/// Documents with unique ids `d0..dn` in generation order.
fn arb_documents(dim: usize) -> impl Strategy<Value = Vec<Document>> {
    proptest::collection::vec(arb_embedding(dim), 0..20).prop_map(|embeddings| {
        embeddings
            .into_iter()
            .enumerate()
            .map(|(i, e)| Document::new(format!("d{}", i), format!("doc {}", i)).with_embedding(e))
            .collect()
    })
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![Just(DistanceMetric::Cosine), Just(DistanceMetric::Euclidean)]
}

fn position(id: &str) -> usize {
    id.trim_start_matches('d').parse().unwrap()
}

mod prop_ranking {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn distances_non_decreasing_and_bounded(
            documents in arb_documents(DIM),
            query in arb_embedding(DIM),
            metric in arb_metric(),
            n_results in 0usize..25,
        ) {
            let results = rank(&documents, &query, metric, n_results, None);

            prop_assert_eq!(results.len(), n_results.min(documents.len()));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].1 <= window[1].1,
                    "results not in ascending order: {} > {}",
                    window[0].1,
                    window[1].1,
                );
            }
            for (_, distance) in &results {
                prop_assert!(*distance >= 0.0);
            }
        }

        #[test]
        fn ties_keep_insertion_order(
            documents in arb_documents(DIM),
            duplicated in 0usize..20,
            query in arb_embedding(DIM),
            metric in arb_metric(),
        ) {
            // Append copies of one embedding so ties are guaranteed
            let mut documents = documents;
            if let Some(source) = documents.get(duplicated % documents.len().max(1)).cloned() {
                let start = documents.len();
                for offset in 0..3 {
                    let mut copy = source.clone();
                    copy.id = format!("d{}", start + offset);
                    documents.push(copy);
                }
            }

            let results = rank(&documents, &query, metric, documents.len(), None);
            for window in results.windows(2) {
                if window[0].1 == window[1].1 {
                    prop_assert!(position(&window[0].0.id) < position(&window[1].0.id));
                }
            }

            let again = rank(&documents, &query, metric, documents.len(), None);
            prop_assert_eq!(results, again);
        }

        #[test]
        fn threshold_only_narrows(
            documents in arb_documents(DIM),
            query in arb_embedding(DIM),
            metric in arb_metric(),
            n_results in 1usize..25,
            threshold in 0.0f32..2.5,
        ) {
            let unfiltered = rank(&documents, &query, metric, n_results, None);
            let filtered = rank(&documents, &query, metric, n_results, Some(threshold));

            // Filtered results are exactly the unfiltered top-k within the threshold
            let expected: Vec<_> = unfiltered
                .iter()
                .filter(|(_, d)| *d <= threshold)
                .cloned()
                .collect();
            prop_assert_eq!(&filtered, &expected);
            prop_assert!(filtered.len() <= unfiltered.len());
            prop_assert!(filtered.iter().all(|(_, d)| *d <= threshold));
        }
    }
}

mod prop_store_retrieval {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn stored_texts_rank_consistently(
            texts in proptest::collection::vec("[a-z]{3,8}( [a-z]{3,8}){0,3}", 1..12),
            query in "[a-z]{3,8}( [a-z]{3,8}){0,2}",
            n_results in 1usize..15,
        ) {
            let store = VectorStore::new(
                Arc::new(InMemoryBackend::new()),
                Arc::new(TrigramProvider::new(128)),
            );
            store.create_collection("props", false, false).unwrap();

            let documents: Vec<Document> = texts
                .iter()
                .enumerate()
                .map(|(i, text)| Document::new(format!("d{}", i), text.clone()))
                .collect();
            store.insert_docs(&documents, "props", false).unwrap();

            let results = store
                .retrieve_docs(&[query.as_str()], "props", Some(n_results), None)
                .unwrap();
            prop_assert_eq!(results.len(), 1);

            let ranked = &results[0];
            prop_assert_eq!(ranked.len(), n_results.min(documents.len()));

            let ids: HashSet<&str> = ranked.iter().map(|(d, _)| d.id.as_str()).collect();
            prop_assert_eq!(ids.len(), ranked.len());

            for window in ranked.windows(2) {
                prop_assert!(window[0].1 <= window[1].1);
                if window[0].1 == window[1].1 {
                    prop_assert!(position(&window[0].0.id) < position(&window[1].0.id));
                }
            }
        }
    }
}
