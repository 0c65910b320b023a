//! Concurrent callers sharing one store or one backend.

use crate::backend::{InMemoryBackend, SqliteBackend, StorageBackend};
use crate::embeddings::providers::TrigramProvider;
use crate::store::VectorStore;
use crate::types::{CollectionKey, Document};
use std::sync::{Arc, Barrier};
use std::thread;

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_store(backend: Arc<dyn StorageBackend>) -> Arc<VectorStore> {
        Arc::new(VectorStore::new(backend, Arc::new(TrigramProvider::new(64))))
    }

    fn backends() -> Vec<Arc<dyn StorageBackend>> {
        vec![
            Arc::new(InMemoryBackend::new()),
            Arc::new(SqliteBackend::open_in_memory().unwrap()),
        ]
    }

    #[test]
    fn test_writers_on_different_collections() {
        for backend in backends() {
            let store = shared_store(backend);
            let workers = 4;
            let per_worker = 25;

            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        let name = format!("worker-{}", w);
                        store.create_collection(&name, false, false).unwrap();
                        for i in 0..per_worker {
                            let doc = Document::new(i.to_string(), format!("note {} from {}", i, w));
                            store.insert_docs(&[doc], &name, false).unwrap();
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            for w in 0..workers {
                let name = format!("worker-{}", w);
                assert_eq!(store.count_docs(&name).unwrap(), per_worker);
            }
        }
    }

    #[test]
    fn test_readers_alongside_writer() {
        let store = shared_store(Arc::new(InMemoryBackend::new()));
        store.create_collection("shared", false, false).unwrap();
        store
            .insert_docs(&[Document::new("seed", "seed note")], "shared", false)
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let doc = Document::new(format!("w{}", i), format!("written note {}", i));
                    store.insert_docs(&[doc], "shared", false).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let results = store
                            .retrieve_docs(&["note"], "shared", Some(5), None)
                            .unwrap();
                        assert!(!results[0].is_empty());
                        assert!(results[0].windows(2).all(|w| w[0].1 <= w[1].1));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(store.count_docs("shared").unwrap(), 51);
    }

    #[test]
    fn test_stores_sharing_backend_share_locks() {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let a = shared_store(Arc::clone(&backend));
        let b = shared_store(Arc::clone(&backend));
        a.create_collection("shared", false, false).unwrap();

        let key = CollectionKey::new(a.partition_key(), "shared");
        let held = backend.collection_locks().handle(&key);
        let writer = held.write();

        // A second store on the same backend must wait for the same lock
        let reader = thread::spawn(move || b.count_docs("shared").unwrap());
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!reader.is_finished());

        drop(writer);
        assert_eq!(reader.join().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ids_across_stores_insert_once() {
        for backend in backends() {
            let first = shared_store(Arc::clone(&backend));
            let second = shared_store(Arc::clone(&backend));
            first.create_collection("race", false, false).unwrap();

            let ids = 100;
            let start = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [first, second]
                .into_iter()
                .enumerate()
                .map(|(w, store)| {
                    let start = Arc::clone(&start);
                    thread::spawn(move || {
                        start.wait();
                        let mut accepted = Vec::new();
                        for i in 0..ids {
                            let doc = Document::new(i.to_string(), format!("writer {} note {}", w, i));
                            match store.insert_docs(&[doc], "race", false) {
                                Ok(()) => accepted.push(i),
                                Err(recall_core::AppError::DuplicateKey { .. }) => {}
                                Err(e) => panic!("unexpected error: {}", e),
                            }
                        }
                        (store, accepted)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let total: usize = results.iter().map(|(_, accepted)| accepted.len()).sum();

            // Every id was accepted by exactly one writer and nothing was overwritten
            assert_eq!(total, ids);
            let store = &results[0].0;
            let docs = store.get_all_docs("race").unwrap();
            assert_eq!(docs.len(), ids);
            for (w, accepted) in results.iter().map(|(_, a)| a).enumerate() {
                for i in accepted {
                    let doc = &store.get_docs_by_ids(&[i.to_string()], "race").unwrap()[0];
                    assert_eq!(doc.content, format!("writer {} note {}", w, i));
                }
            }
        }
    }

    #[test]
    fn test_delete_collection_during_inserts() {
        for backend in backends() {
            let store = shared_store(Arc::clone(&backend));
            store.create_collection("doomed", false, false).unwrap();
            let start = Arc::new(Barrier::new(2));

            let inserter = {
                let store = Arc::clone(&store);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    let mut inserted = 0;
                    for i in 0..200 {
                        let doc = Document::new(i.to_string(), format!("doc{}", i));
                        match store.insert_docs(&[doc], "doomed", false) {
                            Ok(()) => inserted += 1,
                            Err(e) => {
                                assert!(e.is_not_found(), "unexpected error: {}", e);
                                break;
                            }
                        }
                    }
                    inserted
                })
            };

            start.wait();
            store.delete_collection("doomed").unwrap();
            inserter.join().unwrap();

            // Nothing written before or after the delete survives into the
            // recreated collection
            assert!(!store.collection_exists("doomed").unwrap());
            store.create_collection("doomed", false, false).unwrap();
            assert_eq!(store.count_docs("doomed").unwrap(), 0);
        }
    }
}
