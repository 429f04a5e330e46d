use std::collections::HashMap;

use proptest::prelude::*;
use versioned_store::{CasResult, NO_DOCUMENT};

use crate::support::spawn_store;

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    /// CAS with the current version (`true`) or a deliberately wrong one.
    Cas(u8, bool),
    Del(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3).prop_map(Op::Put),
        (0u8..3, any::<bool>()).prop_map(|(k, fresh)| Op::Cas(k, fresh)),
        (0u8..3).prop_map(Op::Del),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn versions_follow_a_counter_model(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = spawn_store("properties");
            let mut model: HashMap<String, u64> = HashMap::new();

            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Put(k) => {
                        let key = format!("k{}", k);
                        let expected = model.get(&key).copied().unwrap_or(NO_DOCUMENT) + 1;
                        let version = store.put(&key, &step).await.unwrap();
                        assert_eq!(version, expected);
                        model.insert(key, version);
                    }
                    Op::Cas(k, fresh) => {
                        let key = format!("k{}", k);
                        let current = model.get(&key).copied().unwrap_or(NO_DOCUMENT);
                        let expected = if fresh { current } else { current + 1 };
                        let result = store.cas_put(&key, expected, &step).await.unwrap();
                        if fresh {
                            assert_eq!(result, CasResult::applied(current + 1));
                            model.insert(key, current + 1);
                        } else {
                            assert_eq!(result, CasResult::stale(current));
                        }
                    }
                    Op::Del(k) => {
                        let key = format!("k{}", k);
                        let existed = store.del(&key).await.unwrap();
                        assert_eq!(existed, model.remove(&key).is_some());
                    }
                }
            }

            for k in 0..3u8 {
                let key = format!("k{}", k);
                let stored = store.get_doc::<usize>(&key).await.unwrap();
                assert_eq!(stored.map(|d| d.version), model.get(&key).copied());
            }
        });
    }
}
