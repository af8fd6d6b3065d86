#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::{fetch_fn, CacheConfig, ExpiringCache, GetOptions, ManualClock};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_size_never_exceeds_bound(
            max_size in 1usize..16,
            keys in prop::collection::vec(0u8..40, 1..120),
        ) {
            let rt = runtime();
            let cache = ExpiringCache::new(
                fetch_fn(|k: u8| async move { Ok::<_, Infallible>(k) }),
                CacheConfig { max_size, ..CacheConfig::default() },
            );
            rt.block_on(async {
                for k in &keys {
                    let v = cache.get(&k.to_string(), *k).await.unwrap();
                    prop_assert_eq!(v, *k);
                    prop_assert!(cache.stats().await.size <= max_size);
                }
                let stats = cache.stats().await;
                prop_assert_eq!(stats.hits + stats.misses, keys.len() as u64);
                Ok(())
            })?;
        }

        #[test]
        fn prop_fresh_entries_are_served_from_cache(
            ttl in 1u64..100,
            elapsed in 0u64..200,
        ) {
            let rt = runtime();
            let clock = Arc::new(ManualClock::new(10_000));
            let cache = ExpiringCache::with_clock(
                fetch_fn(|n: u64| async move { Ok::<_, Infallible>(n) }),
                CacheConfig::default(),
                clock.clone(),
            );
            rt.block_on(async {
                let opts = || GetOptions::new().ttl(Duration::from_secs(ttl));
                cache.get_with("k", 1, opts()).await.unwrap();
                clock.advance(elapsed as i64);
                let v = cache.get_with("k", 2, opts()).await.unwrap();
                if elapsed < ttl {
                    prop_assert_eq!(v, 1);
                } else {
                    prop_assert_eq!(v, 2);
                }
                Ok(())
            })?;
        }
    }
}
