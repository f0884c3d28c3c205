//! Proptest strategies for resource keys and freshness policies

use fetchcache::Freshness;
use proptest::prelude::*;

/// Arbitrary Unicode keys, including separators, dots, and escape characters
pub fn resource_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "[./\\\\%:*?<>|a-z]{0,12}",
        "(https?://)?[a-z]{1,8}\\.[a-z]{2,3}(/[a-z0-9%.]{0,6}){0,3}",
    ]
}

/// Pairs of distinct keys
pub fn distinct_key_pair_strategy() -> impl Strategy<Value = (String, String)> {
    (resource_key_strategy(), resource_key_strategy()).prop_filter("keys must differ", |(a, b)| a != b)
}

pub fn freshness_strategy() -> impl Strategy<Value = Freshness> {
    prop::sample::select(Freshness::ALL.to_vec())
}
