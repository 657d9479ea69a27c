//! Statistical false-positive behavior.
//!
//! A filter built for capacity N and probability p, filled with exactly
//! N keys, must show an observed false-positive rate in the
//! neighborhood of p when probed with keys that were never added. A
//! single run is allowed up to 3p to keep the test robust; the seeded
//! generator makes the whole run reproducible.

use bloomgate::BloomFilterBuilder;
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

fn random_keys(rng: &mut ChaCha8Rng, n: usize, len: usize) -> Vec<String> {
    let mut keys = HashSet::with_capacity(n);
    while keys.len() < n {
        let key: String = (0..len).map(|_| rng.sample(Alphanumeric) as char).collect();
        keys.insert(key);
    }
    keys.into_iter().collect()
}

#[test]
fn observed_fp_rate_stays_near_target() {
    let capacity = 10_000;
    let target_fpp = 0.01;

    let filter = BloomFilterBuilder::<String>::new()
        .with_capacity_and_false_positive_probability(capacity, target_fpp)
        .build()
        .unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let members = random_keys(&mut rng, capacity, 24);
    for key in &members {
        filter.insert(key).unwrap();
    }

    let member_set: HashSet<&String> = members.iter().collect();
    let probes = random_keys(&mut rng, 50_000, 23);

    let false_positives = probes
        .iter()
        .filter(|probe| !member_set.contains(probe) && filter.contains(*probe))
        .count();
    let observed = false_positives as f64 / probes.len() as f64;

    assert!(
        observed <= 3.0 * target_fpp,
        "observed fp rate {} exceeds 3x target {}",
        observed,
        target_fpp
    );
}

#[test]
fn tighter_filters_have_lower_fp_rates() {
    let capacity = 5_000;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let members = random_keys(&mut rng, capacity, 20);
    let probes = random_keys(&mut rng, 30_000, 19);

    let mut observed = Vec::new();
    for target_fpp in [0.05, 0.01, 0.001] {
        let filter = BloomFilterBuilder::<String>::new()
            .with_capacity_and_false_positive_probability(capacity, target_fpp)
            .build()
            .unwrap();
        for key in &members {
            filter.insert(key).unwrap();
        }

        let false_positives = probes.iter().filter(|p| filter.contains(*p)).count();
        observed.push(false_positives as f64 / probes.len() as f64);
    }

    assert!(
        observed[0] > observed[1] && observed[1] > observed[2],
        "fp rates should fall with tighter targets: {:?}",
        observed
    );
    assert!(observed[2] <= 3.0 * 0.001, "tightest rate {} too high", observed[2]);
}

#[test]
fn scaling_chain_respects_compound_target() {
    let target_fpp = 0.01;
    let filter = BloomFilterBuilder::<String>::new()
        .with_capacity_and_false_positive_probability(1_000, target_fpp)
        .with_scaling(2.0, 0.8)
        .build()
        .unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    // Fill well past the initial capacity so several generations exist.
    let members = random_keys(&mut rng, 6_000, 22);
    for key in &members {
        filter.insert(key).unwrap();
    }
    assert!(filter.as_scaling().unwrap().generation_count() >= 2);

    let probes = random_keys(&mut rng, 30_000, 21);
    let false_positives = probes.iter().filter(|p| filter.contains(*p)).count();
    let observed = false_positives as f64 / probes.len() as f64;

    // The per-generation rescaling keeps the compounded rate bounded by
    // the configured target even after multiple scales.
    assert!(
        observed <= 3.0 * target_fpp,
        "compound fp rate {} exceeds 3x target {}",
        observed,
        target_fpp
    );
}
