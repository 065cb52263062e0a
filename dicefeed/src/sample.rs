//! Synthetic per-site samples.
//!
//! Every tick produces one sample per simulated site. The value simulates a
//! six-sided die and is drawn from the operating system's entropy source.

use rand::TryRngCore;
use tracing::error;

use crate::config::Config;

/// Namespace prefix every metric name is rooted under.
const NAMESPACE: &str = "local.random.diceroll";

/// Sides on the simulated die.
const SIDES: u32 = 6;

/// Draws at or above this threshold would bias the roll and are rejected.
const UNBIASED_LIMIT: u32 = u32::MAX - (u32::MAX % SIDES);

#[derive(Debug, Clone, PartialEq, Eq)]
/// One synthetic measurement, ready for submission.
pub struct Sample {
    /// Hierarchical dotted metric name.
    pub name: String,
    /// Decimal string encoding of the measured value.
    pub value: String,
    /// Unix timestamp of the tick that produced this sample.
    pub timestamp: u64,
}

/// Build one sample per site index in `[0, site_count)`, in index order,
/// all stamped with `timestamp`.
pub fn build_batch<R>(rng: &mut R, timestamp: u64, config: &Config) -> Vec<Sample>
where
    R: TryRngCore,
{
    (0..config.site_count)
        .map(|site| Sample {
            name: metric_name(site, &config.server_id),
            value: roll(rng).to_string(),
            timestamp,
        })
        .collect()
}

/// Metric name for one site: the namespace, the site's synthetic domain
/// with dots flattened to underscores, then the server identity.
fn metric_name(site: usize, server_id: &str) -> String {
    let domain = format!("ex{n}.example.jp", n = site + 1).replace('.', "_");
    format!("{NAMESPACE}.{domain}.{server_id}")
}

/// Roll the die: uniform in `[1, 6]`.
///
/// If the random source fails the error is logged and the roll falls back
/// to 1 rather than failing the batch.
fn roll<R>(rng: &mut R) -> u32
where
    R: TryRngCore,
{
    loop {
        match rng.try_next_u32() {
            Ok(draw) if draw < UNBIASED_LIMIT => return draw % SIDES + 1,
            Ok(_) => {} // biased draw, redraw
            Err(err) => {
                error!("error reading from random source: {err}");
                return 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::{build_batch, metric_name, roll};
    use crate::config::Config;

    /// A random source that always fails.
    struct BrokenRng;

    impl rand::TryRngCore for BrokenRng {
        type Error = std::io::Error;

        fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
            Err(std::io::Error::other("entropy source unavailable"))
        }

        fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
            Err(std::io::Error::other("entropy source unavailable"))
        }

        fn try_fill_bytes(&mut self, _dst: &mut [u8]) -> Result<(), Self::Error> {
            Err(std::io::Error::other("entropy source unavailable"))
        }
    }

    fn config_with_sites(site_count: usize) -> Config {
        Config {
            site_count,
            ..Config::default()
        }
    }

    #[test]
    fn one_sample_per_site() {
        let mut rng = StdRng::from_seed([0; 32]);
        for count in [0usize, 1, 50] {
            let batch = build_batch(&mut rng, 1_700_000_000, &config_with_sites(count));
            assert_eq!(batch.len(), count);
        }
    }

    #[test]
    fn every_sample_carries_the_tick_timestamp() {
        let mut rng = StdRng::from_seed([1; 32]);
        let batch = build_batch(&mut rng, 1_700_000_060, &config_with_sites(50));
        assert!(batch.iter().all(|s| s.timestamp == 1_700_000_060));
    }

    #[test]
    fn rolls_stay_on_the_die() {
        let mut rng = StdRng::from_seed([7; 32]);
        for _ in 0..10_000 {
            let value = roll(&mut rng);
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn batch_values_parse_back_onto_the_die() {
        let mut rng = StdRng::from_seed([2; 32]);
        let batch = build_batch(&mut rng, 0, &config_with_sites(50));
        for sample in batch {
            let value: u32 = sample.value.parse().expect("value not numeric");
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn broken_random_source_falls_back_to_one() {
        let batch = build_batch(&mut BrokenRng, 0, &config_with_sites(3));
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|s| s.value == "1"));
    }

    #[test]
    fn name_format_matches_the_backend_hierarchy() {
        assert_eq!(
            metric_name(0, "sv01"),
            "local.random.diceroll.ex1_example_jp.sv01"
        );
        assert_eq!(
            metric_name(49, "sv02"),
            "local.random.diceroll.ex50_example_jp.sv02"
        );
    }

    proptest! {
        // No two site indices may collide on a name for a fixed identity.
        #[test]
        fn names_are_unique_within_a_batch(site_count in 0usize..500) {
            let names: HashSet<String> =
                (0..site_count).map(|site| metric_name(site, "sv01")).collect();
            prop_assert_eq!(names.len(), site_count);
        }
    }
}
