//! Expected cost of randomized chain compression.
//!
//! A round over a chain of `n` vertices is modelled as an `n`-bit random
//! string where each bit is one vertex's coin. A `01` pair is a vertex that
//! stayed home right after one that was sent to it, which is exactly one
//! compression. From the distribution of `01` counts we get, per starting
//! length, the expected number of rounds and the expected length left when
//! the driver gives up.

/// When the driver stops iterating.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopPolicy {
    /// After the first round without a compression.
    AfterOne,
    /// After two consecutive rounds without a compression.
    AfterTwo,
}

impl StopPolicy {
    pub fn idle_rounds(self) -> usize {
        match self {
            StopPolicy::AfterOne => 1,
            StopPolicy::AfterTwo => 2,
        }
    }
}

/// `counts[n][m]`: probability that an `n`-bit random string contains `01`
/// exactly `m` times, for `0 <= n <= max_len`.
pub fn compression_counts(max_len: usize) -> Vec<Vec<f64>> {
    let mut counts = vec![vec![0.0; max_len + 1]; max_len + 1];
    counts[0][0] = 1.0;
    if max_len == 0 {
        return counts;
    }

    // by_last[b][m]: probability of m occurrences with last bit b
    let mut by_last = [vec![0.0; max_len + 1], vec![0.0; max_len + 1]];
    by_last[0][0] = 0.5;
    by_last[1][0] = 0.5;
    counts[1][0] = 1.0;

    for n in 2..=max_len {
        let mut next = [vec![0.0; max_len + 1], vec![0.0; max_len + 1]];
        for m in 0..n {
            let (zero, one) = (by_last[0][m], by_last[1][m]);
            next[0][m] += 0.5 * (zero + one);
            next[1][m] += 0.5 * one;
            next[1][m + 1] += 0.5 * zero;
        }
        for m in 0..n {
            counts[n][m] = next[0][m] + next[1][m];
        }
        by_last = next;
    }
    counts
}

/// Expected rounds to finish a chain of each length `0..=max_len`.
pub fn expected_iterations(max_len: usize, stop: StopPolicy) -> Vec<f64> {
    let counts = compression_counts(max_len);
    let mut expected = vec![0.0; max_len + 1];
    for n in 2..=max_len {
        let progress: f64 = (1..n)
            .map(|m| counts[n][m] * (1.0 + expected[n - m]))
            .sum();
        let idle = counts[n][0];
        expected[n] = progress
            + match stop {
                StopPolicy::AfterOne => idle,
                // an idle round costs one, then the length is retried once
                // more and a second idle round ends it
                StopPolicy::AfterTwo => idle * (1.0 + progress + idle),
            };
    }
    expected
}

/// Expected number of vertices left of a chain of each length `0..=max_len`.
pub fn expected_final_length(max_len: usize, stop: StopPolicy) -> Vec<f64> {
    let counts = compression_counts(max_len);
    let mut expected = vec![0.0; max_len + 1];
    if max_len >= 1 {
        expected[1] = 1.0;
    }
    for n in 2..=max_len {
        let progress: f64 = (1..n).map(|m| counts[n][m] * expected[n - m]).sum();
        let idle = counts[n][0];
        let stuck = n as f64;
        expected[n] = progress
            + match stop {
                StopPolicy::AfterOne => idle * stuck,
                StopPolicy::AfterTwo => idle * (progress + idle * stuck),
            };
    }
    expected
}
