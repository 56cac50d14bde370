//! String subsequence kernel
//!
//! Gap-weighted subsequence kernel over characters with decay `λ = 0.4`,
//! summed over subsequence lengths `1..p` where `p = min(|s1|, |s2|)`. The
//! arithmetic order, self-kernel normalization included, must match the one
//! the scorer weights were trained against.

use cached::proc_macro::cached;

/// Decay factor for gaps
pub const LAMBDA: f64 = 0.4;

/// Raw kernel value `sk(s1, s2)`
#[must_use]
pub fn sk(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    sk_chars(&a, &b)
}

fn sk_chars(s1: &[char], s2: &[char]) -> f64 {
    let (n1, n2) = (s1.len(), s2.len());
    let p = n1.min(n2);
    let w = n2 + 1;
    let lam2 = LAMBDA * LAMBDA;

    let mut dps = vec![0.0_f64; (n1 + 1) * w];
    let mut dp = vec![0.0_f64; (n1 + 1) * w];
    let mut kernel = vec![0.0_f64; n1 + 1];

    for i in 1..=n1 {
        for j in 1..=n2 {
            if s1[i - 1] == s2[j - 1] {
                dps[i * w + j] = lam2;
                kernel[0] += lam2;
            }
        }
    }

    for m in 1..p {
        kernel[m] = 0.0;
        for j in 0..=n2 {
            dp[(m - 1) * w + j] = 0.0;
        }
        for i in 0..=n1 {
            dp[i * w + (m - 1)] = 0.0;
        }

        for i in m..=n1 {
            for j in m..=n2 {
                dp[i * w + j] = dps[i * w + j] + LAMBDA * dp[(i - 1) * w + j]
                    + LAMBDA * dp[i * w + (j - 1)]
                    - lam2 * dp[(i - 1) * w + (j - 1)];

                if s1[i - 1] == s2[j - 1] {
                    dps[i * w + j] = lam2 * dp[(i - 1) * w + (j - 1)];
                    kernel[m] += dps[i * w + j];
                }
            }
        }
    }

    kernel[..p].iter().sum()
}

/// Self-kernel, memoized: mention and head strings recur across many pairs
#[cached(size = 8192)]
fn self_kernel(s: String) -> f64 {
    sk(&s, &s)
}

/// `sk(s1, s2) / sqrt(sk(s1, s1) * sk(s2, s2))`, or 0.0 when either side is empty
#[must_use]
pub fn normalized_sk(s1: &str, s2: &str) -> f64 {
    let norm = (self_kernel(s1.to_string()) * self_kernel(s2.to_string())).sqrt();
    if norm == 0.0 {
        return 0.0;
    }
    sk(s1, s2) / norm
}
