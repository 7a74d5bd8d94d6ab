//! Pure estimators and test statistics.
//!
//! Nothing here touches an adapter; the analyzers fetch aggregates and hand
//! plain numbers to these functions.

use crate::error::{HypographError, Result};
use statrs::distribution::{Beta, ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

fn distribution_error(e: impl std::fmt::Display) -> HypographError {
    HypographError::validation(e.to_string())
}

// ============================================================================
// Density
// ============================================================================

/// `2·W / (N·(N−1))`, or 0 when `N < 2`.
pub fn density(node_count: u64, edge_weight: f64) -> f64 {
    if node_count < 2 {
        return 0.0;
    }
    let n = node_count as f64;
    2.0 * edge_weight / (n * (n - 1.0))
}

/// Two-tailed z-test of an observed density against `expected`.
///
/// The standard error treats each of the `N·(N−1)/2` possible edges as a
/// Bernoulli trial with success probability `expected`.
pub fn density_z_test(observed: f64, expected: f64, node_count: u64) -> Result<(f64, f64)> {
    if !(0.0..=1.0).contains(&expected) {
        return Err(HypographError::validation(format!(
            "expected density must lie in [0, 1], got {}",
            expected
        )));
    }
    let n = node_count as f64;
    let possible = n * (n - 1.0) / 2.0;
    if possible <= 0.0 {
        return Ok((0.0, 1.0));
    }
    let se = (expected * (1.0 - expected) / possible).sqrt();
    if se == 0.0 {
        return Ok((0.0, 0.0));
    }
    let z = (observed - expected) / se;
    let normal = Normal::new(0.0, 1.0).map_err(distribution_error)?;
    Ok((z, 2.0 * normal.sf(z.abs())))
}

// ============================================================================
// ANOVA
// ============================================================================

/// One-way ANOVA across groups of observations. Returns `(F, p)`.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Result<(f64, f64)> {
    if groups.len() < 2 {
        return Err(HypographError::validation(format!(
            "ANOVA needs at least 2 groups, got {}",
            groups.len()
        )));
    }
    if groups.iter().any(|g| g.is_empty()) {
        return Err(HypographError::validation("ANOVA groups must not be empty"));
    }

    let k = groups.len();
    let total: usize = groups.iter().map(Vec::len).sum();
    if total <= k {
        return Err(HypographError::validation(
            "ANOVA needs more observations than groups",
        ));
    }

    let grand_mean = groups.iter().flatten().sum::<f64>() / total as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let mean = mean(group);
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (total - k) as f64;

    if ss_within == 0.0 {
        return Ok(if ss_between == 0.0 {
            (f64::NAN, f64::NAN)
        } else {
            (f64::INFINITY, 0.0)
        });
    }

    let f = (ss_between / df_between) / (ss_within / df_within);
    let dist = FisherSnedecor::new(df_between, df_within).map_err(distribution_error)?;
    Ok((f, dist.sf(f)))
}

// ============================================================================
// Chi-square test of independence
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareOutcome {
    pub chi2: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    pub expected: Vec<Vec<f64>>,
}

/// Chi-square test of independence on an `r × c` contingency table.
///
/// Yates' continuity correction is applied when there is one degree of freedom.
pub fn chi_square_independence(table: &[Vec<f64>]) -> Result<ChiSquareOutcome> {
    let rows = table.len();
    let cols = table.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return Err(HypographError::validation("contingency table is empty"));
    }
    if table.iter().any(|r| r.len() != cols) {
        return Err(HypographError::validation("contingency table is ragged"));
    }

    let row_sums: Vec<f64> = table.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..cols).map(|j| table.iter().map(|r| r[j]).sum()).collect();
    let total: f64 = row_sums.iter().sum();

    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|rs| col_sums.iter().map(|cs| rs * cs / total).collect())
        .collect();
    if expected.iter().flatten().any(|&e| e <= 0.0 || !e.is_finite()) {
        return Err(HypographError::validation(
            "contingency table has a zero expected frequency",
        ));
    }

    let dof = (rows - 1) * (cols - 1);
    if dof == 0 {
        return Ok(ChiSquareOutcome {
            chi2: 0.0,
            p_value: 1.0,
            degrees_of_freedom: 0,
            expected,
        });
    }

    let mut chi2 = 0.0;
    for (observed_row, expected_row) in table.iter().zip(&expected) {
        for (&o, &e) in observed_row.iter().zip(expected_row) {
            let mut o = o;
            if dof == 1 {
                let diff = e - o;
                o += diff.signum() * diff.abs().min(0.5);
            }
            chi2 += (o - e).powi(2) / e;
        }
    }

    let dist = ChiSquared::new(dof as f64).map_err(distribution_error)?;
    Ok(ChiSquareOutcome {
        chi2,
        p_value: dist.sf(chi2),
        degrees_of_freedom: dof,
        expected,
    })
}

// ============================================================================
// Correlation
// ============================================================================

/// Pearson correlation with its two-tailed p-value.
///
/// Fewer than 2 pairs or a constant sample yields `(0, 1)`.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Result<(f64, f64)> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Ok((0.0, 1.0));
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (mx, my) = (mean(xs), mean(ys));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return Ok((0.0, 1.0));
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Ok((r, correlation_p_value(r, n)?))
}

/// Spearman rank correlation (average ranks for ties).
pub fn spearman(xs: &[f64], ys: &[f64]) -> Result<(f64, f64)> {
    let n = xs.len().min(ys.len());
    pearson(&average_ranks(&xs[..n]), &average_ranks(&ys[..n]))
}

/// t-test on the correlation coefficient with `n − 2` degrees of freedom.
fn correlation_p_value(r: f64, n: usize) -> Result<f64> {
    if n <= 2 {
        return Ok(1.0);
    }
    let df = (n - 2) as f64;
    let residual = 1.0 - r * r;
    if residual <= 0.0 {
        return Ok(0.0);
    }
    let t = r * (df / residual).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(distribution_error)?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

/// 1-based ranks, ties receive the mean of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

// ============================================================================
// Beta-binomial
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    /// Conjugate update of a `Beta(alpha, beta)` prior with `successes` out of `trials`.
    pub fn update(alpha: f64, beta: f64, successes: u64, trials: u64) -> Result<Self> {
        check_priors(alpha, beta)?;
        if successes > trials {
            return Err(HypographError::validation(format!(
                "observed {} edges but only {} are possible",
                successes, trials
            )));
        }
        Ok(Self {
            alpha: alpha + successes as f64,
            beta: beta + (trials - successes) as f64,
        })
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Equal-tailed credible interval with the given mass.
    pub fn credible_interval(&self, mass: f64) -> Result<(f64, f64)> {
        let dist = Beta::new(self.alpha, self.beta).map_err(distribution_error)?;
        let tail = (1.0 - mass) / 2.0;
        Ok((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
    }

    /// `P(θ ≤ threshold)`.
    pub fn cdf(&self, threshold: f64) -> Result<f64> {
        let dist = Beta::new(self.alpha, self.beta).map_err(distribution_error)?;
        Ok(dist.cdf(threshold))
    }
}

pub fn check_priors(alpha: f64, beta: f64) -> Result<()> {
    if alpha > 0.0 && beta > 0.0 && alpha.is_finite() && beta.is_finite() {
        Ok(())
    } else {
        Err(HypographError::validation(format!(
            "beta priors must be positive, got ({}, {})",
            alpha, beta
        )))
    }
}

/// Posterior odds over prior odds of `θ > threshold`.
///
/// `+inf` when either stage puts no mass at or below the threshold.
pub fn bayes_factor(prior: BetaPosterior, posterior: BetaPosterior, threshold: f64) -> Result<f64> {
    let odds = |dist: BetaPosterior| -> Result<Option<f64>> {
        let below = dist.cdf(threshold)?;
        if below == 0.0 {
            return Ok(None);
        }
        Ok(Some((1.0 - below) / below))
    };
    let (Some(prior_odds), Some(posterior_odds)) = (odds(prior)?, odds(posterior)?) else {
        return Ok(f64::INFINITY);
    };
    if prior_odds == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(posterior_odds / prior_odds)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
