//! Bayesian density estimation.
//!
//! Each of the `N·(N−1)` possible directed edges of the induced subgraph is a
//! Bernoulli trial; the density gets a conjugate Beta prior.

use super::estimators::{self, BetaPosterior};
use super::hypothesis::HypothesisTestingSuite;
use super::{edge_total, node_count};
use crate::error::Result;
use crate::query::SubgraphSpec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Posterior summary of the edge density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityPosterior {
    pub mean: f64,
    pub ci95_low: f64,
    pub ci95_high: f64,
    pub alpha_posterior: f64,
    pub beta_posterior: f64,
}

impl HypothesisTestingSuite {
    /// Beta-binomial density estimate with the configured priors.
    pub async fn beta_binomial_density(&self, spec: &SubgraphSpec) -> Result<DensityPosterior> {
        self.beta_binomial_density_with(self.settings.alpha_prior, self.settings.beta_prior, spec)
            .await
    }

    /// Beta-binomial density estimate with a `Beta(alpha_prior, beta_prior)` prior.
    ///
    /// With fewer than 2 nodes the priors are returned unchanged and the mean
    /// and interval are 0.
    pub async fn beta_binomial_density_with(
        &self,
        alpha_prior: f64,
        beta_prior: f64,
        spec: &SubgraphSpec,
    ) -> Result<DensityPosterior> {
        estimators::check_priors(alpha_prior, beta_prior)?;
        let posterior = self.posterior(alpha_prior, beta_prior, spec).await?;
        let Some(posterior) = posterior else {
            return Ok(DensityPosterior {
                mean: 0.0,
                ci95_low: 0.0,
                ci95_high: 0.0,
                alpha_posterior: alpha_prior,
                beta_posterior: beta_prior,
            });
        };
        let (ci95_low, ci95_high) = posterior.credible_interval(0.95)?;
        Ok(DensityPosterior {
            mean: posterior.mean(),
            ci95_low,
            ci95_high,
            alpha_posterior: posterior.alpha,
            beta_posterior: posterior.beta,
        })
    }

    /// Bayes factor for "density > `threshold`" with the configured priors.
    pub async fn bayes_factor_density(&self, threshold: f64, spec: &SubgraphSpec) -> Result<f64> {
        self.bayes_factor_density_with(
            threshold,
            self.settings.alpha_prior,
            self.settings.beta_prior,
            spec,
        )
        .await
    }

    /// Posterior odds over prior odds that the density exceeds `threshold`.
    pub async fn bayes_factor_density_with(
        &self,
        threshold: f64,
        alpha_prior: f64,
        beta_prior: f64,
        spec: &SubgraphSpec,
    ) -> Result<f64> {
        estimators::check_priors(alpha_prior, beta_prior)?;
        let prior = BetaPosterior {
            alpha: alpha_prior,
            beta: beta_prior,
        };
        let posterior = self
            .posterior(alpha_prior, beta_prior, spec)
            .await?
            .unwrap_or(prior);
        estimators::bayes_factor(prior, posterior, threshold)
    }

    /// `None` when the subgraph has fewer than 2 nodes.
    async fn posterior(
        &self,
        alpha_prior: f64,
        beta_prior: f64,
        spec: &SubgraphSpec,
    ) -> Result<Option<BetaPosterior>> {
        let n = node_count(self.adapter.as_ref(), &self.builder, &spec.node_filter).await?;
        if n < 2 {
            return Ok(None);
        }
        let possible = n * (n - 1);
        let observed = edge_total(self.adapter.as_ref(), &self.builder, spec, None)
            .await?
            .round() as u64;
        debug!(observed, possible, "Beta-binomial update");
        BetaPosterior::update(alpha_prior, beta_prior, observed, possible).map(Some)
    }
}
