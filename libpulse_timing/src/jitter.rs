//! Decomposition of pairwise timing-difference variances into per-channel jitter.
//!
//! Each channel carries an independent timing error of variance x_c, so for every
//! pair `x_a + x_b = Var(t_a - t_b)`. The over-determined system is solved in the
//! least-squares sense subject to `x_c >= 0` (Lawson-Hanson NNLS), and the jitter of
//! a channel is `sqrt(x_c)`.
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::SolverError;
use super::run::ChannelId;

/// Inner least-squares solves allowed per unknown
const MAX_ITER_PER_UNKNOWN: usize = 5;

/// How to treat a system with too few valid pair variances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMode {
    /// Fewer valid pairs than channels, or pairs that leave the split free: every
    /// channel is undefined
    #[default]
    Strict,
    /// Solve with whatever valid pairs exist; only channels that appear in no valid
    /// pair are undefined
    BestEffort,
}

/// One measured pair variance. The same pair may be observed many times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairObservation {
    pub channel_a: ChannelId,
    pub channel_b: ChannelId,
    pub variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JitterStatus {
    Solved,
    /// Solved in best-effort mode with some channels left undefined
    Partial,
    Underdetermined,
    Failed,
}

/// Measured pair sigma next to the one implied by the solution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairCheck {
    pub channel_a: ChannelId,
    pub channel_b: ChannelId,
    pub measured_sigma: f64,
    pub predicted_sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterSolution {
    pub status: JitterStatus,
    pub variances: BTreeMap<ChannelId, f64>,
    pub sigmas: BTreeMap<ChannelId, f64>,
    /// Half the squared residual norm of the pair system
    pub cost: f64,
    pub pair_checks: Vec<PairCheck>,
}

impl JitterSolution {
    /// A solution with every channel undefined
    pub fn undefined(channels: &[ChannelId], status: JitterStatus) -> Self {
        let nan: BTreeMap<ChannelId, f64> = channels.iter().map(|c| (*c, f64::NAN)).collect();
        Self {
            status,
            variances: nan.clone(),
            sigmas: nan,
            cost: f64::NAN,
            pair_checks: Vec::new(),
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self.status, JitterStatus::Solved | JitterStatus::Partial)
    }

    /// Sigmas in channel order
    pub fn sigma_array(&self) -> Vec<f64> {
        self.sigmas.values().copied().collect()
    }
}

/// Solve for per-channel jitter from a map of pair variances. The channels of the
/// system are every channel named by a key; NaN variances count as missing pairs.
pub fn solve_jitters(
    pair_variances: &BTreeMap<(ChannelId, ChannelId), f64>,
    mode: SolveMode,
) -> Result<JitterSolution, SolverError> {
    let mut channels: Vec<ChannelId> = pair_variances
        .keys()
        .flat_map(|(a, b)| [*a, *b])
        .collect();
    channels.sort_unstable();
    channels.dedup();
    let observations: Vec<PairObservation> = pair_variances
        .iter()
        .map(|((a, b), variance)| PairObservation {
            channel_a: *a,
            channel_b: *b,
            variance: *variance,
        })
        .collect();
    solve_observations(&channels, &observations, mode)
}

/// Solve for the jitter of `channels` from an arbitrary list of pair observations.
pub fn solve_observations(
    channels: &[ChannelId],
    observations: &[PairObservation],
    mode: SolveMode,
) -> Result<JitterSolution, SolverError> {
    let column_of = |channel: ChannelId| channels.iter().position(|c| *c == channel);
    let mut rows: Vec<(usize, usize, &PairObservation)> = Vec::new();
    for obs in observations.iter() {
        let (Some(ia), Some(ib)) = (column_of(obs.channel_a), column_of(obs.channel_b)) else {
            return Err(SolverError::UnknownChannel(obs.channel_a, obs.channel_b));
        };
        if !obs.variance.is_nan() {
            rows.push((ia, ib, obs));
        }
    }

    let n = channels.len();
    let required = match mode {
        SolveMode::Strict => n.max(1),
        SolveMode::BestEffort => 1,
    };
    if rows.len() < required {
        log::warn!(
            "Jitter system is underdetermined: {} valid pair variances for {} channels",
            rows.len(),
            n
        );
        return Ok(JitterSolution::undefined(
            channels,
            JitterStatus::Underdetermined,
        ));
    }

    let mut covered = vec![false; n];
    let mut a = DMatrix::<f64>::zeros(rows.len(), n);
    let mut b = DVector::<f64>::zeros(rows.len());
    for (row, (ia, ib, obs)) in rows.iter().enumerate() {
        a[(row, *ia)] = 1.0;
        a[(row, *ib)] = 1.0;
        b[row] = obs.variance;
        covered[*ia] = true;
        covered[*ib] = true;
    }

    let covered_columns: Vec<usize> = (0..n).filter(|j| covered[*j]).collect();
    let rank = pair_rank(&a.select_columns(covered_columns.iter()));
    let degenerate = rank < covered_columns.len();
    if degenerate {
        log::warn!(
            "Jitter system has rank {} for {} channels, the split is not unique",
            rank,
            covered_columns.len()
        );
        if mode == SolveMode::Strict {
            return Ok(JitterSolution::undefined(
                channels,
                JitterStatus::Underdetermined,
            ));
        }
    }

    let x = nnls(&a, &b)?;
    let residual = &b - &a * &x;
    let cost = 0.5 * residual.norm_squared();

    let mut variances = BTreeMap::new();
    let mut sigmas = BTreeMap::new();
    for (col, channel) in channels.iter().enumerate() {
        let variance = if covered[col] { x[col] } else { f64::NAN };
        variances.insert(*channel, variance);
        sigmas.insert(*channel, variance.sqrt());
    }
    let pair_checks = rows
        .iter()
        .map(|(ia, ib, obs)| PairCheck {
            channel_a: obs.channel_a,
            channel_b: obs.channel_b,
            measured_sigma: obs.variance.sqrt(),
            predicted_sigma: (x[*ia] + x[*ib]).sqrt(),
        })
        .collect();
    let status = if !degenerate && covered.iter().all(|c| *c) {
        JitterStatus::Solved
    } else {
        JitterStatus::Partial
    };

    Ok(JitterSolution {
        status,
        variances,
        sigmas,
        cost,
        pair_checks,
    })
}

/// Numerical rank of a pair matrix. An even cycle of pairs such as
/// (1,2) (2,3) (3,4) (1,4) covers every channel but leaves one direction free.
fn pair_rank(a: &DMatrix<f64>) -> usize {
    let (m, k) = a.shape();
    if m == 0 || k == 0 {
        return 0;
    }
    let svd = a.clone().svd(false, false);
    let eps = svd.singular_values.max() * f64::EPSILON * m.max(k) as f64;
    svd.rank(eps)
}

/// Least-squares solution restricted to the passive columns; zero elsewhere.
fn solve_passive(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    passive: &[bool],
) -> Result<DVector<f64>, SolverError> {
    let indices: Vec<usize> = (0..passive.len()).filter(|j| passive[*j]).collect();
    let sub = a.select_columns(indices.iter());
    let (m, k) = sub.shape();
    let svd = sub.svd(true, true);
    let eps = svd.singular_values.max() * f64::EPSILON * m.max(k) as f64;
    let z_passive = svd.solve(b, eps).map_err(SolverError::Decomposition)?;

    let mut z = DVector::<f64>::zeros(passive.len());
    for (k, j) in indices.iter().enumerate() {
        z[*j] = z_passive[k];
    }
    Ok(z)
}

/// Lawson-Hanson non-negative least squares: argmin ||Ax - b|| subject to x >= 0.
///
/// Tolerances scale with the data, variances in s^2 are of order 1e-18.
fn nnls(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
    let (m, n) = a.shape();
    let norm1 = a
        .column_iter()
        .map(|col| col.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    let tol = 10.0 * f64::EPSILON * m.max(n) as f64 * norm1 * b.amax();
    let max_iter = MAX_ITER_PER_UNKNOWN * n.max(1);

    let mut x = DVector::<f64>::zeros(n);
    let mut passive = vec![false; n];
    let mut iterations = 0;

    loop {
        let w = a.transpose() * (b - a * &x);
        let candidate = (0..n)
            .filter(|j| !passive[*j])
            .max_by(|i, j| w[*i].total_cmp(&w[*j]));
        let Some(entering) = candidate.filter(|j| w[*j] > tol) else {
            break;
        };
        passive[entering] = true;

        let mut first_pass = true;
        loop {
            iterations += 1;
            if iterations > max_iter {
                return Err(SolverError::NoConvergence(max_iter));
            }
            let z = solve_passive(a, b, &passive)?;
            if first_pass && z[entering] <= 0.0 {
                // Rounding admitted a column that cannot improve the fit
                passive[entering] = false;
                return Ok(x);
            }
            first_pass = false;
            if (0..n).filter(|j| passive[*j]).all(|j| z[j] > 0.0) {
                x = z;
                break;
            }

            // Step from x toward z until the first passive variable hits zero
            let mut alpha = f64::INFINITY;
            let mut blocking = entering;
            for j in (0..n).filter(|j| passive[*j] && z[*j] <= 0.0) {
                let step = x[j] / (x[j] - z[j]);
                if step < alpha {
                    alpha = step;
                    blocking = j;
                }
            }
            let step = (&z - &x) * alpha;
            x += step;
            x[blocking] = 0.0;
            for j in 0..n {
                if passive[j] && x[j] <= 0.0 {
                    x[j] = 0.0;
                    passive[j] = false;
                }
            }
        }
    }
    Ok(x)
}
