//! Ordinary least squares fit of a straight line

/// Result of a simple linear regression `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Slope divided by its standard error
    pub t_statistic: f64,
    /// Number of samples used
    pub n: usize,
}

impl LinearFit {
    /// Whether the slope differs from zero at the two-sided 5% level
    /// (normal approximation).
    pub fn is_significant(&self) -> bool {
        self.t_statistic.abs() > 1.96
    }
}

/// Fit `y` against `x` by ordinary least squares.
///
/// Pairs with a non-finite member are skipped. Returns `None` when fewer than
/// three pairs remain or `x` has no spread.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .map(|(&a, &b)| (a, b))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    let n = pairs.len();
    if n < 3 {
        return None;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    for &(a, b) in &pairs {
        sxx += (a - mean_x) * (a - mean_x);
        sxy += (a - mean_x) * (b - mean_y);
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ssr: f64 = pairs
        .iter()
        .map(|&(a, b)| {
            let e = b - (intercept + slope * a);
            e * e
        })
        .sum();
    let se = (ssr / (nf - 2.0) / sxx).sqrt();
    let t_statistic = if se > 0.0 {
        slope / se
    } else if slope == 0.0 {
        0.0
    } else {
        slope.signum() * f64::INFINITY
    };

    Some(LinearFit {
        slope,
        intercept,
        t_statistic,
        n,
    })
}
