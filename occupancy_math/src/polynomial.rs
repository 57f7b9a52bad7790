//! Lag polynomials.
//!
//! A polynomial is stored as its coefficient vector: index `k` multiplies
//! the backshift operator `B^k`, index 0 is the constant term.

/// Build `1 + sign * (c_1 B^step + c_2 B^(2 step) + ...)`.
///
/// Autoregressive factors use `sign = -1.0`, moving-average factors `1.0`.
pub fn lag_polynomial(coefficients: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, &c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] += sign * c;
    }
    poly
}

/// Product of two lag polynomials
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_polynomial_layout() {
        assert_eq!(lag_polynomial(&[0.5, 0.25], 1, -1.0), vec![1.0, -0.5, -0.25]);
        assert_eq!(lag_polynomial(&[0.3], 3, 1.0), vec![1.0, 0.0, 0.0, 0.3]);
        assert_eq!(lag_polynomial(&[], 7, 1.0), vec![1.0]);
    }

    #[test]
    fn test_multiply_seasonal_factors() {
        // (1 - 0.5B)(1 - 0.4B^2) = 1 - 0.5B - 0.4B^2 + 0.2B^3
        let ar = lag_polynomial(&[0.5], 1, -1.0);
        let sar = lag_polynomial(&[0.4], 2, -1.0);
        let product = multiply(&ar, &sar);
        let expected = [1.0, -0.5, -0.4, 0.2];
        assert_eq!(product.len(), expected.len());
        for (p, e) in product.iter().zip(expected) {
            assert!((p - e).abs() < 1e-12);
        }
    }
}
