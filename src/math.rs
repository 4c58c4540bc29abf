use itertools::izip;

/// `y += a * x`
#[inline]
pub(crate) fn axpy(x: &[f64], y: &mut [f64], a: f64) {
    assert!(x.len() == y.len());
    izip!(x, y).for_each(|(x, y)| {
        *y += a * x;
    });
}

#[inline]
pub(crate) fn multiply(x: &[f64], y: &[f64], out: &mut [f64]) {
    let n = x.len();
    assert!(y.len() == n);
    assert!(out.len() == n);

    izip!(x, y, out).for_each(|(x, y, out)| {
        *out = x * y;
    });
}

/// `Σ x_i w_i y_i`
#[inline]
pub(crate) fn weighted_dot(x: &[f64], w: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    assert!(w.len() == n);
    assert!(y.len() == n);
    izip!(x, w, y).map(|(x, w, y)| x * w * y).sum()
}

#[inline]
pub(crate) fn all_finite(x: &[f64]) -> bool {
    x.iter().all(|x| x.is_finite())
}
