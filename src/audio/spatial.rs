//! Inter-channel level/time differences, azimuth, stereo width and correlation
//! for one analysis window.

use rayon::prelude::*;

use super::features::SpatialFeatures;

const EPS: f64 = 1e-20;
/// ILD that maps to a full 90° deflection.
const ILD_SPAN_DB: f64 = 30.0;
/// ITD that maps to a full 90° deflection.
const ITD_SPAN_SEC: f64 = 0.0007;
/// Cross-correlation search radius.
const MAX_LAG_SEC: f64 = 0.001;

pub fn analyze(left: &[f32], right: &[f32], sample_rate: u32) -> SpatialFeatures {
    debug_assert_eq!(left.len(), right.len());
    let (l2, r2) = energy(left, right);

    let ild_db = 10.0 * ((r2 + EPS) / (l2 + EPS)).log10();

    let max_lag = (MAX_LAG_SEC * sample_rate as f64).round() as usize;
    let lag = xcorr_argmax_lag(left, right, max_lag);
    let itd_sec = lag as f64 / sample_rate as f64;

    SpatialFeatures {
        ild_db,
        itd_sec,
        azimuth_deg: azimuth_from_ild_itd(ild_db, itd_sec),
        width_db: width_from_mid_side(left, right),
        correlation: pearson_corr(left, right),
    }
}

/// Sum of squares per channel.
pub fn energy(left: &[f32], right: &[f32]) -> (f64, f64) {
    left.iter().zip(right).fold((0.0, 0.0), |(l2, r2), (&l, &r)| {
        let (l, r) = (l as f64, r as f64);
        (l2 + l * l, r2 + r * r)
    })
}

/// Degrees, +90 fully left, -90 fully right. Positive ILD and ITD indicate the
/// right channel dominates.
pub fn azimuth_from_ild_itd(ild_db: f64, itd_sec: f64) -> f64 {
    let az_ild = (-ild_db / ILD_SPAN_DB).clamp(-1.0, 1.0);
    let az_itd = (-itd_sec / ITD_SPAN_SEC).clamp(-1.0, 1.0);
    (0.5 * (az_ild + az_itd)).clamp(-1.0, 1.0) * 90.0
}

/// Side-to-mid energy ratio in dB.
pub fn width_from_mid_side(left: &[f32], right: &[f32]) -> f64 {
    let (m2, s2) = left.iter().zip(right).fold((0.0, 0.0), |(m2, s2), (&l, &r)| {
        let m = 0.5 * (l as f64 + r as f64);
        let s = 0.5 * (l as f64 - r as f64);
        (m2 + m * m, s2 + s * s)
    });
    10.0 * ((s2 + EPS) / (m2 + EPS)).log10()
}

pub fn pearson_corr(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len()) as f64;
    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    let num = n * sxy - sx * sy;
    let den = ((n * sxx - sx * sx) * (n * syy - sy * sy)).max(EPS).sqrt();
    num / den
}

/// Lag in `[-max_lag, max_lag]` maximizing the energy-normalized
/// cross-correlation. Positive lag means the right channel is delayed.
/// Equal scores resolve to the smallest lag.
pub fn xcorr_argmax_lag(left: &[f32], right: &[f32], max_lag: usize) -> isize {
    let n = left.len().min(right.len());
    if n == 0 {
        return 0;
    }
    let max_lag = max_lag.min(n - 1) as isize;

    let (l2, r2) = energy(&left[..n], &right[..n]);
    let norm = (l2.max(EPS) * r2.max(EPS)).sqrt();

    (-max_lag..=max_lag)
        .into_par_iter()
        .map(|lag| {
            let shift = lag.unsigned_abs();
            let (a, b) = if lag >= 0 {
                (&left[..n - shift], &right[shift..n])
            } else {
                (&left[shift..n], &right[..n - shift])
            };
            let acc: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
            (lag, acc / norm)
        })
        .reduce(
            || (isize::MAX, f64::NEG_INFINITY),
            |best, cand| {
                if cand.1 > best.1 || (cand.1 == best.1 && cand.0 < best.0) {
                    cand
                } else {
                    best
                }
            },
        )
        .0
}
