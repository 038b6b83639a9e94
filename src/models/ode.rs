//! Fixed-step RK4 integration on the sample's time grid.
//!
//! The attractor model has no closed form, so predictions come from
//! integrating `dP/dt = f(P)` between consecutive sample times. Each interval
//! is split into `ceil(dt / max_step)` equal substeps, so the stepping follows
//! the sampling resolution and every prediction lands exactly on a sample time.

/// Upper bound on substeps per sampling interval.
const MAX_SUBSTEPS: usize = 2_000;

/// Integrate an autonomous scalar ODE and return the state at every `times[i]`.
///
/// `times` must be sorted ascending; `y0` is the state at `times[0]`. Once the
/// state becomes non-finite the remaining outputs are `NaN`.
pub fn integrate_rk4<F>(f: F, times: &[f64], y0: f64, max_step: f64) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    let mut out = Vec::with_capacity(times.len());
    if times.is_empty() {
        return out;
    }

    let mut y = y0;
    out.push(y);

    for w in times.windows(2) {
        let dt = w[1] - w[0];
        if y.is_finite() && dt > 0.0 {
            let steps = ((dt / max_step).ceil() as usize).clamp(1, MAX_SUBSTEPS);
            let h = dt / steps as f64;
            for _ in 0..steps {
                y = rk4_step(&f, y, h);
                if !y.is_finite() {
                    break;
                }
            }
        }
        out.push(if y.is_finite() { y } else { f64::NAN });
    }

    out
}

fn rk4_step<F>(f: &F, y: f64, h: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let k1 = f(y);
    let k2 = f(y + 0.5 * h * k1);
    let k3 = f(y + 0.5 * h * k2);
    let k4 = f(y + h * k3);
    y + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4)
}
