//! Time-varying source waveforms.
//!
//! A waveform is parsed once from its property string (`"5"`, `"dc(5)"`,
//! `"step(0,5,1m,1u)"`, `"sin(0,1,1k)"`, ...) and then queried many times
//! during transient stepping. Everything except `dc` and `sin` is normalized
//! to a piecewise-linear table, so evaluation and breakpoint queries share
//! one representation.

use voltaic_core::parse_value;

fn fmod(num: f64, den: f64) -> f64 {
    num - (num / den).floor() * den
}

fn arg(args: &[Option<f64>], index: usize, default: f64) -> f64 {
    args.get(index).copied().flatten().unwrap_or(default)
}

#[derive(Debug, Clone)]
enum Shape {
    Constant(f64),
    Sin {
        offset: f64,
        amplitude: f64,
        freq: f64,
        delay: f64,
        /// Phase offset as a fraction of a cycle.
        phase: f64,
    },
    Pwl {
        pairs: Vec<(f64, f64)>,
        repeat: bool,
    },
}

/// A parsed source waveform: shape, memoized DC value, and repeat period
/// (0 for aperiodic sources).
#[derive(Debug, Clone)]
pub struct Waveform {
    shape: Shape,
    dc: f64,
    period: f64,
}

impl Waveform {
    fn from_shape(shape: Shape, period: f64) -> Self {
        let mut w = Waveform {
            shape,
            dc: 0.0,
            period,
        };
        w.dc = w.value(0.0);
        w
    }

    /// A constant source.
    pub fn dc(v: f64) -> Self {
        Self::from_shape(Shape::Constant(v), 0.0)
    }

    /// A piecewise-linear source over `(t, v)` pairs. Fewer than two pairs
    /// degenerates to a constant; a repeating table's period is its last
    /// time point.
    pub fn pwl(pairs: Vec<(f64, f64)>, repeat: bool) -> Self {
        let period = if repeat {
            pairs.last().map(|p| p.0).unwrap_or(0.0)
        } else {
            0.0
        };
        if pairs.len() < 2 {
            let v = pairs.first().map(|p| p.1).unwrap_or(0.0);
            return Self::from_shape(Shape::Constant(v), period);
        }
        Self::from_shape(Shape::Pwl { pairs, repeat }, period)
    }

    /// `step(v_init, v_plateau, t_delay, t_rise)`
    pub fn step(v1: f64, v2: f64, td: f64, tr: f64) -> Self {
        let td = td.max(0.0);
        let tr = tr.abs();
        Self::pwl(vec![(td, v1), (td + tr, v2)], false)
    }

    /// `square(v_init, v_plateau, freq, duty_cycle)` with 1%-of-period
    /// rise/fall edges.
    pub fn square(v1: f64, v2: f64, freq: f64, duty_cycle: f64) -> Self {
        let freq = freq.abs();
        let duty = duty_cycle.abs().min(100.0);
        let per = if freq == 0.0 { f64::INFINITY } else { 1.0 / freq };
        let t_change = 0.01 * per;
        let t_pw = 0.01 * duty * 0.98 * per;
        Self::pwl(
            vec![
                (0.0, v1),
                (t_change, v2),
                (t_change + t_pw, v2),
                (t_change + t_pw + t_change, v1),
                (per, v1),
            ],
            true,
        )
    }

    /// `triangle(v_init, v_plateau, freq)`
    pub fn triangle(v1: f64, v2: f64, freq: f64) -> Self {
        let freq = freq.abs();
        let per = if freq == 0.0 { f64::INFINITY } else { 1.0 / freq };
        Self::pwl(vec![(0.0, v1), (per / 2.0, v2), (per, v1)], true)
    }

    /// `pulse(v_init, v_plateau, t_delay, t_rise, t_fall, t_width, t_period)`
    pub fn pulse(v1: f64, v2: f64, td: f64, tr: f64, tf: f64, pw: f64, per: f64) -> Self {
        let t1 = td.max(0.0);
        let t2 = t1 + tr.abs();
        let t3 = t2 + pw.abs();
        let t4 = t3 + tf.abs();
        Self::pwl(
            vec![(t1, v1), (t2, v2), (t3, v2), (t4, v1), (per.abs(), v1)],
            true,
        )
    }

    /// `impulse(height, width)`
    pub fn impulse(h: f64, w: f64) -> Self {
        let w = w.abs();
        Self::pwl(vec![(0.0, 0.0), (w / 2.0, h), (w, 0.0)], false)
    }

    /// `sin(v_offset, v_amplitude, freq_hz, t_delay, phase_degrees)`
    pub fn sin(offset: f64, amplitude: f64, freq: f64, td: f64, phase_degrees: f64) -> Self {
        let freq = freq.abs();
        Self::from_shape(
            Shape::Sin {
                offset,
                amplitude,
                freq,
                delay: td.max(0.0),
                phase: phase_degrees / 360.0,
            },
            1.0 / freq,
        )
    }

    /// Parse a waveform property string: a bare number, or
    /// `fn(arg1,arg2,...)` with `fn` one of `dc`, `step`, `square`,
    /// `triangle`, `pulse`, `sin`, `impulse`, `pwl`, `pwl_repeating`.
    /// Unknown functions and malformed numbers fall back to a 0V constant.
    pub fn parse(spec: &str) -> Self {
        let Some(open) = spec.find('(') else {
            return Self::dc(parse_value(spec.trim()).unwrap_or(0.0));
        };

        let fun = spec[..open].trim();
        let end = spec[open..]
            .find(')')
            .map(|e| open + e)
            .unwrap_or(spec.len());
        let args: Vec<Option<f64>> = spec[open + 1..end]
            .split(',')
            .map(|a| parse_value(a.trim()))
            .collect();

        match fun {
            "dc" => Self::dc(arg(&args, 0, 0.0)),
            "step" => Self::step(
                arg(&args, 0, 0.0),
                arg(&args, 1, 1.0),
                arg(&args, 2, 0.0),
                arg(&args, 3, 1e-9),
            ),
            "square" => Self::square(
                arg(&args, 0, 0.0),
                arg(&args, 1, 1.0),
                arg(&args, 2, 1.0),
                arg(&args, 3, 50.0),
            ),
            "triangle" => Self::triangle(
                arg(&args, 0, 0.0),
                arg(&args, 1, 1.0),
                arg(&args, 2, 1.0),
            ),
            "pulse" => Self::pulse(
                arg(&args, 0, 0.0),
                arg(&args, 1, 1.0),
                arg(&args, 2, 0.0),
                arg(&args, 3, 1e-9),
                arg(&args, 4, 1e-9),
                arg(&args, 5, 1e9),
                arg(&args, 6, 1e9),
            ),
            "impulse" => Self::impulse(arg(&args, 0, 1.0), arg(&args, 1, 1e-9)),
            "sin" => Self::sin(
                arg(&args, 0, 0.0),
                arg(&args, 1, 1.0),
                arg(&args, 2, 1.0),
                arg(&args, 3, 0.0),
                arg(&args, 4, 0.0),
            ),
            "pwl" | "pwl_repeating" => {
                let pairs = args
                    .chunks(2)
                    .filter_map(|c| match c {
                        [Some(t), Some(v)] => Some((*t, *v)),
                        _ => None,
                    })
                    .collect();
                Self::pwl(pairs, fun == "pwl_repeating")
            }
            _ => Self::dc(0.0),
        }
    }

    /// Value at time 0.
    pub fn dc_value(&self) -> f64 {
        self.dc
    }

    /// Repeat period (0 for aperiodic sources).
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Evaluate the waveform at time `t`. Periodic sources reduce `t`
    /// modulo the period first.
    pub fn value(&self, t: f64) -> f64 {
        match &self.shape {
            Shape::Constant(v) => *v,
            Shape::Sin {
                offset,
                amplitude,
                freq,
                delay,
                phase,
            } => {
                use std::f64::consts::TAU;
                if t < *delay {
                    offset + amplitude * (TAU * phase).sin()
                } else {
                    offset + amplitude * (TAU * (freq * (t - delay) + phase)).sin()
                }
            }
            Shape::Pwl { pairs, repeat } => {
                let t = if *repeat && self.period > 0.0 {
                    fmod(t, self.period)
                } else {
                    t
                };
                let (mut last_t, mut last_v) = pairs[0];
                if t > last_t {
                    for &(next_t, next_v) in &pairs[1..] {
                        // defend against non-monotonic pairs
                        if next_t > last_t && t < next_t {
                            return last_v + (next_v - last_v) * (t - last_t) / (next_t - last_t);
                        }
                        last_t = next_t;
                        last_v = next_v;
                    }
                }
                last_v
            }
        }
    }

    /// Next time at or after `t` where the slope changes, `None` if the
    /// waveform is smooth from `t` on.
    pub fn inflection_point(&self, t: f64) -> Option<f64> {
        match &self.shape {
            Shape::Constant(_) => None,
            Shape::Sin { delay, .. } => (t < *delay).then_some(*delay),
            Shape::Pwl { pairs, repeat } => {
                let (reduced, base) = if *repeat && self.period > 0.0 && self.period.is_finite() {
                    let r = fmod(t, self.period);
                    (r, t - r)
                } else {
                    (t, 0.0)
                };
                for &(next_t, _) in pairs {
                    if reduced < next_t {
                        return Some(base + next_t);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_number_is_dc() {
        let w = Waveform::parse("5");
        assert_eq!(w.value(0.0), 5.0);
        assert_eq!(w.value(1.0), 5.0);
        assert_eq!(w.dc_value(), 5.0);
        assert_eq!(w.period(), 0.0);
        assert_eq!(w.inflection_point(0.0), None);
    }

    #[test]
    fn test_engineering_notation_value() {
        let w = Waveform::parse("1k");
        assert_eq!(w.dc_value(), 1000.0);
    }

    #[test]
    fn test_malformed_defaults_to_zero() {
        assert_eq!(Waveform::parse("bogus").dc_value(), 0.0);
        assert_eq!(Waveform::parse("wobble(1,2)").dc_value(), 0.0);
    }

    #[test]
    fn test_step() {
        let w = Waveform::parse("step(0,5,1m,1u)");
        assert_eq!(w.value(0.0), 0.0);
        assert_eq!(w.value(0.9e-3), 0.0);
        let mid = w.value(1.0005e-3);
        assert!((mid - 2.5).abs() < 1e-9, "mid-ramp value {}", mid);
        assert_eq!(w.value(2e-3), 5.0);
        assert_eq!(w.period(), 0.0);
    }

    #[test]
    fn test_step_inflections() {
        let w = Waveform::step(0.0, 1.0, 1e-3, 1e-6);
        assert_eq!(w.inflection_point(0.0), Some(1e-3));
        let after_ramp = w.inflection_point(1.0005e-3).unwrap();
        assert!((after_ramp - 1.001e-3).abs() < 1e-12);
        assert_eq!(w.inflection_point(2e-3), None);
    }

    #[test]
    fn test_sin() {
        let w = Waveform::parse("sin(1,2,1k)");
        assert!((w.dc_value() - 1.0).abs() < 1e-12);
        // Quarter period: offset + amplitude.
        let peak = w.value(0.25e-3);
        assert!((peak - 3.0).abs() < 1e-9, "peak {}", peak);
        assert!((w.period() - 1e-3).abs() < 1e-12);
        assert_eq!(w.inflection_point(0.0), None);
    }

    #[test]
    fn test_sin_delay_holds_initial_value() {
        let w = Waveform::sin(0.0, 1.0, 1e3, 1e-3, 90.0);
        assert!((w.value(0.0) - 1.0).abs() < 1e-12);
        assert_eq!(w.inflection_point(0.0), Some(1e-3));
    }

    #[test]
    fn test_pwl_interpolation() {
        let w = Waveform::parse("pwl(0,0,1,10,2,0)");
        assert_eq!(w.value(-1.0), 0.0);
        assert!((w.value(0.5) - 5.0).abs() < 1e-12);
        assert!((w.value(1.5) - 5.0).abs() < 1e-12);
        assert_eq!(w.value(3.0), 0.0);
    }

    #[test]
    fn test_pwl_repeating_reduces_time() {
        let w = Waveform::parse("pwl_repeating(0,0,1,10,2,0)");
        assert!((w.period() - 2.0).abs() < 1e-12);
        assert!((w.value(2.5) - 5.0).abs() < 1e-12);
        // Breakpoints are reported in absolute time.
        let bp = w.inflection_point(2.5).unwrap();
        assert!((bp - 3.0).abs() < 1e-12, "breakpoint {}", bp);
    }

    #[test]
    fn test_pwl_degenerate_is_constant() {
        let w = Waveform::pwl(vec![(1.0, 7.0)], false);
        assert_eq!(w.value(0.0), 7.0);
        assert_eq!(w.value(10.0), 7.0);
        assert_eq!(w.inflection_point(0.0), None);
    }

    #[test]
    fn test_square_levels() {
        let w = Waveform::parse("square(0,1,1)");
        // Just after the rising edge.
        assert!((w.value(0.02) - 1.0).abs() < 1e-9);
        // Deep in the low half.
        assert_eq!(w.value(0.9), 0.0);
        assert!((w.period() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pulse_plateau_and_period() {
        let w = Waveform::pulse(0.0, 1.0, 1e-3, 1e-6, 1e-6, 2e-3, 10e-3);
        assert_eq!(w.value(0.5e-3), 0.0);
        assert!((w.value(2e-3) - 1.0).abs() < 1e-9);
        assert!((w.period() - 10e-3).abs() < 1e-12);
        // Second cycle repeats the first.
        assert!((w.value(12e-3) - w.value(2e-3)).abs() < 1e-9);
    }
}
