//! Easing curves for keyframe tweens.
//!
//! Every curve maps normalized time `t` in `[0, 1]` to eased progress with
//! exact endpoints: `apply(0) == 0` and `apply(1) == 1`. Bounce and elastic
//! may leave `[0, 1]` mid-curve, the boundaries still hold exactly.
//!
//! Used by: `transform::interpolate` (per-frame tween evaluation) and
//! `Easing::sample_curve` (dense preview plots in the tween editor).

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Easing variant stored on a keyframe (`"linear"`, `"ease-in"`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Bounce,
    Elastic,
}

impl Easing {
    pub fn all() -> &'static [Easing] {
        &[
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::Bounce,
            Easing::Elastic,
        ]
    }

    /// Save-file name of the variant.
    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "ease-in",
            Easing::EaseOut => "ease-out",
            Easing::EaseInOut => "ease-in-out",
            Easing::Bounce => "bounce",
            Easing::Elastic => "elastic",
        }
    }

    /// Parse a save-file name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Easing> {
        Easing::all().iter().copied().find(|e| e.name() == name)
    }

    /// Apply the curve to progress `t`. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f32) -> f32 {
        // Endpoints are always exact
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::Bounce => bounce_out(t),
            Easing::Elastic => {
                let c4 = (2.0 * PI) / 3.0;
                2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
        }
    }

    /// Sample the curve at `samples` evenly spaced points, endpoints included.
    ///
    /// Returns `(t, eased)` pairs; fewer than two samples still yields both ends.
    pub fn sample_curve(self, samples: usize) -> Vec<(f32, f32)> {
        let n = samples.max(2);
        (0..n)
            .map(|i| {
                let t = i as f32 / (n - 1) as f32;
                (t, self.apply(t))
            })
            .collect()
    }
}

impl std::fmt::Display for Easing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Easing::Linear => write!(f, "Linear"),
            Easing::EaseIn => write!(f, "Ease In"),
            Easing::EaseOut => write!(f, "Ease Out"),
            Easing::EaseInOut => write!(f, "Ease In-Out"),
            Easing::Bounce => write!(f, "Bounce"),
            Easing::Elastic => write!(f, "Elastic"),
        }
    }
}

/// Decaying bounce settling at 1 (four arcs of shrinking height).
fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}
