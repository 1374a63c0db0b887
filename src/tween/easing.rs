use std::f64::consts::PI;

const BACK: f64 = 1.70158;
const BACK_IN_OUT: f64 = BACK * 1.525;

/// Time remapping curves, `t` in `[0, 1]`.
///
/// TABLE:
/// ┌────────────┬────────────────────────────────────────────┐
/// │ Family     │ Variants                                   │
/// ├────────────┼────────────────────────────────────────────┤
/// │ Linear     │ Linear                                     │
/// │ Polynomial │ Quad / Cubic / Quart / Quint × In/Out/InOut│
/// │ Sin        │ SinIn / SinOut / SinInOut (guards 0 and 1) │
/// │ Expo       │ ExpoIn / ExpoOut / ExpoInOut               │
/// │ Circular   │ CircularIn / CircularOut / CircularInOut   │
/// │ Back       │ BackIn / BackOut / BackInOut (overshoot)   │
/// │ Bounce     │ BounceIn / BounceOut / BounceInOut         │
/// └────────────┴────────────────────────────────────────────┘
///
/// The formulas are kept exactly as the engine has always shipped them,
/// including `SinIn` being `cos(t·π/2)` between its guarded endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    QuintInOut,
    SinIn,
    SinOut,
    SinInOut,
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    CircularIn,
    CircularOut,
    CircularInOut,
    BackIn,
    BackOut,
    BackInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
}

impl Easing {
    pub const ALL: [Easing; 28] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::QuartIn,
        Easing::QuartOut,
        Easing::QuartInOut,
        Easing::QuintIn,
        Easing::QuintOut,
        Easing::QuintInOut,
        Easing::SinIn,
        Easing::SinOut,
        Easing::SinInOut,
        Easing::ExpoIn,
        Easing::ExpoOut,
        Easing::ExpoInOut,
        Easing::CircularIn,
        Easing::CircularOut,
        Easing::CircularInOut,
        Easing::BackIn,
        Easing::BackOut,
        Easing::BackInOut,
        Easing::BounceIn,
        Easing::BounceOut,
        Easing::BounceInOut,
    ];

    pub fn apply(self, t: f64) -> f64 {
        use Easing::*;
        match self {
            Linear => t,
            QuadIn => t * t,
            QuadOut => t * (2.0 - t),
            QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            CubicIn => t * t * t,
            CubicOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
                }
            }
            QuartIn => t * t * t * t,
            QuartOut => {
                let t = t - 1.0;
                1.0 - t * t * t * t
            }
            QuartInOut => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    let t = t - 1.0;
                    1.0 - 8.0 * t * t * t * t
                }
            }
            QuintIn => t * t * t * t * t,
            QuintOut => {
                let t = t - 1.0;
                1.0 + t * t * t * t * t
            }
            QuintInOut => {
                if t < 0.5 {
                    16.0 * t * t * t * t * t
                } else {
                    let t = t - 1.0;
                    1.0 + 16.0 * t * t * t * t * t
                }
            }
            SinIn => guarded(t, |t| (t * PI / 2.0).cos()),
            SinOut => guarded(t, |t| (t * PI / 2.0).sin()),
            SinInOut => guarded(t, |t| 0.5 * (1.0 - (PI * t).cos())),
            ExpoIn => {
                if t == 0.0 {
                    0.0
                } else {
                    1024f64.powf(t - 1.0)
                }
            }
            ExpoOut => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
            ExpoInOut => guarded(t, |t| {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * 1024f64.powf(t - 1.0)
                } else {
                    0.5 * (-(2f64.powf(-10.0 * (t - 1.0))) + 2.0)
                }
            }),
            CircularIn => 1.0 - (1.0 - t * t).sqrt(),
            CircularOut => {
                let t = t - 1.0;
                (1.0 - t * t).sqrt()
            }
            CircularInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    -0.5 * ((1.0 - t * t).sqrt() - 1.0)
                } else {
                    let t = t - 2.0;
                    0.5 * ((1.0 - t * t).sqrt() + 1.0)
                }
            }
            BackIn => t * t * ((BACK + 1.0) * t - BACK),
            BackOut => {
                let t = t - 1.0;
                t * t * ((BACK + 1.0) * t + BACK) + 1.0
            }
            BackInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * (t * t * ((BACK_IN_OUT + 1.0) * t - BACK_IN_OUT))
                } else {
                    let t = t - 2.0;
                    0.5 * (t * t * ((BACK_IN_OUT + 1.0) * t + BACK_IN_OUT) + 2.0)
                }
            }
            BounceIn => 1.0 - bounce_out(1.0 - t),
            BounceOut => bounce_out(t),
            BounceInOut => {
                if t < 0.5 {
                    (1.0 - bounce_out(1.0 - t * 2.0)) * 0.5
                } else {
                    bounce_out(t * 2.0 - 1.0) * 0.5 + 0.5
                }
            }
        }
    }
}

/// Exact 0 and 1 pass through untouched.
fn guarded(t: f64, curve: impl Fn(f64) -> f64) -> f64 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else {
        curve(t)
    }
}

fn bounce_out(t: f64) -> f64 {
    if t < 1.0 / 2.75 {
        7.5625 * t * t
    } else if t < 2.0 / 2.75 {
        let t = t - 1.5 / 2.75;
        7.5625 * t * t + 0.75
    } else if t < 2.5 / 2.75 {
        let t = t - 2.25 / 2.75;
        7.5625 * t * t + 0.9375
    } else {
        let t = t - 2.625 / 2.75;
        7.5625 * t * t + 0.984375
    }
}
