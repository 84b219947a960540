use crate::MemoryError;

/// A hyperparameter whose value changes over time, such as the importance sampling exponent
pub trait Schedule {
    /// Calculate value at time `t`
    fn evaluate(&self, t: f32) -> f32;
}

fn validate(rate: f32, vi: f32, vf: f32) -> Result<(), MemoryError> {
    if !(rate.is_finite() && vi.is_finite() && vf.is_finite()) {
        return Err(MemoryError::InvalidSchedule(String::from(
            "`rate`, `vi` and `vf` must be finite",
        )));
    }
    (rate >= 0.0)
        .then_some(())
        .ok_or_else(|| MemoryError::InvalidSchedule(String::from("`rate` must be non-negative")))
}

/// A constant value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Schedule for Constant {
    fn evaluate(&self, _t: f32) -> f32 {
        self.value
    }
}

/// Moves from v<sub>i</sub> toward v<sub>f</sub> at a constant rate and stays there
///
/// v(t) = min(v<sub>i</sub> + rt, v<sub>f</sub>) if v<sub>i</sub> ≤ v<sub>f</sub>,
/// otherwise max(v<sub>i</sub> - rt, v<sub>f</sub>)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Linear {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Linear {
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self, MemoryError> {
        validate(rate, vi, vf)?;
        Ok(Self { rate, vi, vf })
    }
}

impl Schedule for Linear {
    fn evaluate(&self, t: f32) -> f32 {
        let &Self { rate, vi, vf } = self;
        if vi <= vf {
            (vi + rate * t).min(vf)
        } else {
            (vi - rate * t).max(vf)
        }
    }
}
