use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    #[default]
    Linear,
    In,
    Out,
    InOut,
    InCubic,
    OutCubic,
    InOutCubic,
}

impl Ease {
    /// Document timing names (`linear`, `in`, `out`, `inout`, `easeIn`, ...). Unknown names fall
    /// back to the default curve.
    pub fn from_value(v: Option<&Value>) -> Self {
        let Some(name) = v.and_then(Value::as_str) else {
            return Self::default();
        };
        match name.to_ascii_lowercase().as_str() {
            "in" | "easein" => Self::In,
            "out" | "easeout" => Self::Out,
            "inout" | "easeinout" => Self::InOut,
            "incubic" => Self::InCubic,
            "outcubic" => Self::OutCubic,
            "inoutcubic" => Self::InOutCubic,
            _ => Self::Linear,
        }
    }

    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::In => t * t,
            Self::Out => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/ease.rs"]
mod tests;
