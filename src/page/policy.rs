//! Page-level playback settings read once from the resolved page bag.

use crate::{
    config::BookOptions,
    foundation::props::{Props, PropsExt},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transition {
    /// The page slides in and its timeline follows the drag.
    #[default]
    Scroll,
    /// The page replaces the previous one; drag does not scrub it.
    Replace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayMode {
    /// Autoplay when entered moving forward.
    #[default]
    Auto,
    /// Autoplay on every entry.
    Always,
    /// Only the drag drives the timeline.
    Scroll,
    Never,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PagePolicy {
    pub transition: Transition,
    pub play: PlayMode,
    pub fps: f64,
    /// Seconds for one pass over the timeline.
    pub duration: f64,
    pub repeat: bool,
    pub rewind: bool,
    pub vibrate: bool,
    /// Viewer distance for 3D transforms, document units.
    pub eye_position: Option<f64>,
}

impl PagePolicy {
    pub fn from_props(props: &Props, options: &BookOptions) -> Self {
        let transition = match props.string("transition") {
            Some("replace") => Transition::Replace,
            _ => Transition::Scroll,
        };
        let play = match props.any_of(&["play", "animation"]).and_then(|v| v.as_str()) {
            Some("always") => PlayMode::Always,
            Some("scroll") => PlayMode::Scroll,
            Some("never") => PlayMode::Never,
            _ => PlayMode::Auto,
        };
        let positive = |key: &str, default: f64| {
            props
                .num(key)
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(default)
        };
        Self {
            transition,
            play,
            fps: positive("fps", options.default_fps),
            duration: positive("duration", options.default_duration),
            repeat: props.flag("repeat").unwrap_or(false),
            rewind: props.flag("rewind").unwrap_or(false),
            vibrate: props.flag("vibrate").unwrap_or(false),
            eye_position: props.num("eyePosition").filter(|v| v.is_finite() && *v > 0.0),
        }
    }

    /// Offset advance per timer tick: one pass takes `duration * fps` ticks, which need not be a
    /// whole number.
    pub fn step(&self) -> f64 {
        1.0 / (self.duration * self.fps)
    }

    pub fn tick_interval(&self) -> f64 {
        1.0 / self.fps
    }

    pub fn autoplays(&self, forward: bool) -> bool {
        (forward && self.play == PlayMode::Auto) || self.play == PlayMode::Always || self.repeat
    }
}

#[cfg(test)]
#[path = "../../tests/unit/page/policy.rs"]
mod tests;
