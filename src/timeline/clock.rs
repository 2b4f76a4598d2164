/// Media timing of one layer relative to its parent's time.
///
/// `local = (parent - begin) * speed + time_offset`. A frozen clock (`speed == 0`) ignores its
/// parent entirely, so its local time is whatever `time_offset` was last set to; this is how
/// scrubbing works for both the page master line and independently looping elements.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerClock {
    pub begin: f64,
    pub speed: f64,
    pub time_offset: f64,
}

impl Default for LayerClock {
    fn default() -> Self {
        Self {
            begin: 0.0,
            speed: 1.0,
            time_offset: 0.0,
        }
    }
}

impl LayerClock {
    pub fn frozen() -> Self {
        Self {
            speed: 0.0,
            ..Self::default()
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.speed == 0.0
    }

    pub fn local_time(&self, parent: f64) -> f64 {
        (parent - self.begin) * self.speed + self.time_offset
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/clock.rs"]
mod tests;
