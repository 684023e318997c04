//! Turns the horizontal displacement of a drag, measured when the gesture
//! ends, into a review decision.

pub const DEFAULT_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    /// Below threshold; the card returns to rest.
    None,
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeConfig {
    pub viewport_width: f64,
    /// Fraction of the viewport width a drag has to cross.
    pub threshold: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            viewport_width: 80.0,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl SwipeConfig {
    fn limit(&self) -> f64 {
        self.viewport_width.abs() * self.threshold
    }

    /// Displacement the card may visually follow. A card that cannot be
    /// approved only moves left.
    pub fn constrain(&self, dx: f64, approvable: bool) -> f64 {
        if approvable {
            dx
        } else {
            dx.min(0.0)
        }
    }

    pub fn classify(&self, dx: f64, approvable: bool) -> Swipe {
        let dx = self.constrain(dx, approvable);
        if !dx.is_finite() {
            return Swipe::None;
        }

        let limit = self.limit();
        if dx > limit {
            Swipe::Approve
        } else if dx < -limit {
            Swipe::Reject
        } else {
            Swipe::None
        }
    }
}
