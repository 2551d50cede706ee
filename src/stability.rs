use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use crate::decoder::Weight;

/// Tracks consecutive readings and reports a weight once it has held steady
/// for `window`. Each settled value is reported once; a change re-arms it.
#[derive(Debug)]
pub struct StabilityTracker {
    window: Duration,
    current: Option<(Weight, Instant)>,
    reported: bool,
}

impl StabilityTracker {
    pub fn new(window: Duration) -> Self {
        StabilityTracker {
            window,
            current: None,
            reported: false,
        }
    }

    pub fn observe(&mut self, weight: Weight, now: Instant) -> Option<Weight> {
        let since = match self.current {
            Some((current, since)) if current == weight => since,
            _ => {
                trace!("Weight changed to {}", weight);
                self.current = Some((weight, now));
                self.reported = false;
                now
            }
        };

        if self.reported || now.saturating_duration_since(since) < self.window {
            return None;
        }
        self.reported = true;
        Some(weight)
    }
}
