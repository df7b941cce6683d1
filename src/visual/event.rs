/// One glowing circle on the visual plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualEvent {
    /// Position in the unit square
    pub x: f32,
    pub y: f32,
    /// Consumer clock reading when first drained; `None` until then
    pub timestamp: Option<f64>,
    /// Circle radius in UV units
    pub radius: f32,
    /// Radial falloff exponent
    pub falloff: f32,
    /// Overall brightness multiplier
    pub intensity: f32,
}

impl VisualEvent {
    pub fn new(x: f32, y: f32, radius: f32, falloff: f32, intensity: f32) -> Self {
        Self {
            x,
            y,
            timestamp: None,
            radius,
            falloff,
            intensity,
        }
    }

    /// Seconds since the consumer first saw the event, 0 if it has not yet.
    pub fn age(&self, now: f64) -> f64 {
        self.timestamp.map_or(0.0, |t| now - t)
    }
}
