use std::time::Duration;

use rand::Rng;

use super::event::VisualEvent;
use super::queue::SharedState;

pub const DEMO_INTERVAL: Duration = Duration::from_millis(20);

pub fn random_event<R: Rng>(rng: &mut R) -> VisualEvent {
    VisualEvent::new(
        rng.gen_range(0.1..=0.9),
        rng.gen_range(0.1..=0.9),
        rng.gen_range(0.02..=0.1),
        rng.gen_range(0.8..=2.0),
        rng.gen_range(0.5..=1.5),
    )
}

/// Synthetic producer: one random event per `interval` until the running flag
/// is cleared. Returns the number of events pushed.
pub fn run_demo_producer<R: Rng>(shared: &SharedState, rng: &mut R, interval: Duration) -> usize {
    let mut pushed = 0;
    while shared.running.is_running() {
        std::thread::sleep(interval);
        if !shared.running.is_running() {
            break;
        }
        let event = random_event(rng);
        log::trace!(
            "Demo event at {:.2},{:.2} r={:.3} fo={:.2} it={:.2}",
            event.x,
            event.y,
            event.radius,
            event.falloff,
            event.intensity
        );
        shared.queue.push(event);
        pushed += 1;
    }
    log::info!("Demo producer stopped after {} events", pushed);
    pushed
}
