use std::time::Duration;
use std::thread;
use rand::Rng;
use log::info;

const STOP_POLL: Duration = Duration::from_millis(250);

/// Sleeps for a random duration in `[base, 2 * base]` between page loads.
pub fn random_page_delay(base: Duration) {
    if base.is_zero() {
        return;
    }
    let mut rng = rand::thread_rng();
    let delay = rng.gen_range(base..=base * 2);
    info!("Waiting for {:.1} seconds (Page Delay)...", delay.as_secs_f64());
    thread::sleep(delay);
}

/// Fixed pause between two lookups. Wakes early, returning `false`, once
/// `should_stop` reports true.
pub fn courtesy_delay(delay: Duration, should_stop: impl Fn() -> bool) -> bool {
    if delay.is_zero() {
        return !should_stop();
    }
    info!("Waiting for {} seconds (Rate Limit)...", delay.as_secs());

    let mut remaining = delay;
    while !remaining.is_zero() {
        if should_stop() {
            return false;
        }
        let step = remaining.min(STOP_POLL);
        thread::sleep(step);
        remaining -= step;
    }
    !should_stop()
}
