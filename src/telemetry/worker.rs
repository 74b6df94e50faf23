//! Telemetry worker task body.

use core::time::Duration;

use log::{debug, info, warn};

use super::scheduler::Shared;
use crate::app::ports::TelemetryPublisher;

/// Drain the notification queue until the scheduler stops (or restarts).
///
/// The queue is polled with a bounded sleep so the running flag is observed
/// even when no timer fires.  A notification may therefore wait up to one
/// `poll` interval (`queue_poll_interval_ms`) before it is published, and a
/// stop is observed within one interval plus any publish in flight.
/// Publish failures are logged and skipped.
pub(super) fn run(shared: &Shared, epoch: u32, publisher: &dyn TelemetryPublisher, poll: Duration) {
    info!("Telemetry: worker running (epoch {})", epoch);

    while shared.is_current(epoch) {
        match shared.queue.try_receive() {
            Ok(kind) => {
                debug!("Telemetry: publishing {:?}", kind);
                if let Err(e) = publisher.publish(kind) {
                    warn!("Telemetry: publish {:?} failed: {}", kind, e);
                }
            }
            Err(_) => std::thread::sleep(poll),
        }
    }

    info!("Telemetry: worker exiting (epoch {})", epoch);
}
