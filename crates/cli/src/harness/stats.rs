//! Dispatch run statistics.

use std::time::Duration;

use dispatcher::ShutdownReport;
use observability::DeliveryStatsAggregator;

/// Statistics from a dispatch run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Documents accepted by the dispatcher
    pub submitted: u64,

    /// Documents the producers could not submit (dispatcher closed)
    pub not_submitted: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Whether the run was stopped by a signal
    pub interrupted: bool,

    /// Result of the dispatcher shutdown
    pub shutdown: ShutdownReport,

    /// Per-attempt delivery statistics
    pub deliveries: DeliveryStatsAggregator,
}

impl RunStats {
    /// Successful deliveries per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.shutdown.delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Dispatch Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Submitted: {}", self.submitted);
        if self.not_submitted > 0 {
            println!("   ├─ Not submitted: {}", self.not_submitted);
        }
        println!("   ├─ Released: {}", self.shutdown.released);
        println!("   ├─ Delivered: {}", self.shutdown.delivered);
        println!("   ├─ Failed attempts: {}", self.shutdown.failed);
        println!("   ├─ Discarded: {}", self.shutdown.discarded);
        println!("   └─ Throughput: {:.2} docs/s", self.throughput());

        if self.interrupted {
            println!("\n   Stopped by signal");
        }
        if self.shutdown.drain_timed_out {
            println!("\n   Drain timed out, remaining documents were discarded");
        }

        println!("\n{}", self.deliveries.summary());
    }
}
