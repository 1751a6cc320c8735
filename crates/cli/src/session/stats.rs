//! End-of-run statistics.

use std::time::Duration;

use contracts::PollResult;
use observability::MetricsSummary;
use poller::ClientStats;

/// Statistics of one `run` invocation
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Wall-clock time between start and close
    pub duration: Duration,

    /// Client counters captured just before close
    pub client: ClientStats,

    /// Per sub-request counters captured just before close
    pub sub_requests: Vec<PollResult>,

    /// Results observed by the handler
    pub results: MetricsSummary,
}

impl RunStats {
    /// Dispatches per second over the whole run
    pub fn dispatch_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.client.dispatch.dispatched as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let queue = &self.client.queue;
        let dispatch = &self.client.dispatch;

        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sub-requests: {}", self.client.sub_requests);
        println!("   ├─ Dispatched: {}", dispatch.dispatched);
        println!("   └─ Rate: {:.2}/s", self.dispatch_rate());

        println!("\nDispatcher");
        println!("   ├─ Succeeded: {}", dispatch.succeeded);
        println!("   ├─ Failed: {}", dispatch.failed);
        println!("   ├─ Faults: {}", dispatch.faults);
        println!("   ├─ Fast retries: {}", dispatch.fast_retries);
        println!("   ├─ Cadence re-arms: {}", dispatch.cadence_rearms);
        println!("   └─ Dormant: {}", dispatch.dormant);

        println!("\nReady Queue");
        println!("   ├─ Enqueued: {}", queue.enqueued);
        println!("   ├─ Dequeued: {}", queue.dequeued);
        println!("   ├─ Deferred (queue full): {}", queue.deferred);
        println!("   └─ Depth at close: {}", queue.queue_len);

        if !self.sub_requests.is_empty() {
            println!("\nSub-requests");
            for request in &self.sub_requests {
                println!(
                    "   - slave={} {} [{}..+{}] tx={} err={}",
                    request.slave_id,
                    request.function,
                    request.address,
                    request.quantity,
                    request.tx_count,
                    request.err_count
                );
            }
        }

        println!("\n{}", self.results);
    }
}
