//! Dispatcher - single consumer of the ready queue

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use contracts::{
    ContractError, Fault, FaultHook, FunctionCode, Handler, NopHandler, Transport,
    DEFAULT_JITTER_MAX_MS,
};
use scheduler::{JitterSource, RandomJitter, ReadyQueue, SubRequest, Timer};

use crate::fault::panic_message;
use crate::handle::DispatcherHandle;
use crate::metrics::DispatchMetrics;
use crate::reschedule::Reschedule;

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<T> {
    transport: T,
    queue: ReadyQueue,
    timer: Arc<dyn Timer>,
    shutdown: CancellationToken,
    handler: Arc<dyn Handler>,
    fault_hook: Option<FaultHook>,
    jitter: Arc<dyn JitterSource>,
    jitter_max: Duration,
}

impl<T: Transport + 'static> DispatcherBuilder<T> {
    /// `transport` must already be connected
    pub fn new(
        transport: T,
        queue: ReadyQueue,
        timer: Arc<dyn Timer>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            queue,
            timer,
            shutdown,
            handler: Arc::new(NopHandler),
            fault_hook: None,
            jitter: Arc::new(RandomJitter::new()),
            jitter_max: Duration::from_millis(DEFAULT_JITTER_MAX_MS),
        }
    }

    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn fault_hook(mut self, hook: Option<FaultHook>) -> Self {
        self.fault_hook = hook;
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Upper bound of fast-retry delays
    pub fn jitter_max(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    pub fn build(self) -> Dispatcher<T> {
        Dispatcher {
            transport: self.transport,
            queue: self.queue,
            timer: self.timer,
            shutdown: self.shutdown,
            handler: self.handler,
            fault_hook: self.fault_hook,
            jitter: self.jitter,
            jitter_max: self.jitter_max,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }
}

/// Issues every transport call of a client, one at a time
pub struct Dispatcher<T> {
    transport: T,
    queue: ReadyQueue,
    timer: Arc<dyn Timer>,
    shutdown: CancellationToken,
    handler: Arc<dyn Handler>,
    fault_hook: Option<FaultHook>,
    jitter: Arc<dyn JitterSource>,
    jitter_max: Duration,
    metrics: Arc<DispatchMetrics>,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until shutdown is signalled or the queue closes, then give the
    /// transport back. Queued sub-requests are not drained.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> T {
        info!(
            queue_capacity = self.queue.capacity(),
            jitter_max_ms = self.jitter_max.as_millis() as u64,
            "Dispatcher started"
        );

        loop {
            let request = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = self.queue.pop() => match next {
                    Some(request) => request,
                    None => break,
                },
            };
            self.dispatch(request).await;
        }

        info!(
            dispatched = self.metrics.dispatched(),
            faults = self.metrics.faults(),
            "Dispatcher stopped"
        );
        self.transport
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> DispatcherHandle<T> {
        let shutdown = self.shutdown.clone();
        let metrics = self.metrics();
        let task = tokio::spawn(self.run());
        DispatcherHandle::new(task, shutdown, metrics)
    }

    async fn dispatch(&mut self, request: Arc<SubRequest>) {
        request.record_attempt();
        let function = request.function();
        let started = Instant::now();

        let guarded = AssertUnwindSafe(read_and_notify(
            &mut self.transport,
            self.handler.as_ref(),
            &request,
        ))
        .catch_unwind()
        .await;
        observability::record_dispatch_latency_ms(
            function.as_str(),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        let error = match guarded {
            Ok(Ok(())) => None,
            Ok(Err(err)) => {
                debug!(request_id = request.id(), error = %err, "read failed");
                Some(err)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.raise_fault(&request, message.clone());
                Some(ContractError::DispatchFault { message })
            }
        };

        let succeeded = error.is_none();
        if !succeeded {
            request.record_error();
        }
        self.metrics.record_outcome(succeeded);
        observability::record_request(function.as_str(), succeeded);

        self.reschedule(&request, Reschedule::decide(&request, succeeded));

        let result = request.snapshot();
        let handler = self.handler.as_ref();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| {
            handler.on_result(error.as_ref(), &result)
        })) {
            self.raise_fault(&request, panic_message(panic.as_ref()));
        }
    }

    fn reschedule(&self, request: &Arc<SubRequest>, decision: Reschedule) {
        self.metrics.record_reschedule(decision);
        observability::record_reschedule(decision.as_str());

        match decision {
            Reschedule::FastRetry => {
                let delay = self.jitter.sample(self.jitter_max);
                trace!(
                    request_id = request.id(),
                    retry_count = request.retry_count(),
                    delay_ms = delay.as_millis() as u64,
                    "fast retry"
                );
                self.timer.arm(Arc::clone(request), delay);
            }
            Reschedule::Cadence(scan_rate) => {
                trace!(request_id = request.id(), "rearm at scan rate");
                self.timer.arm(Arc::clone(request), scan_rate);
            }
            Reschedule::Dormant => {
                debug!(request_id = request.id(), "one-shot request done");
            }
        }
    }

    fn raise_fault(&self, request: &SubRequest, message: String) {
        self.metrics.record_fault();
        observability::record_fault(request.function().as_str());
        error!(
            request_id = request.id(),
            slave_id = request.slave_id(),
            function = %request.function(),
            address = request.address(),
            panic = %message,
            "dispatch fault"
        );

        let Some(hook) = &self.fault_hook else {
            return;
        };
        let fault = Fault {
            slave_id: request.slave_id(),
            function: request.function(),
            address: request.address(),
            message,
        };
        if catch_unwind(AssertUnwindSafe(|| hook(&fault))).is_err() {
            error!(request_id = request.id(), "fault hook panicked");
        }
    }
}

/// The guarded part of a dispatch: the read and its payload callback
async fn read_and_notify<T: Transport>(
    transport: &mut T,
    handler: &dyn Handler,
    request: &SubRequest,
) -> Result<(), ContractError> {
    let (slave_id, address, quantity) = (request.slave_id(), request.address(), request.quantity());

    match request.function() {
        FunctionCode::ReadCoils => {
            let data = transport.read_coils(slave_id, address, quantity).await?;
            handler.on_read_coils(slave_id, address, quantity, &data);
        }
        FunctionCode::ReadDiscreteInputs => {
            let data = transport
                .read_discrete_inputs(slave_id, address, quantity)
                .await?;
            handler.on_read_discrete_inputs(slave_id, address, quantity, &data);
        }
        FunctionCode::ReadHoldingRegisters => {
            let data = transport
                .read_holding_registers(slave_id, address, quantity)
                .await?;
            handler.on_read_holding_registers(slave_id, address, quantity, &data);
        }
        FunctionCode::ReadInputRegisters => {
            let data = transport
                .read_input_registers(slave_id, address, quantity)
                .await?;
            handler.on_read_input_registers(slave_id, address, quantity, &data);
        }
    }
    Ok(())
}
