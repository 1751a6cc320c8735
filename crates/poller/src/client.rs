//! Client - lifecycle of one polled transport

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, GatherJob, PollResult, Transport};
use dispatcher::{DispatchMetrics, DispatchMetricsSnapshot, DispatcherBuilder, DispatcherHandle};
use scheduler::{
    CancellationToken, Producer, QueueMetricsSnapshot, ReadyQueue, Splitter, SubRequest, Timer,
    TokioTimer,
};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::ClientOptions;

enum State<T> {
    /// Not started; owns the transport
    Idle(T),
    /// Transport lent to the dispatcher task
    Running(DispatcherHandle<T>),
    Closed,
}

/// Point-in-time client counters
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientStats {
    pub sub_requests: usize,
    pub queue: QueueMetricsSnapshot,
    pub dispatch: DispatchMetricsSnapshot,
}

/// Periodic gather client over one transport.
///
/// Must be created inside a Tokio runtime.
pub struct Client<T> {
    options: ClientOptions,
    queue: ReadyQueue,
    splitter: Splitter,
    shutdown: CancellationToken,
    timer: TokioTimer,
    requests: Mutex<Vec<Arc<SubRequest>>>,
    dispatch_metrics: Option<Arc<DispatchMetrics>>,
    state: State<T>,
}

impl<T: Transport + 'static> Client<T> {
    /// # Errors
    /// `ConfigValidation` for invalid options; `Other` outside a Tokio runtime.
    pub fn new(transport: T, options: ClientOptions) -> Result<Self, ContractError> {
        options.validate()?;

        let queue = ReadyQueue::new(options.ready_queue_capacity);
        let shutdown = CancellationToken::new();
        let producer = Producer::new(
            queue.clone(),
            shutdown.clone(),
            Arc::clone(&options.jitter),
            options.jitter_max,
        );
        let timer = TokioTimer::new(Arc::new(producer), shutdown.clone())
            .map_err(|e| ContractError::Other(e.to_string()))?;

        Ok(Self {
            options,
            queue,
            splitter: Splitter::new(),
            shutdown,
            timer,
            requests: Mutex::new(Vec::new()),
            dispatch_metrics: None,
            state: State::Idle(transport),
        })
    }

    /// Connect the transport, then launch the dispatcher.
    ///
    /// # Errors
    /// The transport's connect error (the client stays startable), `ClientClosed`
    /// after close, `Other` when already started.
    #[instrument(name = "client_start", skip(self))]
    pub async fn start(&mut self) -> Result<(), ContractError> {
        let mut transport = match mem::replace(&mut self.state, State::Closed) {
            State::Idle(transport) => transport,
            State::Running(handle) => {
                self.state = State::Running(handle);
                return Err(ContractError::Other("client already started".into()));
            }
            State::Closed => return Err(ContractError::ClientClosed),
        };

        if let Err(err) = transport.connect().await {
            self.state = State::Idle(transport);
            return Err(err);
        }

        let dispatcher = DispatcherBuilder::new(
            transport,
            self.queue.clone(),
            Arc::new(self.timer.clone()) as Arc<dyn Timer>,
            self.shutdown.clone(),
        )
        .handler(Arc::clone(&self.options.handler))
        .fault_hook(self.options.fault_hook.clone())
        .jitter(Arc::clone(&self.options.jitter))
        .jitter_max(self.options.jitter_max)
        .build();

        self.dispatch_metrics = Some(dispatcher.metrics());
        self.state = State::Running(dispatcher.spawn());
        info!(
            ready_queue_capacity = self.queue.capacity(),
            "Client started"
        );
        Ok(())
    }

    /// Validate and split `job`, then arm every sub-request at its scan rate.
    ///
    /// # Errors
    /// `InvalidSlaveId`, `InvalidFunctionCode`, `InvalidRange` or
    /// `ClientClosed`; nothing is scheduled on error.
    #[instrument(
        name = "client_add_gather_job",
        skip(self, job),
        fields(slave_id = job.slave_id, function_code = job.function_code)
    )]
    pub fn add_gather_job(&self, job: GatherJob) -> Result<(), ContractError> {
        if self.shutdown.is_cancelled() {
            return Err(ContractError::ClientClosed);
        }

        let requests = self.splitter.split(&job)?;
        for request in &requests {
            self.timer.arm(Arc::clone(request), request.scan_rate());
        }
        debug!(sub_requests = requests.len(), "gather job scheduled");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(requests);
        Ok(())
    }

    /// Stop scheduling, wait for the in-flight dispatch, then close the
    /// transport. No transport call or handler callback happens once this
    /// returns. Closing twice is a no-op.
    ///
    /// # Errors
    /// The transport's close error.
    #[instrument(name = "client_close", skip(self))]
    pub async fn close(&mut self) -> Result<(), ContractError> {
        let state = mem::replace(&mut self.state, State::Closed);
        if matches!(state, State::Closed) {
            return Ok(());
        }

        self.shutdown.cancel();
        self.timer.cancel_all();
        self.queue.close();

        let mut transport = match state {
            State::Idle(transport) => transport,
            State::Running(handle) => handle.shutdown().await?,
            State::Closed => return Ok(()),
        };
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let closed = transport.close().await;
        info!(ok = closed.is_ok(), "Client closed");
        closed
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Counters of every sub-request scheduled so far
    pub fn sub_requests(&self) -> Vec<PollResult> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|request| request.snapshot())
            .collect()
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            sub_requests: self
                .requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            queue: self.queue.metrics().snapshot(),
            dispatch: self
                .dispatch_metrics
                .as_ref()
                .map(|metrics| metrics.snapshot())
                .unwrap_or_default(),
        }
    }
}

impl<T> Drop for Client<T> {
    fn drop(&mut self) {
        // stops timers and the dispatcher of a client dropped without close
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Fault, FunctionCode, Handler};
    use scheduler::SequenceJitter;
    use std::time::Duration;
    use transport::{SimulatedConfig, SimulatedProbe, SimulatedTransport};

    #[derive(Default)]
    struct CountingHandler {
        results: Mutex<Vec<PollResult>>,
    }

    impl Handler for CountingHandler {
        fn on_result(&self, _error: Option<&ContractError>, result: &PollResult) {
            self.results.lock().unwrap().push(*result);
        }
    }

    fn client(
        config: SimulatedConfig,
        handler: Arc<CountingHandler>,
    ) -> (Client<SimulatedTransport>, SimulatedProbe) {
        let transport = SimulatedTransport::with_config(config);
        let probe = transport.probe();
        let options = ClientOptions::default()
            .with_handler(handler)
            .with_jitter(Arc::new(SequenceJitter::constant(Duration::from_millis(5))));
        (Client::new(transport, options).unwrap(), probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_scan_rate() {
        let handler = Arc::new(CountingHandler::default());
        let (mut client, probe) = client(SimulatedConfig::default(), handler.clone());
        client.start().await.unwrap();
        client
            .add_gather_job(
                GatherJob::new(1, FunctionCode::ReadHoldingRegisters, 0, 10)
                    .with_scan_rate(Duration::from_millis(100)),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        client.close().await.unwrap();

        assert_eq!(probe.call_count(), 3);
        assert_eq!(handler.results.lock().unwrap().len(), 3);
        let stats = client.stats();
        assert_eq!(stats.dispatch.succeeded, 3);
        assert_eq!(stats.queue.enqueued, 3);
    }

    #[tokio::test]
    async fn test_invalid_job_schedules_nothing() {
        let (client, _) = client(SimulatedConfig::default(), Arc::default());
        let err = client
            .add_gather_job(GatherJob::new(0, FunctionCode::ReadCoils, 0, 1))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidSlaveId { .. }));
        assert_eq!(client.stats().sub_requests, 0);
    }

    #[tokio::test]
    async fn test_start_propagates_connect_error() {
        let (mut client, probe) = client(
            SimulatedConfig {
                fail_connect: true,
                ..Default::default()
            },
            Arc::default(),
        );
        assert!(matches!(
            client.start().await,
            Err(ContractError::Connection { .. })
        ));
        assert!(!client.is_running());
        assert!(!probe.is_connected());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut client, _) = client(SimulatedConfig::default(), Arc::default());
        client.start().await.unwrap();
        assert!(client.start().await.is_err());
        assert!(client.is_running());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_after_close_fails() {
        let (mut client, probe) = client(SimulatedConfig::default(), Arc::default());
        client.start().await.unwrap();
        client.close().await.unwrap();

        let err = client
            .add_gather_job(GatherJob::new(1, FunctionCode::ReadCoils, 0, 8))
            .unwrap_err();
        assert!(matches!(err, ContractError::ClientClosed));
        assert!(probe.is_closed());
        assert!(client.close().await.is_ok());
        assert!(matches!(client.start().await, Err(ContractError::ClientClosed)));
    }

    #[tokio::test]
    async fn test_close_error_propagates() {
        let (mut client, _) = client(
            SimulatedConfig {
                fail_close: true,
                ..Default::default()
            },
            Arc::default(),
        );
        client.start().await.unwrap();
        assert!(matches!(
            client.close().await,
            Err(ContractError::Connection { .. })
        ));
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_close_without_start_closes_transport() {
        let (mut client, probe) = client(SimulatedConfig::default(), Arc::default());
        client.close().await.unwrap();
        assert!(probe.is_closed());
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let options = ClientOptions::default().with_ready_queue_capacity(0);
        let result = Client::new(SimulatedTransport::new(), options);
        assert!(matches!(
            result,
            Err(ContractError::ConfigValidation { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_hook_receives_panics() {
        let faults: Arc<Mutex<Vec<Fault>>> = Arc::default();
        let sink = Arc::clone(&faults);
        let transport = SimulatedTransport::new();
        let probe = transport.probe();
        probe.script(
            2,
            FunctionCode::ReadCoils,
            0,
            [transport::Outcome::Panic("bad frame".into())],
        );
        let options = ClientOptions::default().with_fault_hook(Arc::new(move |fault: &Fault| {
            sink.lock().unwrap().push(fault.clone());
        }));
        let mut client = Client::new(transport, options).unwrap();
        client.start().await.unwrap();
        client
            .add_gather_job(
                GatherJob::new(2, FunctionCode::ReadCoils, 0, 16)
                    .with_scan_rate(Duration::from_millis(100)),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        client.close().await.unwrap();

        assert_eq!(faults.lock().unwrap().len(), 1);
        assert_eq!(probe.call_count(), 2);
        assert_eq!(client.stats().dispatch.faults, 1);
    }
}
