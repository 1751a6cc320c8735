//! # Integration Tests
//!
//! End-to-end tests of the poller against the simulated transport.
//!
//! Covers:
//! - Splitting of oversized jobs
//! - Retry budget and cadence behavior through the public client
//! - One-shot jobs
//! - Close semantics and single in-flight dispatch
//! - Liveness when the ready queue is full

#[cfg(test)]
mod contract_tests {
    use contracts::{FunctionCode, GatherJob};

    #[test]
    fn test_blueprint_jobs_convert() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[transport]
kind = "simulated"

[[jobs]]
slave_id = 3
function_code = 4
address = 10
quantity = 20
scan_rate_ms = 250
retry = 2
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let jobs = blueprint.gather_jobs();
        assert_eq!(jobs.len(), 1);
        let expected = GatherJob::new(3, FunctionCode::ReadInputRegisters, 10, 20)
            .with_scan_rate(std::time::Duration::from_millis(250))
            .with_retry(2);
        assert_eq!(jobs[0], expected);
    }
}

#[cfg(test)]
mod split_tests {
    use contracts::{FunctionCode, GatherJob};
    use scheduler::{chunk_ranges, Splitter};

    #[test]
    fn test_twenty_with_ceiling_ten_gives_two_halves() {
        let ranges: Vec<_> = chunk_ranges(40, 20, 10).collect();
        assert_eq!(ranges, vec![(40, 10), (50, 10)]);
    }

    #[test]
    fn test_sub_requests_tile_the_job() {
        let job = GatherJob::new(1, FunctionCode::ReadDiscreteInputs, 500, 4500);
        let requests = Splitter::new().split(&job).unwrap();

        assert_eq!(requests.len(), 3);
        let mut next = 500u32;
        for request in &requests {
            assert_eq!(u32::from(request.address()), next);
            assert!(request.quantity() <= FunctionCode::ReadDiscreteInputs.quantity_max());
            next += u32::from(request.quantity());
        }
        assert_eq!(next, 5000);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{ContractError, FunctionCode, GatherJob, Handler, PollResult};
    use poller::{Client, ClientOptions};
    use scheduler::{RandomJitter, SequenceJitter};
    use transport::{Outcome, SimulatedConfig, SimulatedProbe, SimulatedTransport};

    /// Records every notification in arrival order
    #[derive(Default)]
    struct RecordingHandler {
        results: Mutex<Vec<(bool, PollResult)>>,
        registers: Mutex<Vec<(u16, Vec<u8>)>>,
    }

    impl RecordingHandler {
        fn results(&self) -> Vec<(bool, PollResult)> {
            self.results.lock().unwrap().clone()
        }

        fn result_count(&self) -> usize {
            self.results.lock().unwrap().len()
        }
    }

    impl Handler for RecordingHandler {
        fn on_read_holding_registers(&self, _slave_id: u8, address: u16, _quantity: u16, data: &[u8]) {
            self.registers.lock().unwrap().push((address, data.to_vec()));
        }

        fn on_result(&self, error: Option<&ContractError>, result: &PollResult) {
            self.results.lock().unwrap().push((error.is_some(), *result));
        }
    }

    fn client_with(
        config: SimulatedConfig,
        options: ClientOptions,
    ) -> (Client<SimulatedTransport>, SimulatedProbe, Arc<RecordingHandler>) {
        let transport = SimulatedTransport::with_config(config);
        let probe = transport.probe();
        let handler = Arc::new(RecordingHandler::default());
        let client = Client::new(transport, options.with_handler(handler.clone())).unwrap();
        (client, probe, handler)
    }

    fn fixed_jitter_options() -> ClientOptions {
        ClientOptions::default()
            .with_jitter(Arc::new(SequenceJitter::constant(Duration::from_millis(5))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_job_is_read_in_chunks() {
        let (mut client, probe, handler) =
            client_with(SimulatedConfig::default(), fixed_jitter_options());
        for address in 0..250u16 {
            probe.set_holding_register(1, address, address);
        }
        client.start().await.unwrap();
        client
            .add_gather_job(GatherJob::new(1, FunctionCode::ReadHoldingRegisters, 0, 250))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        client.close().await.unwrap();

        let mut calls: Vec<_> = probe.calls().iter().map(|c| (c.address, c.quantity)).collect();
        calls.sort_unstable();
        assert_eq!(calls, vec![(0, 125), (125, 125)]);

        let mut registers = handler.registers.lock().unwrap().clone();
        registers.sort_by_key(|(address, _)| *address);
        assert_eq!(registers.len(), 2);
        assert_eq!(registers[1].1.len(), 250);
        // register 125 is the first of the second chunk, big-endian
        assert_eq!(&registers[1].1[..2], &[0x00, 0x7D]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_then_cadence() {
        let (mut client, probe, handler) =
            client_with(SimulatedConfig::default(), fixed_jitter_options());
        probe.set_default_outcome(
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            Outcome::Fail("no response".into()),
        );
        client.start().await.unwrap();
        client
            .add_gather_job(
                GatherJob::new(1, FunctionCode::ReadHoldingRegisters, 0, 10)
                    .with_scan_rate(Duration::from_millis(1000))
                    .with_retry(3),
            )
            .unwrap();

        // first fire at 1000 ms, fast retries at 1005 and 1010
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let results = handler.results();
        assert_eq!(results.len(), 3);
        let err_counts: Vec<_> = results.iter().map(|(_, r)| r.err_count).collect();
        assert_eq!(err_counts, vec![1, 2, 3]);
        assert!(results.iter().all(|(failed, _)| *failed));

        // budget exhausted: next attempt waits a full cadence
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(probe.call_count(), 3);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(probe.call_count(), 4);

        client.close().await.unwrap();
        let stats = client.stats();
        assert_eq!(stats.dispatch.fast_retries, 2);
        assert!(stats.dispatch.cadence_rearms >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_survives_recovery() {
        let (mut client, probe, handler) =
            client_with(SimulatedConfig::default(), fixed_jitter_options());
        let fail = || Outcome::Fail("crc".into());
        probe.script(
            1,
            FunctionCode::ReadCoils,
            0,
            [fail(), fail(), fail(), Outcome::Respond, fail()],
        );
        client.start().await.unwrap();
        client
            .add_gather_job(
                GatherJob::new(1, FunctionCode::ReadCoils, 0, 16)
                    .with_scan_rate(Duration::from_millis(100))
                    .with_retry(3),
            )
            .unwrap();

        // 100, 105, 110 fail; 210 succeeds; 310 fails
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(probe.call_count(), 5);

        // the failure at 310 waits a full cadence instead of retrying at 315
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.call_count(), 5);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(probe.call_count(), 6);

        client.close().await.unwrap();

        let failed: Vec<_> = handler.results().iter().map(|(failed, _)| *failed).collect();
        assert_eq!(failed, vec![true, true, true, false, true, false]);
        assert_eq!(client.stats().dispatch.fast_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_job_dispatches_once() {
        let (mut client, probe, handler) =
            client_with(SimulatedConfig::default(), fixed_jitter_options());
        client.start().await.unwrap();
        client
            .add_gather_job(GatherJob::new(7, FunctionCode::ReadInputRegisters, 0, 200))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.call_count(), 2);
        assert_eq!(handler.result_count(), 2);

        client.close().await.unwrap();
        let stats = client.stats();
        assert_eq!(stats.dispatch.dormant, 2);
        assert_eq!(stats.dispatch.cadence_rearms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_happens_after_close() {
        let config = SimulatedConfig {
            latency: Duration::from_millis(3),
            ..Default::default()
        };
        let (mut client, probe, handler) = client_with(config, fixed_jitter_options());
        client.start().await.unwrap();
        for slave_id in 1..=5u8 {
            client
                .add_gather_job(
                    GatherJob::new(slave_id, FunctionCode::ReadHoldingRegisters, 0, 10)
                        .with_scan_rate(Duration::from_millis(10)),
                )
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        client.close().await.unwrap();

        let calls = probe.call_count();
        let results = handler.result_count();
        assert!(calls > 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.call_count(), calls);
        assert_eq!(handler.result_count(), results);
        assert_eq!(probe.calls_after_close(), 0);
        assert!(probe.is_closed());

        let err = client
            .add_gather_job(GatherJob::new(1, FunctionCode::ReadCoils, 0, 1))
            .unwrap_err();
        assert!(matches!(err, ContractError::ClientClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_read_in_flight() {
        let config = SimulatedConfig {
            latency: Duration::from_millis(5),
            ..Default::default()
        };
        let (mut client, probe, _) = client_with(config, fixed_jitter_options());
        client.start().await.unwrap();
        for slave_id in 1..=10u8 {
            client
                .add_gather_job(
                    GatherJob::new(slave_id, FunctionCode::ReadCoils, 0, 64)
                        .with_scan_rate(Duration::from_millis(20)),
                )
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        client.close().await.unwrap();

        assert!(probe.call_count() > 10);
        assert_eq!(probe.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_defers_without_losing_requests() {
        let options = ClientOptions::default()
            .with_ready_queue_capacity(1)
            .with_jitter(Arc::new(RandomJitter::seeded(42)));
        let config = SimulatedConfig {
            latency: Duration::from_millis(1),
            ..Default::default()
        };
        let (mut client, probe, handler) = client_with(config, options);
        client.start().await.unwrap();
        for slave_id in 1..=20u8 {
            client
                .add_gather_job(GatherJob::new(slave_id, FunctionCode::ReadHoldingRegisters, 0, 4))
                .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        client.close().await.unwrap();

        assert_eq!(probe.call_count(), 20);
        assert_eq!(handler.result_count(), 20);
        let mut slaves: Vec<_> = probe.calls().iter().map(|c| c.slave_id).collect();
        slaves.sort_unstable();
        assert_eq!(slaves, (1..=20).collect::<Vec<_>>());

        let stats = client.stats();
        assert!(stats.queue.deferred > 0);
        assert_eq!(stats.queue.enqueued, 20);
    }
}
