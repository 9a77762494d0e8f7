//! # Pause / Resume Scenarios
//!
//! - A paused relay invokes no handler and nacks every delivery itself.
//! - Resuming restores processing.
//! - A failing message is nacked without affecting later messages or the
//!   adapter state.
//! - Each subscription reaches only its own handler.
//! - With redelivery enabled, a message refused while paused is delivered
//!   after resume.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use relay_core::{
        AckDecision, AckMode, ControlCommand, ControlEvent, ControlPlane, DeliveryOutcome,
        DeliveryStatus, HandlerDirectory, InMemoryTransport, NackReason, RelayConfig, RouteOutcome,
    };
    use tokio::time::timeout;

    use crate::support::{counting_acker, picky_handler, plane_with, LedgerSink};

    // =========================================================================
    // PAUSED RELAY
    // =========================================================================

    #[test]
    fn test_paused_relay_invokes_no_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = plane_with(3, counting_acker(Arc::clone(&calls)));
        let sink = LedgerSink::shared();

        let report = plane.execute(ControlCommand::Pause);
        assert_eq!(report.transitioned.len(), 3);

        for adapter in plane.adapters() {
            for _ in 0..5 {
                let outcome = adapter.on_message(b"payload", sink.handle()).unwrap();
                assert_eq!(outcome, DeliveryOutcome::NotAccepted);
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.messages(), 15);
        assert_eq!(sink.count(AckDecision::Ack), 0);
        assert_eq!(sink.count(AckDecision::Nack), 15);
        assert!(sink.all_settled_once());
    }

    #[test]
    fn test_resume_restores_processing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = plane_with(2, counting_acker(Arc::clone(&calls)));
        let sink = LedgerSink::shared();

        plane.execute(ControlCommand::Pause);
        let report = plane.execute(ControlCommand::Resume);
        assert_eq!(report.transitioned, vec!["sub-0", "sub-1"]);

        for adapter in plane.adapters() {
            let outcome = adapter.on_message(b"payload", sink.handle()).unwrap();
            assert_eq!(outcome, DeliveryOutcome::Processed(RouteOutcome::Acked));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.count(AckDecision::Ack), 2);
    }

    #[test]
    fn test_unknown_command_changes_nothing() {
        let plane = plane_with(2, counting_acker(Arc::new(AtomicUsize::new(0))));
        plane.execute(ControlCommand::Pause);

        let report = plane.execute(ControlCommand::parse("reboot"));
        assert!(report.outcome.is_warning());
        assert!(report.transitioned.is_empty());
        assert_eq!(plane.state_counts().stopped, 2);
        assert!(report.confirmation().contains("unknown command 'reboot'"));
    }

    // =========================================================================
    // FAILURE ISOLATION
    // =========================================================================

    #[test]
    fn test_failure_does_not_affect_later_messages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = plane_with(1, picky_handler(Arc::clone(&calls)));
        let adapter = &plane.adapters()[0];
        let sink = LedgerSink::shared();

        let bad = sink.handle();
        let bad_id = bad.message_id();
        let outcome = adapter.on_message(b"bad-payload", bad).unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Processed(RouteOutcome::Nacked(NackReason::HandlerFailed(_)))
        ));
        assert_eq!(sink.decisions(bad_id), vec![AckDecision::Nack]);
        assert!(adapter.is_running());

        for _ in 0..3 {
            let good = sink.handle();
            let good_id = good.message_id();
            adapter.on_message(b"good", good).unwrap();
            assert_eq!(sink.decisions(good_id), vec![AckDecision::Ack]);
        }

        let stats = adapter.stats();
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.acked, 3);
        assert_eq!(stats.nacked, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_subscription_reaches_only_its_handler() {
        let h1_calls = Arc::new(AtomicUsize::new(0));
        let h2_calls = Arc::new(AtomicUsize::new(0));
        let config = RelayConfig::new(AckMode::Manual)
            .with_subscription("sub-1", "orders", "h1")
            .with_subscription("sub-2", "invoices", "h2");
        let mut directory = HandlerDirectory::new();
        directory.register("h1", counting_acker(Arc::clone(&h1_calls))).unwrap();
        directory.register("h2", counting_acker(Arc::clone(&h2_calls))).unwrap();
        let plane = ControlPlane::bootstrap(&config, &directory).unwrap();
        let sink = LedgerSink::shared();

        let outcome = plane
            .adapter("sub-1")
            .unwrap()
            .on_message(b"order", sink.handle())
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Processed(RouteOutcome::Acked));
        assert_eq!(h1_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h2_calls.load(Ordering::SeqCst), 0);

        plane.execute(ControlCommand::Pause);
        let outcome = plane
            .adapter("sub-2")
            .unwrap()
            .on_message(b"invoice", sink.handle())
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::NotAccepted);
        assert_eq!(h1_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h2_calls.load(Ordering::SeqCst), 0);
    }

    // =========================================================================
    // END TO END THROUGH THE TRANSPORT
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_transport_pause_then_resume() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = plane_with(1, counting_acker(Arc::clone(&calls)));
        let transport = InMemoryTransport::new();
        transport.attach(Arc::clone(&plane.adapters()[0]));
        let mut records = transport.subscribe_deliveries();
        let mut events = plane.subscribe();

        plane.execute(ControlCommand::Pause);
        let paused_id = transport.publish("sub-0", b"while paused".to_vec()).unwrap();
        let record = timeout(Duration::from_secs(2), records.recv()).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::NotAccepted);
        assert_eq!(transport.settlements_for(paused_id), vec![AckDecision::Nack]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        plane.execute(ControlCommand::Resume);
        let resumed_id = transport.publish("sub-0", b"after resume".to_vec()).unwrap();
        let record = timeout(Duration::from_secs(2), records.recv()).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Acked);
        assert_eq!(transport.settlements_for(resumed_id), vec![AckDecision::Ack]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // pause: transition + completion; resume: transition + completion
        let mut transitions = 0;
        for _ in 0..4 {
            if let ControlEvent::AdapterTransitioned { .. } = events.try_recv().unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 2);

        transport.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_message_published_while_paused_acked_after_resume() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = plane_with(1, counting_acker(Arc::clone(&calls)));
        let transport = InMemoryTransport::new().with_max_redeliveries(5);
        transport.attach(Arc::clone(&plane.adapters()[0]));
        let mut records = transport.subscribe_deliveries();

        plane.execute(ControlCommand::Pause);
        let id = transport.publish("sub-0", b"while paused".to_vec()).unwrap();
        let record = timeout(Duration::from_secs(2), records.recv()).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::NotAccepted);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        plane.execute(ControlCommand::Resume);
        let record = timeout(Duration::from_secs(2), records.recv()).await.unwrap().unwrap();
        assert_eq!(record.message_id, id);
        assert_eq!(record.status, DeliveryStatus::Acked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.settlements_for(id), vec![AckDecision::Nack, AckDecision::Ack]);

        transport.shutdown().await;
    }
}
