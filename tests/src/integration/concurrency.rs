//! # Concurrency Scenarios
//!
//! Deliveries race against pause/resume commands issued from other threads.
//! Whatever the interleaving:
//!
//! - every delivery is settled exactly once,
//! - every delivery is either processed or refused, never both,
//! - concurrent commands never double-count an adapter transition.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use rand::Rng;
    use relay_core::{AckDecision, ControlCommand, DeliveryOutcome};

    use crate::support::{counting_acker, plane_with, LedgerSink};

    const DELIVERY_THREADS: usize = 4;
    const MESSAGES_PER_THREAD: usize = 500;

    #[test]
    fn test_deliveries_racing_commands_settle_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let plane = Arc::new(plane_with(2, counting_acker(Arc::clone(&calls))));
        let sink = LedgerSink::shared();
        let done = Arc::new(AtomicBool::new(false));

        let toggler = {
            let plane = Arc::clone(&plane);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                while !done.load(Ordering::SeqCst) {
                    let command = if rng.gen_bool(0.5) {
                        ControlCommand::Pause
                    } else {
                        ControlCommand::Resume
                    };
                    plane.execute(command);
                    thread::sleep(Duration::from_micros(rng.gen_range(10..200)));
                }
            })
        };

        let workers: Vec<_> = (0..DELIVERY_THREADS)
            .map(|t| {
                let plane = Arc::clone(&plane);
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    let mut processed = 0usize;
                    let mut refused = 0usize;
                    for i in 0..MESSAGES_PER_THREAD {
                        let adapter = &plane.adapters()[(t + i) % 2];
                        match adapter.on_message(b"payload", sink.handle()).unwrap() {
                            DeliveryOutcome::Processed(_) => processed += 1,
                            DeliveryOutcome::NotAccepted => refused += 1,
                        }
                    }
                    (processed, refused)
                })
            })
            .collect();

        let (processed, refused) = workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .fold((0, 0), |(p, r), (wp, wr)| (p + wp, r + wr));

        done.store(true, Ordering::SeqCst);
        toggler.join().unwrap();

        let total = DELIVERY_THREADS * MESSAGES_PER_THREAD;
        assert_eq!(processed + refused, total);
        assert_eq!(sink.messages(), total);
        assert!(sink.all_settled_once());

        // Only accepted messages reach the handler, and each is acked by it.
        assert_eq!(calls.load(Ordering::SeqCst), processed);
        assert_eq!(sink.count(AckDecision::Ack), processed);
        assert_eq!(sink.count(AckDecision::Nack), refused);

        let accepted: u64 = plane.adapters().iter().map(|a| a.stats().accepted).sum();
        let not_accepted: u64 = plane.adapters().iter().map(|a| a.stats().not_accepted).sum();
        assert_eq!(accepted as usize, processed);
        assert_eq!(not_accepted as usize, refused);
        assert!(plane.adapters().iter().all(|a| a.in_flight() == 0));
    }

    #[test]
    fn test_concurrent_pause_transitions_each_adapter_once() {
        const ADAPTERS: usize = 8;
        const COMMANDERS: usize = 6;

        let plane = Arc::new(plane_with(
            ADAPTERS,
            counting_acker(Arc::new(AtomicUsize::new(0))),
        ));
        let mut events = plane.subscribe();
        let barrier = Arc::new(Barrier::new(COMMANDERS));

        let commanders: Vec<_> = (0..COMMANDERS)
            .map(|_| {
                let plane = Arc::clone(&plane);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    plane.execute(ControlCommand::Pause).transitioned.len()
                })
            })
            .collect();

        let transitioned: usize = commanders.into_iter().map(|c| c.join().unwrap()).sum();

        assert_eq!(transitioned, ADAPTERS);
        assert_eq!(plane.state_counts().stopped, ADAPTERS);

        let mut transition_events = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, relay_core::ControlEvent::AdapterTransitioned { .. }) {
                transition_events += 1;
            }
        }
        assert_eq!(transition_events, ADAPTERS);
    }
}
