mod common;

use chrono::Utc;
use loan_disbursal::application::coordinator::TransferCoordinator;
use loan_disbursal::domain::report::StatusAggregator;
use loan_disbursal::infrastructure::in_memory::InMemoryPaymentHub;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_settles_exactly_once_under_random_completion_order() {
    let mut rng = rand::thread_rng();

    for n in [0usize, 1, 2, 7, 25] {
        let ids: Vec<u64> = (1..=n as u64).collect();
        let mut hub = InMemoryPaymentHub::new();
        for &id in &ids {
            hub = hub.with_delay(id, Duration::from_millis(rng.gen_range(0..40)));
        }
        let failing: Vec<u64> = ids.iter().copied().filter(|id| id % 3 == 0).collect();
        let hub = hub.with_failing_loans(failing.clone());

        let coordinator = TransferCoordinator::new(
            Arc::new(hub.clone()),
            common::transfer_settings(Duration::from_secs(5)),
        );
        let run = coordinator.initiate_all(common::loans(&ids), Utc::now());
        assert_eq!(run.expected(), n);

        let mut aggregator = StatusAggregator::new(n, &[]);
        let mut seen = HashSet::new();
        let mut run = run;
        while let Some(outcome) = run.next_outcome().await {
            assert!(seen.insert(outcome.loan_id), "duplicate outcome for {}", outcome.loan_id);
            aggregator.record(outcome);
        }
        run.wait_settled().await;

        assert!(run.is_settled());
        assert_eq!(run.settle_signals(), 1);
        assert_eq!(aggregator.recorded(), n);

        let report = aggregator.summary();
        assert!(report.complete);
        assert_eq!(report.transfers_failed, failing.len());
        assert_eq!(hub.dispatched().await.len(), n);
    }
}

#[tokio::test]
async fn test_one_hung_transfer_still_settles() {
    let hub = InMemoryPaymentHub::new().with_delay(2, Duration::from_secs(30));
    let coordinator = TransferCoordinator::new(
        Arc::new(hub),
        common::transfer_settings(Duration::from_millis(100)),
    );

    let run = coordinator.initiate_all(common::loans(&[1, 2, 3]), Utc::now());
    let mut aggregator = StatusAggregator::new(3, &[]);
    tokio::time::timeout(Duration::from_secs(5), run.drain_into(&mut aggregator))
        .await
        .expect("run should settle once the hung transfer times out");

    let report = aggregator.summary();
    assert_eq!(report.transfers_succeeded, 2);
    assert_eq!(report.transfers_failed, 1);
    // the timed-out transfer arrives last
    assert!(report.messages[2].contains("loan 2"));
    assert!(report.messages[2].contains("timed out"));
}
