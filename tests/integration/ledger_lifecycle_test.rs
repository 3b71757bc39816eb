// Ledger Lifecycle Integration Test
// Drives the async LedgerService through register → submit → close → bill → pay

mod common;

use common::{new_service, operator, principal, reading};
use meter_ledger::models::{BillAmount, PeriodStatus, ProofSubmission, RateSource};
use meter_ledger::services::{Categorized, ErrorCategory, LedgerService};

/// Advance until `target` is the current period
async fn advance_to(service: &LedgerService, target: u64, block: &mut u64) {
    while service.current_period().await < target {
        *block += 1;
        service
            .advance_period(&operator(), *block)
            .await
            .expect("operator can advance");
    }
}

#[tokio::test]
async fn test_settlement_rate_bill_for_closed_period_five() {
    let service = new_service();
    let meter = principal("M");
    let mut block = 0;

    service.register_meter(&meter, 1, block).await.unwrap();
    service.set_settlement_rate(&operator(), 1, 200).await.unwrap();
    advance_to(&service, 5, &mut block).await;

    block += 1;
    let receipt = service
        .submit_reading(&meter, &reading(&meter, 1, 100, block), block)
        .await
        .unwrap();
    assert_eq!(receipt.period, 5);

    block += 1;
    service.advance_period(&operator(), block).await.unwrap();
    assert_eq!(
        service.period(5).await.map(|p| p.status),
        Some(PeriodStatus::Closed)
    );

    let amount = service.calculate_bill(&meter, 5, block).await.unwrap();
    assert_eq!(amount, BillAmount { usage: 100, amount: 20_000 });

    let bill = service.get_bill(&meter, 5).await.unwrap();
    assert_eq!(bill.rate, 200);
    assert_eq!(bill.settlement_id, 1);
    assert!(!bill.paid);
}

#[tokio::test]
async fn test_global_rate_applies_without_settlement_override() {
    let service = new_service();
    let meter = principal("N");

    service.register_meter(&meter, 2, 0).await.unwrap();
    service.set_global_rate(&operator(), 150).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 1, 200, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();

    let resolved = service.resolve_rate(2).await;
    assert_eq!(resolved.source, RateSource::Global);
    assert_eq!(
        service.calculate_bill(&meter, 0, 3).await.unwrap(),
        BillAmount { usage: 200, amount: 30_000 }
    );
}

#[tokio::test]
async fn test_second_bill_calculation_conflicts() {
    let service = new_service();
    let meter = principal("M");

    service.register_meter(&meter, 1, 0).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 1, 10, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();
    service.calculate_bill(&meter, 0, 3).await.unwrap();

    let err = service.calculate_bill(&meter, 0, 4).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert_eq!(err.code(), "ALREADY_CALCULATED");
    assert_eq!(service.period_totals(0).await.unwrap().bill_count, 1);
}

#[tokio::test]
async fn test_reading_delta_above_maximum_is_rejected() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();

    let err = service
        .submit_reading(&meter, &reading(&meter, 1, 2_000_000, 1), 1)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.code(), "READING_OUT_OF_RANGE");
    assert_eq!(service.meter(&meter).await.unwrap().last_reading, 0);
    assert!(service.submission(&meter, 0).await.is_none());
}

#[tokio::test]
async fn test_malformed_proof_rejected_before_any_mutation() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();

    let malformed = ProofSubmission {
        encrypted_reading: vec![7; 10],
        proof: vec![9; 10],
        nonce: 1,
        disclosed_reading: 50,
        circuit_id: 1,
        generated_at: 1,
    };

    let err = service
        .submit_reading(&meter, &malformed, 1)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.code(), "MALFORMED_PROOF");

    let batch = service
        .verify_proofs(&meter, std::slice::from_ref(&malformed), 1)
        .await;
    assert_eq!(batch[0].as_ref().unwrap_err().code(), "MALFORMED_PROOF");

    // Nonce 1 was never consumed and the period slot is still free
    assert!(service.submission(&meter, 0).await.is_none());
    let period = service.period(0).await.unwrap();
    assert_eq!(period.total_submissions, 0);
    service
        .submit_reading(&meter, &reading(&meter, 1, 50, 1), 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mark_paid_twice_keeps_bill_paid() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 1, 10, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();
    service.calculate_bill(&meter, 0, 3).await.unwrap();
    assert_eq!(service.outstanding_balance(&meter, 0).await.unwrap(), 1_000);

    let err = service
        .mark_paid(&meter, &meter, 0)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);

    service.mark_paid(&operator(), &meter, 0).await.unwrap();
    let err = service.mark_paid(&operator(), &meter, 0).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_PAID");
    assert!(service.get_bill(&meter, 0).await.unwrap().paid);
    assert_eq!(service.outstanding_balance(&meter, 0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_last_reading_never_decreases() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 1, 500, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();

    let err = service
        .submit_reading(&meter, &reading(&meter, 2, 400, 3), 3)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "READING_OUT_OF_RANGE");
    assert_eq!(service.meter(&meter).await.unwrap().last_reading, 500);

    service
        .submit_reading(&meter, &reading(&meter, 3, 500, 3), 3)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_one_submission_per_meter_and_period() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 1, 10, 1), 1)
        .await
        .unwrap();

    let err = service
        .submit_reading(&meter, &reading(&meter, 2, 20, 1), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_SUBMITTED");
}

#[tokio::test]
async fn test_nonce_reuse_rejected_across_periods() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service
        .submit_reading(&meter, &reading(&meter, 7, 10, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();

    let mut replay = reading(&meter, 7, 20, 2);
    replay.encrypted_reading[0] ^= 0xff;
    replay.proof = meter_ledger::services::proof_ledger::bind_proof(
        1,
        &replay.encrypted_reading,
        20,
        None,
    );
    let err = service.submit_reading(&meter, &replay, 2).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert_eq!(err.code(), "PROOF_REUSED");
}

#[tokio::test]
async fn test_expired_proof_is_temporal() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    let max_age = service.proof_params().await.max_proof_age;

    let err = service
        .submit_reading(&meter, &reading(&meter, 1, 10, 0), max_age + 1)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Temporal);
    assert_eq!(err.code(), "PROOF_EXPIRED");
}

#[tokio::test]
async fn test_paused_period_refuses_submissions_and_bills() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service.pause_period(&operator(), 1).await.unwrap();

    let err = service
        .submit_reading(&meter, &reading(&meter, 1, 10, 1), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PERIOD_CLOSED");

    let err = service.calculate_bill(&meter, 0, 2).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Temporal);

    // Advancing closes a paused period too
    service.advance_period(&operator(), 3).await.unwrap();
    assert_eq!(
        service.period(0).await.unwrap().status,
        PeriodStatus::Closed
    );
}

#[tokio::test]
async fn test_deregistered_meter_cannot_return() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    service.deregister_meter(&meter).await.unwrap();

    let err = service.register_meter(&meter, 1, 1).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_REGISTERED");

    let err = service
        .submit_reading(&meter, &reading(&meter, 1, 10, 1), 1)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(!service.meter(&meter).await.unwrap().active);
}

#[tokio::test]
async fn test_batch_keeps_partial_progress() {
    let service = new_service();
    let billed = principal("billed");
    let idle = principal("idle");
    let unknown = principal("unknown");

    for meter in [&billed, &idle] {
        service.register_meter(meter, 1, 0).await.unwrap();
    }
    service
        .submit_reading(&billed, &reading(&billed, 1, 40, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();

    let outcome = service
        .batch_calculate(&[billed.clone(), idle.clone(), unknown.clone()], 0, 3)
        .await;
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.results[1].1.as_ref().unwrap_err().code(), "ZERO_USAGE");
    assert_eq!(
        outcome.results[2].1.as_ref().unwrap_err().code(),
        "METER_NOT_REGISTERED"
    );
    assert!(service.get_bill(&billed, 0).await.is_some());
}

#[tokio::test]
async fn test_settlement_summary_splits_totals() {
    let service = new_service();
    let east = principal("east");
    let west = principal("west");
    service.register_meter(&east, 1, 0).await.unwrap();
    service.register_meter(&west, 2, 0).await.unwrap();
    service.set_settlement_rate(&operator(), 1, 300).await.unwrap();

    service
        .submit_reading(&east, &reading(&east, 1, 10, 1), 1)
        .await
        .unwrap();
    service
        .submit_reading(&west, &reading(&west, 1, 20, 1), 1)
        .await
        .unwrap();
    service.advance_period(&operator(), 2).await.unwrap();
    service.batch_calculate(&[east, west], 0, 3).await;

    let summary = service.settlement_summary(1, 0).await;
    assert_eq!(summary.settlement_totals.total_billed, 3_000);
    assert_eq!(summary.period_totals.total_billed, 3_000 + 2_000);
    assert_eq!(summary.effective_rate.rate, 300);
}

#[tokio::test]
async fn test_concurrent_replays_accept_exactly_once() {
    let service = new_service();
    let meter = principal("M");
    service.register_meter(&meter, 1, 0).await.unwrap();
    let submission = reading(&meter, 1, 10, 1);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        let meter = meter.clone();
        let submission = submission.clone();
        handles.push(tokio::spawn(async move {
            service.submit_reading(&meter, &submission, 1).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn test_concurrent_bills_reconcile_totals() {
    let service = new_service();
    let meters: Vec<_> = (0..20).map(|i| principal(&format!("meter-{}", i))).collect();
    for (i, meter) in meters.iter().enumerate() {
        service.register_meter(meter, 1, 0).await.unwrap();
        service
            .submit_reading(meter, &reading(meter, 1, 10 + i as u64, 1), 1)
            .await
            .unwrap();
    }
    service.advance_period(&operator(), 2).await.unwrap();

    let mut handles = Vec::new();
    for meter in meters.clone() {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.calculate_bill(&meter, 0, 3).await
        }));
    }
    let mut billed = 0;
    for handle in handles {
        billed += handle.await.unwrap().unwrap().amount;
    }

    let totals = service.period_totals(0).await.unwrap();
    assert_eq!(totals.bill_count, 20);
    assert_eq!(totals.total_billed, billed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_current_period_reads_consistently_during_advances() {
    let service = new_service();

    let advancer = {
        let service = service.clone();
        tokio::spawn(async move {
            for block in 1..=50 {
                service.advance_period(&operator(), block).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let (period, metadata) = service.current_period_with_metadata().await;
                let metadata = metadata.expect("current period has metadata");
                assert_eq!(metadata.id, period);
                assert_eq!(metadata.status, PeriodStatus::Active);
                tokio::task::yield_now().await;
            }
        }));
    }

    advancer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(service.current_period().await, 50);
}
