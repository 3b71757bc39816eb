// Billing Property Tests
// Ledger-wide invariants checked over randomized operation sequences

mod common;

use std::collections::BTreeMap;

use common::{new_ledger, operator, principal, reading};
use meter_ledger::config::LedgerConfig;
use meter_ledger::models::{PeriodTotals, Principal};
use meter_ledger::services::Ledger;
use proptest::prelude::*;

const MAX_DELTA: u64 = 1_000;

fn config() -> LedgerConfig {
    LedgerConfig {
        max_reading_delta: MAX_DELTA,
        ..LedgerConfig::default()
    }
}

fn meters(count: usize) -> Vec<Principal> {
    (0..count).map(|i| principal(&format!("meter-{}", i))).collect()
}

/// Sum every stored bill of `period` the way the totals should
fn recompute(ledger: &Ledger, meters: &[Principal], period: u64) -> PeriodTotals {
    meters
        .iter()
        .filter_map(|meter| ledger.get_bill(meter, period))
        .fold(PeriodTotals::default(), |acc, bill| {
            acc.with_bill(bill.usage, bill.amount_due).expect("test values fit")
        })
}

proptest! {
    #[test]
    fn last_reading_never_decreases(values in proptest::collection::vec(0u64..3_000, 1..20)) {
        let mut ledger = new_ledger(&config());
        let meter = principal("M");
        ledger.register_meter(&meter, 1, 0).unwrap();

        let mut block = 1;
        for (nonce, value) in values.into_iter().enumerate() {
            let before = ledger.meter(&meter).unwrap().last_reading;
            let result = ledger.submit_reading(&meter, &reading(&meter, nonce as u64, value, block), block);
            let after = ledger.meter(&meter).unwrap().last_reading;

            let acceptable = value >= before && value - before <= MAX_DELTA;
            prop_assert_eq!(result.is_ok(), acceptable);
            prop_assert!(after >= before);
            prop_assert_eq!(after, if acceptable { value } else { before });

            block += 1;
            ledger.advance_period(&operator(), block).unwrap();
        }
    }

    #[test]
    fn submissions_and_bills_happen_at_most_once(
        attempts in proptest::collection::vec((0usize..3, 1u64..500), 1..30),
        rebills in proptest::collection::vec(0usize..3, 0..10),
    ) {
        let mut ledger = new_ledger(&config());
        let meters = meters(3);
        for meter in &meters {
            ledger.register_meter(meter, 1, 0).unwrap();
        }

        let mut accepted: BTreeMap<usize, u64> = BTreeMap::new();
        for (nonce, (idx, value)) in attempts.into_iter().enumerate() {
            let meter = &meters[idx];
            let ok = ledger
                .submit_reading(meter, &reading(meter, nonce as u64, value, 1), 1)
                .is_ok();
            if ok {
                prop_assert!(!accepted.contains_key(&idx), "second submission accepted");
                accepted.insert(idx, value);
            }
        }
        prop_assert_eq!(ledger.period(0).unwrap().total_submissions, accepted.len() as u64);

        ledger.advance_period(&operator(), 2).unwrap();
        for (idx, _) in &accepted {
            prop_assert!(ledger.calculate_bill(&meters[*idx], 0, 3).is_ok());
        }
        for idx in rebills {
            prop_assert!(ledger.calculate_bill(&meters[idx], 0, 4).is_err());
        }
        prop_assert_eq!(ledger.period_totals(0).unwrap_or_default().bill_count, accepted.len() as u64);
    }

    #[test]
    fn period_totals_match_stored_bills(
        usages in proptest::collection::vec(0u64..1_000, 1..12),
        settlement_rates in proptest::collection::vec(0u64..500, 3),
        global_rate in 1u64..500,
    ) {
        let mut ledger = new_ledger(&config());
        ledger.set_global_rate(&operator(), global_rate).unwrap();
        for (settlement, rate) in settlement_rates.iter().enumerate() {
            if *rate > 0 {
                ledger.set_settlement_rate(&operator(), settlement as u64, *rate).unwrap();
            }
        }

        let meters = meters(usages.len());
        for (i, (meter, usage)) in meters.iter().zip(&usages).enumerate() {
            ledger.register_meter(meter, (i % 3) as u64, 0).unwrap();
            if *usage > 0 {
                ledger.submit_reading(meter, &reading(meter, 1, *usage, 1), 1).unwrap();
            }
        }
        ledger.advance_period(&operator(), 2).unwrap();

        let outcome = ledger.batch_calculate(&meters, 0, 3);
        prop_assert_eq!(outcome.succeeded, usages.iter().filter(|u| **u > 0).count());

        let stored = recompute(&ledger, &meters, 0);
        prop_assert_eq!(ledger.period_totals(0).unwrap_or_default(), stored);

        for settlement in 0..3u64 {
            let summary = ledger.settlement_summary(settlement, 0);
            let expected = meters
                .iter()
                .filter_map(|meter| ledger.get_bill(meter, 0))
                .filter(|bill| bill.settlement_id == settlement)
                .fold(PeriodTotals::default(), |acc, bill| {
                    acc.with_bill(bill.usage, bill.amount_due).expect("test values fit")
                });
            prop_assert_eq!(summary.settlement_totals, expected);
            prop_assert_eq!(summary.period_totals, stored);
        }
    }
}
