//! Property-based tests for the resource ledger.
//!
//! Random sequences of ticks, spends, credits and rate changes must never
//! leave an account negative.

use proptest::prelude::*;
use stellar_core::Numeral;
use stellar_core::id::ResourceId;
use stellar_core::ledger::ResourceLedger;

#[derive(Debug, Clone)]
enum Op {
    Tick(f64),
    Spend(f64),
    Credit(f64),
    SetRate(f64),
    Reset(f64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0.0f64..120.0).prop_map(Op::Tick),
        (0.0f64..1e6).prop_map(Op::Spend),
        (0.0f64..1e4).prop_map(Op::Credit),
        (0.0f64..1e3).prop_map(Op::SetRate),
        (0.0f64..1e5).prop_map(Op::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn amount_never_negative(ops in proptest::collection::vec(arb_op(), 1..60)) {
        let mut ledger = ResourceLedger::new();
        let resource = ResourceId::Energy;
        for op in ops {
            let before = ledger.amount(resource);
            match op {
                Op::Tick(dt) => ledger.tick(dt).unwrap(),
                Op::Spend(x) => {
                    let amount = Numeral::from(x);
                    let ok = ledger.spend(resource, amount);
                    prop_assert_eq!(ok, amount <= before);
                    if !ok {
                        prop_assert_eq!(ledger.amount(resource), before);
                    }
                }
                Op::Credit(x) => ledger.credit(resource, Numeral::from(x)).unwrap(),
                Op::SetRate(x) => {
                    ledger.set_rate(resource, Numeral::from(x)).unwrap();
                }
                Op::Reset(x) => ledger.reset(resource, Numeral::from(x)),
            }
            prop_assert!(!ledger.amount(resource).is_negative());
        }
    }

    #[test]
    fn lifetime_total_is_monotonic(
        rate in 0.0f64..1e3,
        ticks in proptest::collection::vec(0.0f64..10.0, 1..30),
        spend in 0.0f64..1e3,
    ) {
        let mut ledger = ResourceLedger::new();
        ledger.set_rate(ResourceId::Quanta, Numeral::from(rate)).unwrap();
        let mut last = Numeral::ZERO;
        for dt in ticks {
            ledger.tick(dt).unwrap();
            ledger.spend(ResourceId::Quanta, Numeral::from(spend));
            let total = ledger.total_generated(ResourceId::Quanta);
            prop_assert!(total >= last);
            last = total;
        }
    }
}
