//! Property-based tests for the progression engine.
//!
//! Random action sequences are replayed against a fresh engine, then the
//! balance, save and scheduling invariants are checked.

use proptest::prelude::*;
use stellar_core::Numeral;
use stellar_core::id::ResourceId;
use stellar_engine::Engine;
use stellar_engine::persistence::SaveScheduler;
use stellar_engine::test_utils::{engine, grant};

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum Action {
    Tick(f64),
    Automate,
    BuyCheapest,
    Advance,
    Grant(f64),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0.0..120.0f64).prop_map(Action::Tick),
        Just(Action::Automate),
        Just(Action::BuyCheapest),
        Just(Action::Advance),
        (1.0..1e9f64).prop_map(Action::Grant),
    ]
}

fn replay(actions: &[Action]) -> (Engine, u64) {
    let mut e = engine();
    let mut now = 0u64;
    for action in actions {
        now += 250;
        match action {
            Action::Tick(dt) => e.ledger_tick(*dt, now).unwrap(),
            Action::Automate => {
                e.automation_tick(now).unwrap();
            }
            Action::BuyCheapest => {
                let balance = e.amount(ResourceId::Energy);
                let cheapest = e.hierarchy().skills().graph().purchasable(balance).into_iter().next();
                if let Some((id, _)) = cheapest {
                    e.purchase_skill(id.as_str(), now).unwrap();
                }
            }
            Action::Advance => {
                // Rejections are part of the sequence.
                let _ = e.advance(now);
            }
            Action::Grant(amount) => grant(&mut e, ResourceId::Energy, *amount),
        }
    }
    (e, now)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn balances_never_go_negative(actions in proptest::collection::vec(arb_action(), 0..60)) {
        let (e, _) = replay(&actions);
        for resource in ResourceId::ALL {
            prop_assert!(e.amount(resource) >= Numeral::ZERO);
            prop_assert!(e.rate(resource) >= Numeral::ZERO);
        }
        let tier = e.hierarchy().skills().current_tier();
        prop_assert!((1..=5).contains(&tier));
    }

    #[test]
    fn ticks_add_play_time(deltas in proptest::collection::vec(0.0..10.0f64, 1..40)) {
        let mut e = engine();
        let before = e.amount(ResourceId::Energy);
        for (i, dt) in deltas.iter().enumerate() {
            e.ledger_tick(*dt, i as u64 * 100).unwrap();
        }
        let total: f64 = deltas.iter().sum();
        prop_assert!((e.progress().play_seconds - total).abs() < 1e-9);
        prop_assert!(e.amount(ResourceId::Energy) >= before);
    }

    #[test]
    fn export_import_preserves_progress(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let (a, now) = replay(&actions);
        let text = a.export(now).unwrap();
        let mut b = engine();
        b.import(&text, now).unwrap();
        prop_assert_eq!(b.hierarchy().skills().current_tier(), a.hierarchy().skills().current_tier());
        prop_assert_eq!(
            b.hierarchy().skills().graph().levels(),
            a.hierarchy().skills().graph().levels()
        );
        prop_assert_eq!(b.amount(ResourceId::Energy), a.amount(ResourceId::Energy));
        prop_assert_eq!(b.predicates().unlocked(), a.predicates().unlocked());
    }

    #[test]
    fn scheduler_respects_debounce(
        requests in proptest::collection::vec((0..3usize, 0..20_000u64), 1..50),
    ) {
        const KEYS: [&str; 3] = ["a", "b", "c"];
        let mut s = SaveScheduler::new(1_000, 5_000);
        let mut sorted = requests.clone();
        sorted.sort_by_key(|&(_, at)| at);
        let mut first_request: [Option<u64>; 3] = [None; 3];
        let mut last_write: [Option<u64>; 3] = [None; 3];
        for (key, at) in sorted {
            s.request(KEYS[key], at);
            first_request[key].get_or_insert(at);
            for due in s.take_due(at) {
                let k = KEYS.iter().position(|&x| x == due).unwrap();
                let requested = first_request[k].take().unwrap();
                prop_assert!(at - requested >= 1_000);
                if let Some(last) = last_write[k] {
                    prop_assert!(at - last >= 5_000);
                }
                last_write[k] = Some(at);
            }
        }
    }
}
