//! Walks the prestige hierarchy from a fresh engine: skill tiers, the
//! ascension tree, echo fragments and the first dimension.

use std::collections::BTreeMap;

use stellar_core::Numeral;
use stellar_core::id::ResourceId;
use stellar_data::builtin;
use stellar_engine::save::{self, export_string};
use stellar_engine::test_utils::{
    advance_tier, complete_run, engine, grant, max_current_tier, set_amount,
};
use stellar_engine::{Engine, EngineEvent, LayerError};

/// Seed `points` unspent ascension points through an import.
fn seed_ascension_points(e: &mut Engine, points: u32) {
    let mut documents = BTreeMap::new();
    documents.insert(
        save::ASCENSION_KEY,
        format!(r#"{{"points":{{"amount":{points},"total_earned":{points}}},"levels":{{}}}}"#),
    );
    let text = export_string(&documents).unwrap();
    e.import(&text, 0).unwrap();
}

fn buy_whole_ascension_tree(e: &mut Engine) {
    for def in builtin::ascension() {
        e.purchase_ascension(def.id.as_str(), 0).unwrap();
    }
    assert!(e.hierarchy().ascension().is_complete());
}

// ---------------------------------------------------------------------------
// Skill tiers
// ---------------------------------------------------------------------------

#[test]
fn each_tier_unlocks_the_next() {
    let mut e = engine();
    for expected in 2..=5u8 {
        let report = advance_tier(&mut e, 0);
        assert_eq!(report.advance.to_tier, expected);
        assert_eq!(report.ascension_points, None);
    }
    assert!(e.hierarchy().skills().is_top_tier());
}

#[test]
fn advance_needs_a_maxed_tier() {
    let mut e = engine();
    grant(&mut e, ResourceId::Energy, 1e12);
    assert!(!e.can_advance());
    assert_eq!(e.advance(0), Err(LayerError::TierIncomplete));
}

#[test]
fn completed_run_mints_ascension_points() {
    let mut e = engine();
    let report = complete_run(&mut e, 0);
    assert_eq!(report.ascension_points, Some(Numeral::ONE));
    assert_eq!(e.hierarchy().skills().current_tier(), 1);
    assert!(e.drain_events().contains(&EngineEvent::AscensionPointsEarned(Numeral::ONE)));

    e.automation_tick(0).unwrap();
    assert!(e.predicates().is_unlocked("first_warp"));
    assert!(e.predicates().is_unlocked("ascension_unlocked"));
    assert!(e.predicates().is_unlocked("tier5_complete"));
}

// ---------------------------------------------------------------------------
// Ascension
// ---------------------------------------------------------------------------

#[test]
fn ascension_auto_buy_runs_in_automation_tick() {
    let mut e = engine();
    complete_run(&mut e, 0);
    e.purchase_ascension("auto_buy", 0).unwrap();
    grant(&mut e, ResourceId::Energy, 1e6);

    let report = e.automation_tick(0).unwrap();
    assert!(report.levels_bought > 0);
    let levels = e.hierarchy().skills().graph().total_levels();
    assert!(levels >= u64::from(report.levels_bought));
}

#[test]
fn repeated_automation_tick_buys_the_affordable_set_once() {
    let mut e = engine();
    seed_ascension_points(&mut e, 2);
    e.purchase_ascension("auto_buy", 0).unwrap();
    e.purchase_ascension("bulk_buy_5", 0).unwrap();
    // The first three Energy Core levels cost 10 + 15 + 22.
    set_amount(&mut e, ResourceId::Energy, 47.0);

    let first = e.automation_tick(5_000).unwrap();
    assert_eq!(first.levels_bought, 3);
    assert_eq!(e.hierarchy().skills().graph().level("t1_root"), 3);
    assert_eq!(e.amount(ResourceId::Energy), Numeral::ZERO);

    let second = e.automation_tick(5_000).unwrap();
    assert_eq!(second.levels_bought, 0);
    assert_eq!(e.hierarchy().skills().graph().level("t1_root"), 3);
    assert_eq!(e.amount(ResourceId::Energy), Numeral::ZERO);
    assert!(!e.amount(ResourceId::Energy).is_negative());
}

#[test]
fn auto_warp_advances_from_automation_tick() {
    let mut e = engine();
    seed_ascension_points(&mut e, 11);
    for id in [
        "auto_buy", "bulk_buy_5", "start_energy", "production_25",
        "cost_reduce_10", "warp_speed_1", "production_50", "auto_warp",
    ] {
        e.purchase_ascension(id, 0).unwrap();
    }
    max_current_tier(&mut e, 0);

    let report = e.automation_tick(0).unwrap();
    assert_eq!(report.advance.map(|a| a.advance.to_tier), Some(2));
    // Nothing to advance into until tier 2 is maxed.
    assert_eq!(e.automation_tick(0).unwrap().advance, None);
}

#[test]
fn ascension_purchase_without_points_fails() {
    let mut e = engine();
    assert!(e.purchase_ascension("auto_buy", 0).is_err());
    assert_eq!(e.hierarchy().ascension().graph().level("auto_buy"), 0);
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

#[test]
fn complete_ascension_tree_earns_echo_fragments() {
    let mut e = engine();
    seed_ascension_points(&mut e, 60);
    buy_whole_ascension_tree(&mut e);

    let report = complete_run(&mut e, 0);
    let fragments = report.echo_fragments.unwrap();
    assert!(fragments >= Numeral::ONE);
    assert_eq!(e.hierarchy().dimensions().fragments().amount(), fragments);

    e.unlock_dimension("void", 0).unwrap();
    assert_eq!(
        e.unlock_dimension("void", 0),
        Err(LayerError::AlreadyUnlocked("void".into()))
    );
    assert_eq!(e.upgrade_dimension("void", "void_root", 0), Ok(1));
    assert_eq!(
        e.upgrade_dimension("crystal", "crystal_root", 0),
        Err(LayerError::DimensionLocked("crystal".into()))
    );
}

#[test]
fn echo_fragments_scale_with_energy_at_the_final_advance() {
    let mut e = engine();
    seed_ascension_points(&mut e, 60);
    buy_whole_ascension_tree(&mut e);

    let mut minted = Numeral::ZERO;
    for (energy, expected) in [(1e34, 1.0), (1e35, 1.0), (1e36, 2.0), (1e37, 3.0)] {
        for _ in 1..5 {
            advance_tier(&mut e, 0);
        }
        assert!(e.hierarchy().skills().is_top_tier());
        max_current_tier(&mut e, 0);
        set_amount(&mut e, ResourceId::Energy, energy);

        let report = e.advance(0).unwrap();
        assert!(report.advance.completed_run);
        assert_eq!(report.echo_fragments, Some(Numeral::from(expected)), "energy {energy}");
        minted += Numeral::from(expected);
    }
    assert_eq!(e.hierarchy().dimensions().fragments().amount(), minted);
}

#[test]
fn collapse_is_gated_until_everything_is_done() {
    let mut e = engine();
    assert!(!e.can_collapse());
    assert_eq!(e.collapse(0), Err(LayerError::DimensionsIncomplete));
    assert!(!e.hierarchy().dimensions().has_collapsed());
}
