//! Engine fixtures shared with the integration tests.

use std::io;

use stellar_core::Numeral;
use stellar_core::config::EngineConfig;
use stellar_core::id::ResourceId;
use stellar_data::builtin;

use crate::engine::Engine;
use crate::hierarchy::AdvanceReport;
use crate::persistence::{MemoryStore, SaveStore};

/// A fresh engine on the built-in content with an empty memory store.
pub fn engine() -> Engine {
    with_store(MemoryStore::new())
}

/// A fresh engine on the built-in content writing to `store`.
pub fn with_store<S: SaveStore>(store: S) -> Engine<S> {
    Engine::new(EngineConfig::default(), builtin::content(), store)
        .expect("built-in content is valid")
}

/// Add `amount` of `resource` out of thin air.
pub fn grant<S: SaveStore>(engine: &mut Engine<S>, resource: ResourceId, amount: f64) {
    engine
        .ledger_mut()
        .credit(resource, Numeral::from(amount))
        .expect("grant amount is finite");
}

/// Buy every node of the current skill tier to its cap, funding the buys.
pub fn max_current_tier<S: SaveStore>(engine: &mut Engine<S>, now_ms: u64) {
    grant(engine, ResourceId::Energy, 1e30);
    loop {
        let balance = engine.amount(ResourceId::Energy);
        let next = engine.hierarchy().skills().graph().purchasable(balance).into_iter().next();
        let Some((id, _)) = next else {
            break;
        };
        engine
            .purchase_skill(id.as_str(), now_ms)
            .expect("purchasable node can be bought");
    }
}

/// Max the current tier and advance past it.
pub fn advance_tier<S: SaveStore>(engine: &mut Engine<S>, now_ms: u64) -> AdvanceReport {
    max_current_tier(engine, now_ms);
    engine.advance(now_ms).expect("maxed tier with funds can advance")
}

/// Advance until the top tier completes and the run restarts.
pub fn complete_run<S: SaveStore>(engine: &mut Engine<S>, now_ms: u64) -> AdvanceReport {
    loop {
        let report = advance_tier(engine, now_ms);
        if report.advance.completed_run {
            return report;
        }
    }
}

/// Set `resource` to exactly `amount`.
pub fn set_amount<S: SaveStore>(engine: &mut Engine<S>, resource: ResourceId, amount: f64) {
    engine.ledger_mut().reset(resource, Numeral::from(amount));
}

/// A memory store whose writes to one key fail while `failing` names it.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub failing: Option<&'static str>,
}

impl FailingStore {
    pub fn failing_on(key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: Some(key),
        }
    }
}

impl SaveStore for FailingStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.failing == Some(key) {
            return Err(io::Error::other(format!("{key} is not writable")));
        }
        self.inner.write(key, value)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.inner.remove(key)
    }
}
