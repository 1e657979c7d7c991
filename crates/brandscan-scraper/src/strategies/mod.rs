//! Registry of built-in brand strategies, keyed by brand id.

mod credentialed;
mod json_api;
mod storefront;

use crate::strategy::BrandStrategy;

/// Builds a fresh strategy; strategies hold no job state but are built per
/// job so nothing leaks between runs.
pub type StrategyBuilder = fn() -> BrandStrategy;

#[derive(Debug, Clone, Copy)]
pub struct StrategyEntry {
    pub brand_id: &'static str,
    pub name: &'static str,
    build: StrategyBuilder,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<StrategyEntry>,
}

impl StrategyRegistry {
    /// Every strategy shipped with the agent.
    #[must_use]
    pub fn builtin() -> Self {
        Self::default()
            .with("229", "gucci", json_api::gucci)
            .with("314", "loro_piana", json_api::loro_piana)
            .with("26", "alexander_mcqueen", json_api::alexander_mcqueen)
            .with("478", "saint_laurent", json_api::saint_laurent)
            .with("363", "moncler", json_api::moncler)
            .with("500", "stone_island", json_api::stone_island)
            .with("157", "dolce_gabbana", credentialed::dolce_gabbana)
            .with("310", "loewe", credentialed::loewe)
            .with("125", "chloe", storefront::chloe)
            .with("110", "canada_goose", storefront::canada_goose)
    }

    /// Registers (or replaces) the strategy for `brand_id`.
    #[must_use]
    pub fn with(mut self, brand_id: &'static str, name: &'static str, build: StrategyBuilder) -> Self {
        self.entries.retain(|e| e.brand_id != brand_id);
        self.entries.push(StrategyEntry {
            brand_id,
            name,
            build,
        });
        self
    }

    /// Pure lookup; `None` for an unregistered brand.
    #[must_use]
    pub fn lookup(&self, brand_id: &str) -> Option<BrandStrategy> {
        self.entries
            .iter()
            .find(|e| e.brand_id == brand_id.trim())
            .map(|e| (e.build)())
    }

    pub fn entries(&self) -> impl Iterator<Item = &StrategyEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FetchMode;

    #[test]
    fn builtin_registers_ten_brands() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.entries().count(), 10);
        for entry in registry.entries() {
            let strategy = registry.lookup(entry.brand_id).unwrap();
            assert_eq!(strategy.brand_id, entry.brand_id);
            assert_eq!(strategy.name, entry.name);
        }
    }

    #[test]
    fn unknown_brand_is_none() {
        assert!(StrategyRegistry::builtin().lookup("999").is_none());
    }

    #[test]
    fn fetch_modes_match_each_source() {
        let registry = StrategyRegistry::builtin();
        let mode = |id: &str| registry.lookup(id).unwrap().fetch;
        assert!(matches!(mode("229"), FetchMode::Rendered { .. }));
        assert!(matches!(mode("314"), FetchMode::Http));
        assert!(matches!(mode("157"), FetchMode::CredentialHttp(_)));
        assert!(matches!(mode("310"), FetchMode::CredentialHttp(_)));
        assert!(matches!(mode("110"), FetchMode::Rendered { .. }));
    }

    #[test]
    fn with_replaces_an_existing_entry() {
        let registry = StrategyRegistry::builtin().with("229", "gucci_v2", json_api::gucci);
        assert_eq!(registry.entries().count(), 10);
        assert!(registry.entries().any(|e| e.name == "gucci_v2"));
    }
}
