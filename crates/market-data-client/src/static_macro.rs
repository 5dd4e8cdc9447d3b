use async_trait::async_trait;
use screener_core::{MacroIndicatorSet, MacroProvider};

/// Serves macro values straight from configuration.
pub struct StaticMacroProvider {
    values: MacroIndicatorSet,
}

impl StaticMacroProvider {
    pub fn new(values: MacroIndicatorSet) -> Self {
        Self { values }
    }
}

#[async_trait]
impl MacroProvider for StaticMacroProvider {
    async fn fetch(&self) -> MacroIndicatorSet {
        self.values
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Wraps another provider; configured values win over fetched ones.
pub struct OverlayMacroProvider {
    inner: Box<dyn MacroProvider>,
    overrides: MacroIndicatorSet,
}

impl OverlayMacroProvider {
    pub fn new(inner: Box<dyn MacroProvider>, overrides: MacroIndicatorSet) -> Self {
        Self { inner, overrides }
    }
}

#[async_trait]
impl MacroProvider for OverlayMacroProvider {
    async fn fetch(&self) -> MacroIndicatorSet {
        let fetched = self.inner.fetch().await;
        if self.overrides.available_count() > 0 {
            tracing::info!(
                "Applying {} configured macro value(s) over {}",
                self.overrides.available_count(),
                self.inner.name()
            );
        }
        fetched.overlay(&self.overrides)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
