//! Engine-wide settings.
//!
//! A [`Settings`] value is created once and shared as `Rc<Settings>` by the
//! resolver, the selector builders and the synthesizer. The only mutable piece
//! is the synthesis switch, which can be turned off for a scope with
//! [`Settings::suspend_synthesis`]; the returned guard turns it back on when
//! dropped.

use std::cell::Cell;
use std::time::Duration;

/// Which statistics-backed ranking the default selectors use.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StrategyOption {
    /// Prefer states closest to uncovered code.
    Distance,
    /// Prefer states whose last edge was traversed least.
    VisitCounting,
}

/// Field names through which wrapper containers expose their backing storage.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerLayout {
    /// Field of the wrapper holding the element holder object.
    pub element_holder: String,
    /// Field of the holder holding the element (or key) array.
    pub storage: String,
    /// Field of a map holder holding the value array.
    pub values: String,
}

impl Default for ContainerLayout {
    fn default() -> Self {
        ContainerLayout {
            element_holder: "elementData".to_string(),
            storage: "storage".to_string(),
            values: "values".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    /// Seed of randomized selectors; `None` draws one from entropy.
    pub seed_in_path_selector: Option<u64>,
    pub strategy: StrategyOption,
    /// Traversal budget of a top-level exploration.
    pub step_limit: usize,
    /// Traversal budget of one probe verification.
    pub probe_step_limit: usize,
    /// Maximal method-call count of a synthesized plan.
    pub synthesis_max_depth: usize,
    pub synthesis_timeout: Duration,
    pub use_soft_constraints: bool,
    /// Array length assumed when no length atom constrains an array.
    pub default_array_length: usize,
    pub container_layout: ContainerLayout,
    synthesis_enabled: Cell<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            seed_in_path_selector: Some(42),
            strategy: StrategyOption::Distance,
            step_limit: 3500,
            probe_step_limit: 500,
            synthesis_max_depth: 4,
            synthesis_timeout: Duration::from_secs(60),
            use_soft_constraints: false,
            default_array_length: 100,
            container_layout: ContainerLayout::default(),
            synthesis_enabled: Cell::new(true),
        }
    }
}

impl Settings {
    pub fn synthesis_enabled(&self) -> bool {
        self.synthesis_enabled.get()
    }

    /// Disables synthesis until the returned guard is dropped.
    ///
    /// Guards nest: each one restores the value it observed.
    pub fn suspend_synthesis(&self) -> SynthesisSuspension<'_> {
        let previous = self.synthesis_enabled.replace(false);
        SynthesisSuspension {
            settings: self,
            previous,
        }
    }
}

/// Scope during which synthesis is disabled.
#[must_use = "synthesis is re-enabled as soon as the guard is dropped"]
pub struct SynthesisSuspension<'a> {
    settings: &'a Settings,
    previous: bool,
}

impl Drop for SynthesisSuspension<'_> {
    fn drop(&mut self) {
        self.settings.synthesis_enabled.set(self.previous);
    }
}
