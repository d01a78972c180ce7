//! Inliner configuration.
//!
//! A small read-only bag: the node-count threshold under which functions are
//! inlined without an `inline` modifier, and the capability profile of the
//! emission target.

/// Default inline threshold (max IR nodes for an unmarked function).
pub const DEFAULT_INLINE_THRESHOLD: usize = 50;

/// Capability profile of the emission target.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    can_use_do_loops: bool,
}

impl Caps {
    /// A target without `do` loops. Early returns cannot be emulated there,
    /// so functions containing them are never inlined.
    pub fn no_do_loops() -> Self {
        Caps {
            can_use_do_loops: false,
        }
    }

    pub fn can_use_do_loops(&self) -> bool {
        self.can_use_do_loops
    }
}

impl Default for Caps {
    fn default() -> Self {
        Caps {
            can_use_do_loops: true,
        }
    }
}

/// Read-only settings consulted by the inliner.
#[derive(Debug, Clone)]
pub struct Settings {
    pub inline_threshold: usize,
    pub caps: Caps,
}

impl Settings {
    pub fn with_caps(caps: Caps) -> Self {
        Settings {
            caps,
            ..Settings::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            caps: Caps::default(),
        }
    }
}
