//! Engine quirk profiles.
//!
//! Each profile describes which native accessors a host engine exposes on
//! resource nodes. The detectors and the natural-size normalizer branch on
//! these flags instead of sniffing the engine.

/// Native accessor availability for a simulated engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EngineQuirks {
    /// Resource nodes expose a legacy `readyState` string.
    pub ready_state: bool,
    /// Images expose native `naturalWidth`/`naturalHeight`.
    pub native_natural_size: bool,
    /// Nodes expose a writable runtime style layer (legacy layout path).
    pub runtime_style: bool,
}

impl EngineQuirks {
    /// Current engines: native natural size, no `readyState` on resources.
    pub const MODERN: Self = Self {
        ready_state: false,
        native_natural_size: true,
        runtime_style: false,
    };

    /// Older standards engines without natural-size accessors.
    pub const TRANSITIONAL: Self = Self {
        ready_state: false,
        native_natural_size: false,
        runtime_style: false,
    };

    /// The legacy engine: `readyState` everywhere, runtime style, and a
    /// 28x30 placeholder for broken images.
    pub const LEGACY: Self = Self {
        ready_state: true,
        native_natural_size: false,
        runtime_style: true,
    };

    /// Look up a profile by name (`modern`, `transitional`, `legacy`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "modern" => Some(Self::MODERN),
            "transitional" => Some(Self::TRANSITIONAL),
            "legacy" => Some(Self::LEGACY),
            _ => None,
        }
    }
}

impl Default for EngineQuirks {
    fn default() -> Self {
        Self::MODERN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_resolve_by_name() {
        assert_eq!(EngineQuirks::from_name("Legacy"), Some(EngineQuirks::LEGACY));
        assert_eq!(EngineQuirks::from_name(" modern "), Some(EngineQuirks::MODERN));
        assert_eq!(EngineQuirks::from_name("netscape"), None);
        assert_eq!(EngineQuirks::default(), EngineQuirks::MODERN);
    }
}
