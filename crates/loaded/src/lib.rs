//! Cross-engine load-state detection for `<img>`, `<iframe>` and `<script>`.
//!
//! Given a set of resource nodes, [`Loader::loaded`] reports per node, exactly
//! once per detection cycle, whether the resource loaded (`success`), failed
//! (`error`) or did not finish within a deadline (`timeout`). Each engine
//! profile exposes a different subset of native signals (`complete`,
//! `readyState`, natural-size accessors, load events); the detectors combine
//! whatever is present. Results are always delivered on a later tick of the
//! document's event loop, never synchronously.

#![allow(
    clippy::module_name_repetitions,
    reason = "LoadStatus/LoadOptions read better than Status/Options at call sites"
)]

pub mod classify;
pub mod config;
pub mod detect;
pub mod facade;
pub mod normalize;
pub mod status;
pub mod telemetry;

pub use classify::ResourceKind;
pub use config::LoadedConfig;
pub use facade::{
    COMPLETE_DEFERRED, LoadCallback, LoadOptions, LoadedSet, Loader, RESULT_DEFERRED,
    RegistrationMethod, Settlement,
};
pub use normalize::normalize_natural_size;
pub use status::LoadStatus;
pub use telemetry::DetectionStats;
