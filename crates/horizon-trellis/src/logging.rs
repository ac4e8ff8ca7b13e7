//! Logging targets of the engine.
//!
//! The engine logs through `tracing` under the targets below; the platform
//! targets live in [`horizon_trellis_core::logging::targets`].
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_trellis::class=debug,horizon_trellis::lifecycle=warn")
//!     .init();
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Class registration and instantiation.
    pub const CLASS: &str = "horizon_trellis::class";
    /// Ready hooks.
    pub const LIFECYCLE: &str = "horizon_trellis::lifecycle";
    /// Action wiring.
    pub const ACTIONS: &str = "horizon_trellis::actions";
    /// Debounced operations.
    pub const DEBOUNCE: &str = "horizon_trellis::debounce";
    /// Signal to future bridge.
    pub const BRIDGE: &str = "horizon_trellis::bridge";
}
