//! VESTA - Vigilant Engine for Security zones, Telemetry and Alarming
//!
//! A zoned alarm supervision engine: independent alarm zones with their own
//! sensors, arming modes and delay timers, plus a controller that commands
//! every zone and folds their published states into one system-wide view.
//!
//! # Examples
//!
//! ```rust,no_run
//! use vesta::{Config, Controller, EffectSender, ProtectionMode, SignalBus};
//!
//! # fn main() -> vesta::Result<()> {
//! // Initialize the VESTA runtime
//! vesta::init()?;
//!
//! // Load configuration and build the controller
//! let config = Config::from_file("config.yaml")?;
//! let bus = SignalBus::new();
//! let (effects, _events) = EffectSender::channel();
//! let mut controller = Controller::new(config, bus, effects)?;
//!
//! // Arm the whole system
//! controller.select_protection_mode(ProtectionMode::FullProtection, "cli");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// ============================================================================
// CORE MODULES
// ============================================================================

/// Comprehensive error handling with structured error types
pub mod error;

/// Type-safe value system supporting multiple data types
pub mod value;

/// Thread-safe signal bus with member-change notification
pub mod signal;

/// Protection mode and arm state enumerations
pub mod mode;

/// Configuration management with YAML support and validation
pub mod config;

/// Side-effect ownership decisions per mode transition
pub mod gate;

/// State aggregation over configured member lists
pub mod aggregate;

/// Single alarm zone: arming, activation check/delay, alarms
pub mod zone;

/// Zone controller: mode selection, event dispatch, run loop
pub mod controller;

/// Side-effect events emitted by zones and the controller
pub mod effects;

/// Zone discovery over the signal bus
pub mod discovery;

// ============================================================================
// PUBLIC RE-EXPORTS
// ============================================================================

pub use aggregate::Aggregator;
pub use config::Config;
pub use controller::{Controller, UpdateScope};
pub use effects::{EffectEvent, EffectSender};
pub use error::{AlarmError, Result};
pub use gate::{FxPermits, GateDecision, SideEffectGate};
pub use mode::{ArmState, IndividualMode, ProtectionMode, SystemState};
pub use signal::SignalBus;
pub use value::Value;
pub use zone::Zone;

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// VESTA version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize the VESTA runtime
///
/// Sets up the tracing subscriber from the environment. Call once at the
/// start of the application; repeated calls are harmless.
pub fn init() -> Result<()> {
    #[cfg(not(test))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "vesta=info");
        }

        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer().with_target(false));

        if subscriber.try_init().is_err() {
            // Already initialized, ignore
        }
    }

    tracing::info!("VESTA {} initialized", VERSION);
    Ok(())
}
