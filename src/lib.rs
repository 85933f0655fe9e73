// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod clock;
pub mod live;
pub mod metrics;
pub mod runtime;
pub mod session;

/// Cadence of the host event loop; timer deadlines are checked once per tick.
pub const TICK_RATE_MS: u64 = 50;
