//! Logging macros: `tracing` when the feature is on, no-ops otherwise

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($tt:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, info, warn};
