//! Thin logging facade.
//!
//! The scheduler logs through the `log` crate rather than writing to a
//! concrete UART, so a host application can route diagnostics to whatever
//! sink it installs (or none — `log`'s macros degrade to no-ops without an
//! installed logger, which is the expected state in a release image with no
//! configured sink). This module exists only so call sites say
//! `console::warn!(...)` the way the rest of this crate names things,
//! instead of reaching for `log` directly.

pub(crate) use log::{debug, error, trace, warn};
