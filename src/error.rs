//! Run-time step errors (spec. §7). Construction-time invariant violations
//! (duplicate ports, dangling couplings, incompatible directions/types
//! discovered while wiring a coupling) panic immediately at the call site
//! instead, the way [`crate::model::coupled::Coupled::add_eic`] and its
//! siblings already do — those are programmer errors, not run-time
//! conditions a caller could reasonably recover from.

use crate::model::port::Direction;

/// Everything the kernel can detect while a [`crate::RootCoordinator`] is
/// actually running a simulation. Nothing here is retried: the first
/// `Err` returned from a processor aborts `simulate`.
#[derive(thiserror::Error, Debug)]
pub enum DevsError {
    /// A message's port is not owned by its target model.
    #[error("port '{port}' is not owned by model '{model}'")]
    InvalidPortHost { model: String, port: String },

    /// An output port was used where an input port was required, or vice
    /// versa — e.g. an EIC whose destination resolves to an output port.
    #[error(
        "port '{port}' on model '{model}' must be {expected:?} for this coupling, but is {actual:?}"
    )]
    InvalidPortType {
        model: String,
        port: String,
        expected: Direction,
        actual: Direction,
    },

    /// A port lookup by name missed.
    #[error("model '{model}' has no port named '{port}'")]
    UnknownPort { model: String, port: String },

    /// A child lookup by name missed.
    #[error("coupled model '{model}' has no child named '{child}'")]
    NoSuchChild { model: String, child: String },

    /// A processor received `collect`/`transition` at a time inconsistent
    /// with its own `time_last`/`time_next`.
    #[error(
        "bad synchronization in '{model}': received t={t} but time_last={time_last}, time_next={time_next}"
    )]
    BadSynchronization {
        model: String,
        t: f64,
        time_last: f64,
        time_next: f64,
    },

    /// A user-defined δ/λ/ta function signaled failure.
    #[error("user transition function failed in model '{model}': {source}")]
    UserTransitionFailure {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
