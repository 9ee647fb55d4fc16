//! The Classic DEVS / Parallel DEVS split, realized as a sealed trait
//! with two zero-sized marker types rather than a mix-in applied to
//! processors at construction time (the redesign the distilled notes
//! call for). [`crate::model::coupled::Coupled<F>`] is generic over
//! `F: Formalism` and shares every line of tree-traversal code between
//! the two; only [`Formalism::reduce_imminents`] differs.

use std::fmt::Debug;

mod sealed {
    pub trait Sealed {}
}

/// Behavior that differs between Classic DEVS and Parallel DEVS, reduced
/// to the one decision a coordinator actually needs to make differently:
/// how many of this step's tied-imminent children get to run.
///
/// `Coupled<F>::collect` owns the actual reduction (it needs the
/// children's names to consult a user `select`, which this trait does
/// not carry); `SIMULTANEOUS_SIBLINGS` is the single bit it reads to
/// decide whether to run every imminent child or defer to `select`.
pub trait Formalism: sealed::Sealed + Debug + 'static {
    /// `true` for Parallel DEVS (every tied-imminent child fires
    /// concurrently); `false` for Classic DEVS (exactly one does, chosen
    /// by the coupled model's `select`, defaulting to scheduler tie
    /// order when none is set).
    const SIMULTANEOUS_SIBLINGS: bool;
}

/// A coupled model's tie-breaking function for Classic DEVS: given the
/// names of every currently-imminent child, returns the name of the one
/// that should run this step.
pub type SelectFn = dyn Fn(&[String]) -> String + Send + Sync;

/// Classic DEVS marker: one model fires per tied instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cdevs;

impl sealed::Sealed for Cdevs {}

impl Formalism for Cdevs {
    const SIMULTANEOUS_SIBLINGS: bool = false;
}

/// Parallel DEVS marker: every tied child fires concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pdevs;

impl sealed::Sealed for Pdevs {}

impl Formalism for Pdevs {
    const SIMULTANEOUS_SIBLINGS: bool = true;
}
