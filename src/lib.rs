//! Core simulation kernel for hierarchical Classic DEVS and Parallel DEVS
//! models: the processor tree (simulators, coordinators, a root
//! coordinator), the calendar-queue event scheduler, and the two
//! formalism variants that decide how simultaneous events are
//! disambiguated.
//!
//! The user-facing model-building DSL, statistics collection, and
//! packaging are external collaborators; this crate only implements the
//! abstract DEVS simulation protocol described in the module docs below.

pub mod calendar_queue;
pub mod error;
pub mod model;
pub mod simulation;
pub mod stats;

pub use error::DevsError;
pub use model::coupled::Coupled;
pub use model::port::{Direction, Port};
pub use simulation::formalism::{Cdevs, Formalism, Pdevs};
pub use simulation::{LifecycleEvent, Processor, RootCoordinator};

/// Pointer type used to share a port (or a child processor's boundary) with
/// every coupling that references it. Plain `Rc`/`RefCell` when no
/// `par_*` feature is enabled; `Arc`/`Mutex` once any of them pulls in
/// `rayon`, so the tree can be walked by `par_iter_mut` without giving up
/// the single-writer-per-port discipline described in the crate's
/// concurrency notes.
#[cfg(not(feature = "par_any"))]
pub(crate) type Shared<T> = std::rc::Rc<T>;
#[cfg(feature = "par_any")]
pub(crate) type Shared<T> = std::sync::Arc<T>;

#[cfg(not(feature = "par_any"))]
pub(crate) type Lock<T> = std::cell::RefCell<T>;
#[cfg(feature = "par_any")]
pub(crate) type Lock<T> = std::sync::Mutex<T>;

/// Marker alias that is a no-op bound in the sequential build and expands
/// to `Send + Sync` once any `par_*` feature pulls in `rayon`. Ports,
/// models, and processors are bounded by this instead of by `Send`/`Sync`
/// directly so the kernel compiles identically with or without the
/// parallel features, and so `Box<dyn Processor>` is only required to be
/// thread-safe when it actually needs to cross a rayon thread boundary.
#[cfg(not(feature = "par_any"))]
pub trait MaybeSendSync {}
#[cfg(not(feature = "par_any"))]
impl<T: ?Sized> MaybeSendSync for T {}

#[cfg(feature = "par_any")]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(feature = "par_any")]
impl<T: ?Sized + Send + Sync> MaybeSendSync for T {}
