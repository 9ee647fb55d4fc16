//! Model-side types: ports, the shared `Component` state every processor
//! carries, leaf (`atomic`) models, and coupled (`coupled`) models.

pub mod atomic;
pub mod component;
pub mod coupled;
pub mod port;

pub use atomic::AtomicModel;
pub use component::Component;
pub use coupled::Coupled;
pub use port::{Direction, ErasedPort, Port};
