use crate::model::component::Component;
use std::fmt::Debug;

/// Capability set a leaf model implements to participate in a simulation.
/// This is the kernel's answer to spec. §9's "class-level DSL that
/// redefines instance methods per subclass": rather than a subclass
/// registering δ/λ/ta at the class level, the user's model type simply
/// implements this trait, and the kernel depends on nothing but the
/// trait.
pub trait AtomicModel: Debug {
    /// The model owns its [`Component`] (name + ports) directly, so that
    /// `delta_ext`/`lambda` can read/write their own ports without the
    /// kernel handing them anything — matching the teacher crate's
    /// `Atomic::get_component`/`get_component_mut`.
    fn component(&self) -> &Component;
    fn component_mut(&mut self) -> &mut Component;

    /// Time elapsed since the last state transition, measured at
    /// construction/re-initialization. Defaults to 0 (freshly created
    /// models start at their own clock origin).
    #[inline]
    fn elapsed(&self) -> f64 {
        0.0
    }

    /// Advisory convenience value for the next activation delta. `ta()`
    /// defaults to reading this, but `sigma` is never read directly by
    /// the kernel — only `ta()` is authoritative (spec. §9 open
    /// question). Override `ta()` directly if a model's time advance
    /// isn't just "whatever `sigma` says".
    #[inline]
    fn sigma(&self) -> f64 {
        f64::INFINITY
    }

    /// Time-advance function. Must return a finite, non-negative number,
    /// or `+INFINITY` to mark the model passive.
    #[inline]
    fn ta(&self) -> f64 {
        self.sigma()
    }

    /// Output function. The only place a model may safely push values
    /// into its own output ports.
    fn lambda(&self);

    /// Internal transition function.
    fn delta_int(&mut self);

    /// External transition function. `e` is the elapsed time since the
    /// model's last state transition. The only place a model may safely
    /// read its own input ports.
    fn delta_ext(&mut self, e: f64);

    /// Confluent transition function, invoked when a model is both
    /// imminent and has pending external input on the same step.
    /// Defaults to `delta_int` followed by `delta_ext(0.0)`; a PDEVS
    /// model may override this with genuine simultaneous-event handling.
    /// Classic DEVS models generally leave this at its default — ties
    /// among *distinct* children are resolved by the coupled model's
    /// `select`, not by a per-model confluent function (spec. §4.2).
    #[inline]
    fn delta_conf(&mut self) {
        self.delta_int();
        self.delta_ext(0.0);
    }

    /// Optional hook run once after the simulation reaches its end time
    /// or quiesces, before the processor tree is torn down.
    #[inline]
    fn post_simulation_hook(&mut self) {}
}

/// Implements [`AtomicModel`]'s component-access boilerplate for a struct
/// with a field named `component: Component`, delegating `lambda`,
/// `delta_int`, `delta_ext`, `ta` to inherent methods of the same name —
/// mirrors the teacher crate's `impl_atomic!` macro.
#[macro_export]
macro_rules! impl_atomic_component {
    ($ty:ident) => {
        impl $crate::model::atomic::AtomicModel for $ty {
            fn component(&self) -> &$crate::model::component::Component {
                &self.component
            }
            fn component_mut(&mut self) -> &mut $crate::model::component::Component {
                &mut self.component
            }
            fn lambda(&self) {
                self.lambda()
            }
            fn delta_int(&mut self) {
                self.delta_int()
            }
            fn delta_ext(&mut self, e: f64) {
                self.delta_ext(e)
            }
            fn ta(&self) -> f64 {
                self.ta()
            }
        }
    };
}
