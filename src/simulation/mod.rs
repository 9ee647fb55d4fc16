//! The processor tree: the common [`Processor`] protocol every node in a
//! model hierarchy answers to, and [`RootCoordinator`], which drives it.
//!
//! There is deliberately no separate `Simulator<M>` wrapper struct around
//! an [`crate::model::atomic::AtomicModel`] — the blanket impl below
//! makes every atomic model a processor directly, the same way the
//! pack's reference crate blanket-implements its simulator trait over
//! anything implementing its atomic-model trait.

pub mod formalism;

pub use formalism::{Cdevs, Formalism, Pdevs};

use crate::error::DevsError;
use crate::model::atomic::AtomicModel;
use crate::model::component::Component;
use crate::model::port::ErasedPort;
use crate::stats::StatsTree;
use crate::{MaybeSendSync, Shared};
use std::fmt::Debug;

/// Notifications a [`RootCoordinator`] broadcasts to registered listener
/// closures — the "observer pattern for lifecycle hooks" redesign from
/// the design notes, with no trait-object downcasting and no global
/// registry.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent {
    PostInit { time_next: f64 },
    PostStep { t: f64 },
    PreTeardown,
}

/// Common protocol every node in the processor tree answers to: a bare
/// atomic model (via the blanket impl below) or a
/// [`crate::model::coupled::Coupled`] subtree.
pub trait Processor: Debug + MaybeSendSync {
    /// The [`Component`] (name, clock, port tables) this processor
    /// wraps — its own for an atomic model, or the coupled model's
    /// boundary ports for a coordinator. Lets [`crate::model::coupled::Coupled`]
    /// wire couplings against any child without knowing whether that
    /// child is a leaf or a subtree.
    fn component(&self) -> &Component;

    fn name(&self) -> &str {
        self.component().name()
    }

    fn time_last(&self) -> f64 {
        self.component().time_last()
    }

    fn time_next(&self) -> f64 {
        self.component().time_next()
    }

    fn try_get_in_port(&self, name: &str) -> Result<Shared<dyn ErasedPort>, DevsError> {
        self.component().try_get_in_port(name)
    }

    fn try_get_out_port(&self, name: &str) -> Result<Shared<dyn ErasedPort>, DevsError> {
        self.component().try_get_out_port(name)
    }

    /// Type-erased borrow, used by [`crate::model::coupled::Coupled::flatten`]
    /// to tell whether a child is itself a coupled model worth inlining.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Consumes the box to recover the concrete child type, for the same
    /// purpose as [`Processor::as_any`] but by value.
    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any>;

    /// Sets this processor's clock from `t` and returns the resulting
    /// `time_next`.
    fn init(&mut self, t: f64) -> Result<f64, DevsError>;

    /// Runs whatever is imminent at `t` and leaves the results sitting in
    /// output ports for the caller (a parent coordinator, or nobody for
    /// the root) to read via couplings.
    fn collect(&mut self, t: f64) -> Result<(), DevsError>;

    /// Applies state transitions at `t` given whatever external input the
    /// caller has already routed into this processor's input ports.
    fn transition(&mut self, t: f64) -> Result<(), DevsError>;

    /// Clears this processor's own port buffers (not its children's —
    /// [`crate::model::coupled::Coupled::transition`] clears each active
    /// child's ports itself, right after that child's `transition`
    /// returns).
    fn clear_ports(&mut self);

    fn tear_down(&mut self);

    fn stats(&self) -> StatsTree;
}

impl<M: AtomicModel + MaybeSendSync + 'static> Processor for M {
    fn component(&self) -> &Component {
        AtomicModel::component(self)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }

    fn init(&mut self, t: f64) -> Result<f64, DevsError> {
        let elapsed = self.elapsed();
        let time_last = t - elapsed;
        let ta = self.ta();
        let time_next = time_last + ta;
        self.component_mut().stats.ta_calls += 1;
        self.component_mut().set_clock(time_last, time_next);
        tracing::debug!(model = self.component().name(), time_next, "atomic init");
        Ok(time_next)
    }

    fn collect(&mut self, t: f64) -> Result<(), DevsError> {
        let (time_last, time_next) = (self.component().time_last(), self.component().time_next());
        if t != time_next {
            return Err(DevsError::BadSynchronization {
                model: self.component().name().to_string(),
                t,
                time_last,
                time_next,
            });
        }
        AtomicModel::lambda(self);
        let produced = self.component().output_len();
        let stats = &mut self.component_mut().stats;
        stats.lambda_calls += 1;
        stats.messages_out += produced;
        Ok(())
    }

    fn transition(&mut self, t: f64) -> Result<(), DevsError> {
        let (time_last, time_next) = (self.component().time_last(), self.component().time_next());
        if t > time_next {
            return Err(DevsError::BadSynchronization {
                model: self.component().name().to_string(),
                t,
                time_last,
                time_next,
            });
        }
        if !self.component().is_input_empty() {
            let consumed = self.component().input_len();
            if t == time_next {
                AtomicModel::delta_conf(self);
                let stats = &mut self.component_mut().stats;
                stats.delta_conf_calls += 1;
                stats.messages_in += consumed;
            } else {
                let e = t - time_last;
                AtomicModel::delta_ext(self, e);
                let stats = &mut self.component_mut().stats;
                stats.delta_ext_calls += 1;
                stats.messages_in += consumed;
            }
        } else if t == time_next {
            AtomicModel::delta_int(self);
            self.component_mut().stats.delta_int_calls += 1;
        } else {
            // Empty input and t before time_next: neither internal nor
            // external transition applies (spec.md §4.2, "Else fatal").
            // A correctly-behaving `Coupled` coordinator never reaches
            // this: it only calls `transition` on a child that is either
            // imminent or has pending input.
            return Err(DevsError::BadSynchronization {
                model: self.component().name().to_string(),
                t,
                time_last,
                time_next,
            });
        }
        let ta = self.ta();
        self.component_mut().stats.ta_calls += 1;
        self.component_mut().set_clock(t, t + ta);
        Ok(())
    }

    fn clear_ports(&mut self) {
        self.component_mut().clear_ports();
    }

    fn tear_down(&mut self) {
        self.post_simulation_hook();
    }

    fn stats(&self) -> StatsTree {
        StatsTree::leaf(self.component().name(), self.component().stats.clone())
    }
}

/// Drives the top of a processor tree through the generic root loop
/// (spec. §4.4): formalism-agnostic by construction — the CDEVS/PDEVS
/// split is entirely inside however `root`'s coordinators reduce their
/// imminent sets, not in this loop.
pub struct RootCoordinator<P: Processor> {
    root: P,
    listeners: Vec<Box<dyn FnMut(LifecycleEvent)>>,
}

impl<P: Processor> std::fmt::Debug for RootCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootCoordinator")
            .field("root", &self.root)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<P: Processor> RootCoordinator<P> {
    pub fn new(root: P) -> Self {
        Self {
            root,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: impl FnMut(LifecycleEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: LifecycleEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub fn root(&self) -> &P {
        &self.root
    }

    pub fn stats(&self) -> StatsTree {
        self.root.stats()
    }

    /// Runs the simulation until `root.time_next >= end_time`, or until
    /// the system quiesces (`time_next == +INFINITY`) — whichever comes
    /// first, regardless of how much horizon remains.
    pub fn simulate(&mut self, end_time: f64) -> Result<(), DevsError> {
        let mut time_next = self.root.init(0.0)?;
        self.notify(LifecycleEvent::PostInit { time_next });
        while time_next < end_time {
            let t = time_next;
            self.root.collect(t)?;
            self.root.transition(t)?;
            self.root.clear_ports();
            tracing::trace!(t, "root step");
            self.notify(LifecycleEvent::PostStep { t });
            time_next = self.root.time_next();
        }
        self.notify(LifecycleEvent::PreTeardown);
        self.root.tear_down();
        Ok(())
    }

    /// Runs at most `n_steps` root-loop iterations, stopping early on
    /// quiescence just like [`RootCoordinator::simulate`].
    pub fn simulate_steps(&mut self, mut n_steps: usize) -> Result<(), DevsError> {
        let mut time_next = self.root.init(0.0)?;
        self.notify(LifecycleEvent::PostInit { time_next });
        while time_next.is_finite() && n_steps > 0 {
            let t = time_next;
            self.root.collect(t)?;
            self.root.transition(t)?;
            self.root.clear_ports();
            self.notify(LifecycleEvent::PostStep { t });
            time_next = self.root.time_next();
            n_steps -= 1;
        }
        self.notify(LifecycleEvent::PreTeardown);
        self.root.tear_down();
        Ok(())
    }
}
