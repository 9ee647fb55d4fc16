use crate::calendar_queue::CalendarQueue;
use crate::error::DevsError;
use crate::model::component::Component;
use crate::model::port::{types_compatible, Direction, ErasedPort, Port};
use crate::simulation::formalism::SelectFn;
use crate::simulation::{Formalism, Processor};
use crate::stats::{ModelStats, StatsTree};
use crate::{MaybeSendSync, Shared};
#[cfg(feature = "par_couplings")]
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;

type Coupling = (Shared<dyn ErasedPort>, Shared<dyn ErasedPort>);

/// A coupled DEVS model and its own coordinator rolled into one type —
/// there is no separate `Coordinator` wrapper, the same way
/// [`super::atomic::AtomicModel`] has no separate `Simulator` wrapper.
/// `F` selects Classic vs. Parallel DEVS imminent-set reduction
/// ([`Formalism::SIMULTANEOUS_SIBLINGS`]); every other line of
/// tree-traversal code is shared between the two.
pub struct Coupled<F: Formalism> {
    component: Component,
    comps_map: HashMap<String, usize>,
    comps_vec: Vec<Box<dyn Processor>>,
    eic_vec: Vec<Coupling>,
    ic_vec: Vec<Coupling>,
    eoc_vec: Vec<Coupling>,
    scheduler: CalendarQueue<usize>,
    /// Indices handed `collect`/`transition` this step; populated by
    /// `collect`, consumed by the following `transition` call. Kept as
    /// a field (rather than threaded through the `Processor` trait's
    /// fixed signature) because `collect` and `transition` communicate
    /// nothing else about which children actually ran.
    imminent: Vec<usize>,
    select: Option<Box<SelectFn>>,
    _formalism: PhantomData<F>,
}

impl<F: Formalism> Debug for Coupled<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Coupled")
            .field("component", &self.component)
            .field("children", &self.comps_vec.len())
            .finish()
    }
}

impl<F: Formalism> Display for Coupled<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.component.name())
    }
}

impl<F: Formalism> Coupled<F> {
    pub fn new(name: &str) -> Self {
        Self {
            component: Component::new(name),
            comps_map: HashMap::new(),
            comps_vec: Vec::new(),
            eic_vec: Vec::new(),
            ic_vec: Vec::new(),
            eoc_vec: Vec::new(),
            scheduler: CalendarQueue::new(),
            imminent: Vec::new(),
            select: None,
            _formalism: PhantomData,
        }
    }

    pub fn add_in_port<T: 'static + Clone + Debug + MaybeSendSync>(&mut self, name: &str) -> Port<T> {
        self.component.add_in_port(name)
    }

    pub fn add_out_port<T: 'static + Clone + Debug + MaybeSendSync>(&mut self, name: &str) -> Port<T> {
        self.component.add_out_port(name)
    }

    /// Registers the tie-breaking function Classic DEVS consults when
    /// more than one child is imminent on the same step. Ignored under
    /// `F = Pdevs`, where every imminent child runs. Without one, CDEVS
    /// falls back to the calendar queue's own (LIFO) tie order.
    pub fn set_select(&mut self, select: impl Fn(&[String]) -> String + Send + Sync + 'static) {
        self.select = Some(Box::new(select));
    }

    /// Adds a child processor. Panics if the coupled model already has a
    /// child with this name — a programmer error caught at build time.
    pub fn add_component(&mut self, child: Box<dyn Processor>) {
        let name = child.name().to_string();
        if self.comps_map.contains_key(&name) {
            panic!("coupled model '{}' already has a child named '{name}'", self.component.name());
        }
        self.comps_map.insert(name, self.comps_vec.len());
        self.comps_vec.push(child);
    }

    fn child(&self, name: &str) -> &dyn Processor {
        let &idx = self
            .comps_map
            .get(name)
            .unwrap_or_else(|| panic!("coupled model '{}' has no child named '{name}'", self.component.name()));
        self.comps_vec[idx].as_ref()
    }

    fn add_coupling(
        coupling_set: &mut Vec<Coupling>,
        from: Shared<dyn ErasedPort>,
        to: Shared<dyn ErasedPort>,
    ) {
        if !types_compatible(from.as_ref(), to.as_ref()) {
            panic!(
                "cannot couple port '{}' ({}) on '{}' to port '{}' ({}) on '{}': incompatible types",
                from.name(), "type", from.host(), to.name(), "type", to.host()
            );
        }
        if coupling_set
            .iter()
            .any(|(f, t)| std::ptr::eq(f.as_ref() as *const _ as *const (), from.as_ref() as *const _ as *const ())
                && std::ptr::eq(t.as_ref() as *const _ as *const (), to.as_ref() as *const _ as *const ()))
        {
            panic!(
                "duplicate coupling from '{}.{}' to '{}.{}'",
                from.host(), from.name(), to.host(), to.name()
            );
        }
        coupling_set.push((from, to));
    }

    /// External Input Coupling: this coupled model's own input port to a
    /// child's input port.
    pub fn add_eic(&mut self, port_from: &str, child_to: &str, port_to: &str) {
        let from = self.component.try_get_in_port(port_from).unwrap_or_else(|e| panic!("{e}"));
        if from.direction() != Direction::Input {
            panic!("EIC source '{port_from}' on '{}' is not an input port", self.component.name());
        }
        let to = self.child(child_to).try_get_in_port(port_to).unwrap_or_else(|e| panic!("{e}"));
        Self::add_coupling(&mut self.eic_vec, from, to);
    }

    /// Internal Coupling: one child's output port to a sibling's input port.
    pub fn add_ic(&mut self, child_from: &str, port_from: &str, child_to: &str, port_to: &str) {
        let from = self.child(child_from).try_get_out_port(port_from).unwrap_or_else(|e| panic!("{e}"));
        let to = self.child(child_to).try_get_in_port(port_to).unwrap_or_else(|e| panic!("{e}"));
        Self::add_coupling(&mut self.ic_vec, from, to);
    }

    /// External Output Coupling: a child's output port to this coupled
    /// model's own output port.
    pub fn add_eoc(&mut self, child_from: &str, port_from: &str, port_to: &str) {
        let from = self.child(child_from).try_get_out_port(port_from).unwrap_or_else(|e| panic!("{e}"));
        let to = self.component.try_get_out_port(port_to).unwrap_or_else(|e| panic!("{e}"));
        if to.direction() != Direction::Output {
            panic!("EOC destination '{port_to}' on '{}' is not an output port", self.component.name());
        }
        Self::add_coupling(&mut self.eoc_vec, from, to);
    }

    /// Performs the transitive-closure composition described for the
    /// flattening optimization: returns an equivalent coupled model whose
    /// children are all atomic (any nested [`Coupled`] child is inlined),
    /// with EIC/IC/EOC composed across the removed levels. The simulation
    /// protocol is identical either way; only the tree shape changes,
    /// which is why this is a plain method rather than something
    /// `RootCoordinator` does automatically.
    pub fn flatten(mut self) -> Self {
        let children = std::mem::take(&mut self.comps_vec);
        let mut eic = std::mem::take(&mut self.eic_vec);
        let mut ic = std::mem::take(&mut self.ic_vec);
        let mut eoc = std::mem::take(&mut self.eoc_vec);
        self.comps_map.clear();

        for child in children {
            if child.as_any().downcast_ref::<Coupled<F>>().is_some() {
                let nested = *child
                    .into_any()
                    .downcast::<Coupled<F>>()
                    .expect("checked by as_any just above");
                self.inline_child(nested.flatten(), &mut eic, &mut ic, &mut eoc);
            } else {
                self.comps_map.insert(child.name().to_string(), self.comps_vec.len());
                self.comps_vec.push(child);
            }
        }

        self.eic_vec = eic;
        self.ic_vec = ic;
        self.eoc_vec = eoc;
        self
    }

    /// Splices an already-flattened nested coupled model's children into
    /// `self`, rewriting any coupling crossing its boundary by matching
    /// the boundary port's identity (`Rc`/`Arc` pointer equality) rather
    /// than its name — a nested model's own input port object *is* the
    /// same [`Shared`] the parent's coupling already points at, since
    /// both were produced by the one call to [`Component::add_in_port`]
    /// that created it, so pointer matching survives arbitrarily many
    /// inlined levels without re-deriving anything from names.
    fn inline_child(
        &mut self,
        nested: Coupled<F>,
        eic: &mut Vec<Coupling>,
        ic: &mut Vec<Coupling>,
        eoc: &mut Vec<Coupling>,
    ) {
        let host = nested.component.name().to_string();
        let same_port = |a: &Shared<dyn ErasedPort>, b: &Shared<dyn ErasedPort>| {
            std::ptr::eq(a.as_ref() as *const _ as *const (), b.as_ref() as *const _ as *const ())
        };

        let incoming: Vec<Coupling> = eic
            .iter()
            .chain(ic.iter())
            .filter(|(_, to)| to.host() == host)
            .cloned()
            .collect();
        for (ext_from, boundary_in) in &incoming {
            for (b_from, b_to) in nested.eic_vec.iter().chain(nested.ic_vec.iter()) {
                if same_port(b_from, boundary_in) {
                    ic.push((ext_from.clone(), b_to.clone()));
                }
            }
        }
        eic.retain(|(_, to)| to.host() != host);
        ic.retain(|(_, to)| to.host() != host);

        let outgoing: Vec<Coupling> = ic
            .iter()
            .chain(eoc.iter())
            .filter(|(from, _)| from.host() == host)
            .cloned()
            .collect();
        for (boundary_out, ext_to) in &outgoing {
            for (b_from, b_to) in nested.ic_vec.iter().chain(nested.eoc_vec.iter()) {
                if same_port(b_to, boundary_out) {
                    ic.push((b_from.clone(), ext_to.clone()));
                }
            }
        }
        ic.retain(|(from, _)| from.host() != host);
        eoc.retain(|(from, _)| from.host() != host);

        ic.extend(nested.ic_vec);

        for leaf in nested.comps_vec {
            self.comps_map.insert(leaf.name().to_string(), self.comps_vec.len());
            self.comps_vec.push(leaf);
        }
    }
}

impl<F: Formalism> Processor for Coupled<F> {
    fn component(&self) -> &Component {
        &self.component
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
        self
    }

    /// Forwards `init` to every child, schedules each under its returned
    /// `time_next`, and takes `time_last` as the latest of its children's
    /// (spec. §4.3).
    fn init(&mut self, t: f64) -> Result<f64, DevsError> {
        #[cfg(feature = "par_start")]
        let inits: Result<Vec<f64>, DevsError> =
            self.comps_vec.par_iter_mut().map(|c| c.init(t)).collect();
        #[cfg(not(feature = "par_start"))]
        let inits: Result<Vec<f64>, DevsError> =
            self.comps_vec.iter_mut().map(|c| c.init(t)).collect();
        let inits = inits?;

        for (idx, time_next) in inits.into_iter().enumerate() {
            self.scheduler.push(idx, time_next);
        }
        let time_last = self
            .comps_vec
            .iter()
            .map(|c| c.time_last())
            .fold(f64::NEG_INFINITY, f64::max);
        let time_last = if time_last.is_finite() { time_last } else { t };
        let time_next = self.scheduler.peek_priority().unwrap_or(f64::INFINITY);
        self.component.set_clock(time_last, time_next);
        tracing::debug!(model = self.component.name(), time_next, "coupled init");
        Ok(time_next)
    }

    /// Pops every child tied at `t`, reduces them to the activated set
    /// via `F`, runs `collect` on the survivors, re-schedules the losing
    /// ties at the same `t`, and propagates IC/EOC.
    fn collect(&mut self, t: f64) -> Result<(), DevsError> {
        let (time_last, time_next) = (self.component.time_last(), self.component.time_next());
        if t != time_next {
            return Err(DevsError::BadSynchronization {
                model: self.component.name().to_string(),
                t,
                time_last,
                time_next,
            });
        }

        let mut tied = Vec::new();
        while self.scheduler.peek_priority() == Some(t) {
            let (idx, _) = self.scheduler.pop().expect("peek just confirmed an entry");
            tied.push(idx);
        }

        let activated: Vec<usize> = if F::SIMULTANEOUS_SIBLINGS || tied.len() <= 1 {
            tied.clone()
        } else {
            let names: Vec<String> = tied.iter().map(|&i| self.comps_vec[i].name().to_string()).collect();
            let chosen = match &self.select {
                Some(select) => select(&names),
                None => names[0].clone(),
            };
            self.component.stats.select_calls += 1;
            let chosen_idx = tied
                .iter()
                .copied()
                .find(|&i| self.comps_vec[i].name() == chosen)
                .unwrap_or(tied[0]);
            vec![chosen_idx]
        };

        for &idx in &tied {
            if !activated.contains(&idx) {
                self.scheduler.push(idx, t);
            }
        }
        self.imminent = activated.clone();

        #[cfg(feature = "par_collection")]
        self.comps_vec
            .par_iter_mut()
            .enumerate()
            .filter(|(idx, _)| activated.contains(idx))
            .try_for_each(|(_, child)| child.collect(t))?;
        #[cfg(not(feature = "par_collection"))]
        for &idx in &activated {
            self.comps_vec[idx].collect(t)?;
        }

        #[cfg(feature = "par_couplings")]
        {
            self.ic_vec.par_iter().for_each(|(from, to)| from.propagate_into(&**to));
            self.eoc_vec.par_iter().for_each(|(from, to)| from.propagate_into(&**to));
        }
        #[cfg(not(feature = "par_couplings"))]
        {
            for (from, to) in &self.ic_vec {
                from.propagate_into(&**to);
            }
            for (from, to) in &self.eoc_vec {
                from.propagate_into(&**to);
            }
        }
        Ok(())
    }

    /// Fans external input into children via EIC, runs `transition` on
    /// every child that is either imminent (from `collect`, just before)
    /// or was handed new input, re-schedules each under its new
    /// `time_next`, and recomputes `time_next` from the scheduler.
    fn transition(&mut self, t: f64) -> Result<(), DevsError> {
        let time_next = self.component.time_next();
        if t > time_next {
            return Err(DevsError::BadSynchronization {
                model: self.component.name().to_string(),
                t,
                time_last: self.component.time_last(),
                time_next,
            });
        }

        #[cfg(feature = "par_couplings")]
        self.eic_vec.par_iter().for_each(|(from, to)| from.propagate_into(&**to));
        #[cfg(not(feature = "par_couplings"))]
        for (from, to) in &self.eic_vec {
            from.propagate_into(&**to);
        }

        let imminent = std::mem::take(&mut self.imminent);
        let activated: Vec<usize> = (0..self.comps_vec.len())
            .filter(|idx| imminent.contains(idx) || !self.comps_vec[*idx].component().is_input_empty())
            .collect();

        #[cfg(feature = "par_transition")]
        self.comps_vec
            .par_iter_mut()
            .enumerate()
            .filter(|(idx, _)| activated.contains(idx))
            .try_for_each(|(_, child)| child.transition(t))?;
        #[cfg(not(feature = "par_transition"))]
        for &idx in &activated {
            self.comps_vec[idx].transition(t)?;
        }

        for &idx in &activated {
            let child = &mut self.comps_vec[idx];
            child.clear_ports();
            let new_time_next = child.time_next();
            self.scheduler.remove(&idx);
            self.scheduler.push(idx, new_time_next);
        }

        let time_next = self.scheduler.peek_priority().unwrap_or(f64::INFINITY);
        self.component.set_clock(t, time_next);
        Ok(())
    }

    fn clear_ports(&mut self) {
        self.component.clear_ports();
    }

    fn tear_down(&mut self) {
        #[cfg(feature = "par_stop")]
        self.comps_vec.par_iter_mut().for_each(|c| c.tear_down());
        #[cfg(not(feature = "par_stop"))]
        for child in &mut self.comps_vec {
            child.tear_down();
        }
    }

    fn stats(&self) -> StatsTree {
        let own = ModelStats {
            select_calls: self.component.stats.select_calls,
            ..ModelStats::default()
        };
        let children = self.comps_vec.iter().map(|c| c.stats()).collect();
        StatsTree::coupled(self.component.name(), own, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Cdevs;

    #[test]
    fn eic_ic_eoc_wiring_and_lookup_errors() {
        let mut top: Coupled<Cdevs> = Coupled::new("top");
        let _: Port<i32> = top.add_in_port("in");
        let _: Port<i32> = top.add_out_port("out");

        let mut a = Coupled::<Cdevs>::new("a");
        let _: Port<i32> = a.add_in_port("in");
        let _: Port<i32> = a.add_out_port("out");
        top.add_component(Box::new(a));

        top.add_eic("in", "a", "in");
        top.add_eoc("a", "out", "out");
        assert_eq!(top.eic_vec.len(), 1);
        assert_eq!(top.eoc_vec.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already has a child named")]
    fn duplicate_child_panics() {
        let mut top: Coupled<Cdevs> = Coupled::new("top");
        top.add_component(Box::new(Coupled::<Cdevs>::new("a")));
        top.add_component(Box::new(Coupled::<Cdevs>::new("a")));
    }

    #[test]
    #[should_panic(expected = "has no child named")]
    fn missing_child_panics() {
        let mut top: Coupled<Cdevs> = Coupled::new("top");
        let _: Port<i32> = top.add_in_port("in");
        top.add_eic("in", "missing", "in");
    }
}
