//! Standalone demonstration binary: not part of the kernel's public API
//! (see SPEC_FULL.md §6), it only exercises `xdevs-kernel` as a library
//! consumer the way the teacher crate's own `main.rs` exercises DEVStone.
//!
//! Builds the two-generator/one-receiver model from spec.md §8 flat or
//! hierarchical, under either formalism, runs it to quiescence, and
//! prints the resulting stats tree and wall-clock timings.
//!
//! USAGE: `cargo run --bin gen_recv_demo -- <cdevs|pdevs> <flat|hier>`

use std::cell::Cell;
use std::env;
use std::time::Instant;
use xdevs_kernel::model::{AtomicModel, Component};
use xdevs_kernel::{Cdevs, Coupled, Formalism, Pdevs, Port, RootCoordinator};

#[derive(Debug)]
struct Generator {
    component: Component,
    out: Port<i32>,
    fired: Cell<bool>,
}

impl Generator {
    fn new(name: &str) -> Self {
        let mut component = Component::new(name);
        let out = component.add_out_port("out");
        Self {
            component,
            out,
            fired: Cell::new(false),
        }
    }
}

impl AtomicModel for Generator {
    fn component(&self) -> &Component {
        &self.component
    }
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
    fn sigma(&self) -> f64 {
        if self.fired.get() {
            f64::INFINITY
        } else {
            1.0
        }
    }
    fn lambda(&self) {
        self.out.add_value(1);
    }
    fn delta_int(&mut self) {
        self.fired.set(true);
    }
    fn delta_ext(&mut self, _e: f64) {}
}

#[derive(Debug)]
struct Receiver {
    component: Component,
    r#in: Port<i32>,
    received: Cell<u64>,
}

impl Receiver {
    fn new(name: &str) -> Self {
        let mut component = Component::new(name);
        let r#in = component.add_in_port("in");
        Self {
            component,
            r#in,
            received: Cell::new(0),
        }
    }
}

impl AtomicModel for Receiver {
    fn component(&self) -> &Component {
        &self.component
    }
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
    fn lambda(&self) {}
    fn delta_int(&mut self) {}
    fn delta_ext(&mut self, _e: f64) {
        let bag = self.r#in.values();
        self.received.set(self.received.get() + bag.len() as u64);
    }
}

fn flat_model<F: Formalism>() -> Coupled<F> {
    let mut top: Coupled<F> = Coupled::new("top");
    top.add_component(Box::new(Generator::new("G1")));
    top.add_component(Box::new(Generator::new("G2")));
    top.add_component(Box::new(Receiver::new("R")));
    top.add_ic("G1", "out", "R", "in");
    top.add_ic("G2", "out", "R", "in");
    top
}

fn hierarchical_model<F: Formalism>() -> Coupled<F> {
    let mut gen: Coupled<F> = Coupled::new("gen");
    gen.add_out_port::<i32>("out");
    gen.add_component(Box::new(Generator::new("G1")));
    gen.add_component(Box::new(Generator::new("G2")));
    gen.add_eoc("G1", "out", "out");
    gen.add_eoc("G2", "out", "out");

    let mut top: Coupled<F> = Coupled::new("top");
    top.add_component(Box::new(gen));
    top.add_component(Box::new(Receiver::new("R")));
    top.add_ic("gen", "out", "R", "in");
    top
}

fn run<F: Formalism>(coupled: Coupled<F>) {
    let start = Instant::now();
    let mut root = RootCoordinator::new(coupled);
    let build_time = start.elapsed();

    let start = Instant::now();
    root.simulate(f64::INFINITY).expect("simulation aborted");
    let sim_time = start.elapsed();

    println!("coordinator build time: {build_time:?}");
    println!("simulation time: {sim_time:?}");
    println!("{:#?}", root.stats());
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let formalism = args
        .get(1)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "pdevs".to_string());
    let topology = args
        .get(2)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "flat".to_string());

    match (formalism.as_str(), topology.as_str()) {
        ("cdevs", "flat") => run::<Cdevs>(flat_model()),
        ("cdevs", "hier") => run::<Cdevs>(hierarchical_model()),
        ("pdevs", "flat") => run::<Pdevs>(flat_model()),
        ("pdevs", "hier") => run::<Pdevs>(hierarchical_model()),
        _ => panic!("usage: gen_recv_demo <cdevs|pdevs> <flat|hier>"),
    }
}
