use crate::model::port::{Direction, ErasedPort, Port};
use crate::stats::ModelStats;
use crate::{DevsError, MaybeSendSync, Shared};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Static structure shared by every processor: a name, its port tables,
/// and the clock fields the simulation protocol maintains
/// (`time_last <= current_time <= time_next` between step boundaries).
///
/// The teacher crate keeps these clock fields directly on its `Model`/
/// `Component` struct rather than on a separate processor wrapper; this
/// crate follows that precedent; conceptually they belong to the
/// "processor" twin of the model (spec. §3), but there is no benefit in
/// Rust to splitting them into a second struct when every processor is a
/// model plus these two numbers.
#[derive(Debug)]
pub struct Component {
    name: String,
    time_last: f64,
    time_next: f64,
    input_map: HashMap<String, usize>,
    output_map: HashMap<String, usize>,
    input_ports: Vec<Shared<dyn ErasedPort>>,
    output_ports: Vec<Shared<dyn ErasedPort>>,
    pub(crate) stats: ModelStats,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            time_last: 0.,
            time_next: f64::INFINITY,
            input_map: HashMap::new(),
            output_map: HashMap::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            stats: ModelStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_last(&self) -> f64 {
        self.time_last
    }

    pub fn time_next(&self) -> f64 {
        self.time_next
    }

    pub(crate) fn set_clock(&mut self, time_last: f64, time_next: f64) {
        self.time_last = time_last;
        self.time_next = time_next;
    }

    /// Adds a new input port of type `Port<T>`. Panics if the component
    /// already has an input port with this name.
    pub fn add_in_port<T: 'static + Clone + Debug + MaybeSendSync>(
        &mut self,
        name: &str,
    ) -> Port<T> {
        self.add_port(name, Direction::Input)
    }

    /// Adds a new output port of type `Port<T>`. Panics if the component
    /// already has an output port with this name.
    pub fn add_out_port<T: 'static + Clone + Debug + MaybeSendSync>(
        &mut self,
        name: &str,
    ) -> Port<T> {
        self.add_port(name, Direction::Output)
    }

    fn add_port<T: 'static + Clone + Debug + MaybeSendSync>(
        &mut self,
        name: &str,
        direction: Direction,
    ) -> Port<T> {
        let (map, vec) = match direction {
            Direction::Input => (&mut self.input_map, &mut self.input_ports),
            Direction::Output => (&mut self.output_map, &mut self.output_ports),
        };
        if map.contains_key(name) {
            panic!(
                "component '{}' already contains {:?} port named '{}'",
                self.name, direction, name
            );
        }
        let port = Port::<T>::new(name, &self.name, direction);
        map.insert(name.to_string(), vec.len());
        vec.push(port.0.clone());
        port
    }

    pub fn try_get_in_port(&self, name: &str) -> Result<Shared<dyn ErasedPort>, DevsError> {
        self.get_port(&self.input_map, &self.input_ports, name)
    }

    pub fn try_get_out_port(&self, name: &str) -> Result<Shared<dyn ErasedPort>, DevsError> {
        self.get_port(&self.output_map, &self.output_ports, name)
    }

    fn get_port(
        &self,
        map: &HashMap<String, usize>,
        vec: &[Shared<dyn ErasedPort>],
        name: &str,
    ) -> Result<Shared<dyn ErasedPort>, DevsError> {
        let i = *map.get(name).ok_or_else(|| DevsError::UnknownPort {
            model: self.name.clone(),
            port: name.to_string(),
        })?;
        Ok(vec[i].clone())
    }

    /// Panicking counterpart of [`Component::try_get_in_port`], used by
    /// builder-time methods where an unknown port is a programmer error
    /// caught as early as possible.
    pub fn get_in_port(&self, name: &str) -> Shared<dyn ErasedPort> {
        self.try_get_in_port(name)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn get_out_port(&self, name: &str) -> Shared<dyn ErasedPort> {
        self.try_get_out_port(name)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn is_input_empty(&self) -> bool {
        self.input_ports.iter().all(|p| p.is_empty())
    }

    pub fn is_output_empty(&self) -> bool {
        self.output_ports.iter().all(|p| p.is_empty())
    }

    /// Total number of values currently buffered across every input
    /// port, used to count `messages_in` for [`ModelStats`] — a bag of
    /// 3 values on one port counts as 3, matching PDEVS's per-value
    /// accounting rather than per-port.
    pub(crate) fn input_len(&self) -> u64 {
        self.input_ports.iter().map(|p| p.len() as u64).sum()
    }

    pub(crate) fn output_len(&self) -> u64 {
        self.output_ports.iter().map(|p| p.len() as u64).sum()
    }

    pub fn clear_input(&mut self) {
        self.input_ports.iter().for_each(|p| p.clear());
    }

    pub fn clear_output(&mut self) {
        self.output_ports.iter().for_each(|p| p.clear());
    }

    pub fn clear_ports(&mut self) {
        self.clear_input();
        self.clear_output();
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ports_error() {
        let c = Component::new("a");
        assert!(matches!(
            c.try_get_in_port("missing"),
            Err(DevsError::UnknownPort { .. })
        ));
        assert!(matches!(
            c.try_get_out_port("missing"),
            Err(DevsError::UnknownPort { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "already contains Input port named 'x'")]
    fn duplicate_in_port_panics() {
        let mut c = Component::new("a");
        let _: Port<i32> = c.add_in_port("x");
        let _: Port<i32> = c.add_in_port("x");
    }

    #[test]
    #[should_panic(expected = "already contains Output port named 'x'")]
    fn duplicate_out_port_panics() {
        let mut c = Component::new("a");
        let _: Port<i32> = c.add_out_port("x");
        let _: Port<f64> = c.add_out_port("x");
    }

    #[test]
    fn ports_and_clearing() {
        let mut c = Component::new("a");
        let in_i32: Port<i32> = c.add_in_port("i");
        let out_i32: Port<i32> = c.add_out_port("o");

        assert!(c.is_input_empty());
        assert!(c.is_output_empty());

        out_i32.add_value(1);
        assert!(!c.is_output_empty());
        c.clear_output();
        assert!(c.is_output_empty());

        in_i32.add_value(2);
        assert!(!c.is_input_empty());
        c.clear_input();
        assert!(c.is_input_empty());
    }
}
