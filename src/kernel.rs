//! The simulation kernel.
//!
//! A [`Kernel`] owns everything a simulation needs: the model catalogue, the node registry, the
//! workers with their nodes and connections, the layers, the clock and the message ports.
//! Kernels are explicitly constructed and several kernels can coexist in one process.
//!
//! # Examples
//!
//! ```
//! use rusty_nest::connection::{Pattern, SynSpec};
//! use rusty_nest::kernel::Kernel;
//! use rusty_nest::config::KernelConfig;
//! use rusty_nest::status;
//!
//! let mut kernel = Kernel::new(KernelConfig::with_workers(2)).unwrap();
//! let generator = kernel
//!     .create("spike_generator", 1, &status! { "spike_times" => vec![1.0, 2.0, 3.0] })
//!     .unwrap();
//! let detector = kernel.create("spike_detector", 1, &status! {}).unwrap();
//! kernel
//!     .connect(&generator, &detector, Pattern::Divergent, &SynSpec::new(1.0, 1.0))
//!     .unwrap();
//! kernel.simulate(10.0).unwrap();
//! let n_events = kernel.get_status(&detector, "n_events").unwrap();
//! assert_eq!(n_events[0].as_i64(), Some(3));
//! ```
use log;
use nalgebra::Vector3;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender};

use crate::config::{KernelConfig, Verbosity};
use crate::connection::{Connection, Pattern, SynSpec, SynapseType};
use crate::distribution::{NodeSlot, SyncReport, Worker};
use crate::error::KernelError;
use crate::event::SpikeRecord;
use crate::message::{Message, MessageHub};
use crate::models::{CalibrateContext, ModelCatalogue, Node};
use crate::random::{layer_stream, KernelRng, CONNECT_STREAM_BASE};
use crate::registry::{NodeEntry, NodeId, NodeRegistry};
use crate::status::{Status, Value};
use crate::time::{Clock, Resolution, Step};
use crate::topology::{self, Layer, LayerConnSpec, LayerId, LayerSpec};

/// State of the event scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Ready for construction calls and simulation.
    Idle,
    /// A simulation run is in progress.
    Stepping,
    /// The clock overflowed; only a reset can recover the kernel.
    Invalidated,
}

/// Summary of the state of a kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelStatus {
    /// Current simulation time in ms.
    pub time: f64,
    /// Current step of the clock.
    pub steps: Step,
    pub num_nodes: usize,
    pub num_connections: usize,
    pub num_workers: usize,
    pub num_layers: usize,
    /// Length of one simulation step in ms.
    pub resolution: f64,
    /// Number of resets since the kernel was constructed.
    pub epoch: u64,
    /// Shortest and longest connection delays in ms, if there is any connection.
    pub min_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub state: SchedulerState,
}

/// Selects connections by source, target and synapse type. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionFilter {
    pub sources: Option<Vec<NodeId>>,
    pub targets: Option<Vec<NodeId>>,
    pub synapse: Option<SynapseType>,
}

impl ConnectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(mut self, sources: &[NodeId]) -> Self {
        self.sources = Some(sources.to_vec());
        self
    }

    pub fn with_targets(mut self, targets: &[NodeId]) -> Self {
        self.targets = Some(targets.to_vec());
        self
    }

    pub fn with_synapse(mut self, synapse: SynapseType) -> Self {
        self.synapse = Some(synapse);
        self
    }

    fn matches(&self, conn: &Connection) -> bool {
        self.sources.as_ref().map_or(true, |s| s.contains(&conn.source()))
            && self.targets.as_ref().map_or(true, |t| t.contains(&conn.target()))
            && self.synapse.map_or(true, |s| s == conn.synapse())
    }
}

#[derive(Debug)]
pub struct Kernel {
    config: KernelConfig,
    resolution: Resolution,
    verbosity: Verbosity,
    models: ModelCatalogue,
    registry: NodeRegistry,
    workers: Vec<Worker>,
    layers: Vec<Layer>,
    clock: Clock,
    pool: ThreadPool,
    ports: MessageHub,
    /// Identifier of the next connection.
    next_connection_id: u64,
    /// Number of successful connect calls since the last reset, used to select random streams.
    connect_calls: u64,
    state: SchedulerState,
    epoch: u64,
}

fn build_pool(num_workers: usize) -> Result<ThreadPool, KernelError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("kernel-worker-{}", i))
        .build()
        .map_err(|e| KernelError::InvalidConfiguration(e.to_string()))
}

impl Kernel {
    /// Create a new kernel.
    /// The function returns an error if the configuration is invalid.
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        let resolution = config.validate()?;
        let pool = build_pool(config.num_workers)?;
        let kernel = Kernel {
            verbosity: config.verbosity,
            resolution,
            models: ModelCatalogue::builtin(resolution),
            registry: NodeRegistry::default(),
            workers: (0..config.num_workers)
                .map(|rank| Worker::new(rank, resolution))
                .collect(),
            layers: vec![],
            clock: Clock::new(config.max_steps),
            pool,
            ports: MessageHub::new(),
            next_connection_id: 0,
            connect_calls: 0,
            state: SchedulerState::Idle,
            epoch: 0,
            config,
        };
        log::info!(
            "Kernel created with {} worker(s) at resolution {} ms",
            kernel.config.num_workers,
            kernel.resolution.ms()
        );
        Ok(kernel)
    }

    /// Reset the kernel: all nodes, connections, layers, model changes and ports are dropped and
    /// the clock restarts at zero. Handles keep counting, so that handles of the previous epoch
    /// are rejected as stale.
    pub fn reset(&mut self) {
        self.models = ModelCatalogue::builtin(self.resolution);
        self.registry = self.registry.next_epoch();
        self.workers = (0..self.config.num_workers)
            .map(|rank| Worker::new(rank, self.resolution))
            .collect();
        self.layers.clear();
        self.clock = Clock::new(self.config.max_steps);
        self.ports = MessageHub::new();
        self.next_connection_id = 0;
        self.connect_calls = 0;
        self.state = SchedulerState::Idle;
        self.verbosity = self.config.verbosity;
        self.epoch += 1;
        log::info!("Kernel reset (epoch {})", self.epoch);
    }

    /// Reset the kernel with a new configuration.
    /// On error, the kernel is left unchanged.
    pub fn reset_with(&mut self, config: KernelConfig) -> Result<(), KernelError> {
        let resolution = config.validate()?;
        if config.num_workers != self.config.num_workers {
            self.pool = build_pool(config.num_workers)?;
        }
        self.resolution = resolution;
        self.config = config;
        self.reset();
        Ok(())
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// Forward a message to the log if its level passes the verbosity threshold.
    pub fn message(&self, level: Verbosity, origin: &str, text: &str) {
        if level < self.verbosity {
            return;
        }
        if let Some(log_level) = level.log_level() {
            log::log!(log_level, "[{}] {}: {}", level, origin, text);
        }
    }

    fn check_valid(&self) -> Result<(), KernelError> {
        match self.state {
            SchedulerState::Invalidated => Err(KernelError::KernelInvalidated),
            _ => Ok(()),
        }
    }

    /// Returns the current simulation time in ms.
    pub fn time(&self) -> f64 {
        self.resolution.time_of(self.clock.now())
    }

    // Models

    /// Returns the names of all available models.
    pub fn models(&self) -> Vec<String> {
        self.models.names().map(String::from).collect()
    }

    /// Returns the current defaults of a model.
    pub fn get_defaults(&self, model: &str) -> Result<Status, KernelError> {
        self.check_valid()?;
        Ok(self.models.get(model)?.defaults().clone())
    }

    pub fn set_defaults(&mut self, model: &str, params: &Status) -> Result<(), KernelError> {
        self.check_valid()?;
        self.models.set_defaults(model, params)
    }

    pub fn copy_model(&mut self, existing: &str, new_name: &str, params: &Status) -> Result<(), KernelError> {
        self.check_valid()?;
        self.models.copy_model(existing, new_name, params)
    }

    // Nodes

    /// Build `n` nodes of a model without registering them.
    fn build_nodes(&self, model: &str, n: usize, params: &Status) -> Result<Vec<Box<dyn Node>>, KernelError> {
        let entry = self.models.get(model)?;
        entry.validate(params)?;
        (0..n)
            .map(|_| entry.instantiate(self.resolution, params))
            .collect()
    }

    /// Register nodes and hand them to their workers.
    fn commit_nodes(&mut self, model: &str, nodes: Vec<Box<dyn Node>>) -> Vec<NodeId> {
        let num_workers = self.workers.len();
        nodes
            .into_iter()
            .map(|node| {
                let index = self.registry.len();
                let id = self.registry.next_id();
                let worker = self.config.partition.worker_of(id, index, num_workers);
                self.registry.push(NodeEntry {
                    model: model.to_string(),
                    worker,
                    sends: node.sends(),
                });
                self.workers[worker].add_node(NodeSlot {
                    id,
                    node,
                    rng: KernelRng::new(self.config.rng_type, self.config.seed, id.0),
                });
                id
            })
            .collect()
    }

    /// Create `n` nodes of a model, with the model defaults overridden by `params`.
    /// Returns the handles of the new nodes, in ascending order.
    /// On error, no node is created.
    pub fn create(&mut self, model: &str, n: usize, params: &Status) -> Result<Vec<NodeId>, KernelError> {
        self.check_valid()?;
        let nodes = self.build_nodes(model, n, params)?;
        let ids = self.commit_nodes(model, nodes);
        log::debug!("Created {} node(s) of model {}", ids.len(), model);
        Ok(ids)
    }

    /// Returns the number of nodes created since the last reset.
    pub fn num_nodes(&self) -> usize {
        self.registry.len()
    }

    fn node(&self, id: NodeId) -> Result<&dyn Node, KernelError> {
        let entry = self.registry.get(id)?;
        self.workers[entry.worker]
            .node(id)
            .ok_or(KernelError::UnknownNode(id.0))
    }

    /// Apply parameters to several nodes.
    /// On error, no node is changed.
    pub fn set_status(&mut self, ids: &[NodeId], params: &Status) -> Result<(), KernelError> {
        self.check_valid()?;
        for &id in ids.iter() {
            let entry = self.registry.get(id)?;
            self.models.get(&entry.model)?.validate(params)?;
            self.node(id)?.check_status(params)?;
        }
        for &id in ids.iter() {
            let worker = self.registry.get(id)?.worker;
            if let Some(node) = self.workers[worker].node_mut(id) {
                node.set_status(params)?;
            }
        }
        Ok(())
    }

    /// Returns the value of a parameter or state variable of several nodes.
    pub fn get_status(&self, ids: &[NodeId], key: &str) -> Result<Vec<Value>, KernelError> {
        self.check_valid()?;
        ids.iter()
            .map(|&id| {
                let mut status = self.get_status_all(id)?;
                status.remove(key).ok_or_else(|| {
                    KernelError::InvalidParameter(format!("node {} has no parameter '{}'", id, key))
                })
            })
            .collect()
    }

    /// Returns the full status of a node, including its model, handle and worker.
    pub fn get_status_all(&self, id: NodeId) -> Result<Status, KernelError> {
        self.check_valid()?;
        let entry = self.registry.get(id)?;
        let mut status = Status::new();
        self.node(id)?.get_status(&mut status);
        status.insert("model".to_string(), Value::from(entry.model.as_str()));
        status.insert("global_id".to_string(), Value::from(id.0));
        status.insert("worker".to_string(), Value::from(entry.worker));
        Ok(status)
    }

    // Connections

    /// Check that every target can handle what its source emits.
    fn check_legal(&self, pairs: &[(NodeId, NodeId)], receptor: usize) -> Result<(), KernelError> {
        for &(source, target) in pairs.iter() {
            let kind = self.registry.get(source)?.sends.ok_or_else(|| {
                KernelError::IllegalConnection(format!(
                    "node {} ({}) emits no events",
                    source,
                    self.registry.get(source).map_or("?", |e| e.model.as_str())
                ))
            })?;
            let handled = self.node(target)?.handles(kind, receptor);
            if !handled {
                return Err(KernelError::IllegalConnection(format!(
                    "node {} ({}) cannot handle {:?} events from node {} on receptor {}",
                    target,
                    self.registry.get(target)?.model,
                    kind,
                    source,
                    receptor
                )));
            }
        }
        Ok(())
    }

    /// Store connections on the workers owning their targets.
    fn commit_connections(&mut self, connections: Vec<Connection>) -> Result<usize, KernelError> {
        let n = connections.len();
        let mut batches: Vec<Vec<Connection>> = vec![vec![]; self.workers.len()];
        for conn in connections {
            let worker = self.registry.get(conn.target())?.worker;
            batches[worker].push(conn);
        }
        for (worker, batch) in self.workers.iter_mut().zip(batches) {
            worker.append_connections(batch);
        }
        self.next_connection_id += n as u64;
        self.connect_calls += 1;
        Ok(n)
    }

    /// Connect explicit (source, target) pairs.
    /// Returns the number of new connections. On error, no connection is created.
    pub fn connect_pairs(&mut self, pairs: &[(NodeId, NodeId)], syn_spec: &SynSpec) -> Result<usize, KernelError> {
        self.check_valid()?;
        for &(source, target) in pairs.iter() {
            self.registry.index_of(source)?;
            self.registry.index_of(target)?;
        }
        self.check_legal(pairs, syn_spec.receptor)?;
        let mut rng = KernelRng::new(
            self.config.rng_type,
            self.config.seed,
            CONNECT_STREAM_BASE + self.connect_calls,
        );
        let connections = syn_spec.build_all(pairs, self.next_connection_id, &self.resolution, &mut rng)?;
        let n = self.commit_connections(connections)?;
        log::debug!("Created {} connection(s)", n);
        Ok(n)
    }

    /// Connect sources to targets following a pattern.
    /// Returns the number of new connections. On error, no connection is created.
    pub fn connect(
        &mut self,
        sources: &[NodeId],
        targets: &[NodeId],
        pattern: Pattern,
        syn_spec: &SynSpec,
    ) -> Result<usize, KernelError> {
        self.check_valid()?;
        self.registry.check_all(sources)?;
        self.registry.check_all(targets)?;
        let pairs = pattern.expand(sources, targets)?;
        self.connect_pairs(&pairs, syn_spec)
    }

    /// Connect each source to all targets with the given weight and delay.
    pub fn divergent_connect(
        &mut self,
        sources: &[NodeId],
        targets: &[NodeId],
        weight: f64,
        delay: f64,
    ) -> Result<usize, KernelError> {
        self.connect(sources, targets, Pattern::Divergent, &SynSpec::new(weight, delay))
    }

    /// Connect each target to all sources with the given weight and delay.
    pub fn convergent_connect(
        &mut self,
        sources: &[NodeId],
        targets: &[NodeId],
        weight: f64,
        delay: f64,
    ) -> Result<usize, KernelError> {
        self.connect(sources, targets, Pattern::Convergent, &SynSpec::new(weight, delay))
    }

    /// Returns the connections matching a filter, sorted by source, target, weight and delay.
    pub fn connections(&self, filter: &ConnectionFilter) -> Result<Vec<Connection>, KernelError> {
        self.check_valid()?;
        let mut connections: Vec<Connection> = self
            .workers
            .iter()
            .flat_map(|worker| worker.connections().iter())
            .filter(|conn| filter.matches(conn))
            .cloned()
            .collect();
        connections.sort_by(|a, b| {
            a.source()
                .cmp(&b.source())
                .then(a.target().cmp(&b.target()))
                .then(a.weight().total_cmp(&b.weight()))
                .then(a.delay().total_cmp(&b.delay()))
                .then(a.id().cmp(&b.id()))
        });
        Ok(connections)
    }

    /// Returns the number of connections created since the last reset.
    pub fn num_connections(&self) -> usize {
        self.workers.iter().map(|w| w.connections().len()).sum()
    }

    // Topology

    /// Create a layer of nodes on a grid.
    /// On error, no node is created.
    pub fn create_layer(&mut self, spec: LayerSpec) -> Result<LayerId, KernelError> {
        self.check_valid()?;
        spec.validate()?;
        let mut groups = vec![];
        for (model, multiplicity) in spec.elements.iter() {
            let n = multiplicity * spec.rows * spec.columns * spec.depth.unwrap_or(1);
            groups.push((model.clone(), self.build_nodes(model, n, &spec.params)?));
        }
        let ids: Vec<NodeId> = groups
            .into_iter()
            .flat_map(|(model, nodes)| self.commit_nodes(&model, nodes))
            .collect();
        let id = LayerId(self.layers.len());
        log::debug!("Created layer {} with {} node(s)", id.0, ids.len());
        self.layers.push(Layer::new(id, spec, ids));
        Ok(id)
    }

    /// Returns a layer.
    pub fn layer(&self, id: LayerId) -> Result<&Layer, KernelError> {
        self.check_valid()?;
        self.layers.get(id.0).ok_or(KernelError::UnknownLayer(id.0))
    }

    /// Returns the nodes of a layer, in creation order.
    pub fn layer_nodes(&self, id: LayerId) -> Result<Vec<NodeId>, KernelError> {
        Ok(self.layer(id)?.nodes().to_vec())
    }

    /// Returns the positions of the nodes of a layer, in creation order.
    pub fn layer_positions(&self, id: LayerId) -> Result<Vec<Vector3<f64>>, KernelError> {
        Ok(self.layer(id)?.positions().to_vec())
    }

    /// Returns the displacement between two nodes of a layer, taking periodic boundaries into account.
    pub fn layer_displacement(&self, id: LayerId, from: NodeId, to: NodeId) -> Result<Vector3<f64>, KernelError> {
        let layer = self.layer(id)?;
        Ok(layer.displacement(&layer.position(from)?, &layer.position(to)?))
    }

    /// Returns the distance between two nodes of a layer, taking periodic boundaries into account.
    pub fn layer_distance(&self, id: LayerId, from: NodeId, to: NodeId) -> Result<f64, KernelError> {
        Ok(self.layer_displacement(id, from, to)?.norm())
    }

    /// Connect two layers.
    /// Returns the number of new connections. On error, no connection is created.
    pub fn connect_layers(
        &mut self,
        source: LayerId,
        target: LayerId,
        spec: &LayerConnSpec,
    ) -> Result<usize, KernelError> {
        let source_layer = self.layer(source)?;
        let target_layer = self.layer(target)?;
        let (rng_type, seed, call) = (self.config.rng_type, self.config.seed, self.connect_calls);
        let rng_of = move |id: NodeId| KernelRng::new(rng_type, seed, layer_stream(call, id.0));
        let projections = self.pool.install(|| {
            topology::connect::connect_layers(source_layer, target_layer, spec, rng_of)
        })?;

        let pairs: Vec<(NodeId, NodeId)> = projections.iter().map(|p| (p.source, p.target)).collect();
        self.check_legal(&pairs, spec.receptor)?;
        let connections = projections
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                Connection::build(
                    self.next_connection_id + i as u64,
                    p.source,
                    p.target,
                    spec.receptor,
                    p.weight,
                    p.delay,
                    spec.synapse,
                    &self.resolution,
                )
            })
            .collect::<Result<Vec<Connection>, KernelError>>()?;
        let n = self.commit_connections(connections)?;
        log::debug!("Connected layer {} to layer {} with {} connection(s)", source.0, target.0, n);
        Ok(n)
    }

    // Scheduling

    /// Index pending connections on every worker and size their ring buffers.
    pub fn sync(&mut self) -> Result<SyncReport, KernelError> {
        self.check_valid()?;
        let flushed = self.workers.iter_mut().map(Worker::sync).sum();
        Ok(SyncReport {
            flushed,
            connections_per_worker: self.workers.iter().map(|w| w.connections().len()).collect(),
            nodes_per_worker: self.workers.iter().map(Worker::num_nodes).collect(),
        })
    }

    /// Simulate for the given duration in ms, truncated to a whole number of steps.
    ///
    /// The function returns an error if the duration is negative, or if the clock would run past
    /// its maximum step. The latter invalidates the kernel until it is reset.
    pub fn simulate(&mut self, duration: f64) -> Result<(), KernelError> {
        self.check_valid()?;
        let steps = self.resolution.steps_in(duration)?;
        if let Err(e) = self.clock.check_advance(steps) {
            self.state = SchedulerState::Invalidated;
            self.message(Verbosity::Fatal, "simulate", &e.to_string());
            return Err(e);
        }

        self.sync()?;
        let mut ctx = CalibrateContext {
            now: self.clock.now(),
            ports: &mut self.ports,
        };
        for worker in self.workers.iter_mut() {
            worker.calibrate(&mut ctx)?;
        }

        self.state = SchedulerState::Stepping;
        let start = self.clock.now();
        self.message(
            Verbosity::Info,
            "simulate",
            &format!(
                "Simulating {} steps from t = {} ms on {} worker(s)...",
                steps,
                self.time(),
                self.workers.len()
            ),
        );

        // For logging purposes
        let log_interval = (steps / 10).max(1);

        for i in 0..steps {
            let step = self.clock.now();
            let records = self.deliver_and_update(step);
            self.route(&records);
            self.clock.tick();
            if (i + 1) % log_interval == 0 {
                log::debug!("Simulated {} / {} steps", i + 1, steps);
            }
        }

        self.state = SchedulerState::Idle;
        self.message(
            Verbosity::Info,
            "simulate",
            &format!(
                "Simulation finished at t = {} ms ({} steps)",
                self.time(),
                self.clock.now() - start
            ),
        );
        Ok(())
    }

    /// First phase of a step: every worker delivers its due events and updates its nodes.
    /// Returns all emissions, gathered from all workers.
    fn deliver_and_update(&mut self, step: Step) -> Vec<SpikeRecord> {
        if self.workers.len() > 1 {
            let workers = &mut self.workers;
            self.pool.install(|| {
                workers
                    .par_iter_mut()
                    .map(|worker| worker.deliver_and_update(step))
                    .collect::<Vec<Vec<SpikeRecord>>>()
                    .concat()
            })
        } else {
            self.workers
                .iter_mut()
                .flat_map(|worker| worker.deliver_and_update(step))
                .collect()
        }
    }

    /// Second phase of a step: every worker files the events caused by all emissions.
    fn route(&mut self, records: &[SpikeRecord]) {
        if records.is_empty() {
            return;
        }
        if self.workers.len() > 1 {
            let workers = &mut self.workers;
            self.pool
                .install(|| workers.par_iter_mut().for_each(|worker| worker.route(records)));
        } else {
            self.workers.iter_mut().for_each(|worker| worker.route(records));
        }
    }

    /// Returns a summary of the kernel state.
    pub fn status(&self) -> KernelStatus {
        let delays = self
            .workers
            .iter()
            .flat_map(|w| w.connections().iter())
            .map(Connection::delay);
        let (min_delay, max_delay) = delays.fold((None, None), |(min, max): (Option<f64>, Option<f64>), d| {
            (
                Some(min.map_or(d, |m| m.min(d))),
                Some(max.map_or(d, |m| m.max(d))),
            )
        });
        KernelStatus {
            time: self.time(),
            steps: self.clock.now(),
            num_nodes: self.num_nodes(),
            num_connections: self.num_connections(),
            num_workers: self.workers.len(),
            num_layers: self.layers.len(),
            resolution: self.resolution.ms(),
            epoch: self.epoch,
            min_delay,
            max_delay,
            state: self.state,
        }
    }

    // Message ports

    /// Returns a sender feeding the input port of the given name.
    pub fn message_port_sender(&mut self, port: &str) -> Result<Sender<Message>, KernelError> {
        self.check_valid()?;
        Ok(self.ports.input_sender(port))
    }

    /// Returns the receiver of the output port of the given name. It can only be taken once per epoch.
    pub fn message_port_receiver(&mut self, port: &str) -> Result<Receiver<Message>, KernelError> {
        self.check_valid()?;
        self.ports.output_receiver(port)
    }
}
