//! This crate provides a discrete-time kernel for simulating spiking neural networks in Rust.
//!
//! Networks are built by creating nodes (neurons and devices) from a catalogue of models,
//! connecting them either pairwise with patterns or spatially with layers, masks and distance
//! dependent kernels, and simulating them in fixed time steps on a pool of parallel workers.
//! Results only depend on the seed and on the order in which nodes and connections are created,
//! not on the number of workers.
//!
//! # Building and Simulating Networks
//!
//! ```rust
//! use rusty_nest::config::KernelConfig;
//! use rusty_nest::kernel::Kernel;
//! use rusty_nest::status;
//!
//! // Init a kernel with 2 workers
//! let mut kernel = Kernel::new(KernelConfig::with_workers(2)).unwrap();
//!
//! // Drive a population of neurons with a noisy current and record their spikes
//! let neurons = kernel.create("iaf_neuron", 10, &status! {}).unwrap();
//! let noise = kernel.create("noise_generator", 1, &status! { "mean" => 500.0, "std" => 50.0 }).unwrap();
//! let detector = kernel.create("spike_detector", 1, &status! {}).unwrap();
//! kernel.divergent_connect(&noise, &neurons, 1.0, 1.0).unwrap();
//! kernel.convergent_connect(&neurons, &detector, 1.0, 1.0).unwrap();
//!
//! kernel.simulate(100.0).unwrap();
//! let n_events = kernel.get_status(&detector, "n_events").unwrap()[0].as_i64().unwrap();
//! assert!(n_events > 0);
//!
//! // Read and clear the recorder
//! kernel.set_status(&detector, &status! { "n_events" => 0 }).unwrap();
//! assert_eq!(kernel.get_status(&detector, "n_events").unwrap()[0].as_i64(), Some(0));
//! ```
//!
//! # Spatial Networks
//!
//! ```rust
//! use rusty_nest::config::KernelConfig;
//! use rusty_nest::kernel::Kernel;
//! use rusty_nest::topology::{ConnectionType, DistanceParameter, LayerConnSpec, LayerSpec, Mask, MaskSpec};
//!
//! let mut kernel = Kernel::new(KernelConfig::default()).unwrap();
//!
//! // A 10 x 10 grid of neurons on a torus
//! let layer = kernel
//!     .create_layer(LayerSpec::grid(10, 10).with_element("iaf_neuron", 1).with_edge_wrap(true))
//!     .unwrap();
//!
//! // Connect each neuron to its 4 nearest neighbors, with weights decreasing with distance
//! let spec = LayerConnSpec::new(ConnectionType::Divergent)
//!     .with_mask(MaskSpec::new(Mask::Circular { radius: 0.11 }))
//!     .with_weights(DistanceParameter::Linear { a: -1.0, c: 1.0 })
//!     .with_autapses(false);
//! assert_eq!(kernel.connect_layers(layer, layer, &spec).unwrap(), 400);
//! ```
pub mod config;
pub mod connection;
pub mod distribution;
pub mod error;
pub mod event;
pub mod kernel;
pub mod message;
pub mod models;
pub mod random;
pub mod registry;
pub mod status;
pub mod time;
pub mod topology;
