//! Node models and the model catalogue.
//!
//! A model is a plugin consumed by the kernel: it declares a parameter schema, provides default
//! values and builds nodes implementing the [`Node`] trait. Each model lives in its own submodule.
use log;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::KernelError;
use crate::event::{Emission, Event, EventKind};
use crate::message::MessageHub;
use crate::random::KernelRng;
use crate::status::{validate, Access, ParamSpec, Scope, Status};
use crate::time::{Resolution, Step};

pub mod device;
pub mod iaf_neuron;
pub mod message_proxy;
pub mod noise_generator;
pub mod parrot_neuron;
pub mod sinusoidal_poisson_generator;
pub mod spike_detector;
pub mod spike_generator;
pub mod step_current_generator;

/// What a node can access when it is prepared for a simulation run.
pub struct CalibrateContext<'a> {
    /// The current step, i.e., the first step of the upcoming run.
    pub now: Step,
    /// The message ports of the kernel.
    pub ports: &'a mut MessageHub,
}

/// What a node can access during the update of a single step.
pub struct UpdateContext<'a> {
    /// The step being updated, i.e., the interval `(step*h, (step+1)*h]`.
    pub step: Step,
    /// The random stream of the node.
    pub rng: &'a mut KernelRng,
}

/// A simulation entity, i.e., a neuron or a device.
pub trait Node: Send + fmt::Debug {
    /// Write all parameters and state variables of the node into `status`.
    fn get_status(&self, status: &mut Status);

    /// Check whether a (schema-validated) status can be applied, without applying it.
    fn check_status(&self, status: &Status) -> Result<(), KernelError>;

    /// Apply a (schema-validated) status. On failure, the node is left unchanged.
    fn set_status(&mut self, status: &Status) -> Result<(), KernelError>;

    /// Returns the kind of event the node emits, if any.
    fn sends(&self) -> Option<EventKind> {
        None
    }

    /// Returns true if the node accepts events of the given kind on the given receptor port.
    fn handles(&self, _kind: EventKind, _receptor: usize) -> bool {
        false
    }

    /// Prepare the node for a simulation run.
    fn calibrate(&mut self, _ctx: &mut CalibrateContext) -> Result<(), KernelError> {
        Ok(())
    }

    /// Handle an event delivered at the current step.
    fn handle(&mut self, _event: &Event) {}

    /// Advance the node by one step, returning what it emits.
    /// Spikes at distinct offsets within the step are returned as separate emissions, earliest first.
    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission>;
}

/// Creates a node with its built-in defaults.
pub type BuildFn = fn(Resolution) -> Box<dyn Node>;

/// A registered model: its schema, current defaults and a constructor.
#[derive(Clone)]
pub struct ModelEntry {
    pub name: String,
    pub schema: &'static [ParamSpec],
    defaults: Status,
    build: BuildFn,
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl ModelEntry {
    /// Register a model. Defaults are read from a prototype node.
    pub fn new(name: &str, schema: &'static [ParamSpec], build: BuildFn, resolution: Resolution) -> Self {
        let mut status = Status::new();
        build(resolution).get_status(&mut status);
        let defaults = status
            .into_iter()
            .filter(|(key, _)| {
                schema
                    .iter()
                    .any(|spec| spec.name == key && spec.access != Access::ReadOnly)
            })
            .collect();
        ModelEntry {
            name: name.to_string(),
            schema,
            defaults,
            build,
        }
    }

    /// Returns the current defaults of the model.
    pub fn defaults(&self) -> &Status {
        &self.defaults
    }

    /// Check instance parameters against the schema of the model.
    pub fn validate(&self, params: &Status) -> Result<(), KernelError> {
        validate(self.schema, &self.name, params, Scope::Instance)
    }

    /// Build a node from the defaults overridden by the given parameters.
    /// The parameters must have been validated with [`ModelEntry::validate`].
    pub fn instantiate(&self, resolution: Resolution, params: &Status) -> Result<Box<dyn Node>, KernelError> {
        let mut status = self.defaults.clone();
        status.extend(params.iter().map(|(key, value)| (key.clone(), value.clone())));
        let mut node = (self.build)(resolution);
        node.set_status(&status)?;
        Ok(node)
    }

    /// Returns a copy of the model with updated defaults.
    fn with_defaults(&self, name: &str, params: &Status, resolution: Resolution) -> Result<Self, KernelError> {
        validate(self.schema, name, params, Scope::Defaults)?;
        let mut defaults = self.defaults.clone();
        defaults.extend(params.iter().map(|(key, value)| (key.clone(), value.clone())));
        // Cross-parameter constraints are checked by building a prototype.
        (self.build)(resolution).set_status(&defaults)?;
        Ok(ModelEntry {
            name: name.to_string(),
            schema: self.schema,
            defaults,
            build: self.build,
        })
    }
}

/// The catalogue of models available to a kernel.
#[derive(Debug, Clone)]
pub struct ModelCatalogue {
    resolution: Resolution,
    models: BTreeMap<String, ModelEntry>,
}

impl ModelCatalogue {
    /// Returns an empty catalogue.
    pub fn new(resolution: Resolution) -> Self {
        ModelCatalogue {
            resolution,
            models: BTreeMap::new(),
        }
    }

    /// Returns the catalogue of all built-in models.
    pub fn builtin(resolution: Resolution) -> Self {
        let mut catalogue = Self::new(resolution);
        catalogue.register(iaf_neuron::NAME, iaf_neuron::SCHEMA, iaf_neuron::build);
        catalogue.register(parrot_neuron::NAME, parrot_neuron::SCHEMA, parrot_neuron::build);
        catalogue.register(spike_generator::NAME, spike_generator::SCHEMA, spike_generator::build);
        catalogue.register(noise_generator::NAME, noise_generator::SCHEMA, noise_generator::build);
        catalogue.register(
            step_current_generator::NAME,
            step_current_generator::SCHEMA,
            step_current_generator::build,
        );
        catalogue.register(
            sinusoidal_poisson_generator::NAME,
            sinusoidal_poisson_generator::SCHEMA,
            sinusoidal_poisson_generator::build,
        );
        catalogue.register(spike_detector::NAME, spike_detector::SCHEMA, spike_detector::build);
        catalogue.register(
            message_proxy::IN_NAME,
            message_proxy::IN_SCHEMA,
            message_proxy::build_in,
        );
        catalogue.register(
            message_proxy::OUT_NAME,
            message_proxy::OUT_SCHEMA,
            message_proxy::build_out,
        );
        catalogue
    }

    /// Register a model under the given name, replacing any model with the same name.
    pub fn register(&mut self, name: &str, schema: &'static [ParamSpec], build: BuildFn) {
        self.models.insert(
            name.to_string(),
            ModelEntry::new(name, schema, build, self.resolution),
        );
    }

    /// Returns the model with the given name.
    pub fn get(&self, name: &str) -> Result<&ModelEntry, KernelError> {
        self.models
            .get(name)
            .ok_or_else(|| KernelError::UnknownModel(name.to_string()))
    }

    /// Returns the names of all models, in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.models.keys().map(String::as_str)
    }

    /// Change the defaults of a model. On failure, the model is left unchanged.
    pub fn set_defaults(&mut self, name: &str, params: &Status) -> Result<(), KernelError> {
        let updated = self.get(name)?.with_defaults(name, params, self.resolution)?;
        self.models.insert(name.to_string(), updated);
        log::debug!("Defaults of model {} updated", name);
        Ok(())
    }

    /// Register a copy of an existing model under a new name, with updated defaults.
    /// Returns an error if the new name is already taken.
    pub fn copy_model(&mut self, existing: &str, new_name: &str, params: &Status) -> Result<(), KernelError> {
        if self.models.contains_key(new_name) {
            return Err(KernelError::InvalidParameter(format!(
                "a model named '{}' already exists",
                new_name
            )));
        }
        let copy = self.get(existing)?.with_defaults(new_name, params, self.resolution)?;
        self.models.insert(new_name.to_string(), copy);
        log::debug!("Model {} copied to {}", existing, new_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status;
    use crate::status::get_f64;

    #[test]
    fn test_builtin_models() {
        let catalogue = ModelCatalogue::builtin(Resolution::default());
        for name in [
            "iaf_neuron",
            "parrot_neuron",
            "spike_generator",
            "noise_generator",
            "step_current_generator",
            "sinusoidal_poisson_generator",
            "spike_detector",
            "message_in_proxy",
            "message_out_proxy",
        ] {
            let model = catalogue.get(name).unwrap();
            assert!(model.instantiate(Resolution::default(), &Status::new()).is_ok());
        }
        assert_eq!(
            catalogue.get("aeif_cond_exp").unwrap_err(),
            KernelError::UnknownModel("aeif_cond_exp".to_string())
        );
    }

    #[test]
    fn test_set_defaults() {
        let mut catalogue = ModelCatalogue::builtin(Resolution::default());
        catalogue
            .set_defaults("iaf_neuron", &status! { "tau_m" => 20.0 })
            .unwrap();
        assert_eq!(get_f64(catalogue.get("iaf_neuron").unwrap().defaults(), "tau_m"), Some(20.0));

        // V_reset must stay below V_th
        assert!(catalogue
            .set_defaults("iaf_neuron", &status! { "V_reset" => -50.0 })
            .is_err());
        assert_eq!(get_f64(catalogue.get("iaf_neuron").unwrap().defaults(), "V_reset"), Some(-70.0));
    }

    #[test]
    fn test_copy_model() {
        let mut catalogue = ModelCatalogue::builtin(Resolution::default());
        catalogue
            .copy_model(
                "sinusoidal_poisson_generator",
                "shared_poisson",
                &status! { "individual_spike_trains" => false },
            )
            .unwrap();
        let model = catalogue.get("shared_poisson").unwrap();
        assert_eq!(model.name, "shared_poisson");
        assert_eq!(
            model.defaults().get("individual_spike_trains").and_then(|v| v.as_bool()),
            Some(false)
        );
        assert!(catalogue
            .copy_model("iaf_neuron", "shared_poisson", &Status::new())
            .is_err());
        assert!(matches!(
            catalogue.copy_model("nope", "other", &Status::new()),
            Err(KernelError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_instance_cannot_set_defaults_only() {
        let catalogue = ModelCatalogue::builtin(Resolution::default());
        let model = catalogue.get("sinusoidal_poisson_generator").unwrap();
        assert!(model
            .validate(&status! { "individual_spike_trains" => false })
            .is_err());
    }
}
