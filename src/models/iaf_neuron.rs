//! Leaky integrate-and-fire neuron.
//!
//! The membrane potential relaxes towards `E_L` with time constant `tau_m` and integrates the
//! constant current `I_e` and the currents delivered at each step. The subthreshold dynamics are
//! integrated exactly over one step. Incoming spikes make the potential jump by their weight
//! (in mV) times their multiplicity. When the potential reaches `V_th`, the neuron fires, is
//! reset to `V_reset` and stays refractory for `t_ref` ms.
use crate::error::KernelError;
use crate::event::{Emission, Event, EventKind, Signal};
use crate::models::{Node, UpdateContext};
use crate::status::{get_f64, ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "iaf_neuron";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::double("C_m"),
    ParamSpec::double("tau_m"),
    ParamSpec::double("t_ref").min(0.0),
    ParamSpec::double("E_L"),
    ParamSpec::double("V_reset"),
    ParamSpec::double("V_th"),
    ParamSpec::double("I_e"),
    ParamSpec::double("V_m"),
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(IafNeuron::new(resolution))
}

/// Parameters of the neuron, and the propagators derived from them.
#[derive(Debug, Clone, PartialEq)]
struct Parameters {
    /// Membrane capacitance in pF.
    c_m: f64,
    /// Membrane time constant in ms.
    tau_m: f64,
    /// Refractory period in ms.
    t_ref: f64,
    /// Resting potential in mV.
    e_l: f64,
    v_reset: f64,
    v_th: f64,
    /// Constant input current in pA.
    i_e: f64,
    /// Decay of the potential over one step.
    p22: f64,
    /// Contribution of a constant current over one step.
    p21: f64,
    ref_steps: u64,
}

impl Parameters {
    fn updated(&self, status: &Status, resolution: &Resolution) -> Result<Self, KernelError> {
        let mut p = self.clone();
        p.c_m = get_f64(status, "C_m").unwrap_or(p.c_m);
        p.tau_m = get_f64(status, "tau_m").unwrap_or(p.tau_m);
        p.t_ref = get_f64(status, "t_ref").unwrap_or(p.t_ref);
        p.e_l = get_f64(status, "E_L").unwrap_or(p.e_l);
        p.v_reset = get_f64(status, "V_reset").unwrap_or(p.v_reset);
        p.v_th = get_f64(status, "V_th").unwrap_or(p.v_th);
        p.i_e = get_f64(status, "I_e").unwrap_or(p.i_e);

        if p.c_m <= 0.0 {
            return Err(KernelError::InvalidParameter(format!(
                "{}.C_m must be positive, got {}",
                NAME, p.c_m
            )));
        }
        if p.tau_m <= 0.0 {
            return Err(KernelError::InvalidParameter(format!(
                "{}.tau_m must be positive, got {}",
                NAME, p.tau_m
            )));
        }
        if p.v_reset >= p.v_th {
            return Err(KernelError::InvalidParameter(format!(
                "{}.V_reset ({}) must be below V_th ({})",
                NAME, p.v_reset, p.v_th
            )));
        }

        Ok(p.with_propagators(resolution))
    }

    fn with_propagators(mut self, resolution: &Resolution) -> Self {
        let h = resolution.ms();
        self.p22 = (-h / self.tau_m).exp();
        self.p21 = self.tau_m / self.c_m * (1.0 - self.p22);
        self.ref_steps = (self.t_ref / h).round() as u64;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IafNeuron {
    resolution: Resolution,
    params: Parameters,
    /// Membrane potential in mV.
    v_m: f64,
    /// Remaining refractory steps.
    refractory: u64,
    /// Potential jump due to the spikes delivered at the current step.
    spike_input: f64,
    /// Current delivered at the current step.
    current_input: f64,
}

impl IafNeuron {
    pub fn new(resolution: Resolution) -> Self {
        let params = Parameters {
            c_m: 250.0,
            tau_m: 10.0,
            t_ref: 2.0,
            e_l: -70.0,
            v_reset: -70.0,
            v_th: -55.0,
            i_e: 0.0,
            p22: 0.0,
            p21: 0.0,
            ref_steps: 0,
        }
        .with_propagators(&resolution);
        IafNeuron {
            resolution,
            v_m: params.e_l,
            params,
            refractory: 0,
            spike_input: 0.0,
            current_input: 0.0,
        }
    }

    /// Returns the membrane potential in mV.
    pub fn v_m(&self) -> f64 {
        self.v_m
    }
}

impl Node for IafNeuron {
    fn get_status(&self, status: &mut Status) {
        status.insert("C_m".into(), self.params.c_m.into());
        status.insert("tau_m".into(), self.params.tau_m.into());
        status.insert("t_ref".into(), self.params.t_ref.into());
        status.insert("E_L".into(), self.params.e_l.into());
        status.insert("V_reset".into(), self.params.v_reset.into());
        status.insert("V_th".into(), self.params.v_th.into());
        status.insert("I_e".into(), self.params.i_e.into());
        status.insert("V_m".into(), self.v_m.into());
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        self.params.updated(status, &self.resolution).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        self.params = self.params.updated(status, &self.resolution)?;
        self.v_m = get_f64(status, "V_m").unwrap_or(self.v_m);
        Ok(())
    }

    fn sends(&self) -> Option<EventKind> {
        Some(EventKind::Spike)
    }

    fn handles(&self, _kind: EventKind, receptor: usize) -> bool {
        receptor == 0
    }

    fn handle(&mut self, event: &Event) {
        match event.signal {
            Signal::Spike { multiplicity } => {
                self.spike_input += event.weight * multiplicity as f64
            }
            Signal::Current { amplitude } => self.current_input += event.weight * amplitude,
        }
    }

    fn update(&mut self, _ctx: &mut UpdateContext) -> Vec<Emission> {
        let p = &self.params;
        if self.refractory > 0 {
            self.refractory -= 1;
            self.v_m = p.v_reset;
        } else {
            self.v_m = p.e_l
                + (self.v_m - p.e_l) * p.p22
                + (p.i_e + self.current_input) * p.p21
                + self.spike_input;
        }
        self.spike_input = 0.0;
        self.current_input = 0.0;

        if self.v_m >= p.v_th {
            self.v_m = p.v_reset;
            self.refractory = p.ref_steps;
            return vec![Emission::Spike {
                multiplicity: 1,
                offset: 0.0,
            }];
        }
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{KernelRng, RngType};
    use crate::registry::NodeId;
    use crate::status;
    use approx::assert_relative_eq;

    fn run(neuron: &mut IafNeuron, steps: u64) -> Vec<u64> {
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        (0..steps)
            .filter(|&step| {
                let mut ctx = UpdateContext { step, rng: &mut rng };
                !neuron.update(&mut ctx).is_empty()
            })
            .collect()
    }

    #[test]
    fn test_rest_without_input() {
        let mut neuron = IafNeuron::new(Resolution::default());
        assert!(run(&mut neuron, 1000).is_empty());
        assert_relative_eq!(neuron.v_m(), -70.0);
    }

    #[test]
    fn test_subthreshold_current() {
        // steady state is E_L + I_e * tau_m / C_m = -70 + 10 = -60 mV
        let mut neuron = IafNeuron::new(Resolution::default());
        neuron.set_status(&status! { "I_e" => 250.0 }).unwrap();
        assert!(run(&mut neuron, 2000).is_empty());
        assert_relative_eq!(neuron.v_m(), -60.0, epsilon = 1e-6);
    }

    #[test]
    fn test_regular_firing() {
        // steady state above threshold: regular firing, separated by at least the refractory period
        let mut neuron = IafNeuron::new(Resolution::default());
        neuron.set_status(&status! { "I_e" => 500.0 }).unwrap();
        let spikes = run(&mut neuron, 10000);
        assert!(spikes.len() > 10);
        assert!(spikes.windows(2).all(|w| w[1] - w[0] > 20));
    }

    #[test]
    fn test_spike_input() {
        let mut neuron = IafNeuron::new(Resolution::default());
        neuron.handle(&Event {
            source: NodeId(1),
            receptor: 0,
            stamp: 1,
            offset: 0.0,
            weight: 8.0,
            signal: Signal::Spike { multiplicity: 2 },
        });
        assert_eq!(run(&mut neuron, 1), vec![0]);
        assert_relative_eq!(neuron.v_m(), -70.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut neuron = IafNeuron::new(Resolution::default());
        assert!(neuron.set_status(&status! { "V_reset" => -50.0 }).is_err());
        assert!(neuron.set_status(&status! { "C_m" => 0.0 }).is_err());
        assert!(neuron.check_status(&status! { "tau_m" => -1.0 }).is_err());

        let mut status = Status::new();
        neuron.get_status(&mut status);
        assert_eq!(get_f64(&status, "V_reset"), Some(-70.0));
        assert_eq!(get_f64(&status, "C_m"), Some(250.0));
    }
}
