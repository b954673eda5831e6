use clap::Parser;
use log;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::BufWriter;

use rusty_nest::config::{KernelConfig, Verbosity};
use rusty_nest::error::KernelError;
use rusty_nest::kernel::Kernel;
use rusty_nest::registry::NodeId;
use rusty_nest::status;
use rusty_nest::status::Status;

/// Measure the I-F curve of a neuron model: a population of neurons is driven by a noisy current
/// I(t) = I_mean + I_std * W(t), where W(t) is white noise, and the output firing rate is
/// measured on a grid of (I_mean, I_std) values.
#[derive(Parser, Debug)]
struct Args {
    /// The seed of all random streams
    #[arg(long, default_value = "0")]
    seed: u64,
    /// The number of parallel workers
    #[arg(short = 'w', long, default_value = "4")]
    num_workers: usize,
    /// The number of neurons
    #[arg(short = 'N', long, default_value = "100")]
    num_neurons: usize,
    /// The interval between two successive measurement trials, in ms
    #[arg(long, default_value = "200.0")]
    t_inter_trial: f64,
    /// The duration of a measurement trial, in ms
    #[arg(long, default_value = "1000.0")]
    t_sim: f64,
    /// The mean currents: start, stop (excluded) and step, in pA
    #[arg(long, num_args = 3, default_values_t = [0.0, 100.0, 10.0])]
    i_mean: Vec<f64>,
    /// The current standard deviations: start, stop (excluded) and step, in pA
    #[arg(long, num_args = 3, default_values_t = [0.0, 100.0, 10.0])]
    i_std: Vec<f64>,
    /// The membrane capacitance of the neurons, in pF
    #[arg(long, default_value = "250.0")]
    c_m: f64,
    /// The membrane time constant of the neurons, in ms
    #[arg(long, default_value = "10.0")]
    tau_m: f64,
    /// The refractory period of the neurons, in ms
    #[arg(long, default_value = "2.0")]
    t_ref: f64,
    /// The firing threshold of the neurons, in mV
    #[arg(long, default_value = "-55.0")]
    v_th: f64,
    /// The kernel time after which the kernel is rebuilt to keep the clock far from its limit, in ms
    #[arg(long, default_value = "100000.0")]
    max_time: f64,
    /// An optional kernel configuration file; overrides the seed and number of workers
    #[arg(long)]
    config: Option<String>,
}

/// The model under test, with its parameters.
const MODEL: &str = "if_curve_neuron";

#[derive(Serialize, Debug)]
struct Transfer {
    i_mean: Vec<f64>,
    i_std: Vec<f64>,
    /// Firing rates in spikes/s, indexed by mean then standard deviation.
    rate: Vec<Vec<f64>>,
}

struct IfCurve {
    kernel: Kernel,
    params: Status,
    num_neurons: usize,
    t_inter_trial: f64,
    t_sim: f64,
    max_time: f64,
    noise: Vec<NodeId>,
    detector: Vec<NodeId>,
}

impl IfCurve {
    fn new(kernel: Kernel, params: Status, args: &Args) -> Result<Self, KernelError> {
        let mut curve = IfCurve {
            kernel,
            params,
            num_neurons: args.num_neurons,
            t_inter_trial: args.t_inter_trial,
            t_sim: args.t_sim,
            max_time: args.max_time,
            noise: vec![],
            detector: vec![],
        };
        curve.build()?;
        Ok(curve)
    }

    /// Reset the kernel and create the neurons, the noise generator and the spike detector.
    fn build(&mut self) -> Result<(), KernelError> {
        self.kernel.reset();
        self.kernel.set_verbosity(Verbosity::Warning);
        self.kernel.copy_model("iaf_neuron", MODEL, &self.params)?;
        let neurons = self.kernel.create(MODEL, self.num_neurons, &status! {})?;
        self.noise = self.kernel.create("noise_generator", 1, &status! {})?;
        self.detector = self
            .kernel
            .create("spike_detector", 1, &status! { "to_memory" => true })?;
        self.kernel.divergent_connect(&self.noise, &neurons, 1.0, 1.0)?;
        self.kernel.convergent_connect(&neurons, &self.detector, 1.0, 1.0)?;
        Ok(())
    }

    /// Returns the output rate of the neurons (in spikes/s) for the given noise parameters.
    fn output_rate(&mut self, mean: f64, std: f64) -> Result<f64, KernelError> {
        let mut t = self.kernel.time();
        if t > self.max_time {
            log::info!("Rebuilding the kernel at t = {} ms", t);
            self.build()?;
            t = 0.0;
        }
        self.kernel.simulate(self.t_inter_trial)?;
        self.kernel.set_status(&self.detector, &status! { "n_events" => 0 })?;
        self.kernel.set_status(
            &self.noise,
            &status! { "mean" => mean, "std" => std, "start" => 0.0, "stop" => self.t_sim, "origin" => t },
        )?;
        self.kernel.simulate(self.t_sim)?;
        let n_events = self.kernel.get_status(&self.detector, "n_events")?[0]
            .as_i64()
            .unwrap_or(0);
        Ok(n_events as f64 * 1000.0 / (self.num_neurons as f64 * self.t_sim))
    }
}

fn arange(range: &[f64]) -> Result<Vec<f64>, KernelError> {
    match range {
        [start, stop, step] if *step > 0.0 => {
            let n = ((stop - start) / step).ceil().max(0.0) as usize;
            Ok((0..n).map(|i| start + i as f64 * step).collect())
        }
        _ => Err(KernelError::InvalidConfiguration(format!(
            "expected a range as start, stop and a positive step, got {:?}",
            range
        ))),
    }
}

fn main() -> Result<(), KernelError> {
    let args = Args::parse();

    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", args));
    let hash = hasher.finalize();
    let log_path = format!("log/{:x}.log", hash);
    let transfer_path = format!("if_curve/{:x}.json", hash);

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build(log_path)
        .map_err(|e| KernelError::IOError(e.to_string()))?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(LevelFilter::Info))
        .map_err(|e| KernelError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| KernelError::IOError(e.to_string()))?;

    log::info!("{:?}", args);

    let config = match &args.config {
        Some(path) => KernelConfig::load_from(path)?,
        None => KernelConfig {
            seed: args.seed,
            ..KernelConfig::with_workers(args.num_workers)
        },
    };
    let kernel = Kernel::new(config)?;
    let params = status! {
        "C_m" => args.c_m,
        "tau_m" => args.tau_m,
        "t_ref" => args.t_ref,
        "V_th" => args.v_th,
        "I_e" => 0.0,
    };
    let mut curve = IfCurve::new(kernel, params, &args)?;
    log::info!("Kernel setup: done!");

    let i_mean = arange(&args.i_mean)?;
    let i_std = arange(&args.i_std)?;
    let mut rate = vec![vec![0.0; i_std.len()]; i_mean.len()];
    for (n, &mean) in i_mean.iter().enumerate() {
        log::info!("I = {}", mean);
        for (m, &std) in i_std.iter().enumerate() {
            rate[n][m] = curve.output_rate(mean, std)?;
            log::info!("I_mean = {}, I_std = {}: rate = {:.3} spikes/s", mean, std, rate[n][m]);
        }
    }

    create_dir_all("if_curve").map_err(|e| KernelError::IOError(e.to_string()))?;
    let file = File::create(&transfer_path).map_err(|e| KernelError::IOError(e.to_string()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &Transfer { i_mean, i_std, rate })
        .map_err(|e| KernelError::IOError(e.to_string()))?;
    log::info!("Transfer saving: done! Saved to {}", transfer_path);
    Ok(())
}
