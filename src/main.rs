//! Bench demo.
//!
//! Builds every device in a JSON bench description with emulated pins,
//! exercises them once and exits.
//!
//! ```text
//! nts-hw-demo [-v] [--dot] [bench.json]
//! ```
//!
//! `--dot` prints the relay and actuator state machines as Graphviz and
//! exits.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_lite::future::block_on;
use log::{info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::LevelFilter;

use nts_hardware::actuator::{Actuator, HwPwmOutput, PwmOutput};
use nts_hardware::config::HardwareConfig;
use nts_hardware::fsm::{self, ACTUATOR_TABLE, RELAY_TABLE};
use nts_hardware::gpio::{self, Edge, PwmDevice};
use nts_hardware::qcm::calculation;
use nts_hardware::qcm::materials::Material;
use nts_hardware::relay::{Relay, SwitchOptions};
use nts_hardware::vacuum_gauge::{edwards, erstevak, leybold};
use nts_hardware::vfd::{EmulatedVfd, Vfd};

const DEMO_BENCH: &str = r#"{
    "relays": [
        {"pin_number": 17, "label": "Gate valve"},
        {"pin_number": 27, "label": "Roughing pump"}
    ],
    "buttons": [{"pin_number": 22, "label": "Interlock"}],
    "pwms": [
        {"pin_number": 12, "label": "Heater", "frequency": 1000},
        {"backend": "rpi_hardware_pwm", "channel": 1, "label": "Fan"}
    ]
}"#;

#[derive(Parser, Debug)]
#[command(name = "nts-hw-demo")]
#[command(about = "Exercise an emulated lab bench", version)]
struct Args {
    /// Log every switch and bus transaction
    #[arg(short, long)]
    verbose: bool,

    /// Print the relay and actuator state machines as Graphviz and exit
    #[arg(long)]
    dot: bool,

    /// Bench description (JSON); a built-in two-relay bench when omitted
    bench: Option<PathBuf>,
}

/// Routes the library's `log` records through a tracing fmt subscriber.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger: {e}"))
}

// ── Demo steps ────────────────────────────────────────────────

fn run_relays(cfg: &HardwareConfig, verbose: bool) -> Result<()> {
    for rc in &cfg.relays {
        let pin = gpio::get_relay(rc)?;
        let probe = pin.clone();
        let mut relay = Relay::with_label(pin, &rc.label, SwitchOptions::default().verbose(verbose))?;
        relay.toggle()?;
        info!(
            "{}: {} (line {})",
            relay.label(),
            relay.state().name(),
            if probe.physical_level() { "high" } else { "low" }
        );
        relay.switch_off()?;
    }
    Ok(())
}

fn run_buttons(cfg: &HardwareConfig) -> Result<()> {
    for bc in &cfg.buttons {
        let mut button = gpio::get_button(bc)?;
        // pull-up line pressed to ground
        button.pin().drive(!bc.pull_up);
        match button.update(0)? {
            Some(Edge::Activated) => info!("{}: pressed", bc.label),
            other => warn!("{}: unexpected edge {other:?}", bc.label),
        }
    }
    Ok(())
}

fn run_pwms(cfg: &HardwareConfig, verbose: bool) -> Result<()> {
    let options = SwitchOptions::default().verbose(verbose);
    for pc in &cfg.pwms {
        match gpio::get_pwm(pc)? {
            PwmDevice::Pin(pin) => {
                let mut act = Actuator::with_label(PwmOutput::new(pin)?, &pc.label, options)?;
                act.set_value(0.5)?;
                act.set_frequency(f64::from(pc.frequency) * 2.0)?;
                info!("{}: {:.0} %", act.label(), act.output().pin().value() * 100.0);
                act.switch_off()?;
            }
            PwmDevice::Hardware(pwm) => {
                let mut act = Actuator::with_label(HwPwmOutput::new(pwm), &pc.label, options)?;
                act.set_value(0.25)?;
                info!("{}: running {}", act.label(), act.output().is_running());
                act.switch_off()?;
            }
        }
    }
    Ok(())
}

fn run_vfd() -> Result<()> {
    let mut vfd = EmulatedVfd::new(50.0);
    block_on(async {
        vfd.set_frequency_percent(40.0).await?;
        vfd.start().await?;
        let params = vfd.read_parameters().await?;
        info!("VFD: {}", serde_json::to_string(&params)?);
        let code = vfd.read_error_code().await?;
        let fault = vfd.parse_error_code(code);
        info!("VFD: {fault}");
        vfd.stop().await?;
        anyhow::Ok(())
    })
}

fn run_calculations() -> Result<()> {
    let Some(gold) = Material::by_symbol("Au") else {
        bail!("material table has no Au");
    };
    let thickness =
        calculation::freq_change_to_thickness(6.0e6, 5.999e6, gold.density, gold.z_ratio);
    info!("QCM: 1 kHz shift on {} = {thickness:.1} Å", gold.symbol);

    info!("Edwards APG 4.0 V = {:.3e} mbar", edwards::voltage_to_pressure(4.0));
    info!(
        "Leybold TTR 101 N 5.0 V = {:.3e} mbar",
        leybold::voltage_to_pressure(5.0, "TTR 101 N")
    );
    info!(
        "Erstevak MTM9D 6.2 V = {:.3e} mbar",
        erstevak::voltage_to_pressure(6.2, "MTM9D")
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.dot {
        print!("{}", fsm::to_dot(&RELAY_TABLE, "relay"));
        print!("{}", fsm::to_dot(&ACTUATOR_TABLE, "actuator"));
        return Ok(());
    }

    init_logging(args.verbose)?;
    info!("nts-hardware {}", nts_hardware::VERSION);

    let text = match &args.bench {
        Some(p) => fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        None => DEMO_BENCH.to_owned(),
    };
    let cfg = HardwareConfig::from_json(&text).context("bench config")?;

    run_relays(&cfg, args.verbose)?;
    run_buttons(&cfg)?;
    run_pwms(&cfg, args.verbose)?;
    run_vfd()?;
    run_calculations()?;

    info!("demo finished");
    Ok(())
}
