//! # Motion Control Executable
//!
//! This executable drives the rover's actuators from the line protocol on its UART:
//! - 6 drive motors, through H-bridge drivers sharing a standby line
//! - 6 steering servos, through a PCA9685 servo driver
//!
//! With `--sim` the hardware is simulated and the protocol runs over stdin/stdout instead.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use motion_lib::{
    hal::{
        sim::{self, SimPin, SimPlatform, SimServoDriver},
        Platform,
    },
    motor_ctrl::MotorBank,
    params::MotionExecParams,
    servo_ctrl::{ServoBank, ServoBankConfig},
    transport::{StdioTransport, Transport},
    MotionDriver,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
    time::millis_since,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "motion_exec", about = "Rover motor and servo control")]
struct Opts {
    /// Simulate the hardware and run the protocol over stdin/stdout
    #[structopt(long)]
    sim: bool,

    /// Parameter file to use instead of $CHEDDAR_SW_ROOT/params/motion_exec.toml
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Minimum level of log records, one of info, debug or trace
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("motion_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Motion Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: MotionExecParams = match opts.params {
        Some(ref path) => util::params::load_from_path(path),
        None => util::params::load("motion_exec.toml"),
    }
    .wrap_err("Failed to load parameters")?;

    params.are_valid().wrap_err("Invalid parameters")?;

    info!("Parameters loaded");

    // ---- HARDWARE INITIALISATION ----

    let period = Duration::from_millis(params.main_loop.period_ms);

    if opts.sim {
        info!("Using simulated hardware over stdio");

        let motors = MotorBank::new(
            sim::motor_legs(),
            SimPin::new("motor standby"),
            params.motors.resolution_bits,
        )
        .wrap_err("Failed to initialise the motors")?;

        let servos = ServoBank::new(
            SimServoDriver::new(),
            SimPin::new("servo output enable"),
            ServoBankConfig::from(&params.servos),
        )
        .wrap_err("Failed to initialise the servos")?;

        let driver: MotionDriver<SimPlatform, _> =
            MotionDriver::new(StdioTransport::new(), motors, servos);

        run(driver, period)
    } else {
        run_on_hardware(&params, period)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

#[cfg(all(any(target_arch = "arm", target_arch = "aarch64"), target_os = "linux"))]
fn run_on_hardware(params: &MotionExecParams, period: Duration) -> Result<()> {
    use motion_lib::{
        hal::rpi::{self, RpiPlatform},
        transport::uart::UartTransport,
    };

    let (motors, servos) = rpi::bring_up(params).wrap_err("Failed to initialise the hardware")?;

    let transport =
        UartTransport::new(&params.transport).wrap_err("Failed to open the command UART")?;

    let driver: MotionDriver<RpiPlatform, _> = MotionDriver::new(transport, motors, servos);

    run(driver, period)
}

#[cfg(not(all(any(target_arch = "arm", target_arch = "aarch64"), target_os = "linux")))]
fn run_on_hardware(_params: &MotionExecParams, _period: Duration) -> Result<()> {
    Err(color_eyre::eyre::eyre!(
        "Rover hardware is only available on a Raspberry Pi, use --sim to simulate it"
    ))
}

/// Run the main loop until the transport closes, then shut the actuators down.
fn run<H, T>(mut driver: MotionDriver<H, T>, period: Duration) -> Result<()>
where
    H: Platform,
    T: Transport,
{
    info!("Initialisation complete, entering main loop");

    let start = Instant::now();

    let loop_result = loop {
        match driver.run_once(millis_since(start)) {
            Ok(_) => (),
            Err(e) if e.is_closed() => {
                info!("Command stream closed");
                break Ok(());
            }
            Err(e) => break Err(e),
        }

        thread::sleep(period);
    };

    // Always leave the rover safe, even if the loop failed
    if let Err(e) = driver.shutdown() {
        warn!("Failed to shut down cleanly: {}", e);
    }

    loop_result.wrap_err("Main loop failed")
}
