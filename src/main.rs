use std::{
    path::PathBuf,
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    time::{Duration, Instant},
};
use clap::Parser;

use rotctl_scope::{
    options::*,
    rotor::*,
    tracking::*,
    transform::HorizCoord,
    utils::{io_utils::*, log_utils, sexagesimal::*, timer::Timer},
};

const OPTIONS_CONF_NAME: &str = "options";

#[derive(Parser, Debug)]
#[command(
    name = "rotctl_scope",
    version,
    about = "Points rotctld-controlled rotator to RA/DEC and keeps it tracking"
)]
struct Cli {
    #[arg(long, help = "rotctld host name or IP address")]
    host: Option<String>,

    #[arg(long, help = "rotctld TCP port")]
    port: Option<u16>,

    #[arg(long, allow_hyphen_values = true, help = "Site latitude, degrees (DD:MM:SS or decimal)")]
    lat: Option<String>,

    #[arg(long, allow_hyphen_values = true, help = "Site longitude, degrees east (DD:MM:SS or decimal)")]
    lon: Option<String>,

    #[arg(long, help = "Use simulated rotor instead of rotctld")]
    simulate: bool,

    #[arg(
        long,
        num_args = 2,
        value_names = ["RA", "DEC"],
        allow_hyphen_values = true,
        help = "Target RA (hours) and DEC (degrees), HH:MM:SS or decimal"
    )]
    goto: Option<Vec<String>>,

    #[arg(long, help = "Poll period in milliseconds")]
    poll_period_ms: Option<u64>,

    #[arg(long, help = "Stop after this number of seconds (runs until Ctrl+C if omitted)")]
    duration: Option<u64>,

    #[arg(long, help = "Options file (default is options.json in application directory)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Save resulting options")]
    save_options: bool,

    #[arg(long, help = "Debug log and log duplicated to stderr")]
    verbose: bool,
}

fn parse_angle(text: &str, what: &str) -> anyhow::Result<f64> {
    sexagesimal_to_value(text)
        .ok_or_else(|| anyhow::anyhow!("Can't parse {} `{}`", what, text))
}

fn apply_cli_to_options(cli: &Cli, options: &mut Options) -> anyhow::Result<()> {
    if let Some(host) = &cli.host {
        options.rotor.host = host.clone();
    }
    if let Some(port) = cli.port {
        options.rotor.port = port;
    }
    if let Some(lat) = &cli.lat {
        options.site.latitude = parse_angle(lat, "latitude")?;
    }
    if let Some(lon) = &cli.lon {
        options.site.longitude = parse_angle(lon, "longitude")?;
    }
    if cli.simulate {
        options.rotor.backend = RotorBackend::Simulator;
    }
    if let Some(poll_period_ms) = cli.poll_period_ms {
        options.tracking.poll_period_ms = poll_period_ms;
    }
    Ok(())
}

fn parse_goto_target(cli: &Cli) -> anyhow::Result<Option<(f64, f64)>> {
    let Some(values) = &cli.goto else {
        return Ok(None);
    };
    let [ra_str, dec_str] = values.as_slice() else {
        anyhow::bail!("--goto requires RA and DEC");
    };
    let ra = parse_angle(ra_str, "RA")?;
    let dec = parse_angle(dec_str, "DEC")?;
    if !(0.0..24.0).contains(&ra) {
        anyhow::bail!("RA {} is out of range [0, 24)", ra);
    }
    if !(-90.0..=90.0).contains(&dec) {
        anyhow::bail!("DEC {} is out of range [-90, 90]", dec);
    }
    Ok(Some((ra, dec)))
}

fn create_rotor(options: &Options) -> anyhow::Result<Box<dyn Rotor + Send>> {
    let rotor: Box<dyn Rotor + Send> = match options.rotor.backend {
        RotorBackend::Rotctld => {
            let link = RotctldLink::connect(
                &options.rotor.host,
                options.rotor.port,
                &options.rotor.link_timeouts()
            )?;
            Box::new(link)
        }
        RotorBackend::Simulator => {
            let rotor = SimulatedRotor::new(
                HorizCoord::new(0.0, 0.0),
                options.simulator.step_deg
            );
            Box::new(rotor)
        }
    };
    Ok(rotor)
}

const EXIT_CHECK_PERIOD: Duration = Duration::from_millis(100);

/// Blocks until `exit_flag` is set or `duration` (if given) is elapsed
fn wait_for_exit(exit_flag: &AtomicBool, duration: Option<Duration>) {
    let deadline = duration.map(|duration| Instant::now() + duration);
    while !exit_flag.load(Ordering::Relaxed) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return;
        }
        std::thread::sleep(EXIT_CHECK_PERIOD);
    }
    log::info!("Exit is requested");
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logs_dir = get_app_dir()?;
    logs_dir.push("logs");
    log_utils::cleanup_old_logs(&logs_dir, 14/*days*/);
    let _logger = log_utils::start_logger(&logs_dir, cli.verbose)?;
    log::set_max_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info });

    log::info!(
        "{} {} ver. {} is started",
        env!("CARGO_PKG_NAME"),
        std::env::consts::ARCH,
        env!("CARGO_PKG_VERSION")
    );

    let mut options = Options::default();
    match &cli.config {
        Some(file_name) => load_json_from_file(&mut options, file_name)?,
        None            => load_json_from_config_file(&mut options, OPTIONS_CONF_NAME)?,
    }
    apply_cli_to_options(&cli, &mut options)?;
    options.check()?;
    log::info!("Options: {:?}", options);

    if cli.save_options {
        match &cli.config {
            Some(file_name) => save_json_to_file(&options, file_name)?,
            None            => save_json_to_config(&options, OPTIONS_CONF_NAME)?,
        }
        log::info!("Options saved");
    }

    let target = parse_goto_target(&cli)?;

    let exit_flag = Arc::new(AtomicBool::new(false));
    {
        let exit_flag = Arc::clone(&exit_flag);
        ctrlc::set_handler(move || exit_flag.store(true, Ordering::Relaxed))?;
    }

    let rotor = create_rotor(&options)?;
    let ctrl = Arc::new(Mutex::new(TrackingController::new(
        rotor,
        options.site.observer_position()
    )));

    if let Some((ra, dec)) = target {
        let mut ctrl = ctrl.lock().unwrap();
        if let Err(err) = ctrl.goto_now(ra, dec) {
            ctrl.rotor_mut().disconnect();
            return Err(err.into());
        }
    }

    let timer = Timer::new();
    {
        let ctrl = Arc::clone(&ctrl);
        timer.exec_periodic(options.tracking.poll_period(), move || {
            let mut ctrl = ctrl.lock().unwrap();
            match ctrl.poll_now() {
                Ok(crd) => log::info!(
                    "RA={} DEC={} state={:?}",
                    value_to_sexagesimal(crd.ra, true, 1),
                    value_to_sexagesimal(crd.dec, true, 0),
                    ctrl.state()
                ),
                Err(err) => log::error!("Poll failed: {}", err),
            }
        });
    }

    wait_for_exit(&exit_flag, cli.duration.map(Duration::from_secs));
    drop(timer);

    let mut ctrl = ctrl.lock()
        .map_err(|_| anyhow::anyhow!("Tracking controller mutex is poisoned"))?;
    let crd = ctrl.reported();
    if let Err(err) = ctrl.abort() {
        log::error!("Abort failed: {}", err);
    }
    ctrl.rotor_mut().disconnect();

    println!(
        "RA={} DEC={} state={:?}",
        value_to_sexagesimal(crd.ra, true, 1),
        value_to_sexagesimal(crd.dec, true, 0),
        ctrl.state()
    );

    log::info!("Exited");
    Ok(())
}

#[test]
fn test_wait_for_exit() {
    let exit_flag = AtomicBool::new(false);
    let start = Instant::now();
    wait_for_exit(&exit_flag, Some(Duration::from_millis(200)));
    assert!(start.elapsed() >= Duration::from_millis(200));

    let exit_flag = Arc::new(AtomicBool::new(false));
    let setter = {
        let exit_flag = Arc::clone(&exit_flag);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            exit_flag.store(true, Ordering::Relaxed);
        })
    };
    let start = Instant::now();
    wait_for_exit(&exit_flag, None);
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_secs(10));
    setter.join().unwrap();

    exit_flag.store(true, Ordering::Relaxed);
    let start = Instant::now();
    wait_for_exit(&exit_flag, Some(Duration::from_secs(60)));
    assert!(start.elapsed() < Duration::from_secs(10));
}
