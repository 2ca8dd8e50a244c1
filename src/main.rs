#[macro_use]
extern crate log;
#[macro_use]
extern crate clap;

use std::process;
use std::time::Duration;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use savage_i2c::bit_layer::is_reserved;
use savage_i2c::probe::{self, DevMemWindow};
use savage_i2c::{BusAdapter, BusConfig, Error, Registry};

type Bus = BusAdapter<DevMemWindow>;

fn setup_logger(verbosity: u64) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S%.6f]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn parse_number(text: &str) -> Result<u32, String> {
    let parsed = if text.starts_with("0x") || text.starts_with("0X") {
        u32::from_str_radix(&text[2..], 16)
    } else {
        text.parse()
    };
    parsed.map_err(|e| format!("invalid number {}: {}", text, e))
}

fn parse_byte(text: &str) -> Result<u8, String> {
    let value = parse_number(text)?;
    if value > 0xff {
        return Err(format!("{} does not fit in a byte", text));
    }
    Ok(value as u8)
}

fn validate_byte(text: String) -> Result<(), String> {
    parse_byte(&text).map(|_| ())
}

fn validate_number(text: String) -> Result<(), String> {
    parse_number(&text).map(|_| ())
}

fn config_from(matches: &ArgMatches) -> BusConfig {
    let mut config = BusConfig::default();
    if let Some(us) = matches.value_of("half-period-us").and_then(|t| parse_number(t).ok()) {
        config.half_period = Duration::from_micros(us as u64);
    }
    if let Some(ms) = matches.value_of("timeout-ms").and_then(|t| parse_number(t).ok()) {
        config.stretch_timeout = Duration::from_millis(ms as u64);
    }
    config
}

fn detect(bus: &mut Bus) -> Result<(), Error> {
    println!("     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f");
    for row in (0u8..0x80).step_by(16) {
        let mut line = format!("{:02x}:", row);
        for address in row..row + 16 {
            if address < 0x03 || address > 0x77 {
                line.push_str("   ");
            } else if bus.probe(address)? {
                line.push_str(&format!(" {:02x}", address));
            } else {
                line.push_str(" --");
            }
        }
        println!("{}", line);
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let config = config_from(matches);
    let sysfs = matches.value_of("sysfs").unwrap_or(probe::DEFAULT_SYSFS_ROOT);
    let devmem = matches.value_of("devmem").unwrap_or(probe::DEFAULT_DEVMEM);

    let device = probe::find_device(sysfs)?;
    let window = device.open_window(devmem)?;

    let mut registry = Registry::new();
    let mut bus = Bus::new();
    bus.attach(window, config, &mut registry)?;

    let result = match matches.subcommand() {
        ("detect", Some(_)) => detect(&mut bus),
        ("read", Some(sub)) => read(&mut bus, sub),
        ("write", Some(sub)) => write(&mut bus, sub),
        _ => Ok(()),
    };

    finish(result, bus.detach(&mut registry))
}

/// Outcome of a command once the bus is detached; a failed command wins over
/// a failed detach.
fn finish<T>(result: Result<(), Error>, detached: Result<T, Error>) -> Result<(), Error> {
    match detached {
        Ok(_) => result,
        Err(e) if result.is_err() => {
            error!("detach failed: {}", e);
            result
        }
        Err(e) => Err(e),
    }
}

fn address_of(matches: &ArgMatches) -> u8 {
    let address = matches
        .value_of("address")
        .and_then(|text| parse_byte(text).ok())
        .unwrap_or(0);
    if is_reserved(address) {
        warn!("0x{:02x} is a reserved address", address);
    }
    address
}

fn read(bus: &mut Bus, matches: &ArgMatches) -> Result<(), Error> {
    let address = address_of(matches);
    let count = matches
        .value_of("count")
        .and_then(|text| parse_number(text).ok())
        .unwrap_or(1) as usize;

    let mut buffer = vec![0u8; count];
    let read = bus.read(address, &mut buffer)?;
    let bytes: Vec<String> = buffer[..read]
        .iter()
        .map(|byte| format!("0x{:02x}", byte))
        .collect();
    println!("{}", bytes.join(" "));
    Ok(())
}

fn write(bus: &mut Bus, matches: &ArgMatches) -> Result<(), Error> {
    let address = address_of(matches);
    let bytes: Vec<u8> = matches
        .values_of("bytes")
        .map(|values| values.filter_map(|text| parse_byte(text).ok()).collect())
        .unwrap_or_default();

    let written = bus.write(address, &bytes)?;
    info!("wrote {} bytes to 0x{:02x}", written, address);
    Ok(())
}

fn main() {
    let address = Arg::with_name("address")
        .help("7-bit slave address")
        .required(true)
        .validator(validate_byte);

    let matches = App::new("savage-i2c")
        .version(crate_version!())
        .about("Talks to devices on the Savage4 serial port I2C bus")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Raises log verbosity"),
        )
        .arg(
            Arg::with_name("sysfs")
                .long("sysfs")
                .takes_value(true)
                .help("PCI device directory to search"),
        )
        .arg(
            Arg::with_name("devmem")
                .long("devmem")
                .takes_value(true)
                .help("Physical memory device"),
        )
        .arg(
            Arg::with_name("half-period-us")
                .long("half-period-us")
                .takes_value(true)
                .validator(validate_number)
                .help("Delay per clock phase in microseconds"),
        )
        .arg(
            Arg::with_name("timeout-ms")
                .long("timeout-ms")
                .takes_value(true)
                .validator(validate_number)
                .help("Clock stretch timeout in milliseconds"),
        )
        .subcommand(SubCommand::with_name("detect").about("Scans the bus for devices"))
        .subcommand(
            SubCommand::with_name("read")
                .about("Reads bytes from a device")
                .arg(address.clone())
                .arg(
                    Arg::with_name("count")
                        .help("Number of bytes")
                        .default_value("1")
                        .validator(validate_number),
                ),
        )
        .subcommand(
            SubCommand::with_name("write")
                .about("Writes bytes to a device")
                .arg(address)
                .arg(
                    Arg::with_name("bytes")
                        .help("Bytes to send")
                        .multiple(true)
                        .validator(validate_byte),
                ),
        )
        .get_matches();

    if let Err(e) = setup_logger(matches.occurrences_of("verbose")) {
        eprintln!("Could not init logger: {}", e);
    }

    trace!("Setting up main");

    match run(&matches) {
        Ok(()) => {}
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    }
}
