use std::time::Duration;

use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use rand::Rng;
use tokio::sync::watch;
use tracing::error;

use smartpark::bays::BayId;
use smartpark::bridge::{BridgeTopics, CarParkBridge};
use smartpark::bus::{Broker, BusClient};
use smartpark::codec::{self, EventKind};
use smartpark::config::Config;
use smartpark::display::ConsoleDisplay;
use smartpark::records::RecordLog;
use smartpark::sensors::{BaySensor, Detector, DetectorKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("smartpark")
        .version("0.1.0")
        .author("Facility Systems Engineering Team")
        .about("🅿️  Smart parking facility simulator - broker, coordinator, sensors, displays")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to the JSON configuration")
                .takes_value(true)
                .default_value("config.json")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("broker")
                .about("📡 Run the message bus broker")
                .long_about("Runs the TCP publish/subscribe broker every other component connects to"),
        )
        .subcommand(
            SubCommand::with_name("carpark")
                .about("🚗 Run the car park coordinator")
                .arg(
                    Arg::with_name("park-interval")
                        .long("park-interval")
                        .value_name("SECONDS")
                        .help("Periodically request a bay allocation for waiting cars")
                        .takes_value(true)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(seconds) if seconds > 0 => Ok(()),
                            _ => Err("interval must be a positive number of seconds".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("sensor")
                .about("📟 Run an entry/exit detector")
                .arg(
                    Arg::with_name("kind")
                        .long("kind")
                        .value_name("KIND")
                        .help("Detector variant")
                        .takes_value(true)
                        .possible_values(&["console", "random", "replay"])
                        .default_value("console"),
                )
                .arg(
                    Arg::with_name("period")
                        .long("period")
                        .value_name("SECONDS")
                        .help("Detection period for the random variant")
                        .takes_value(true)
                        .default_value("1"),
                )
                .arg(
                    Arg::with_name("file")
                        .long("file")
                        .value_name("FILE")
                        .help("Event file for the replay variant")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("bay-sensor")
                .about("🅿️  Run a single bay's occupancy sensor")
                .arg(
                    Arg::with_name("bay")
                        .long("bay")
                        .value_name("BAY")
                        .help("Bay identifier, e.g. bay_1")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("display").about("🖥  Run a console display"))
        .get_matches();

    let config_path = matches.value_of("config").unwrap_or("config.json");

    match matches.subcommand() {
        ("broker", _) => run_broker(config_path).await?,
        ("carpark", Some(sub_matches)) => run_carpark(config_path, sub_matches).await?,
        ("sensor", Some(sub_matches)) => run_sensor(config_path, sub_matches).await?,
        ("bay-sensor", Some(sub_matches)) => run_bay_sensor(config_path, sub_matches).await?,
        ("display", _) => run_display(config_path).await?,
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Run the message bus", "smartpark broker".bright_cyan());
            println!("  {} Run the coordinator", "smartpark carpark".bright_cyan());
            println!("  {} Drive traffic", "smartpark sensor --kind random".bright_cyan());
            println!("  {} Watch the facility", "smartpark display".bright_cyan());
        }
    }

    Ok(())
}

async fn run_broker(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let addr = format!(
        "{}:{}",
        config.carpark.connection.host, config.carpark.connection.port
    );
    let broker = Broker::bind(&addr).await?;
    println!("📡 Bus broker listening on {addr} (Ctrl+C to stop)");
    tokio::select! {
        result = broker.run() => result?,
        _ = tokio::signal::ctrl_c() => println!("\n📡 Bus broker stopped"),
    }
    Ok(())
}

async fn run_carpark(
    config_path: &str,
    matches: &ArgMatches<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let mut carpark = config.carpark.clone();
    if carpark.sensor_topics.is_empty() {
        carpark.sensor_topics.push(config.sensor.topic_address());
    }

    let center = carpark.build_center()?;
    let topics = BridgeTopics::from_config(&carpark);
    let mut bridge = CarParkBridge::new(center, topics.clone());
    if let Some(path) = &carpark.record_log {
        bridge = bridge.with_record_log(RecordLog::new(path));
    }

    let connection = &carpark.connection;
    let mut client =
        BusClient::connect(&connection.host, connection.port, connection.keepalive_interval())
            .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    if let Some(raw) = matches.value_of("park-interval") {
        let period = Duration::from_secs(raw.parse()?);
        let mut driver =
            BusClient::connect(&connection.host, connection.port, connection.keepalive_interval())
                .await?;
        let topic = topics.bay_events_topic.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let temperature = rand::thread_rng().gen_range(10.0..30.0);
                let payload = match codec::encode_bay_request(
                    EventKind::Parked,
                    temperature,
                    chrono::Local::now().naive_local(),
                ) {
                    Ok(payload) => payload,
                    Err(err) => {
                        error!(error = %err, "cannot encode allocation request");
                        continue;
                    }
                };
                if let Err(err) = driver.publish(&topic, &payload).await {
                    error!(error = %err, "allocation request failed");
                    break;
                }
            }
        });
    }

    println!("🚗 Car park coordinator serving (Ctrl+C or a Quit event stops it)");
    bridge.start_serving(&mut client, shutdown_rx).await?;
    println!("🚗 Car park coordinator stopped");
    Ok(())
}

async fn run_sensor(
    config_path: &str,
    matches: &ArgMatches<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let kind = match matches.value_of("kind").unwrap_or("console") {
        "random" => DetectorKind::Random {
            period: Duration::from_secs(matches.value_of("period").unwrap_or("1").parse()?),
        },
        "replay" => {
            let path = matches
                .value_of("file")
                .ok_or("--file is required for replay sensors")?;
            DetectorKind::Replay { path: path.into() }
        }
        _ => DetectorKind::Console,
    };

    let sensor_config = &config.sensor;
    let sensor_topic = sensor_config.topic_address();
    let detector = Detector::new(kind, sensor_topic.clone(), config.carpark.bay_events_topic());
    let mut client = BusClient::connect(
        &sensor_config.host,
        sensor_config.port,
        sensor_config.keepalive_interval(),
    )
    .await?;
    println!("📟 Sensor publishing to {sensor_topic}");
    detector.start_sensing(&mut client).await?;
    Ok(())
}

async fn run_bay_sensor(
    config_path: &str,
    matches: &ArgMatches<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let bay = BayId::new(matches.value_of("bay").unwrap_or("bay_1"));
    let connection = &config.carpark.connection;
    let assignment_topic = connection.topic(&connection.location, bay.as_str(), "parked");
    let mut sensor = BaySensor::new(bay, assignment_topic, config.carpark.bay_events_topic());
    let sensor_config = &config.sensor;
    let mut client = BusClient::connect(
        &sensor_config.host,
        sensor_config.port,
        sensor_config.keepalive_interval(),
    )
    .await?;
    sensor.start_sensing(&mut client).await?;
    Ok(())
}

async fn run_display(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    let display_config = &config.display;
    let mut client = BusClient::connect(
        &display_config.host,
        display_config.port,
        display_config.keepalive_interval(),
    )
    .await?;
    let display = ConsoleDisplay::new(config.carpark.display_topic());
    println!("🖥  Display watching {}", config.carpark.display_topic());
    display.run(&mut client).await?;
    Ok(())
}
