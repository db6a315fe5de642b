//! Simulador de planificación de CPU - ejecutable de línea de comandos
//!
//! Uso:
//!   cpu-scheduler-simulator --policy rr --quantum 2 --workers 3
//!   cpu-scheduler-simulator --policy fcfs --reference --workers 1 --tick-ms 0
//!   cpu-scheduler-simulator --process 0:5 --process 0:3 --process 1:1 --csv resultados.csv

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info};

use cpu_scheduler_simulator::generator::{self, ProcessSpec, WorkloadGenerator};
use cpu_scheduler_simulator::{
    config, ExecutionMode, Process, SchedulerError, SchedulingAlgorithm, Simulation,
    SimulationConfig, Tick,
};

fn cli() -> Command {
    Command::new("cpu-scheduler-simulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulador de planificación de CPU (FCFS y Round Robin) con N CPUs")
        .arg(
            Arg::new("policy")
                .short('p')
                .long("policy")
                .default_value("rr")
                .help("Algoritmo de planificación: fcfs o rr"),
        )
        .arg(
            Arg::new("quantum")
                .short('q')
                .long("quantum")
                .value_parser(value_parser!(Tick))
                .help("Quantum de Round Robin en ticks"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_parser(value_parser!(usize))
                .help("Número de CPUs trabajadoras [por defecto: 3]"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["auto", "parallel", "direct"])
                .default_value("auto")
                .help("Ejecución de las CPUs: hilos propios o dentro del despachador"),
        )
        .arg(
            Arg::new("tick-ms")
                .long("tick-ms")
                .value_parser(value_parser!(u64))
                .help("Duración real de un tick en milisegundos, 0 = sin pausas [por defecto: 500]"),
        )
        .arg(
            Arg::new("processes")
                .short('n')
                .long("processes")
                .value_parser(value_parser!(usize))
                .help("Cantidad de procesos aleatorios [por defecto: 6]"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Semilla de la carga aleatoria"),
        )
        .arg(
            Arg::new("process")
                .long("process")
                .action(ArgAction::Append)
                .value_parser(|value: &str| {
                    value
                        .parse::<ProcessSpec>()
                        .map_err(|err| err.to_string())
                })
                .conflicts_with("reference")
                .help("Proceso explícito llegada:ráfaga (repetible)"),
        )
        .arg(
            Arg::new("reference")
                .long("reference")
                .action(ArgAction::SetTrue)
                .help("Usa la carga de referencia de tres procesos"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .value_name("PATH")
                .help("Escribe las métricas por proceso en un archivo CSV"),
        )
}

fn workload(matches: &ArgMatches) -> Vec<Process> {
    if matches.get_flag("reference") {
        return generator::reference_workload();
    }
    if let Some(specs) = matches.get_many::<ProcessSpec>("process") {
        let specs: Vec<ProcessSpec> = specs.copied().collect();
        return generator::build_processes(&specs);
    }

    let count = matches
        .get_one::<usize>("processes")
        .copied()
        .unwrap_or(config::DEFAULT_PROCESS_COUNT);
    let mut generator = match matches.get_one::<u64>("seed") {
        Some(seed) => WorkloadGenerator::seeded(*seed),
        None => WorkloadGenerator::from_entropy(),
    };
    generator.generate(count)
}

fn execution_mode(name: &str) -> ExecutionMode {
    match name {
        "parallel" => ExecutionMode::Parallel,
        "direct" => ExecutionMode::Direct,
        _ => ExecutionMode::Auto,
    }
}

fn run(matches: &ArgMatches) -> Result<(), SchedulerError> {
    let policy = matches
        .get_one::<String>("policy")
        .map(String::as_str)
        .unwrap_or("rr");
    let algorithm =
        SchedulingAlgorithm::parse(policy, matches.get_one::<Tick>("quantum").copied())?;
    let workers = matches
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or(config::DEFAULT_WORKERS);
    let tick_ms = matches
        .get_one::<u64>("tick-ms")
        .copied()
        .unwrap_or(config::DEFAULT_TICK_MS);
    let mode = matches
        .get_one::<String>("mode")
        .map(|name| execution_mode(name))
        .unwrap_or(ExecutionMode::Auto);

    let processes = workload(matches);
    println!("=== Procesos generados ===");
    for process in &processes {
        println!(
            "  P{}: llegada={}, ráfaga={}",
            process.id(),
            process.arrival_time(),
            process.total_burst()
        );
    }

    let config = SimulationConfig {
        tick_duration: Duration::from_millis(tick_ms),
        execution_mode: mode,
        ..SimulationConfig::default()
    };
    let mut simulation = Simulation::new(config, processes);

    // Imprime los eventos a medida que ocurren
    let events = simulation.subscribe();
    let printer = thread::spawn(move || {
        for event in events {
            println!("  {}", event);
        }
    });

    let result = simulation.run(algorithm, workers);
    drop(simulation);
    let _ = printer.join();
    let report = result?;

    println!("{}", report.generate_report());
    info!("Tiempo real de la corrida: {:.2?}", report.wall_time);

    if let Some(path) = matches.get_one::<String>("csv") {
        std::fs::write(path, report.generate_csv_report())
            .map_err(|err| SchedulerError::Runtime(format!("no se pudo escribir {}: {}", path, err)))?;
        println!("Métricas escritas en {}", path);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
