//! Tests de integración para el simulador de planificación de CPU

use std::thread;
use std::time::Duration;

use cpu_scheduler_simulator::{
    generator, ExecutionMode, Process, SchedulerError, SchedulingAlgorithm, SimEvent,
    Simulation, SimulationConfig, SimulationReport, WorkloadGenerator,
};

fn run_instant(
    mode: ExecutionMode,
    processes: Vec<Process>,
    algorithm: SchedulingAlgorithm,
    workers: usize,
) -> SimulationReport {
    let mut simulation = Simulation::new(SimulationConfig::instant(mode), processes);
    simulation.run(algorithm, workers).unwrap()
}

fn paced(tick_ms: u64) -> SimulationConfig {
    SimulationConfig {
        tick_duration: Duration::from_millis(tick_ms),
        ..SimulationConfig::instant(ExecutionMode::Direct)
    }
}

#[test]
fn test_fcfs_reference_case() {
    let report = run_instant(
        ExecutionMode::Direct,
        generator::reference_workload(),
        SchedulingAlgorithm::fcfs(),
        1,
    );

    // En FCFS con una CPU el orden es el de llegada
    assert_eq!(report.completion_order(), &[1, 2, 3]);
    let waiting: Vec<_> = report.metrics.finished().iter().map(|m| m.waiting_time).collect();
    let turnaround: Vec<_> = report
        .metrics
        .finished()
        .iter()
        .map(|m| m.turnaround_time)
        .collect();
    assert_eq!(waiting, vec![0, 5, 7]);
    assert_eq!(turnaround, vec![5, 8, 8]);
    assert_eq!(report.summary.average_waiting_time, 4.0);
    assert_eq!(report.summary.average_turnaround_time, 7.0);
    assert_eq!(report.clock, 9);
}

#[test]
fn test_round_robin_reference_case() {
    let report = run_instant(
        ExecutionMode::Direct,
        generator::reference_workload(),
        SchedulingAlgorithm::round_robin(2).unwrap(),
        1,
    );

    let slices: Vec<_> = report
        .timeline
        .iter()
        .map(|r| (r.process_id, r.ticks()))
        .collect();
    assert_eq!(slices, vec![(1, 2), (2, 2), (3, 1), (1, 2), (2, 1), (1, 1)]);
    assert_eq!(report.completion_order(), &[3, 2, 1]);

    let finish = |id| report.metrics.get(id).unwrap().finish_time;
    assert_eq!(finish(3), 5);
    assert_eq!(finish(2), 8);
    assert_eq!(finish(1), 9);
}

#[test]
fn test_parallel_and_direct_agree() {
    let processes = WorkloadGenerator::seeded(7).generate(8);

    for algorithm in [SchedulingAlgorithm::fcfs(), SchedulingAlgorithm::round_robin(2).unwrap()] {
        for workers in [1, 3] {
            let direct = run_instant(
                ExecutionMode::Direct,
                processes.clone(),
                algorithm.clone(),
                workers,
            );
            let parallel = run_instant(
                ExecutionMode::Parallel,
                processes.clone(),
                algorithm.clone(),
                workers,
            );

            assert_eq!(direct.mode, ExecutionMode::Direct);
            assert_eq!(direct.timeline, parallel.timeline, "{} / {} CPUs", algorithm, workers);
            assert_eq!(direct.summary, parallel.summary, "{} / {} CPUs", algorithm, workers);
        }
    }
}

#[test]
fn test_burst_conservation_and_no_overlap() {
    let processes = WorkloadGenerator::seeded(11).generate(10);
    let report = run_instant(
        ExecutionMode::Direct,
        processes.clone(),
        SchedulingAlgorithm::round_robin(3).unwrap(),
        3,
    );

    // Cada proceso ejecuta exactamente su ráfaga total
    for process in &processes {
        let executed: u64 = report
            .timeline
            .iter()
            .filter(|r| r.process_id == process.id())
            .map(|r| r.ticks())
            .sum();
        assert_eq!(executed, process.total_burst(), "P{}", process.id());
    }

    // Una CPU nunca ejecuta dos porciones a la vez
    for worker in 0..3 {
        let mut slices: Vec<_> = report
            .timeline
            .iter()
            .filter(|r| r.worker_id == worker)
            .collect();
        slices.sort_by_key(|r| r.start_tick);
        for pair in slices.windows(2) {
            assert!(pair[0].end_tick <= pair[1].start_tick);
        }
    }

    // Ninguna porción empieza antes de la llegada
    for record in &report.timeline {
        let arrival = processes[record.process_id - 1].arrival_time();
        assert!(record.start_tick >= arrival);
    }
}

#[test]
fn test_more_workers_never_slower() {
    let processes = WorkloadGenerator::seeded(3).generate(6);
    let one = run_instant(
        ExecutionMode::Direct,
        processes.clone(),
        SchedulingAlgorithm::fcfs(),
        1,
    );
    let three = run_instant(ExecutionMode::Direct, processes, SchedulingAlgorithm::fcfs(), 3);

    assert!(three.summary.makespan <= one.summary.makespan);
    assert!(three.summary.average_waiting_time <= one.summary.average_waiting_time);
}

#[test]
fn test_subscriber_receives_events() {
    let mut simulation = Simulation::new(
        SimulationConfig::instant(ExecutionMode::Direct),
        generator::reference_workload(),
    );
    let events = simulation.subscribe();
    let report = simulation.run(SchedulingAlgorithm::fcfs(), 1).unwrap();

    let received: Vec<SimEvent> = events.try_iter().collect();
    assert_eq!(received, report.events);

    let arrived = received
        .iter()
        .filter(|e| matches!(e, SimEvent::Arrived { .. }))
        .count();
    let finished = received
        .iter()
        .filter(|e| matches!(e, SimEvent::Finished { .. }))
        .count();
    assert_eq!(arrived, 3);
    assert_eq!(finished, 3);
    assert!(!received.iter().any(|e| matches!(e, SimEvent::Warning { .. })));
}

#[test]
fn test_pause_and_resume() {
    let mut simulation = Simulation::new(paced(10), generator::reference_workload());
    simulation.start(SchedulingAlgorithm::fcfs(), 1).unwrap();

    simulation.pause().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(simulation.is_running());
    simulation.resume().unwrap();

    // La pausa no altera los resultados
    let report = simulation.wait().unwrap();
    assert_eq!(report.completion_order(), &[1, 2, 3]);
    assert_eq!(report.summary.average_waiting_time, 4.0);
}

#[test]
fn test_reset_is_idempotent() {
    let mut simulation = Simulation::new(paced(20), generator::reference_workload());
    simulation.start(SchedulingAlgorithm::round_robin(2).unwrap(), 1).unwrap();
    thread::sleep(Duration::from_millis(30));

    simulation.reset();
    simulation.reset();
    assert!(!simulation.is_running());
    assert_eq!(simulation.wait().unwrap_err(), SchedulerError::NotStarted);

    // Tras el reset se puede iniciar otra corrida desde cero
    let report = simulation
        .run(SchedulingAlgorithm::round_robin(2).unwrap(), 1)
        .unwrap();
    assert_eq!(report.completion_order(), &[3, 2, 1]);
}

#[test]
fn test_reset_cancels_parallel_run() {
    let config = SimulationConfig {
        tick_duration: Duration::from_millis(10),
        ..SimulationConfig::instant(ExecutionMode::Parallel)
    };
    let mut simulation = Simulation::new(config, generator::reference_workload());
    simulation.start(SchedulingAlgorithm::round_robin(2).unwrap(), 2).unwrap();

    // Las CPUs quedan a mitad de una porción
    thread::sleep(Duration::from_millis(35));
    simulation.reset();
    assert!(!simulation.is_running());

    // Ninguna finalización de la corrida cancelada llega a la siguiente
    let report = simulation
        .run(SchedulingAlgorithm::round_robin(2).unwrap(), 1)
        .unwrap();
    assert_eq!(report.mode, ExecutionMode::Parallel);
    assert!(!report.events.iter().any(|e| matches!(e, SimEvent::Warning { .. })));
    assert_eq!(report.completion_order(), &[3, 2, 1]);
    assert_eq!(report.summary.average_waiting_time, 4.0);
}

#[test]
fn test_reset_while_paused() {
    let mut simulation = Simulation::new(paced(20), generator::reference_workload());
    simulation.start(SchedulingAlgorithm::fcfs(), 2).unwrap();
    simulation.pause().unwrap();
    simulation.reset();
    assert!(!simulation.is_running());
}

#[test]
fn test_parameter_validation() {
    assert!(matches!(
        SchedulingAlgorithm::round_robin(0),
        Err(SchedulerError::InvalidBurst(_))
    ));
    assert!(matches!(
        SchedulingAlgorithm::parse("sjf", None),
        Err(SchedulerError::UnknownAlgorithm(_))
    ));

    let mut simulation = Simulation::new(
        SimulationConfig::instant(ExecutionMode::Direct),
        generator::reference_workload(),
    );
    assert_eq!(
        simulation.run(SchedulingAlgorithm::fcfs(), 0).unwrap_err(),
        SchedulerError::InvalidWorkerCount(0)
    );

    simulation.set_processes(vec![Process::new(4, 0, 1), Process::new(4, 2, 2)]);
    assert_eq!(
        simulation.run(SchedulingAlgorithm::fcfs(), 1).unwrap_err(),
        SchedulerError::DuplicateProcess(4)
    );
}

#[test]
fn test_report_generation() {
    let report = run_instant(
        ExecutionMode::Direct,
        generator::reference_workload(),
        SchedulingAlgorithm::round_robin(2).unwrap(),
        2,
    );

    let text = report.generate_report();
    assert!(text.contains("Round Robin"));
    assert!(text.contains("REPORTE DE RESULTADOS"));
    assert!(text.contains("P3"));

    let csv = report.generate_csv_report();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("ProcessID,"));
}
