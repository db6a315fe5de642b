//! Ejemplo básico de uso del simulador de planificación de CPU

use cpu_scheduler_simulator::{
    ExecutionMode, SchedulingAlgorithm, Simulation, SimulationConfig, WorkloadGenerator,
};

fn main() {
    println!("=== Ejemplo: Uso Básico del Simulador ===\n");

    let processes = WorkloadGenerator::seeded(2025).generate(6);
    let config = SimulationConfig::instant(ExecutionMode::Auto);

    // Ejecutar simulación con FCFS
    println!("1. Ejecutando simulación con FCFS...");
    let mut fcfs_simulation = Simulation::new(config, processes.clone());
    let fcfs = match fcfs_simulation.run(SchedulingAlgorithm::fcfs(), 3) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error en FCFS: {}", err);
            return;
        }
    };
    println!("\n--- Reporte FCFS ---");
    println!("{}", fcfs.generate_report());

    // Ejecutar simulación con Round Robin
    println!("\n2. Ejecutando simulación con Round Robin (quantum 2)...");
    let mut rr_simulation = Simulation::new(config, processes);
    let rr = match SchedulingAlgorithm::round_robin(2)
        .and_then(|algorithm| rr_simulation.run(algorithm, 3))
    {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error en Round Robin: {}", err);
            return;
        }
    };
    println!("\n--- Reporte Round Robin ---");
    println!("{}", rr.generate_report());

    // Comparación de resultados
    println!("\n=== Comparación de Algoritmos ===");
    println!("| Métrica                    | FCFS      | Round Robin |");
    println!("|----------------------------|-----------|-------------|");
    println!(
        "| Tiempo promedio de espera  | {:>9.2} | {:>11.2} |",
        fcfs.summary.average_waiting_time, rr.summary.average_waiting_time
    );
    println!(
        "| Tiempo promedio turnaround | {:>9.2} | {:>11.2} |",
        fcfs.summary.average_turnaround_time, rr.summary.average_turnaround_time
    );
    println!(
        "| Tiempo promedio respuesta  | {:>9.2} | {:>11.2} |",
        fcfs.summary.average_response_time, rr.summary.average_response_time
    );
    println!(
        "| Makespan (ticks)           | {:>9} | {:>11} |",
        fcfs.summary.makespan, rr.summary.makespan
    );

    // Generar archivos CSV para análisis posterior
    for (path, report) in [("fcfs_results.csv", &fcfs), ("rr_results.csv", &rr)] {
        if let Err(err) = std::fs::write(path, report.generate_csv_report()) {
            eprintln!("No se pudo escribir {}: {}", path, err);
            return;
        }
    }

    println!("\nArchivos CSV generados:");
    println!("   - fcfs_results.csv");
    println!("   - rr_results.csv");
}
