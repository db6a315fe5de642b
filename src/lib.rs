//! # Simulador de Planificación de CPU
//!
//! Esta biblioteca implementa un simulador de planificación de procesos con un
//! despachador central y N CPUs trabajadoras que se comunican únicamente por
//! mensajes. Soporta FCFS y Round Robin y calcula los tiempos de espera y de
//! turnaround de cada proceso.
//!
//! ## Características principales
//!
//! - **Paso de mensajes**: el despachador envía `Dispatch` a cada CPU y recibe
//!   `Completion` por canales de `crossbeam-channel`.
//! - **Modo degradado**: con pocos contextos de ejecución las CPUs corren
//!   dentro del despachador y la simulación produce los mismos resultados.
//! - **Algoritmos de scheduling**: FCFS (no expropiativo) y Round Robin con
//!   quantum configurable, detrás del trait `SchedulingPolicy`.
//! - **Observabilidad**: flujo de eventos para la capa de presentación y
//!   reportes en texto y CSV.
//!
//! ## Estructura del proyecto
//!
//! - `process`: procesos y sus estados
//! - `ready_queue`: cola FIFO de procesos listos
//! - `scheduler`: políticas de planificación
//! - `worker`: CPU trabajadora
//! - `transport`: mensajes y canal entre despachador y CPUs
//! - `dispatcher`: reloj, llegadas, despacho y finalizaciones
//! - `events`: eventos observables y línea de tiempo
//! - `metrics`: métricas y reportes
//! - `generator`: cargas de trabajo
//! - `simulation`: superficie de control (iniciar, pausar, reanudar, reiniciar)
//!
//! ## Ejemplo
//!
//! ```rust
//! use cpu_scheduler_simulator::{
//!     generator, ExecutionMode, SchedulingAlgorithm, Simulation, SimulationConfig,
//! };
//!
//! let mut simulation = Simulation::new(
//!     SimulationConfig::instant(ExecutionMode::Direct),
//!     generator::reference_workload(),
//! );
//! let report = simulation
//!     .run(SchedulingAlgorithm::round_robin(2).unwrap(), 1)
//!     .unwrap();
//! assert_eq!(report.completion_order(), &[3, 2, 1]);
//! ```

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod generator;
pub mod metrics;
pub mod process;
pub mod ready_queue;
pub mod scheduler;
pub mod simulation;
pub mod transport;
pub mod worker;

// Re-exportar las estructuras principales para facilitar su uso
pub use dispatcher::{Assignment, Dispatcher, WorkerSlot};
pub use error::{Result, SchedulerError, TransportError};
pub use events::{DispatchRecord, EventLog, SimEvent};
pub use generator::{ProcessSpec, WorkloadGenerator};
pub use metrics::{MetricsCollector, MetricsSummary, ProcessMetrics};
pub use process::{Process, ProcessId, ProcessState, Tick};
pub use ready_queue::ReadyQueue;
pub use scheduler::{Fcfs, RoundRobin, SchedulingAlgorithm, SchedulingPolicy, Selection};
pub use simulation::{Simulation, SimulationConfig, SimulationReport};
pub use transport::{
    Completion, DirectTransport, Dispatch, ExecutionMode, ThreadedTransport, Transport,
    WorkerMessage,
};
pub use worker::{Worker, WorkerId, WorkerStatus};

/// Configuración por defecto del simulador
pub mod config {
    use super::Tick;

    /// Quantum por defecto para Round Robin (en ticks)
    pub const DEFAULT_QUANTUM: Tick = 2;

    /// Número de CPUs trabajadoras
    pub const DEFAULT_WORKERS: usize = 3;

    /// Procesos generados cuando no se indica una carga
    pub const DEFAULT_PROCESS_COUNT: usize = 6;

    /// Duración real de un tick (en milisegundos)
    pub const DEFAULT_TICK_MS: u64 = 500;

    /// Espera máxima por la respuesta de una CPU (en milisegundos)
    pub const COMPLETION_TIMEOUT_MS: u64 = 5000;

    /// Mensajes pendientes que admite la bandeja de cada CPU
    pub const WORKER_INBOX_CAPACITY: usize = 2;

    /// Rango de ráfagas de la carga aleatoria
    pub const DEFAULT_MIN_BURST: Tick = 4;
    pub const DEFAULT_MAX_BURST: Tick = 10;
}
