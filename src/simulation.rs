//! # Módulo de Simulación Principal
//!
//! Superficie de control de la simulación: arranca una corrida con una
//! política y una cantidad de CPUs, permite pausarla, reanudarla y
//! reiniciarla, y devuelve el reporte final.
//!
//! La corrida avanza en un hilo propio (el contexto del despachador); las
//! CPUs corren en sus propios hilos o, en modo degradado, dentro de ese
//! mismo contexto.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use parking_lot::{Condvar, Mutex};

use crate::config;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SchedulerError};
use crate::events::{DispatchRecord, SimEvent};
use crate::metrics::{MetricsCollector, MetricsSummary};
use crate::process::{Process, Tick};
use crate::scheduler::SchedulingAlgorithm;
use crate::transport::{self, ExecutionMode};

/// Parámetros de ejecución de una simulación.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Tiempo real por tick simulado (`Duration::ZERO` corre sin pausas)
    pub tick_duration: Duration,
    /// Espera máxima, una vez vencida la porción, por la respuesta de una CPU
    pub completion_timeout: Duration,
    pub execution_mode: ExecutionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(config::DEFAULT_TICK_MS),
            completion_timeout: Duration::from_millis(config::COMPLETION_TIMEOUT_MS),
            execution_mode: ExecutionMode::Auto,
        }
    }
}

impl SimulationConfig {
    /// Configuración sin demoras, útil para pruebas y ejecuciones por lotes.
    pub fn instant(execution_mode: ExecutionMode) -> Self {
        Self {
            tick_duration: Duration::ZERO,
            execution_mode,
            ..Self::default()
        }
    }
}

/// Resultado de una corrida.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub algorithm: SchedulingAlgorithm,
    /// Modo efectivo en el que corrieron las CPUs
    pub mode: ExecutionMode,
    pub num_workers: usize,
    /// Ticks simulados hasta la última finalización
    pub clock: Tick,
    pub metrics: MetricsCollector,
    pub summary: MetricsSummary,
    pub timeline: Vec<DispatchRecord>,
    pub events: Vec<SimEvent>,
    pub wall_time: Duration,
}

impl SimulationReport {
    /// Genera un reporte detallado de los resultados.
    pub fn generate_report(&self) -> String {
        let mut report = format!(
            "\n=== Simulación de planificación ({}) ===\n{} CPUs, modo {}\n",
            self.algorithm.description(),
            self.num_workers,
            self.mode
        );
        report.push_str(&self.metrics.generate_report(&self.summary));
        report
    }

    /// Genera un reporte en formato CSV.
    pub fn generate_csv_report(&self) -> String {
        self.metrics.generate_csv_report()
    }

    /// Ids de los procesos en orden de finalización
    pub fn completion_order(&self) -> &[usize] {
        &self.summary.completion_order
    }
}

/// Señales compartidas entre la superficie de control y el hilo de la corrida.
#[derive(Debug, Default)]
struct RunControl {
    paused: Mutex<bool>,
    wake: Condvar,
    cancelled: AtomicBool,
}

impl RunControl {
    fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.wake.notify_all();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.set_paused(false);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bloquea mientras la corrida esté en pausa.
    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock();
        while *paused && !self.is_cancelled() {
            self.wake.wait(&mut paused);
        }
    }

    /// Espera un tick de tiempo real; se interrumpe con pausa o reset.
    fn pace(&self, tick_duration: Duration) {
        if tick_duration.is_zero() {
            return;
        }
        let deadline = Instant::now() + tick_duration;
        let mut paused = self.paused.lock();
        while !*paused && !self.is_cancelled() {
            if self.wake.wait_until(&mut paused, deadline).timed_out() {
                break;
            }
        }
    }
}

/// Corrida en curso.
struct RunHandle {
    control: Arc<RunControl>,
    handle: thread::JoinHandle<Option<SimulationReport>>,
}

/// Orquestador de la simulación.
///
/// ```rust
/// use cpu_scheduler_simulator::{
///     generator, ExecutionMode, SchedulingAlgorithm, Simulation, SimulationConfig,
/// };
///
/// let mut simulation = Simulation::new(
///     SimulationConfig::instant(ExecutionMode::Direct),
///     generator::reference_workload(),
/// );
/// let report = simulation.run(SchedulingAlgorithm::fcfs(), 1).unwrap();
/// assert_eq!(report.completion_order(), &[1, 2, 3]);
/// assert_eq!(report.summary.average_waiting_time, 4.0);
/// ```
pub struct Simulation {
    config: SimulationConfig,
    processes: Vec<Process>,
    subscribers: Vec<Sender<SimEvent>>,
    run: Option<RunHandle>,
}

impl Simulation {
    /// Crea una simulación para la carga de trabajo dada.
    ///
    /// # Arguments
    ///
    /// * `config` - Parámetros de ejecución
    /// * `processes` - Procesos a admitir al iniciar cada corrida
    pub fn new(config: SimulationConfig, processes: Vec<Process>) -> Self {
        Self {
            config,
            processes,
            subscribers: Vec::new(),
            run: None,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Reemplaza la carga de trabajo para la próxima corrida.
    pub fn set_processes(&mut self, processes: Vec<Process>) {
        self.processes = processes;
    }

    /// Suscribe un observador a los eventos de las próximas corridas.
    pub fn subscribe(&mut self) -> Receiver<SimEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Inicia una corrida en segundo plano.
    ///
    /// # Errors
    ///
    /// - `InvalidWorkerCount` si `num_workers` es 0
    /// - `InvalidBurst` si el quantum de Round Robin es 0
    /// - `DuplicateProcess` si la carga repite algún id
    /// - `AlreadyRunning` si ya hay una corrida iniciada
    pub fn start(&mut self, algorithm: SchedulingAlgorithm, num_workers: usize) -> Result<()> {
        if self.run.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if num_workers == 0 {
            return Err(SchedulerError::InvalidWorkerCount(num_workers));
        }
        let policy = algorithm.clone().into_policy()?;

        let transport = transport::connect(
            self.config.execution_mode,
            num_workers,
            self.config.tick_duration,
        );
        let mut dispatcher = Dispatcher::new(policy, transport)
            .with_completion_timeout(self.config.completion_timeout);

        for process in &self.processes {
            if let Err(err) = dispatcher.admit(process.clone()) {
                dispatcher.shutdown();
                return Err(err);
            }
        }
        for subscriber in &self.subscribers {
            dispatcher.subscribe(subscriber.clone());
        }

        info!(
            "=== Simulación de planificación ({}) === {} procesos, {} CPUs, modo {}",
            algorithm,
            self.processes.len(),
            num_workers,
            dispatcher.mode()
        );

        let control = Arc::new(RunControl::default());
        let driver_control = Arc::clone(&control);
        let tick_duration = self.config.tick_duration;
        let handle = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || {
                drive(dispatcher, algorithm, num_workers, tick_duration, &driver_control)
            })
            .map_err(|err| SchedulerError::Runtime(err.to_string()))?;

        self.run = Some(RunHandle { control, handle });
        Ok(())
    }

    /// Pausa la corrida entre ticks.
    pub fn pause(&self) -> Result<()> {
        let run = self.run.as_ref().ok_or(SchedulerError::NotStarted)?;
        run.control.set_paused(true);
        info!("Simulación en pausa");
        Ok(())
    }

    /// Reanuda una corrida pausada.
    pub fn resume(&self) -> Result<()> {
        let run = self.run.as_ref().ok_or(SchedulerError::NotStarted)?;
        run.control.set_paused(false);
        info!("Simulación reanudada");
        Ok(())
    }

    /// Cancela la corrida en curso y vuelve al estado inicial.
    ///
    /// Sin corrida en curso no hace nada, por lo que llamarlo dos veces
    /// equivale a llamarlo una.
    pub fn reset(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        run.control.cancel();
        if run.handle.join().is_err() {
            warn!("el hilo del despachador terminó con pánico");
        }
    }

    /// Espera el fin de la corrida y devuelve su reporte.
    ///
    /// Una corrida en pausa no termina hasta que se reanude.
    ///
    /// # Errors
    ///
    /// - `NotStarted` si no hay corrida
    /// - `Runtime` si la corrida fue cancelada o su hilo falló
    pub fn wait(&mut self) -> Result<SimulationReport> {
        let run = self.run.take().ok_or(SchedulerError::NotStarted)?;
        match run.handle.join() {
            Ok(Some(report)) => Ok(report),
            Ok(None) => Err(SchedulerError::Runtime("la corrida fue cancelada".to_string())),
            Err(_) => Err(SchedulerError::Runtime(
                "el hilo del despachador terminó con pánico".to_string(),
            )),
        }
    }

    /// Ejecuta una corrida completa y devuelve su reporte.
    pub fn run(
        &mut self,
        algorithm: SchedulingAlgorithm,
        num_workers: usize,
    ) -> Result<SimulationReport> {
        self.start(algorithm, num_workers)?;
        self.wait()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Bucle del contexto del despachador.
///
/// # Returns
///
/// `None` si la corrida fue cancelada
fn drive(
    mut dispatcher: Dispatcher,
    algorithm: SchedulingAlgorithm,
    num_workers: usize,
    tick_duration: Duration,
    control: &RunControl,
) -> Option<SimulationReport> {
    let started = Instant::now();

    while !dispatcher.is_complete() {
        control.wait_while_paused();
        if control.is_cancelled() {
            dispatcher.reset();
            dispatcher.shutdown();
            info!("Simulación cancelada en t={}", dispatcher.clock());
            return None;
        }
        dispatcher.tick();
        control.pace(tick_duration);
    }

    let metrics = dispatcher.metrics().clone();
    let summary = metrics.summary(dispatcher.timeline(), num_workers);
    let report = SimulationReport {
        algorithm,
        mode: dispatcher.mode(),
        num_workers,
        clock: summary.makespan,
        metrics,
        summary,
        timeline: dispatcher.timeline().to_vec(),
        events: dispatcher.events().to_vec(),
        wall_time: started.elapsed(),
    };
    dispatcher.shutdown();

    info!(
        "=== Simulación completada === {} procesos en {} ticks (espera promedio: {:.2}, turnaround promedio: {:.2})",
        report.summary.finished,
        report.clock,
        report.summary.average_waiting_time,
        report.summary.average_turnaround_time
    );
    Some(report)
}
