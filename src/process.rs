//! # Módulo de Procesos
//!
//! Este módulo define los procesos simulados que compiten por las CPUs:
//! su identidad inmutable (id, llegada, ráfaga total) y su estado de
//! ejecución, que sólo modifica el despachador.

use std::collections::BTreeMap;
use std::fmt;

/// Identificador único de un proceso
pub type ProcessId = usize;

/// Instante de la simulación, medido en ticks
pub type Tick = u64;

/// Tabla de procesos que ya llegaron al sistema, indexada por id
pub type ProcessTable = BTreeMap<ProcessId, Process>;

/// Estado de un proceso dentro del ciclo de vida de la simulación.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// En la cola de listos (o a punto de entrar), esperando CPU
    Waiting,
    /// Asignado a una CPU que está ejecutando una porción de su ráfaga
    Running,
    /// Ráfaga completada; nunca vuelve a otro estado
    Finished,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Running => write!(f, "Running"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Un trabajo simulado con ráfaga de CPU sintética.
///
/// Los campos son privados: un `Process` sólo se puede construir en estado
/// `Waiting` con `remaining_burst == total_burst`, y sus transiciones de
/// estado sólo las realiza el despachador dentro del crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process {
    id: ProcessId,
    arrival_time: Tick,
    total_burst: Tick,
    remaining_burst: Tick,
    state: ProcessState,
    start_time: Option<Tick>,
    finish_time: Option<Tick>,
}

impl Process {
    /// Crea un nuevo proceso en estado `Waiting`.
    ///
    /// # Arguments
    ///
    /// * `id` - Identificador único del proceso
    /// * `arrival_time` - Tick en el que el proceso llega al sistema
    /// * `total_burst` - Ticks de CPU necesarios para terminar
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::{Process, ProcessState};
    ///
    /// let process = Process::new(1, 0, 5);
    /// assert_eq!(process.remaining_burst(), 5);
    /// assert_eq!(process.state(), ProcessState::Waiting);
    /// ```
    pub fn new(id: ProcessId, arrival_time: Tick, total_burst: Tick) -> Self {
        Self {
            id,
            arrival_time,
            total_burst,
            remaining_burst: total_burst,
            state: ProcessState::Waiting,
            start_time: None,
            finish_time: None,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub fn total_burst(&self) -> Tick {
        self.total_burst
    }

    pub fn remaining_burst(&self) -> Tick {
        self.remaining_burst
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Tick del primer despacho, si ya ocurrió
    pub fn start_time(&self) -> Option<Tick> {
        self.start_time
    }

    /// Tick de finalización, si ya terminó
    pub fn finish_time(&self) -> Option<Tick> {
        self.finish_time
    }

    pub fn is_finished(&self) -> bool {
        self.state == ProcessState::Finished
    }

    /// Tiempo de turnaround (`finish_time - arrival_time`).
    ///
    /// # Returns
    ///
    /// `None` si el proceso todavía no terminó
    pub fn turnaround_time(&self) -> Option<Tick> {
        self.finish_time
            .map(|finish| finish.saturating_sub(self.arrival_time))
    }

    /// Tiempo de espera (`turnaround - total_burst`).
    ///
    /// # Returns
    ///
    /// `None` si el proceso todavía no terminó
    pub fn waiting_time(&self) -> Option<Tick> {
        self.turnaround_time()
            .map(|turnaround| turnaround.saturating_sub(self.total_burst))
    }

    /// Tiempo de respuesta (`start_time - arrival_time`).
    pub fn response_time(&self) -> Option<Tick> {
        self.start_time
            .map(|start| start.saturating_sub(self.arrival_time))
    }

    /// Marca el proceso como asignado a una CPU en el tick `now`.
    pub(crate) fn mark_running(&mut self, now: Tick) {
        self.state = ProcessState::Running;
        self.start_time.get_or_insert(now);
    }

    /// Descuenta los ticks ejecutados de la ráfaga restante.
    ///
    /// # Returns
    ///
    /// Los ticks realmente descontados (nunca más que la ráfaga restante)
    pub(crate) fn consume(&mut self, ticks: Tick) -> Tick {
        let consumed = ticks.min(self.remaining_burst);
        self.remaining_burst -= consumed;
        consumed
    }

    /// Devuelve el proceso a la espera tras una expropiación.
    pub(crate) fn mark_waiting(&mut self) {
        self.state = ProcessState::Waiting;
    }

    /// Marca el proceso como terminado en el tick `at`.
    pub(crate) fn mark_finished(&mut self, at: Tick) {
        self.remaining_burst = 0;
        self.state = ProcessState::Finished;
        self.finish_time = Some(at);
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{} (llegada: {}, ráfaga: {}, restante: {}, {})",
            self.id, self.arrival_time, self.total_burst, self.remaining_burst, self.state
        )
    }
}
