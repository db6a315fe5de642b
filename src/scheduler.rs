//! # Módulo de Algoritmos de Planificación
//!
//! Este módulo implementa los algoritmos de scheduling que usa el despachador
//! para decidir qué proceso ejecuta a continuación y durante cuántos ticks.
//!
//! `SchedulingAlgorithm` es la variante etiquetada que se elige desde la
//! superficie de control; cada variante se convierte en una política concreta
//! que implementa [`SchedulingPolicy`]. Agregar una política nueva no requiere
//! tocar el despachador.

use std::fmt;

use log::warn;

use crate::config;
use crate::error::{Result, SchedulerError};
use crate::process::{ProcessId, ProcessTable, Tick};
use crate::ready_queue::ReadyQueue;
use crate::worker::WorkerId;

/// Decisión de una política: qué proceso despachar y por cuántos ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub process_id: ProcessId,
    pub slice_length: Tick,
}

/// Contrato de una política de planificación.
///
/// `select` recibe la cola de listos y la CPU libre, y devuelve el proceso
/// elegido (ya retirado de la cola) junto con la longitud de la porción,
/// o `None` si la cola está vacía.
pub trait SchedulingPolicy: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    fn is_preemptive(&self) -> bool;

    fn select(
        &self,
        queue: &mut ReadyQueue,
        processes: &ProcessTable,
        worker: WorkerId,
    ) -> Option<Selection>;
}

/// Saca la cabeza de la cola saltando ids que no estén en la tabla.
fn pop_known(queue: &mut ReadyQueue, processes: &ProcessTable) -> Option<(ProcessId, Tick)> {
    while let Some(id) = queue.pop_front() {
        match processes.get(&id) {
            Some(process) => return Some((id, process.remaining_burst())),
            None => warn!("P{} estaba en la cola de listos pero no en la tabla; se descarta", id),
        }
    }
    None
}

/// First-Come First-Served: la cabeza de la cola ejecuta hasta terminar.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fcfs;

impl SchedulingPolicy for Fcfs {
    fn name(&self) -> &'static str {
        "FCFS"
    }

    fn is_preemptive(&self) -> bool {
        false
    }

    fn select(
        &self,
        queue: &mut ReadyQueue,
        processes: &ProcessTable,
        _worker: WorkerId,
    ) -> Option<Selection> {
        pop_known(queue, processes).map(|(process_id, remaining)| Selection {
            process_id,
            slice_length: remaining,
        })
    }
}

/// Round Robin: la cabeza de la cola ejecuta como máximo `quantum` ticks.
#[derive(Clone, Copy, Debug)]
pub struct RoundRobin {
    quantum: Tick,
}

impl RoundRobin {
    pub fn new(quantum: Tick) -> Result<Self> {
        if quantum == 0 {
            return Err(SchedulerError::InvalidBurst(
                "el quantum debe ser mayor que 0".to_string(),
            ));
        }
        Ok(Self { quantum })
    }

    pub fn quantum(&self) -> Tick {
        self.quantum
    }
}

impl SchedulingPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        "Round Robin"
    }

    fn is_preemptive(&self) -> bool {
        true
    }

    fn select(
        &self,
        queue: &mut ReadyQueue,
        processes: &ProcessTable,
        _worker: WorkerId,
    ) -> Option<Selection> {
        pop_known(queue, processes).map(|(process_id, remaining)| Selection {
            process_id,
            slice_length: remaining.min(self.quantum),
        })
    }
}

/// Algoritmos de planificación disponibles.
///
/// - FCFS garantiza que los procesos se ejecuten en orden de llegada
/// - Round Robin reparte las CPUs en porciones de `quantum` ticks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulingAlgorithm {
    /// First-Come First-Served: no expropiativo.
    ///
    /// Cada proceso ejecuta su ráfaga completa antes de liberar la CPU.
    /// Es simple pero produce el efecto convoy cuando un proceso largo
    /// llega antes que varios cortos.
    Fcfs,

    /// Round Robin: expropiativo con quantum fijo.
    ///
    /// Si al terminar la porción le queda ráfaga, el proceso vuelve al
    /// final de la cola de listos.
    RoundRobin {
        /// Máximo de ticks continuos por despacho
        quantum: Tick,
    },
}

impl SchedulingAlgorithm {
    /// Crea un algoritmo FCFS.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::SchedulingAlgorithm;
    ///
    /// let algorithm = SchedulingAlgorithm::fcfs();
    /// assert!(!algorithm.is_preemptive());
    /// ```
    pub fn fcfs() -> Self {
        Self::Fcfs
    }

    /// Crea un algoritmo Round Robin con el quantum especificado.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidBurst` si `quantum` es 0
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::SchedulingAlgorithm;
    ///
    /// let algorithm = SchedulingAlgorithm::round_robin(2).unwrap();
    /// assert_eq!(algorithm.quantum(), Some(2));
    /// assert!(SchedulingAlgorithm::round_robin(0).is_err());
    /// ```
    pub fn round_robin(quantum: Tick) -> Result<Self> {
        RoundRobin::new(quantum).map(|rr| Self::RoundRobin { quantum: rr.quantum() })
    }

    /// Interpreta el nombre de un algoritmo tal como llega desde la línea
    /// de comandos. El quantum se ignora para FCFS y, si falta, Round Robin
    /// usa [`config::DEFAULT_QUANTUM`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::SchedulingAlgorithm;
    ///
    /// assert_eq!(SchedulingAlgorithm::parse("fcfs", Some(9)).unwrap(), SchedulingAlgorithm::Fcfs);
    /// assert_eq!(
    ///     SchedulingAlgorithm::parse("rr", None).unwrap(),
    ///     SchedulingAlgorithm::RoundRobin { quantum: 2 }
    /// );
    /// ```
    pub fn parse(name: &str, quantum: Option<Tick>) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "fcfs" => Ok(Self::Fcfs),
            "rr" | "round-robin" | "round_robin" | "roundrobin" => {
                Self::round_robin(quantum.unwrap_or(config::DEFAULT_QUANTUM))
            }
            other => Err(SchedulerError::UnknownAlgorithm(other.to_string())),
        }
    }

    /// Determina si el algoritmo es expropiativo.
    pub fn is_preemptive(&self) -> bool {
        match self {
            Self::Fcfs => false,
            Self::RoundRobin { .. } => true,
        }
    }

    /// Calcula la porción a despachar para un proceso con `remaining` ticks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::SchedulingAlgorithm;
    ///
    /// assert_eq!(SchedulingAlgorithm::fcfs().slice_length(5), 5);
    /// assert_eq!(SchedulingAlgorithm::RoundRobin { quantum: 2 }.slice_length(5), 2);
    /// ```
    pub fn slice_length(&self, remaining: Tick) -> Tick {
        match self {
            Self::Fcfs => remaining,
            Self::RoundRobin { quantum } => remaining.min(*quantum),
        }
    }

    /// Obtiene el quantum configurado (`None` para FCFS).
    pub fn quantum(&self) -> Option<Tick> {
        match self {
            Self::Fcfs => None,
            Self::RoundRobin { quantum } => Some(*quantum),
        }
    }

    /// Obtiene una descripción textual del algoritmo.
    pub fn description(&self) -> String {
        match self {
            Self::Fcfs => "First-Come First-Served (no expropiativo)".to_string(),
            Self::RoundRobin { quantum } => {
                format!("Round Robin expropiativo (quantum: {} ticks)", quantum)
            }
        }
    }

    /// Construye la política concreta que usará el despachador.
    pub fn into_policy(self) -> Result<Box<dyn SchedulingPolicy>> {
        match self {
            Self::Fcfs => Ok(Box::new(Fcfs)),
            Self::RoundRobin { quantum } => Ok(Box::new(RoundRobin::new(quantum)?)),
        }
    }
}

impl fmt::Display for SchedulingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fcfs => write!(f, "FCFS"),
            Self::RoundRobin { quantum } => write!(f, "Round Robin (quantum {})", quantum),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;

    fn table(entries: &[(ProcessId, Tick)]) -> ProcessTable {
        entries
            .iter()
            .map(|&(id, burst)| (id, Process::new(id, 0, burst)))
            .collect()
    }

    #[test]
    fn test_fcfs_creation() {
        let algorithm = SchedulingAlgorithm::fcfs();
        assert_eq!(algorithm, SchedulingAlgorithm::Fcfs);
        assert!(!algorithm.is_preemptive());
        assert_eq!(algorithm.quantum(), None);
    }

    #[test]
    fn test_round_robin_creation() {
        let algorithm = SchedulingAlgorithm::round_robin(3).unwrap();

        match algorithm {
            SchedulingAlgorithm::RoundRobin { quantum } => assert_eq!(quantum, 3),
            _ => panic!("Expected RoundRobin variant"),
        }

        assert!(algorithm.is_preemptive());
        assert!(matches!(
            SchedulingAlgorithm::round_robin(0),
            Err(SchedulerError::InvalidBurst(_))
        ));
    }

    #[test]
    fn test_slice_length() {
        // FCFS should return the full remaining burst
        assert_eq!(SchedulingAlgorithm::fcfs().slice_length(8), 8);

        // Round Robin should return min(remaining, quantum)
        let rr_small = SchedulingAlgorithm::RoundRobin { quantum: 3 };
        assert_eq!(rr_small.slice_length(8), 3);

        let rr_large = SchedulingAlgorithm::RoundRobin { quantum: 10 };
        assert_eq!(rr_large.slice_length(8), 8);
    }

    #[test]
    fn test_parse() {
        assert_eq!(SchedulingAlgorithm::parse("FCFS", None).unwrap(), SchedulingAlgorithm::Fcfs);
        assert_eq!(
            SchedulingAlgorithm::parse("round-robin", Some(4)).unwrap(),
            SchedulingAlgorithm::RoundRobin { quantum: 4 }
        );
        assert!(SchedulingAlgorithm::parse("rr", Some(0)).is_err());
        assert_eq!(
            SchedulingAlgorithm::parse("sjf", None),
            Err(SchedulerError::UnknownAlgorithm("sjf".to_string()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", SchedulingAlgorithm::fcfs()), "FCFS");
        assert_eq!(
            format!("{}", SchedulingAlgorithm::RoundRobin { quantum: 2 }),
            "Round Robin (quantum 2)"
        );
    }

    #[test]
    fn test_fcfs_select_runs_to_completion() {
        let processes = table(&[(1, 5), (2, 3)]);
        let mut queue = ReadyQueue::new();
        queue.push_back(1);
        queue.push_back(2);

        let selection = Fcfs.select(&mut queue, &processes, 0).unwrap();
        assert_eq!(selection, Selection { process_id: 1, slice_length: 5 });
        assert_eq!(queue.to_vec(), vec![2]);
    }

    #[test]
    fn test_round_robin_select_caps_slice() {
        let processes = table(&[(1, 5), (2, 1)]);
        let mut queue = ReadyQueue::new();
        queue.push_back(1);
        queue.push_back(2);

        let policy = RoundRobin::new(2).unwrap();
        assert_eq!(policy.select(&mut queue, &processes, 0).unwrap().slice_length, 2);
        assert_eq!(policy.select(&mut queue, &processes, 0).unwrap().slice_length, 1);
        assert!(policy.select(&mut queue, &processes, 0).is_none());
    }

    #[test]
    fn test_select_skips_unknown_ids() {
        let processes = table(&[(2, 4)]);
        let mut queue = ReadyQueue::new();
        queue.push_back(9);
        queue.push_back(2);

        let selection = Fcfs.select(&mut queue, &processes, 0).unwrap();
        assert_eq!(selection.process_id, 2);
        assert!(queue.is_empty());
    }
}
