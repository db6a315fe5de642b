//! # Módulo Generador de Procesos
//!
//! Crea las cargas de trabajo que se admiten en el despachador: procesos
//! descritos a mano (`"llegada:ráfaga"`), cargas aleatorias reproducibles
//! y el caso de referencia de tres procesos.

use std::ops::RangeInclusive;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config;
use crate::error::SchedulerError;
use crate::process::{Process, ProcessId, Tick};

/// Descripción de un proceso antes de asignarle id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    pub arrival_time: Tick,
    pub burst: Tick,
}

impl FromStr for ProcessSpec {
    type Err = SchedulerError;

    /// Interpreta `"llegada:ráfaga"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::ProcessSpec;
    ///
    /// let spec: ProcessSpec = "1:5".parse().unwrap();
    /// assert_eq!(spec.arrival_time, 1);
    /// assert_eq!(spec.burst, 5);
    /// assert!("0:-3".parse::<ProcessSpec>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (arrival, burst) = s.split_once(':').ok_or_else(|| {
            SchedulerError::InvalidBurst(format!("'{}' no tiene el formato llegada:ráfaga", s))
        })?;
        Ok(Self {
            arrival_time: parse_ticks(arrival, "llegada")?,
            burst: parse_ticks(burst, "ráfaga")?,
        })
    }
}

fn parse_ticks(value: &str, field: &str) -> Result<Tick, SchedulerError> {
    value.trim().parse::<Tick>().map_err(|_| {
        SchedulerError::InvalidBurst(format!(
            "{} '{}' debe ser un entero no negativo",
            field,
            value.trim()
        ))
    })
}

/// Asigna ids `1..=n` a las especificaciones, en orden.
pub fn build_processes(specs: &[ProcessSpec]) -> Vec<Process> {
    specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| Process::new(idx + 1, spec.arrival_time, spec.burst))
        .collect()
}

/// Carga de referencia: `[(1, 0, 5), (2, 0, 3), (3, 1, 1)]`.
pub fn reference_workload() -> Vec<Process> {
    vec![
        Process::new(1, 0, 5),
        Process::new(2, 0, 3),
        Process::new(3, 1, 1),
    ]
}

/// Generador de cargas aleatorias reproducibles.
///
/// El proceso `i` (desde 1) llega en el tick `i - 1` con una ráfaga uniforme
/// en el rango configurado.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    rng: StdRng,
    burst_range: RangeInclusive<Tick>,
}

impl WorkloadGenerator {
    /// Crea un generador con semilla fija.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            burst_range: config::DEFAULT_MIN_BURST..=config::DEFAULT_MAX_BURST,
        }
    }

    /// Crea un generador con semilla tomada de la entropía del sistema.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            burst_range: config::DEFAULT_MIN_BURST..=config::DEFAULT_MAX_BURST,
        }
    }

    /// Cambia el rango de ráfagas.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidBurst` si el rango está vacío
    pub fn with_burst_range(mut self, range: RangeInclusive<Tick>) -> Result<Self, SchedulerError> {
        if range.is_empty() {
            return Err(SchedulerError::InvalidBurst(format!(
                "rango de ráfagas vacío: {}..={}",
                range.start(),
                range.end()
            )));
        }
        self.burst_range = range;
        Ok(self)
    }

    /// Genera `count` procesos.
    pub fn generate(&mut self, count: usize) -> Vec<Process> {
        (0..count)
            .map(|idx| {
                let burst = self.rng.gen_range(self.burst_range.clone());
                Process::new(idx as ProcessId + 1, idx as Tick, burst)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let spec: ProcessSpec = " 3 : 7 ".parse().unwrap();
        assert_eq!(spec, ProcessSpec { arrival_time: 3, burst: 7 });
    }

    #[test]
    fn test_parse_rejects_invalid_bursts() {
        for input in ["0:-1", "0:2.5", "0:abc", "5", "-1:3"] {
            assert!(
                matches!(input.parse::<ProcessSpec>(), Err(SchedulerError::InvalidBurst(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_build_processes_assigns_ids() {
        let specs = [
            ProcessSpec { arrival_time: 0, burst: 4 },
            ProcessSpec { arrival_time: 2, burst: 1 },
        ];
        let processes = build_processes(&specs);
        assert_eq!(processes[0].id(), 1);
        assert_eq!(processes[1].id(), 2);
        assert_eq!(processes[1].arrival_time(), 2);
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let first = WorkloadGenerator::seeded(42).generate(6);
        let second = WorkloadGenerator::seeded(42).generate(6);
        assert_eq!(first, second);

        for (idx, process) in first.iter().enumerate() {
            assert_eq!(process.id(), idx + 1);
            assert_eq!(process.arrival_time(), idx as Tick);
            assert!((4..=10).contains(&process.total_burst()));
        }
    }

    #[test]
    fn test_burst_range_validation() {
        assert!(WorkloadGenerator::seeded(1).with_burst_range(5..=4).is_err());

        let mut generator = WorkloadGenerator::seeded(1).with_burst_range(2..=2).unwrap();
        assert!(generator.generate(3).iter().all(|p| p.total_burst() == 2));
    }
}
