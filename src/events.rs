//! # Módulo de Eventos
//!
//! Interfaz de observación hacia la capa de presentación: un flujo de eventos
//! de sólo anexado, en el orden en que los produce el despachador. Quien
//! dibuja el diagrama de Gantt puede reconstruirlo completo a partir de
//! [`EventLog::events`].

use std::fmt;

use crossbeam_channel::Sender;

use crate::process::{ProcessId, Tick};
use crate::worker::WorkerId;

/// Evento observable de la simulación.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// Un proceso llegó y entró al sistema
    Arrived { process_id: ProcessId, tick: Tick },
    /// Se despachó una porción a una CPU
    Dispatched {
        process_id: ProcessId,
        worker_id: WorkerId,
        tick: Tick,
        slice_length: Tick,
    },
    /// Una CPU terminó su porción
    Completed {
        process_id: ProcessId,
        worker_id: WorkerId,
        tick: Tick,
        remaining_burst: Tick,
    },
    /// Un proceso completó su ráfaga
    Finished { process_id: ProcessId, finish_time: Tick },
    /// Error recuperado localmente; la simulación continúa
    Warning { tick: Tick, message: String },
    /// La simulación volvió al estado inicial
    Reset,
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrived { process_id, tick } => write!(f, "t={} P{} llega", tick, process_id),
            Self::Dispatched {
                process_id,
                worker_id,
                tick,
                slice_length,
            } => write!(
                f,
                "t={} CPU {} -> P{} ({} ticks)",
                tick, worker_id, process_id, slice_length
            ),
            Self::Completed {
                process_id,
                worker_id,
                tick,
                remaining_burst,
            } => write!(
                f,
                "t={} CPU {} libera P{} (restante: {})",
                tick, worker_id, process_id, remaining_burst
            ),
            Self::Finished {
                process_id,
                finish_time,
            } => write!(f, "t={} P{} terminó", finish_time, process_id),
            Self::Warning { tick, message } => write!(f, "t={} advertencia: {}", tick, message),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Registro de una porción ejecutada, para la línea de tiempo.
///
/// Cubre el intervalo `[start_tick, end_tick)` y nunca se modifica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    pub process_id: ProcessId,
    pub worker_id: WorkerId,
    pub start_tick: Tick,
    pub end_tick: Tick,
}

impl DispatchRecord {
    pub fn ticks(&self) -> Tick {
        self.end_tick - self.start_tick
    }
}

/// Registro de eventos de sólo anexado con reenvío a suscriptores.
///
/// Los suscriptores reciben por canales no acotados para que una
/// presentación lenta nunca bloquee al despachador. Los suscriptores
/// desconectados se descartan.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
    subscribers: Vec<Sender<SimEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Sender<SimEvent>) {
        self.subscribers.push(subscriber);
    }

    pub fn push(&mut self, event: SimEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        self.events.push(event);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Vacía el historial; los suscriptores se conservan.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_push_and_fan_out() {
        let mut log = EventLog::new();
        let (tx, rx) = unbounded();
        log.subscribe(tx);

        log.push(SimEvent::Arrived { process_id: 1, tick: 0 });
        log.push(SimEvent::Finished { process_id: 1, finish_time: 3 });

        assert_eq!(log.len(), 2);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_drops_disconnected_subscribers() {
        let mut log = EventLog::new();
        let (tx, rx) = unbounded();
        log.subscribe(tx);
        drop(rx);

        log.push(SimEvent::Reset);
        assert!(log.subscribers.is_empty());
        assert_eq!(log.events(), &[SimEvent::Reset]);
    }

    #[test]
    fn test_display() {
        let event = SimEvent::Dispatched {
            process_id: 2,
            worker_id: 0,
            tick: 4,
            slice_length: 2,
        };
        assert_eq!(event.to_string(), "t=4 CPU 0 -> P2 (2 ticks)");
    }
}
