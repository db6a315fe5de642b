//! # Módulo de CPUs Trabajadoras
//!
//! Cada CPU simulada ejecuta, de a una por vez, las porciones de ráfaga que
//! le despacha el despachador y responde con exactamente un mensaje de
//! finalización por despacho. La CPU nunca modifica los procesos: sólo
//! informa cuántos ticks ejecutó.

use std::fmt;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};

use crate::error::{Result, SchedulerError};
use crate::transport::{Completion, Dispatch, WorkerMessage};

/// Índice de una CPU simulada (desde 0)
pub type WorkerId = usize;

/// Estado de ocupación de una CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Busy => write!(f, "Busy"),
        }
    }
}

/// Una CPU simulada.
///
/// Acepta como máximo un despacho pendiente: pedirle un segundo despacho
/// antes de reportar el anterior es una violación de protocolo.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    current: Option<Dispatch>,
    /// Tiempo real que dura cada tick simulado
    tick_duration: Duration,
}

impl Worker {
    /// Crea una nueva CPU ociosa.
    ///
    /// # Arguments
    ///
    /// * `id` - Índice de la CPU
    /// * `tick_duration` - Tiempo real que se deja transcurrir por tick
    ///   ejecutado (`Duration::ZERO` para ejecución instantánea)
    pub fn new(id: WorkerId, tick_duration: Duration) -> Self {
        Self {
            id,
            current: None,
            tick_duration,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        if self.current.is_some() {
            WorkerStatus::Busy
        } else {
            WorkerStatus::Idle
        }
    }

    /// Despacho en curso, si lo hay
    pub fn current(&self) -> Option<&Dispatch> {
        self.current.as_ref()
    }

    /// Ejecuta una porción completa de forma síncrona.
    ///
    /// # Errors
    ///
    /// `SchedulerError::ProtocolViolation` si la CPU ya tenía un despacho
    /// sin reportar
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use cpu_scheduler_simulator::{Dispatch, Worker};
    ///
    /// let mut worker = Worker::new(0, Duration::ZERO);
    /// let completion = worker
    ///     .execute(Dispatch { process_id: 4, slice_length: 2, epoch: 0, seq: 0 })
    ///     .unwrap();
    /// assert_eq!(completion.ticks_executed, 2);
    /// ```
    pub fn execute(&mut self, dispatch: Dispatch) -> Result<Completion> {
        self.accept(dispatch)?;
        thread::sleep(self.slice_duration(&dispatch));
        self.complete().ok_or_else(|| {
            SchedulerError::ProtocolViolation(format!("la CPU {} perdió su despacho", self.id))
        })
    }

    /// Descarta la porción en curso sin emitir finalización.
    ///
    /// # Returns
    ///
    /// El despacho descartado, si había uno
    pub fn reset(&mut self) -> Option<Dispatch> {
        let discarded = self.current.take();
        if let Some(dispatch) = &discarded {
            debug!(
                "[CPU {}] Reset: se descarta la porción de P{} ({} ticks)",
                self.id, dispatch.process_id, dispatch.slice_length
            );
        }
        discarded
    }

    /// Bucle principal de una CPU que corre en su propio hilo.
    ///
    /// 1. Espera un `Dispatch` del despachador
    /// 2. Deja transcurrir `slice_length × tick_duration` atendiendo mensajes
    ///    de control: un `Reset` descarta la porción y un `Shutdown` termina
    /// 3. Envía la `Completion` y vuelve a quedar ociosa
    ///
    /// Termina al recibir `Shutdown` o cuando se cierra alguno de los canales.
    pub fn run(mut self, inbox: Receiver<WorkerMessage>, outbox: Sender<Completion>) {
        info!("[CPU {}] iniciada", self.id);

        loop {
            let dispatch = match inbox.recv() {
                Ok(WorkerMessage::Dispatch(dispatch)) => dispatch,
                Ok(WorkerMessage::Reset) => {
                    self.reset();
                    continue;
                }
                Ok(WorkerMessage::Shutdown) | Err(_) => break,
            };

            if let Err(err) = self.accept(dispatch) {
                warn!("[CPU {}] {}", self.id, err);
                continue;
            }

            match self.wait_slice(&inbox, self.slice_duration(&dispatch)) {
                SliceOutcome::Elapsed => {
                    let Some(completion) = self.complete() else {
                        continue;
                    };
                    if outbox.send(completion).is_err() {
                        break;
                    }
                }
                SliceOutcome::Reset => {
                    self.reset();
                }
                SliceOutcome::Shutdown => break,
            }
        }

        info!("[CPU {}] finalizando", self.id);
    }

    /// Espera a que transcurra la porción atendiendo mensajes de control.
    fn wait_slice(&self, inbox: &Receiver<WorkerMessage>, duration: Duration) -> SliceOutcome {
        let deadline = std::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match inbox.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => return SliceOutcome::Elapsed,
                Err(RecvTimeoutError::Disconnected) => return SliceOutcome::Shutdown,
                Ok(WorkerMessage::Reset) => return SliceOutcome::Reset,
                Ok(WorkerMessage::Shutdown) => return SliceOutcome::Shutdown,
                Ok(WorkerMessage::Dispatch(extra)) => {
                    warn!(
                        "[CPU {}] despacho de P{} recibido con una porción en curso; se ignora",
                        self.id, extra.process_id
                    );
                }
            }
        }
    }

    fn accept(&mut self, dispatch: Dispatch) -> Result<()> {
        if let Some(current) = &self.current {
            return Err(SchedulerError::ProtocolViolation(format!(
                "la CPU {} ya ejecuta P{}; despacho de P{} rechazado",
                self.id, current.process_id, dispatch.process_id
            )));
        }
        trace!(
            "[CPU {}] P{} inicia porción de {} ticks",
            self.id,
            dispatch.process_id,
            dispatch.slice_length
        );
        self.current = Some(dispatch);
        Ok(())
    }

    fn complete(&mut self) -> Option<Completion> {
        self.current.take().map(|dispatch| Completion {
            worker_id: self.id,
            process_id: dispatch.process_id,
            ticks_executed: dispatch.slice_length,
            epoch: dispatch.epoch,
            seq: dispatch.seq,
        })
    }

    fn slice_duration(&self, dispatch: &Dispatch) -> Duration {
        let ticks = u32::try_from(dispatch.slice_length).unwrap_or(u32::MAX);
        self.tick_duration.saturating_mul(ticks)
    }
}

/// Resultado de esperar una porción en el hilo de la CPU.
enum SliceOutcome {
    Elapsed,
    Reset,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn dispatch(process_id: usize, slice_length: u64) -> Dispatch {
        Dispatch {
            process_id,
            slice_length,
            epoch: 1,
            seq: 9,
        }
    }

    #[test]
    fn test_execute_reports_full_slice() {
        let mut worker = Worker::new(2, Duration::ZERO);
        let completion = worker.execute(dispatch(5, 3)).unwrap();

        assert_eq!(completion.worker_id, 2);
        assert_eq!(completion.process_id, 5);
        assert_eq!(completion.ticks_executed, 3);
        assert_eq!(completion.epoch, 1);
        assert_eq!(completion.seq, 9);
        assert_eq!(worker.status(), WorkerStatus::Idle);
    }

    #[test]
    fn test_single_outstanding_dispatch() {
        let mut worker = Worker::new(0, Duration::ZERO);
        worker.accept(dispatch(1, 2)).unwrap();
        assert_eq!(worker.status(), WorkerStatus::Busy);

        let err = worker.execute(dispatch(2, 2)).unwrap_err();
        assert!(matches!(err, SchedulerError::ProtocolViolation(_)));
        assert_eq!(worker.current().map(|d| d.process_id), Some(1));
    }

    #[test]
    fn test_reset_discards_slice() {
        let mut worker = Worker::new(0, Duration::ZERO);
        worker.accept(dispatch(1, 2)).unwrap();

        assert_eq!(worker.reset().map(|d| d.process_id), Some(1));
        assert_eq!(worker.status(), WorkerStatus::Idle);
        assert!(worker.reset().is_none());
    }

    #[test]
    fn test_threaded_loop_round_trip() {
        let (inbox_tx, inbox_rx) = bounded(2);
        let (outbox_tx, outbox_rx) = bounded(2);
        let handle = thread::spawn(move || Worker::new(1, Duration::ZERO).run(inbox_rx, outbox_tx));

        inbox_tx.send(WorkerMessage::Dispatch(dispatch(9, 4))).unwrap();
        let completion = outbox_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.process_id, 9);
        assert_eq!(completion.ticks_executed, 4);

        inbox_tx.send(WorkerMessage::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_threaded_reset_emits_no_completion() {
        let (inbox_tx, inbox_rx) = bounded(2);
        let (outbox_tx, outbox_rx) = bounded(2);
        let handle = thread::spawn(move || {
            Worker::new(0, Duration::from_secs(10)).run(inbox_rx, outbox_tx)
        });

        inbox_tx.send(WorkerMessage::Dispatch(dispatch(3, 5))).unwrap();
        inbox_tx.send(WorkerMessage::Reset).unwrap();
        inbox_tx.send(WorkerMessage::Shutdown).unwrap();
        handle.join().unwrap();

        assert!(outbox_rx.try_recv().is_err());
    }
}
