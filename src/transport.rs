//! # Módulo de Transporte
//!
//! Canal de mensajes entre el despachador y las CPUs. El despachador sólo
//! conoce el trait [`Transport`]; hay dos implementaciones:
//!
//! - [`ThreadedTransport`]: un hilo por CPU, conectados con canales acotados
//!   de `crossbeam-channel`.
//! - [`DirectTransport`]: modo degradado de un solo contexto; las CPUs se
//!   ejecutan secuencialmente dentro del hilo del despachador.
//!
//! Ambos producen la misma secuencia de eventos; sólo cambia el tiempo real
//! de entrega de los mensajes.

use std::collections::VecDeque;
use std::fmt;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{info, warn};

use crate::config;
use crate::error::TransportError;
use crate::process::{ProcessId, Tick};
use crate::worker::{Worker, WorkerId};

/// Solicitud de ejecución de una porción de ráfaga.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub process_id: ProcessId,
    pub slice_length: Tick,
    /// Generación de la corrida; cambia con cada reset
    pub epoch: u64,
    /// Número de despacho, único dentro de la corrida; la CPU lo repite en
    /// su finalización
    pub seq: u64,
}

/// Respuesta de una CPU al terminar su porción.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub worker_id: WorkerId,
    pub process_id: ProcessId,
    pub ticks_executed: Tick,
    pub epoch: u64,
    pub seq: u64,
}

/// Mensajes que el despachador envía a una CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Ejecutar una porción de ráfaga
    Dispatch(Dispatch),
    /// Descartar la porción en curso sin reportarla
    Reset,
    /// Terminar el hilo de la CPU
    Shutdown,
}

/// Modo de ejecución de las CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Paralelo si hay contextos suficientes, directo en caso contrario
    Auto,
    /// Un hilo por CPU
    Parallel,
    /// Un único contexto: las CPUs se ejecutan secuencialmente
    Direct,
}

impl ExecutionMode {
    /// Resuelve `Auto` según los contextos de ejecución disponibles.
    ///
    /// Se necesita un contexto para el despachador más uno por CPU.
    pub fn resolve(self, num_workers: usize) -> Self {
        match self {
            Self::Auto => {
                let contexts = thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                Self::for_contexts(contexts, num_workers)
            }
            other => other,
        }
    }

    /// Elige el modo para una cantidad conocida de contextos.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpu_scheduler_simulator::ExecutionMode;
    ///
    /// assert_eq!(ExecutionMode::for_contexts(4, 3), ExecutionMode::Parallel);
    /// assert_eq!(ExecutionMode::for_contexts(1, 3), ExecutionMode::Direct);
    /// ```
    pub fn for_contexts(contexts: usize, num_workers: usize) -> Self {
        if contexts > num_workers {
            Self::Parallel
        } else {
            Self::Direct
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "automático"),
            Self::Parallel => write!(f, "paralelo (un hilo por CPU)"),
            Self::Direct => write!(f, "directo (un solo contexto)"),
        }
    }
}

/// Canal punto a punto entre el despachador y sus CPUs.
pub trait Transport: Send {
    fn worker_count(&self) -> usize;

    /// Modo efectivo (nunca `Auto`)
    fn mode(&self) -> ExecutionMode;

    fn send(&mut self, worker: WorkerId, message: WorkerMessage) -> Result<(), TransportError>;

    /// Espera la próxima finalización de cualquier CPU.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Completion, TransportError>;

    /// Vacía las finalizaciones ya entregadas sin esperar.
    fn drain(&mut self) -> Vec<Completion> {
        let mut drained = Vec::new();
        while let Ok(completion) = self.recv_timeout(Duration::ZERO) {
            drained.push(completion);
        }
        drained
    }

    /// Detiene las CPUs y libera sus recursos. Es idempotente.
    fn shutdown(&mut self);
}

/// Modo degradado: las CPUs viven en el hilo del despachador.
///
/// Cada `Dispatch` se ejecuta en el momento del envío y su finalización
/// queda en una cola local hasta que el despachador la pide.
#[derive(Debug)]
pub struct DirectTransport {
    workers: Vec<Worker>,
    outbox: VecDeque<Completion>,
}

impl DirectTransport {
    pub fn new(num_workers: usize) -> Self {
        Self {
            workers: (0..num_workers)
                .map(|id| Worker::new(id, Duration::ZERO))
                .collect(),
            outbox: VecDeque::new(),
        }
    }
}

impl Transport for DirectTransport {
    fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Direct
    }

    fn send(&mut self, worker: WorkerId, message: WorkerMessage) -> Result<(), TransportError> {
        let target = self
            .workers
            .get_mut(worker)
            .ok_or(TransportError::UnknownWorker(worker))?;

        match message {
            WorkerMessage::Dispatch(dispatch) => {
                let completion = target
                    .execute(dispatch)
                    .map_err(|_| TransportError::Rejected(worker))?;
                self.outbox.push_back(completion);
            }
            WorkerMessage::Reset => {
                target.reset();
                self.outbox.retain(|completion| completion.worker_id != worker);
            }
            WorkerMessage::Shutdown => {}
        }
        Ok(())
    }

    fn recv_timeout(&mut self, _timeout: Duration) -> Result<Completion, TransportError> {
        self.outbox.pop_front().ok_or(TransportError::Timeout)
    }

    fn shutdown(&mut self) {
        self.outbox.clear();
        for worker in &mut self.workers {
            worker.reset();
        }
    }
}

/// Extremo del despachador hacia una CPU con hilo propio.
struct WorkerLink {
    inbox: Option<Sender<WorkerMessage>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Modo paralelo: un hilo por CPU.
///
/// Cada CPU tiene un buzón acotado propio y todas comparten un canal acotado
/// de finalizaciones hacia el despachador. Si el buzón de una CPU está
/// desconectado, la porción se ejecuta en línea con una CPU local para que
/// la corrida siga avanzando.
pub struct ThreadedTransport {
    links: Vec<WorkerLink>,
    completions: Option<Receiver<Completion>>,
    fallback: DirectTransport,
}

impl ThreadedTransport {
    /// Lanza un hilo `cpu-N` por CPU.
    ///
    /// # Errors
    ///
    /// Devuelve el error de E/S si el sistema no puede crear algún hilo;
    /// los hilos ya creados se detienen antes de volver.
    pub fn spawn(num_workers: usize, tick_duration: Duration) -> std::io::Result<Self> {
        let (completion_tx, completion_rx) = bounded(num_workers.max(1) * 2);
        let mut transport = Self {
            links: Vec::with_capacity(num_workers),
            completions: Some(completion_rx),
            fallback: DirectTransport::new(num_workers),
        };

        for id in 0..num_workers {
            let (inbox_tx, inbox_rx) = bounded(config::WORKER_INBOX_CAPACITY);
            let outbox = completion_tx.clone();
            let worker = Worker::new(id, tick_duration);

            let spawned = thread::Builder::new()
                .name(format!("cpu-{}", id))
                .spawn(move || worker.run(inbox_rx, outbox));

            match spawned {
                Ok(handle) => transport.links.push(WorkerLink {
                    inbox: Some(inbox_tx),
                    handle: Some(handle),
                }),
                Err(err) => {
                    transport.shutdown();
                    return Err(err);
                }
            }
        }

        info!("{} CPUs lanzadas en hilos propios", num_workers);
        Ok(transport)
    }
}

impl Transport for ThreadedTransport {
    fn worker_count(&self) -> usize {
        self.links.len()
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel
    }

    fn send(&mut self, worker: WorkerId, message: WorkerMessage) -> Result<(), TransportError> {
        let link = self
            .links
            .get_mut(worker)
            .ok_or(TransportError::UnknownWorker(worker))?;

        let Some(inbox) = &link.inbox else {
            return self.fallback.send(worker, message);
        };

        match inbox.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Rejected(worker)),
            Err(TrySendError::Disconnected(message)) => {
                warn!(
                    "[CPU {}] buzón desconectado; se ejecuta en el contexto del despachador",
                    worker
                );
                link.inbox = None;
                self.fallback.send(worker, message)
            }
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Completion, TransportError> {
        if let Ok(completion) = self.fallback.recv_timeout(Duration::ZERO) {
            return Ok(completion);
        }
        let receiver = self.completions.as_ref().ok_or(TransportError::Disconnected)?;
        receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TransportError::Timeout,
            RecvTimeoutError::Disconnected => TransportError::Disconnected,
        })
    }

    fn shutdown(&mut self) {
        for link in &mut self.links {
            if let Some(inbox) = link.inbox.take() {
                let _ = inbox.try_send(WorkerMessage::Shutdown);
            }
        }
        // Cerrar el canal de finalizaciones desbloquea a las CPUs que estén
        // esperando para enviar.
        self.completions = None;

        for (id, link) in self.links.iter_mut().enumerate() {
            if let Some(handle) = link.handle.take() {
                if handle.join().is_err() {
                    warn!("[CPU {}] el hilo terminó con pánico", id);
                }
            }
        }
        self.fallback.shutdown();
    }
}

impl Drop for ThreadedTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedTransport")
            .field("workers", &self.links.len())
            .finish()
    }
}

/// Construye el transporte para el modo pedido.
///
/// Si no se pueden crear los hilos, se registra una advertencia y se usa
/// el modo directo.
pub fn connect(
    mode: ExecutionMode,
    num_workers: usize,
    tick_duration: Duration,
) -> Box<dyn Transport> {
    match mode.resolve(num_workers) {
        ExecutionMode::Direct => Box::new(DirectTransport::new(num_workers)),
        _ => match ThreadedTransport::spawn(num_workers, tick_duration) {
            Ok(transport) => Box::new(transport),
            Err(err) => {
                warn!("no se pudieron lanzar los hilos de las CPUs ({}); modo directo", err);
                Box::new(DirectTransport::new(num_workers))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(process_id: ProcessId, slice_length: Tick) -> WorkerMessage {
        WorkerMessage::Dispatch(Dispatch {
            process_id,
            slice_length,
            epoch: 0,
            seq: process_id as u64,
        })
    }

    #[test]
    fn test_direct_executes_on_send() {
        let mut transport = DirectTransport::new(2);
        transport.send(1, dispatch(7, 3)).unwrap();

        let completion = transport.recv_timeout(Duration::ZERO).unwrap();
        assert_eq!(completion.worker_id, 1);
        assert_eq!(completion.ticks_executed, 3);
        assert_eq!(transport.recv_timeout(Duration::ZERO), Err(TransportError::Timeout));
    }

    #[test]
    fn test_direct_reset_drops_pending_completion() {
        let mut transport = DirectTransport::new(2);
        transport.send(0, dispatch(1, 2)).unwrap();
        transport.send(1, dispatch(2, 2)).unwrap();
        transport.send(0, WorkerMessage::Reset).unwrap();

        let remaining = transport.drain();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].process_id, 2);
    }

    #[test]
    fn test_unknown_worker() {
        let mut transport = DirectTransport::new(1);
        assert_eq!(
            transport.send(3, WorkerMessage::Reset),
            Err(TransportError::UnknownWorker(3))
        );
    }

    #[test]
    fn test_threaded_round_trip() {
        let mut transport = ThreadedTransport::spawn(3, Duration::ZERO).unwrap();
        assert_eq!(transport.worker_count(), 3);

        for worker in 0..3 {
            transport.send(worker, dispatch(worker + 10, 1)).unwrap();
        }

        let mut seen: Vec<WorkerId> = (0..3)
            .map(|_| transport.recv_timeout(Duration::from_secs(5)).unwrap().worker_id)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);

        transport.shutdown();
        transport.shutdown();
    }

    #[test]
    fn test_mode_resolution() {
        assert_eq!(ExecutionMode::Direct.resolve(8), ExecutionMode::Direct);
        assert_eq!(ExecutionMode::Parallel.resolve(8), ExecutionMode::Parallel);
        assert_ne!(ExecutionMode::Auto.resolve(1), ExecutionMode::Auto);
        assert_eq!(ExecutionMode::for_contexts(3, 3), ExecutionMode::Direct);
    }
}
