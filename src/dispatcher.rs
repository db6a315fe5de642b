//! # Módulo del Despachador
//!
//! El despachador es dueño exclusivo de la cola de listos, de la tabla de
//! procesos y del reloj de la simulación. Las CPUs sólo reciben `Dispatch`
//! y responden `Completion` a través del [`Transport`]; nunca tocan el
//! estado de los procesos.
//!
//! Cada llamada a [`Dispatcher::tick`] trabaja sobre el tick actual `now`:
//!
//! 1. Aplica las finalizaciones de las porciones que terminan en `now`,
//!    en orden de CPU. Si alguna todavía no llegó, espera por ella.
//! 2. Libera las llegadas con `arrival_time <= now`.
//! 3. Despacha a cada CPU ociosa, en orden de CPU.
//! 4. Avanza el reloj.
//!
//! Así, en un mismo tick la cola conserva su orden previo, luego recibe los
//! procesos expropiados y al final las llegadas nuevas. Las finalizaciones
//! se aplican por tick virtual y no por orden de llegada real, por lo que
//! los modos paralelo y directo producen la misma secuencia de eventos.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, info, trace, warn};

use crate::config;
use crate::error::{Result, SchedulerError, TransportError};
use crate::events::{DispatchRecord, EventLog, SimEvent};
use crate::metrics::MetricsCollector;
use crate::process::{Process, ProcessId, ProcessState, ProcessTable, Tick};
use crate::ready_queue::ReadyQueue;
use crate::scheduler::SchedulingPolicy;
use crate::transport::{Completion, Dispatch, ExecutionMode, Transport, WorkerMessage};
use crate::worker::{WorkerId, WorkerStatus};

/// Porción asignada a una CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub process_id: ProcessId,
    pub slice_length: Tick,
    pub start_tick: Tick,
    /// Número del despacho que la originó
    pub seq: u64,
}

impl Assignment {
    /// Tick en el que la porción termina
    pub fn end_tick(&self) -> Tick {
        self.start_tick + self.slice_length
    }
}

/// Vista del despachador sobre una CPU. Está `Busy` si y sólo si tiene
/// una asignación.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSlot {
    pub id: WorkerId,
    assignment: Option<Assignment>,
}

impl WorkerSlot {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            assignment: None,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        if self.assignment.is_some() {
            WorkerStatus::Busy
        } else {
            WorkerStatus::Idle
        }
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.assignment.map(|a| a.process_id)
    }
}

/// Coordinador de la simulación.
pub struct Dispatcher {
    clock: Tick,
    /// Generación de la corrida; descarta finalizaciones anteriores a un reset
    epoch: u64,
    /// Próximo número de despacho
    next_seq: u64,
    policy: Box<dyn SchedulingPolicy>,
    transport: Box<dyn Transport>,
    processes: ProcessTable,
    ready: ReadyQueue,
    /// Procesos admitidos que todavía no llegaron, por (llegada, admisión)
    arrivals: VecDeque<Process>,
    workers: Vec<WorkerSlot>,
    /// Finalizaciones recibidas antes de su tick
    inbox: BTreeMap<WorkerId, Completion>,
    metrics: MetricsCollector,
    timeline: Vec<DispatchRecord>,
    events: EventLog,
    completion_timeout: Duration,
}

impl Dispatcher {
    /// Crea un despachador con una CPU por cada CPU del transporte.
    ///
    /// # Arguments
    ///
    /// * `policy` - Política de planificación
    /// * `transport` - Canal hacia las CPUs
    pub fn new(policy: Box<dyn SchedulingPolicy>, transport: Box<dyn Transport>) -> Self {
        let workers = (0..transport.worker_count()).map(WorkerSlot::new).collect();
        Self {
            clock: 0,
            epoch: 0,
            next_seq: 0,
            policy,
            transport,
            processes: ProcessTable::new(),
            ready: ReadyQueue::new(),
            arrivals: VecDeque::new(),
            workers,
            inbox: BTreeMap::new(),
            metrics: MetricsCollector::new(),
            timeline: Vec::new(),
            events: EventLog::new(),
            completion_timeout: Duration::from_millis(config::COMPLETION_TIMEOUT_MS),
        }
    }

    /// Plazo máximo de espera por una finalización que ya debió llegar.
    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Suscribe un observador al flujo de eventos.
    pub fn subscribe(&mut self, subscriber: Sender<SimEvent>) {
        self.events.subscribe(subscriber);
    }

    /// Admite un proceso recién creado.
    ///
    /// Si ya llegó (`arrival_time <= clock`) entra directamente a la cola de
    /// listos; si no, queda pendiente hasta su tick de llegada. Un proceso
    /// con ráfaga 0 se marca terminado en su tick de llegada sin pasar por
    /// la cola.
    ///
    /// # Errors
    ///
    /// `SchedulerError::DuplicateProcess` si el id ya es conocido
    pub fn admit(&mut self, process: Process) -> Result<()> {
        let id = process.id();
        if self.processes.contains_key(&id) || self.arrivals.iter().any(|p| p.id() == id) {
            return Err(SchedulerError::DuplicateProcess(id));
        }

        if process.arrival_time() <= self.clock {
            self.arrive(process);
        } else {
            let position = self
                .arrivals
                .partition_point(|p| p.arrival_time() <= process.arrival_time());
            debug!("P{} pendiente hasta t={}", id, process.arrival_time());
            self.arrivals.insert(position, process);
        }
        Ok(())
    }

    /// Avanza la simulación un tick.
    pub fn tick(&mut self) {
        let now = self.clock;
        self.collect_due_completions(now);
        self.release_arrivals(now);
        self.dispatch_idle_workers(now);
        self.clock += 1;
    }

    /// Procesa el reporte de una CPU.
    ///
    /// Descuenta `ticks_executed` de la ráfaga restante. Si llega a 0 el
    /// proceso termina y pasa al colector de métricas; si no, vuelve al
    /// final de la cola de listos. En ambos casos la CPU queda libre.
    ///
    /// # Errors
    ///
    /// Los reportes que no corresponden a una asignación vigente
    /// (`UnknownWorker`, `UnknownProcess`, `ProtocolViolation`) se registran
    /// como advertencia, se descartan y se devuelven como error; el estado
    /// de la simulación no cambia.
    pub fn on_completion(
        &mut self,
        worker_id: WorkerId,
        process_id: ProcessId,
        ticks_executed: Tick,
    ) -> Result<()> {
        let checked = self.check_report(worker_id, process_id);
        let assignment = match checked {
            Ok(assignment) => assignment,
            Err(err) => {
                self.recover(err.clone());
                return Err(err);
            }
        };

        if ticks_executed > assignment.slice_length {
            self.recover(SchedulerError::ProtocolViolation(format!(
                "CPU {} reportó {} ticks para una porción de {}",
                worker_id, ticks_executed, assignment.slice_length
            )));
        }
        let executed = ticks_executed.min(assignment.slice_length);
        let end_tick = assignment.start_tick + executed;

        let Some(process) = self.processes.get_mut(&process_id) else {
            // check_report ya verificó que el proceso existe
            return Err(SchedulerError::UnknownProcess(process_id));
        };
        process.consume(executed);
        let remaining = process.remaining_burst();

        self.workers[worker_id].assignment = None;
        self.timeline.push(DispatchRecord {
            process_id,
            worker_id,
            start_tick: assignment.start_tick,
            end_tick,
        });
        self.events.push(SimEvent::Completed {
            process_id,
            worker_id,
            tick: end_tick,
            remaining_burst: remaining,
        });

        if remaining == 0 {
            self.finish(process_id, end_tick);
        } else {
            process.mark_waiting();
            self.ready.push_back(process_id);
            debug!(
                "[CPU {}] P{} vuelve a la cola con {} ticks restantes",
                worker_id, process_id, remaining
            );
        }
        Ok(())
    }

    /// Vuelve al estado inicial: cola vacía, CPUs ociosas, métricas en cero.
    ///
    /// Las porciones en curso se cancelan con `Reset` y las finalizaciones
    /// de la corrida anterior quedan descartadas. Llamarlo dos veces
    /// equivale a llamarlo una.
    pub fn reset(&mut self) {
        self.epoch += 1;
        for worker_id in 0..self.workers.len() {
            if self.workers[worker_id].assignment.take().is_some() {
                if let Err(err) = self.transport.send(worker_id, WorkerMessage::Reset) {
                    warn!("[CPU {}] no se pudo enviar Reset: {}", worker_id, err);
                }
            }
        }
        let stale = self.transport.drain().len() + self.inbox.len();
        if stale > 0 {
            trace!("{} finalizaciones obsoletas descartadas", stale);
        }
        self.inbox.clear();

        self.clock = 0;
        self.processes.clear();
        self.ready.clear();
        self.arrivals.clear();
        self.metrics.clear();
        self.timeline.clear();
        self.events.clear();
        self.events.push(SimEvent::Reset);
        info!("Simulación reiniciada");
    }

    /// Detiene las CPUs. El despachador no debe usarse después.
    pub fn shutdown(&mut self) {
        self.transport.shutdown();
    }

    /// La simulación terminó: cola vacía, CPUs ociosas y sin llegadas futuras.
    pub fn is_complete(&self) -> bool {
        self.ready.is_empty()
            && self.arrivals.is_empty()
            && self.workers.iter().all(|w| w.assignment.is_none())
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn mode(&self) -> ExecutionMode {
        self.transport.mode()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// Procesos que ya llegaron, por id
    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.processes.values()
    }

    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    pub fn workers(&self) -> &[WorkerSlot] {
        &self.workers
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Porciones ejecutadas, en orden de finalización
    pub fn timeline(&self) -> &[DispatchRecord] {
        &self.timeline
    }

    pub fn events(&self) -> &[SimEvent] {
        self.events.events()
    }

    /// Incorpora un proceso que llegó en el tick actual.
    fn arrive(&mut self, process: Process) {
        let id = process.id();
        let tick = self.clock.max(process.arrival_time());
        self.events.push(SimEvent::Arrived { process_id: id, tick });

        if process.total_burst() == 0 {
            self.processes.insert(id, process);
            self.finish(id, tick);
            return;
        }

        debug!("P{} entra a la cola de listos en t={}", id, tick);
        self.processes.insert(id, process);
        self.ready.push_back(id);
    }

    fn release_arrivals(&mut self, now: Tick) {
        while self
            .arrivals
            .front()
            .is_some_and(|p| p.arrival_time() <= now)
        {
            if let Some(process) = self.arrivals.pop_front() {
                self.arrive(process);
            }
        }
    }

    fn dispatch_idle_workers(&mut self, now: Tick) {
        for worker_id in 0..self.workers.len() {
            if self.workers[worker_id].assignment.is_some() {
                continue;
            }
            let Some(selection) = self.policy.select(&mut self.ready, &self.processes, worker_id)
            else {
                break;
            };
            let Some(process) = self.processes.get_mut(&selection.process_id) else {
                continue;
            };

            process.mark_running(now);
            let seq = self.next_seq;
            self.next_seq += 1;
            let dispatch = Dispatch {
                process_id: selection.process_id,
                slice_length: selection.slice_length,
                epoch: self.epoch,
                seq,
            };

            if let Err(err) = self.transport.send(worker_id, WorkerMessage::Dispatch(dispatch)) {
                // El proceso nunca llegó a ejecutar: vuelve a la cabeza.
                process.mark_waiting();
                self.ready.push_front(selection.process_id);
                self.recover(err.into());
                continue;
            }

            self.workers[worker_id].assignment = Some(Assignment {
                process_id: selection.process_id,
                slice_length: selection.slice_length,
                start_tick: now,
                seq,
            });
            self.events.push(SimEvent::Dispatched {
                process_id: selection.process_id,
                worker_id,
                tick: now,
                slice_length: selection.slice_length,
            });
            debug!(
                "t={} [CPU {}] -> P{} por {} ticks",
                now, worker_id, selection.process_id, selection.slice_length
            );
        }
    }

    /// Espera y aplica las finalizaciones de las porciones que terminan en `now`.
    fn collect_due_completions(&mut self, now: Tick) {
        let due: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|w| w.assignment.is_some_and(|a| a.end_tick() <= now))
            .map(|w| w.id)
            .collect();
        if due.is_empty() {
            return;
        }

        let deadline = Instant::now() + self.completion_timeout;
        while due.iter().any(|id| !self.inbox.contains_key(id)) {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.transport.recv_timeout(timeout) {
                Ok(completion) => self.accept_report(completion),
                Err(err) => {
                    self.synthesize_missing(&due, err);
                    break;
                }
            }
        }

        for worker_id in due {
            if let Some(completion) = self.inbox.remove(&worker_id) {
                let _ = self.on_completion(
                    completion.worker_id,
                    completion.process_id,
                    completion.ticks_executed,
                );
            }
        }
    }

    /// Guarda un reporte recibido hasta el tick en que termina su porción.
    fn accept_report(&mut self, completion: Completion) {
        if completion.epoch != self.epoch {
            trace!(
                "finalización obsoleta de P{} (corrida {}) descartada",
                completion.process_id,
                completion.epoch
            );
            return;
        }

        let worker_id = completion.worker_id;
        let violation = match self.workers.get(worker_id).map(|slot| slot.assignment) {
            None => Some(SchedulerError::UnknownWorker(worker_id)),
            Some(current) if current.map(|a| a.seq) != Some(completion.seq) => {
                if completion.seq < self.next_seq {
                    // Reporte tardío de una porción ya completada localmente
                    trace!(
                        "[CPU {}] finalización atrasada de P{} (despacho {}) descartada",
                        worker_id,
                        completion.process_id,
                        completion.seq
                    );
                    return;
                }
                Some(SchedulerError::ProtocolViolation(format!(
                    "finalización de la CPU {} para un despacho inexistente ({})",
                    worker_id, completion.seq
                )))
            }
            Some(_) if self.inbox.contains_key(&worker_id) => {
                Some(SchedulerError::ProtocolViolation(format!(
                    "finalización duplicada de la CPU {}",
                    worker_id
                )))
            }
            Some(_) => None,
        };

        match violation {
            Some(err) => self.recover(err),
            None => {
                self.inbox.insert(worker_id, completion);
            }
        }
    }

    /// Completa localmente las porciones cuyo reporte no llegó a tiempo.
    fn synthesize_missing(&mut self, due: &[WorkerId], err: TransportError) {
        for &worker_id in due {
            if self.inbox.contains_key(&worker_id) {
                continue;
            }
            let Some(assignment) = self.workers[worker_id].assignment else {
                continue;
            };
            self.recover(SchedulerError::Runtime(format!(
                "CPU {} sin respuesta para P{} ({}); se asume la porción completa",
                worker_id, assignment.process_id, err
            )));
            self.inbox.insert(
                worker_id,
                Completion {
                    worker_id,
                    process_id: assignment.process_id,
                    ticks_executed: assignment.slice_length,
                    epoch: self.epoch,
                    seq: assignment.seq,
                },
            );
        }
    }

    /// Valida que un reporte corresponda a la asignación vigente de la CPU.
    fn check_report(&self, worker_id: WorkerId, process_id: ProcessId) -> Result<Assignment> {
        let slot = self
            .workers
            .get(worker_id)
            .ok_or(SchedulerError::UnknownWorker(worker_id))?;
        let process = self
            .processes
            .get(&process_id)
            .ok_or(SchedulerError::UnknownProcess(process_id))?;
        let assignment = slot.assignment.ok_or_else(|| {
            SchedulerError::ProtocolViolation(format!(
                "finalización de P{} en la CPU {} que no está ocupada",
                process_id, worker_id
            ))
        })?;

        if assignment.process_id != process_id || process.state() != ProcessState::Running {
            return Err(SchedulerError::ProtocolViolation(format!(
                "la CPU {} ejecuta P{}, no P{}",
                worker_id, assignment.process_id, process_id
            )));
        }
        Ok(assignment)
    }

    fn finish(&mut self, process_id: ProcessId, at: Tick) {
        let Some(process) = self.processes.get_mut(&process_id) else {
            return;
        };
        if !process.is_finished() {
            process.mark_finished(at);
        }
        if let Some(metrics) = self.metrics.record(process) {
            info!(
                "P{} terminó en t={} (espera: {}, turnaround: {})",
                process_id, at, metrics.waiting_time, metrics.turnaround_time
            );
        }
        self.events.push(SimEvent::Finished {
            process_id,
            finish_time: at,
        });
    }

    /// Registra un error recuperado localmente sin detener la simulación.
    fn recover(&mut self, err: SchedulerError) {
        warn!("t={} {}", self.clock, err);
        self.events.push(SimEvent::Warning {
            tick: self.clock,
            message: err.to_string(),
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("ready", &self.ready)
            .field("workers", &self.workers)
            .finish()
    }
}
