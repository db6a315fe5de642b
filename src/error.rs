//! # Módulo de Errores
//!
//! Define los errores del simulador. Los errores de configuración
//! (`DuplicateProcess`, `InvalidBurst`, ...) se devuelven a quien llama;
//! los de protocolo los recupera el despachador localmente.

use std::error::Error;
use std::fmt;

use crate::process::ProcessId;
use crate::worker::WorkerId;

/// Errores del núcleo de planificación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Se intentó admitir un proceso con un identificador ya conocido
    DuplicateProcess(ProcessId),
    /// Un reporte de finalización hace referencia a un proceso desconocido
    UnknownProcess(ProcessId),
    /// Un reporte de finalización hace referencia a una CPU desconocida
    UnknownWorker(WorkerId),
    /// Ráfaga o quantum negativo, no entero o nulo
    InvalidBurst(String),
    /// Mensaje fuera de protocolo entre despachador y CPU
    ProtocolViolation(String),
    /// Nombre de algoritmo no reconocido
    UnknownAlgorithm(String),
    /// Número de CPUs inválido (debe ser >= 1)
    InvalidWorkerCount(usize),
    /// Ya hay una simulación en curso
    AlreadyRunning,
    /// No hay ninguna simulación iniciada
    NotStarted,
    /// Fallo del entorno de ejecución (hilos)
    Runtime(String),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateProcess(id) => write!(f, "proceso duplicado: P{}", id),
            Self::UnknownProcess(id) => write!(f, "proceso desconocido: P{}", id),
            Self::UnknownWorker(id) => write!(f, "CPU desconocida: {}", id),
            Self::InvalidBurst(detail) => write!(f, "ráfaga inválida: {}", detail),
            Self::ProtocolViolation(detail) => write!(f, "violación de protocolo: {}", detail),
            Self::UnknownAlgorithm(name) => {
                write!(f, "algoritmo desconocido: {} (use fcfs o rr)", name)
            }
            Self::InvalidWorkerCount(n) => {
                write!(f, "número de CPUs inválido: {} (se requiere al menos 1)", n)
            }
            Self::AlreadyRunning => write!(f, "la simulación ya está en ejecución"),
            Self::NotStarted => write!(f, "no hay ninguna simulación iniciada"),
            Self::Runtime(detail) => write!(f, "error de ejecución: {}", detail),
        }
    }
}

impl Error for SchedulerError {}

/// Errores del canal entre el despachador y las CPUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No llegó ningún mensaje dentro del plazo
    Timeout,
    /// Todas las CPUs cerraron su extremo del canal
    Disconnected,
    /// La CPU destino no existe
    UnknownWorker(WorkerId),
    /// La CPU rechazó el despacho (ya tenía uno pendiente)
    Rejected(WorkerId),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "tiempo de espera agotado"),
            Self::Disconnected => write!(f, "canal desconectado"),
            Self::UnknownWorker(id) => write!(f, "CPU {} inexistente", id),
            Self::Rejected(id) => write!(f, "CPU {} rechazó el despacho", id),
        }
    }
}

impl Error for TransportError {}

impl From<TransportError> for SchedulerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnknownWorker(id) => Self::UnknownWorker(id),
            TransportError::Rejected(id) => {
                Self::ProtocolViolation(format!("despacho enviado a la CPU {} ocupada", id))
            }
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Resultado estándar del simulador
pub type Result<T> = std::result::Result<T, SchedulerError>;
