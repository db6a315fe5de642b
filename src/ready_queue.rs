//! # Cola de Listos
//!
//! Secuencia ordenada de identificadores de procesos en espera. Es una cola
//! FIFO estable: los procesos expropiados vuelven siempre al final y un mismo
//! identificador nunca aparece dos veces.

use std::collections::VecDeque;

use crate::process::ProcessId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadyQueue {
    ids: VecDeque<ProcessId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encola un proceso al final.
    ///
    /// # Returns
    ///
    /// `false` (sin modificar la cola) si el id ya estaba encolado
    pub fn push_back(&mut self, id: ProcessId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    /// Reinserta un proceso al frente. Sólo se usa para deshacer un
    /// despacho que no llegó a la CPU, nunca para expropiaciones.
    pub(crate) fn push_front(&mut self, id: ProcessId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_front(id);
        true
    }

    pub fn pop_front(&mut self) -> Option<ProcessId> {
        self.ids.pop_front()
    }

    pub fn front(&self) -> Option<ProcessId> {
        self.ids.front().copied()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.ids.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ProcessId> {
        self.ids.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
