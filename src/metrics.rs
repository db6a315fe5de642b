//! # Módulo de Métricas y Reportes
//!
//! Este módulo calcula las métricas de rendimiento de cada proceso terminado
//! y los promedios de la corrida, y genera los reportes en texto y CSV.
//!
//! El colector es una proyección pura del conjunto de procesos terminados:
//! las sumas acumuladas siempre se pueden recalcular a partir de ese conjunto.

use crate::events::DispatchRecord;
use crate::process::{Process, ProcessId, Tick};

/// Métricas individuales de un proceso terminado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMetrics {
    pub process_id: ProcessId,
    pub arrival_time: Tick,
    pub total_burst: Tick,
    /// Tick del primer despacho
    pub start_time: Tick,
    pub finish_time: Tick,
    /// `turnaround_time - total_burst`
    pub waiting_time: Tick,
    /// `finish_time - arrival_time`
    pub turnaround_time: Tick,
    /// `start_time - arrival_time`
    pub response_time: Tick,
}

/// Métricas agregadas de la corrida.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub finished: usize,
    pub average_waiting_time: f64,
    pub average_turnaround_time: f64,
    pub average_response_time: f64,
    /// Tick de la última finalización
    pub makespan: Tick,
    /// Procesos terminados por tick
    pub throughput: f64,
    /// Fracción de ticks ocupados de cada CPU sobre el makespan
    pub utilization: Vec<f64>,
    pub completion_order: Vec<ProcessId>,
}

/// Colector de métricas alimentado con los eventos `Finished`.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    finished: Vec<ProcessMetrics>,
    total_waiting: Tick,
    total_turnaround: Tick,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un proceso terminado.
    ///
    /// # Returns
    ///
    /// Las métricas calculadas, o `None` si el proceso no terminó
    pub fn record(&mut self, process: &Process) -> Option<&ProcessMetrics> {
        let finish_time = process.finish_time()?;
        let turnaround_time = process.turnaround_time()?;
        let waiting_time = process.waiting_time()?;
        let start_time = process.start_time().unwrap_or(finish_time);

        self.total_waiting += waiting_time;
        self.total_turnaround += turnaround_time;
        self.finished.push(ProcessMetrics {
            process_id: process.id(),
            arrival_time: process.arrival_time(),
            total_burst: process.total_burst(),
            start_time,
            finish_time,
            waiting_time,
            turnaround_time,
            response_time: start_time.saturating_sub(process.arrival_time()),
        });
        self.finished.last()
    }

    /// Métricas por proceso en orden de finalización
    pub fn finished(&self) -> &[ProcessMetrics] {
        &self.finished
    }

    pub fn get(&self, process_id: ProcessId) -> Option<&ProcessMetrics> {
        self.finished.iter().find(|m| m.process_id == process_id)
    }

    pub fn len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }

    pub fn completion_order(&self) -> Vec<ProcessId> {
        self.finished.iter().map(|m| m.process_id).collect()
    }

    pub fn average_waiting_time(&self) -> f64 {
        average(self.total_waiting, self.finished.len())
    }

    pub fn average_turnaround_time(&self) -> f64 {
        average(self.total_turnaround, self.finished.len())
    }

    /// Recalcula ambos promedios desde el conjunto de terminados.
    ///
    /// # Returns
    ///
    /// `(average_waiting_time, average_turnaround_time)`
    pub fn recompute(&self) -> (f64, f64) {
        let waiting: Tick = self.finished.iter().map(|m| m.waiting_time).sum();
        let turnaround: Tick = self.finished.iter().map(|m| m.turnaround_time).sum();
        (
            average(waiting, self.finished.len()),
            average(turnaround, self.finished.len()),
        )
    }

    /// Calcula el resumen de la corrida.
    ///
    /// # Arguments
    ///
    /// * `timeline` - Porciones ejecutadas, para la utilización por CPU
    /// * `num_workers` - Cantidad de CPUs de la corrida
    pub fn summary(&self, timeline: &[DispatchRecord], num_workers: usize) -> MetricsSummary {
        let makespan = self
            .finished
            .iter()
            .map(|m| m.finish_time)
            .max()
            .unwrap_or(0);
        let response: Tick = self.finished.iter().map(|m| m.response_time).sum();

        let mut busy = vec![0 as Tick; num_workers];
        for record in timeline {
            if let Some(ticks) = busy.get_mut(record.worker_id) {
                *ticks += record.ticks();
            }
        }
        let utilization = busy
            .into_iter()
            .map(|ticks| ratio(ticks as f64, makespan as f64))
            .collect();

        MetricsSummary {
            finished: self.finished.len(),
            average_waiting_time: self.average_waiting_time(),
            average_turnaround_time: self.average_turnaround_time(),
            average_response_time: average(response, self.finished.len()),
            makespan,
            throughput: ratio(self.finished.len() as f64, makespan as f64),
            utilization,
            completion_order: self.completion_order(),
        }
    }

    pub fn clear(&mut self) {
        self.finished.clear();
        self.total_waiting = 0;
        self.total_turnaround = 0;
    }

    /// Genera un reporte detallado de los resultados.
    pub fn generate_report(&self, summary: &MetricsSummary) -> String {
        let mut report = String::new();

        report.push_str("\n=== REPORTE DE RESULTADOS ===\n\n");
        report.push_str(&format!(
            "{:^8} {:^9} {:^7} {:^8} {:^8} {:^8} {:^12} {:^10}\n",
            "Proc", "Llegada", "Ráfaga", "Inicio", "Fin", "Espera", "Turnaround", "Respuesta"
        ));
        report.push_str(&format!("{}\n", "-".repeat(80)));

        for m in &self.finished {
            report.push_str(&format!(
                "{:^8} {:^9} {:^7} {:^8} {:^8} {:^8} {:^12} {:^10}\n",
                format!("P{}", m.process_id),
                m.arrival_time,
                m.total_burst,
                m.start_time,
                m.finish_time,
                m.waiting_time,
                m.turnaround_time,
                m.response_time
            ));
        }

        report.push_str("\n=== ESTADÍSTICAS RESUMIDAS ===\n");
        report.push_str(&format!("Procesos completados: {}\n", summary.finished));
        report.push_str(&format!(
            "Tiempo promedio de espera: {:.2} ticks\n",
            summary.average_waiting_time
        ));
        report.push_str(&format!(
            "Tiempo promedio de turnaround: {:.2} ticks\n",
            summary.average_turnaround_time
        ));
        report.push_str(&format!(
            "Tiempo promedio de respuesta: {:.2} ticks\n",
            summary.average_response_time
        ));
        report.push_str(&format!("Makespan: {} ticks\n", summary.makespan));
        report.push_str(&format!(
            "Throughput: {:.3} procesos/tick\n",
            summary.throughput
        ));
        for (worker, utilization) in summary.utilization.iter().enumerate() {
            report.push_str(&format!(
                "Utilización CPU {}: {:.1}%\n",
                worker,
                utilization * 100.0
            ));
        }
        report.push_str(&format!(
            "Orden de finalización: {:?}\n",
            summary.completion_order
        ));

        report
    }

    /// Genera un reporte en formato CSV, una fila por proceso terminado.
    pub fn generate_csv_report(&self) -> String {
        let mut csv = String::from(
            "ProcessID,ArrivalTime,Burst,StartTime,FinishTime,WaitTime,Turnaround,ResponseTime\n",
        );
        for m in &self.finished {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                m.process_id,
                m.arrival_time,
                m.total_burst,
                m.start_time,
                m.finish_time,
                m.waiting_time,
                m.turnaround_time,
                m.response_time
            ));
        }
        csv
    }
}

fn average(total: Tick, count: usize) -> f64 {
    ratio(total as f64, count as f64)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(id: ProcessId, arrival: Tick, burst: Tick, start: Tick, finish: Tick) -> Process {
        let mut process = Process::new(id, arrival, burst);
        process.mark_running(start);
        process.consume(burst);
        process.mark_finished(finish);
        process
    }

    #[test]
    fn test_record_computes_times() {
        let mut collector = MetricsCollector::new();
        let metrics = collector.record(&finished(3, 1, 1, 8, 9)).unwrap().clone();

        assert_eq!(metrics.turnaround_time, 8);
        assert_eq!(metrics.waiting_time, 7);
        assert_eq!(metrics.response_time, 7);
    }

    #[test]
    fn test_ignores_unfinished() {
        let mut collector = MetricsCollector::new();
        assert!(collector.record(&Process::new(1, 0, 4)).is_none());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_averages_match_recompute() {
        let mut collector = MetricsCollector::new();
        collector.record(&finished(1, 0, 5, 0, 5));
        collector.record(&finished(2, 0, 3, 5, 8));
        collector.record(&finished(3, 1, 1, 8, 9));

        assert_eq!(collector.average_waiting_time(), 4.0);
        assert_eq!(collector.average_turnaround_time(), 7.0);
        assert_eq!(
            collector.recompute(),
            (collector.average_waiting_time(), collector.average_turnaround_time())
        );
        assert_eq!(collector.completion_order(), vec![1, 2, 3]);
    }

    #[test]
    fn test_summary_utilization() {
        let mut collector = MetricsCollector::new();
        collector.record(&finished(1, 0, 4, 0, 4));
        let timeline = [DispatchRecord {
            process_id: 1,
            worker_id: 0,
            start_tick: 0,
            end_tick: 4,
        }];

        let summary = collector.summary(&timeline, 2);
        assert_eq!(summary.makespan, 4);
        assert_eq!(summary.utilization, vec![1.0, 0.0]);
        assert_eq!(summary.throughput, 0.25);
    }

    #[test]
    fn test_empty_collector() {
        let collector = MetricsCollector::new();
        let summary = collector.summary(&[], 1);
        assert_eq!(summary.average_waiting_time, 0.0);
        assert_eq!(summary.throughput, 0.0);
    }

    #[test]
    fn test_reports() {
        let mut collector = MetricsCollector::new();
        collector.record(&finished(1, 0, 2, 0, 2));
        let summary = collector.summary(&[], 1);

        let text = collector.generate_report(&summary);
        assert!(text.contains("REPORTE DE RESULTADOS"));
        assert!(text.contains("ESTADÍSTICAS RESUMIDAS"));
        assert!(text.contains("Tiempo promedio de espera: 0.00 ticks\n"));
        assert!(text.contains("Makespan: 2 ticks\n"));
        assert!(text.ends_with("Orden de finalización: [1]\n"));

        let csv = collector.generate_csv_report();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("ProcessID,"));
        assert_eq!(csv.lines().nth(1), Some("1,0,2,0,2,0,2,0"));
    }

    #[test]
    fn test_clear() {
        let mut collector = MetricsCollector::new();
        collector.record(&finished(1, 0, 2, 0, 2));
        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.average_turnaround_time(), 0.0);
    }
}
