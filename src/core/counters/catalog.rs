//! Ready-made counter sets for the system-wide readers.

use std::sync::Arc;

use super::{CounterBackend, CounterHandle, CounterPath, CounterResolver};
use crate::error::Result;

/// Instance name carrying the machine-wide total.
pub const TOTAL_INSTANCE: &str = "_Total";

/// Substrings of network interface names that never carry real traffic.
const INVALID_NETWORK_PATTERNS: [&str; 11] = [
    "isatap",
    "teredo",
    "loopback",
    "ms_ndiswan",
    "ppp",
    "vpn",
    "virtual",
    "pseudo",
    "bluetooth",
    "hamachi",
    "tap-",
];

pub fn is_valid_network_instance(instance: &str) -> bool {
    let lower = instance.to_lowercase();
    !INVALID_NETWORK_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

pub struct DiskCounters {
    pub idle_time: CounterHandle,
    pub read_bytes: CounterHandle,
    pub write_bytes: CounterHandle,
}

#[derive(Default)]
pub struct NetworkCounters {
    pub sent: Vec<CounterHandle>,
    pub received: Vec<CounterHandle>,
    pub bandwidth: Option<CounterHandle>,
}

/// Builds primed counter handles for CPU, memory, disk and network.
pub struct CounterCatalog {
    resolver: CounterResolver,
}

impl CounterCatalog {
    pub fn new(backend: Arc<dyn CounterBackend>) -> Self {
        Self {
            resolver: CounterResolver::new(backend),
        }
    }

    pub fn resolver(&self) -> &CounterResolver {
        &self.resolver
    }

    fn backend(&self) -> &Arc<dyn CounterBackend> {
        self.resolver.backend()
    }

    /// `% Processor Time` always reads the `_Total` instance.
    pub fn cpu_total(&self) -> Result<CounterHandle> {
        let category = self.resolver.resolve_category(&["Processor", "Procesador"])?;
        let counter = self
            .resolver
            .resolve_counter(&category, &["% Processor Time", "% de tiempo de procesador"]);
        CounterHandle::open_primed(
            self.backend(),
            CounterPath::new(&category, &counter, Some(TOTAL_INSTANCE)),
        )
    }

    /// `Available Bytes` is a single-instance counter.
    pub fn memory_available(&self) -> Result<CounterHandle> {
        let category = self.resolver.resolve_category(&["Memory", "Memoria"])?;
        let counter = self
            .resolver
            .resolve_counter(&category, &["Available Bytes", "Bytes disponibles"]);
        CounterHandle::open_primed(self.backend(), CounterPath::new(&category, &counter, None))
    }

    pub fn disk(&self) -> Result<DiskCounters> {
        let category = self
            .resolver
            .resolve_category(&["PhysicalDisk", "Disco físico"])?;
        let idle = self
            .resolver
            .resolve_counter(&category, &["% Idle Time", "% de tiempo inactivo"]);
        let read = self.resolver.resolve_counter(
            &category,
            &["Disk Read Bytes/sec", "Bytes de lectura de disco/s"],
        );
        let write = self.resolver.resolve_counter(
            &category,
            &["Disk Write Bytes/sec", "Bytes de escritura en disco/s"],
        );

        let open = |counter: &str| {
            CounterHandle::open_primed(
                self.backend(),
                CounterPath::new(&category, counter, Some(TOTAL_INSTANCE)),
            )
        };

        Ok(DiskCounters {
            idle_time: open(&idle)?,
            read_bytes: open(&read)?,
            write_bytes: open(&write)?,
        })
    }

    /// Sent/received counters for every plausible physical interface.
    /// Interfaces whose counters fail to open are skipped.
    pub fn network(&self) -> Result<NetworkCounters> {
        let category = self
            .resolver
            .resolve_category(&["Network Interface", "Interfaz de red"])?;
        let sent_name = self
            .resolver
            .resolve_counter(&category, &["Bytes Sent/sec", "Bytes enviados/s"]);
        let received_name = self
            .resolver
            .resolve_counter(&category, &["Bytes Received/sec", "Bytes recibidos/s"]);
        let bandwidth_name = self
            .resolver
            .resolve_counter(&category, &["Current Bandwidth", "Ancho de banda actual"]);

        let mut counters = NetworkCounters::default();
        for instance in self.backend().instance_names(&category)? {
            if !is_valid_network_instance(&instance) {
                continue;
            }

            let sent = CounterHandle::open_primed(
                self.backend(),
                CounterPath::new(&category, &sent_name, Some(&instance)),
            );
            let received = CounterHandle::open_primed(
                self.backend(),
                CounterPath::new(&category, &received_name, Some(&instance)),
            );

            match (sent, received) {
                (Ok(sent), Ok(received)) => {
                    counters.sent.push(sent);
                    counters.received.push(received);
                }
                (Err(e), _) | (_, Err(e)) => {
                    log::debug!("Skipping network interface '{}': {}", instance, e);
                    continue;
                }
            }

            if counters.bandwidth.is_none() {
                counters.bandwidth = CounterHandle::open_primed(
                    self.backend(),
                    CounterPath::new(&category, &bandwidth_name, Some(&instance)),
                )
                .ok();
            }
        }

        Ok(counters)
    }
}
