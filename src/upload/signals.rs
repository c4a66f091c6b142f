// SPDX-License-Identifier: GPL-3.0-only

//! Signals a job emits towards the UI, and the subscription set that holds their handlers

use std::collections::BTreeMap;

use super::JobType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSignal {
    Progress(String),
    Error(String),
    Completed { job_type: JobType, upload_name: String },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Progress,
    Error,
    Completed,
    Cancelled,
}

impl JobSignal {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Progress(_) => SignalKind::Progress,
            Self::Error(_) => SignalKind::Error,
            Self::Completed { .. } => SignalKind::Completed,
            Self::Cancelled => SignalKind::Cancelled,
        }
    }
}

pub type SignalHandler = Box<dyn FnMut(&JobSignal) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Handlers connected to one job. Handlers run in connection order.
#[derive(Default)]
pub struct SignalBus {
    next_id: u64,
    handlers: BTreeMap<SubscriptionId, (SignalKind, SignalHandler)>,
}

impl SignalBus {
    pub fn connect(&mut self, kind: SignalKind, handler: SignalHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, (kind, handler));
        id
    }

    /// Drops every handler, returning how many were connected.
    pub fn disconnect_all(&mut self) -> usize {
        let count = self.handlers.len();
        self.handlers.clear();
        count
    }

    pub fn emit(&mut self, signal: &JobSignal) {
        let kind = signal.kind();
        for (handler_kind, handler) in self.handlers.values_mut() {
            if *handler_kind == kind {
                handler(signal);
            }
        }
    }
}
