// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Input-monitor task: installs the keyboard hook on its own thread and
//! pumps it

use std::sync::Arc;

use tracing::info;

use crate::context::DependencyContext;
use crate::error::TaskError;
use crate::services::KeySink;
use crate::worker::{WorkOutcome, WorkerTask};

pub struct InputMonitor {
    context: Arc<DependencyContext>,
    installed: bool,
}

impl InputMonitor {
    pub fn new(context: Arc<DependencyContext>) -> Self {
        Self {
            context,
            installed: false,
        }
    }
}

impl WorkerTask for InputMonitor {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        let mut hook = self.context.input_hook.lock();

        // Installed lazily so OS hooks bind to this worker's thread
        if !self.installed {
            let sink = KeySink::new(Arc::clone(&self.context.queue), Arc::clone(&self.context.classifier));
            hook.install(sink)
                .map_err(|e| TaskError::Fatal(format!("Failed to install input hook: {}", e)))?;
            self.installed = true;
            info!("[INPUT] Keyboard hook installed");
        }

        match hook.pump() {
            Ok(0) => Ok(WorkOutcome::Idle),
            Ok(_) => Ok(WorkOutcome::Worked),
            Err(e) => Err(TaskError::Recoverable(format!("Input hook pump failed: {}", e))),
        }
    }

    fn on_stop(&mut self) {
        if self.installed {
            self.context.input_hook.lock().uninstall();
            self.installed = false;
            info!("[INPUT] Keyboard hook removed");
        }
    }
}
