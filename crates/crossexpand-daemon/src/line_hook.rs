// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented input hook
//!
//! A reader thread turns every character of its source into a press and a
//! release and hands them over a bounded channel. `pump()` drains what has
//! arrived into the runtime's [`KeySink`] without blocking.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use crossexpand_event_queue::KeyPayload;
use crossexpand_runtime::{InputHook, KeySink, ServiceError, ServiceResult};
use tracing::{debug, info, warn};

/// Key events buffered between the reader thread and `pump()`
const CHANNEL_CAPACITY: usize = 4096;

/// Events forwarded per `pump()` call
const PUMP_BATCH: usize = 256;

type LineSource = Box<dyn BufRead + Send>;

pub struct LineInputHook {
    source: Option<LineSource>,
    receiver: Option<Receiver<KeyPayload>>,
    sink: Option<KeySink>,
    eof: Arc<AtomicBool>,
    eof_logged: bool,
}

impl LineInputHook {
    pub fn new(source: impl BufRead + Send + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            receiver: None,
            sink: None,
            eof: Arc::new(AtomicBool::new(false)),
            eof_logged: false,
        }
    }

    /// Hook reading the process's standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }

    /// The source has been read to the end
    pub fn at_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }
}

fn read_source(mut source: LineSource, sender: Sender<KeyPayload>, eof: Arc<AtomicBool>) {
    let mut line = String::new();
    loop {
        line.clear();
        match source.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                for c in line.chars() {
                    let keycode = c as u32;
                    if sender.send(KeyPayload::press(keycode, c)).is_err()
                        || sender.send(KeyPayload::release(keycode)).is_err()
                    {
                        // Hook dropped
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("[INPUT] Read failed: {}", e);
                break;
            }
        }
    }
    eof.store(true, Ordering::Release);
}

impl InputHook for LineInputHook {
    fn initialize(&mut self) -> ServiceResult<()> {
        if self.receiver.is_some() {
            return Ok(());
        }
        let source = self
            .source
            .take()
            .ok_or_else(|| ServiceError::Initialization("line source already consumed".to_string()))?;

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let eof = Arc::clone(&self.eof);
        thread::Builder::new()
            .name("crossexpand-line-reader".to_string())
            .spawn(move || read_source(source, sender, eof))?;
        self.receiver = Some(receiver);
        debug!("[INPUT] Line reader started");
        Ok(())
    }

    fn install(&mut self, sink: KeySink) -> ServiceResult<()> {
        if self.receiver.is_none() {
            return Err(ServiceError::Hook("install() before initialize()".to_string()));
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn pump(&mut self) -> ServiceResult<usize> {
        let (Some(receiver), Some(sink)) = (&self.receiver, &self.sink) else {
            return Ok(0);
        };

        let mut forwarded = 0;
        for _ in 0..PUMP_BATCH {
            match receiver.try_recv() {
                Ok(payload) => {
                    // A dropped event is already counted by the queue
                    sink.submit(payload);
                    forwarded += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.eof_logged {
                        info!("[INPUT] End of input reached");
                        self.eof_logged = true;
                    }
                    break;
                }
            }
        }
        Ok(forwarded)
    }

    fn uninstall(&mut self) {
        self.sink = None;
    }
}
