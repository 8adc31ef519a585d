// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Text injector that types into a terminal stream

use std::io::{self, Write};

use crossexpand_runtime::{ServiceResult, TextInjector};
use tracing::warn;

/// Erases one character on a terminal: back, blank, back
const ERASE: &[u8] = b"\x08 \x08";

pub struct ConsoleInjector {
    out: Box<dyn Write + Send>,
    last_error: Option<String>,
}

impl ConsoleInjector {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            last_error: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn write(&mut self, bytes: &[u8]) -> bool {
        match self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                false
            }
        }
    }
}

impl TextInjector for ConsoleInjector {
    fn initialize(&mut self) -> ServiceResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn inject(&mut self, text: &str) -> bool {
        self.write(text.as_bytes())
    }

    fn delete_previous_chars(&mut self, count: usize) -> bool {
        self.write(&ERASE.repeat(count))
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!("[INJECTOR] Final flush failed: {}", e);
            self.last_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct StuckFlush;

    impl Write for StuckFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "terminal gone"))
        }
    }

    #[test]
    fn test_delete_then_inject() {
        let buffer = SharedBuffer::default();
        let mut injector = ConsoleInjector::new(buffer.clone());
        injector.initialize().unwrap();

        assert!(injector.delete_previous_chars(2));
        assert!(injector.inject("héllo"));
        assert_eq!(
            *buffer.0.lock(),
            [ERASE, ERASE, "héllo".as_bytes()].concat()
        );
        assert_eq!(injector.last_error(), None);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut injector = ConsoleInjector::new(BrokenPipe);
        assert!(!injector.inject("text"));
        assert!(injector.last_error().unwrap().contains("pipe closed"));
    }

    #[test]
    fn test_shutdown_flush_failure_is_recorded() {
        let mut injector = ConsoleInjector::new(StuckFlush);
        injector.shutdown();
        assert!(injector.last_error().unwrap().contains("terminal gone"));
    }
}
