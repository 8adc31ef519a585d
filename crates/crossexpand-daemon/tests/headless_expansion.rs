// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The headless services driving a real worker pool

use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossexpand_config::load_config_from_str;
use crossexpand_daemon::{ConsoleInjector, LineInputHook};
use crossexpand_runtime::{MapShortcutLookup, PoolConfig, PoolServices, WorkerPool};
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct Terminal(Arc<Mutex<Vec<u8>>>);

impl Terminal {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for Terminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn typed_lines_are_expanded_on_the_terminal() {
    let config = load_config_from_str(
        r#"
[processing]
processor_thread_count = 2

[queue]
queue_capacity_per_priority = 256

[workers]
idle_sleep_ms = 1

[injection]
expansion_delay_ms = 0

[shortcuts]
"/sig" = "Best regards"
"#,
    )
    .unwrap();

    let terminal = Terminal::default();
    let shortcuts: BTreeMap<String, String> = config.shortcuts.clone();
    let pool = WorkerPool::new(
        PoolConfig::from_config(&config),
        PoolServices::new(
            Box::new(LineInputHook::new(Cursor::new("thanks /sig\nbye\n"))),
            Arc::new(MapShortcutLookup::new(shortcuts)),
            Box::new(ConsoleInjector::new(terminal.clone())),
        ),
    )
    .unwrap();
    pool.initialize().unwrap();

    let expected = [b"\x08 \x08".repeat(5), b"Best regards".to_vec()].concat();
    assert!(wait_until(Duration::from_secs(5), || terminal.contents() == expected));

    // 16 characters, each a press and a release
    assert!(wait_until(Duration::from_secs(5), || {
        pool.get_stats().total_events_processed == 32
    }));
    assert_eq!(pool.get_stats().total_expansions_performed, 1);
    pool.shutdown();
}
