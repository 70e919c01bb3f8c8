//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use mason_core::builder::{ToolOutput, Toolchain};
use mason_core::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times - subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A toolchain that records every invocation and fakes tool side effects:
/// the compiler and linker write their `-o` target, the archiver writes its
/// archive, the symbol dumper replays canned dumps, and the analyzer writes
/// its output file. Any invocation whose arguments contain `fail_substring`
/// fails.
#[derive(Default)]
pub struct StubToolchain {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
    pub fail_substring: Option<String>,
    /// Library file name -> `nm` style dump text.
    pub symbol_dumps: BTreeMap<String, String>,
}

impl StubToolchain {
    #[allow(dead_code)]
    pub fn with_symbols(symbol_dumps: BTreeMap<String, String>) -> StubToolchain {
        StubToolchain {
            symbol_dumps,
            ..StubToolchain::default()
        }
    }

    /// Invocations of `tool` whose arguments include `marker`.
    #[allow(dead_code)]
    pub fn count_calls(&self, tool: &str, marker: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(t, args)| t == tool && args.iter().any(|a| a == marker))
            .count()
    }

    #[allow(dead_code)]
    pub fn calls_of(&self, tool: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .iter()
            .filter(|(t, _)| t == tool)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl Toolchain for StubToolchain {
    fn run(&self, tool: &str, args: &[String]) -> Result<ToolOutput> {
        self.calls.lock().push((tool.to_string(), args.to_vec()));
        if let Some(bad) = &self.fail_substring {
            if args.iter().any(|a| a.contains(bad.as_str())) {
                return Ok(ToolOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: "stub failure".to_string(),
                });
            }
        }
        match tool {
            "g++" => {
                if let Some(pos) = args.iter().position(|a| a == "-o") {
                    if let Some(out) = args.get(pos + 1) {
                        std::fs::write(out, b"stub output")?;
                    }
                }
            }
            "ar" => {
                if let Some(lib) = args.get(1) {
                    std::fs::write(lib, b"stub archive")?;
                }
            }
            "nm" => {
                let name = args
                    .first()
                    .map(|a| {
                        Path::new(a)
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default()
                    })
                    .unwrap_or_default();
                let dump = self.symbol_dumps.get(&name).cloned().unwrap_or_default();
                return Ok(ToolOutput {
                    success: true,
                    stdout: dump,
                    stderr: String::new(),
                });
            }
            "mason-analyze" => {
                if let Some(out) = args.get(1) {
                    std::fs::write(out, b"stub analysis")?;
                }
            }
            _ => {}
        }
        Ok(ToolOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
