use std::env;

// Default arena size for the interpreter heap. Embedded builds pin this at
// compile time; the CLI can still override it at runtime.
const DEFAULT_HEAP_SIZE: usize = 0x10000;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=FORJ_HEAP_SIZE");

    let heap_size = match env::var("FORJ_HEAP_SIZE") {
        Ok(raw) => {
            let trimmed = raw.trim();
            let parsed = if let Some(hex) = trimmed.strip_prefix("0x") {
                usize::from_str_radix(hex, 16)
            } else {
                trimmed.parse::<usize>()
            };
            match parsed {
                Ok(size) if size >= 64 => size,
                _ => panic!("FORJ_HEAP_SIZE must be an integer of at least 64 bytes, got {raw:?}"),
            }
        }
        Err(_) => DEFAULT_HEAP_SIZE,
    };

    // Target-specific: the smallest Cortex-M0 parts cannot spare the desktop default
    let target = env::var("TARGET").unwrap_or_default();
    let heap_size = if target.starts_with("thumbv6m") && env::var("FORJ_HEAP_SIZE").is_err() {
        heap_size / 4
    } else {
        heap_size
    };

    println!("cargo:rustc-env=FORJ_DEFAULT_HEAP_SIZE={heap_size}");
}
