//! Runtime configuration.
//!
//! The default heap size is fixed at build time (`FORJ_HEAP_SIZE`, see
//! `build.rs`); everything else can be changed per interpreter instance.

/// Arena size used when nothing else is specified.
pub const DEFAULT_HEAP_SIZE: usize = parse_heap_size(env!("FORJ_DEFAULT_HEAP_SIZE"));

/// Byte written over reclaimed blocks so stale reads stand out in dumps.
pub const DEFAULT_POISON: u8 = 0xFF;

/// Nesting limit for scope resolution and alias chasing.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 64;

const fn parse_heap_size(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut value = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as usize;
        i += 1;
    }
    value
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    pub heap_size: usize,
    pub poison: u8,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
            poison: DEFAULT_POISON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub arena: ArenaConfig,
    pub max_scan_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
        }
    }
}

impl Config {
    pub fn with_heap_size(mut self, heap_size: usize) -> Self {
        self.arena.heap_size = heap_size;
        self
    }

    pub fn with_poison(mut self, poison: u8) -> Self {
        self.arena.poison = poison;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_time_default_is_sane() {
        assert!(DEFAULT_HEAP_SIZE >= 64);
        assert_eq!(Config::default().arena.heap_size, DEFAULT_HEAP_SIZE);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::default().with_heap_size(4096).with_poison(0xAA);
        assert_eq!(config.arena.heap_size, 4096);
        assert_eq!(config.arena.poison, 0xAA);
    }
}
