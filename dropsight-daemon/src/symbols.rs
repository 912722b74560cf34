//! Kernel symbol table loading and lookup.
//!
//! Parses a kallsyms-format text file (`address type name [module]`) into
//! an ordered map and resolves instruction addresses to the containing
//! symbol via a floor lookup. A symbol covers the address range from its
//! own start up to the next symbol's start.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use dropsight_core::error::{ConfigError, DropsightError};
use dropsight_core::pipeline::SymbolResolver;
use dropsight_core::types::Symbol;

/// Symbol resolver backed by a kallsyms snapshot.
#[derive(Debug, Default)]
pub struct KallsymsResolver {
    symbols: BTreeMap<u64, Symbol>,
}

impl KallsymsResolver {
    /// Load a kallsyms-format file.
    ///
    /// Lines that do not parse are skipped; zero-address symbols
    /// (restricted view, kptr_restrict) make the table useless, so an
    /// empty result is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DropsightError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut symbols = BTreeMap::new();

        for line in content.lines() {
            let mut fields = line.split_whitespace();
            let (Some(addr), Some(_kind), Some(name)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let Ok(addr) = u64::from_str_radix(addr, 16) else {
                debug!(line, "skipping unparsable kallsyms line");
                continue;
            };
            if addr == 0 {
                continue;
            }
            symbols.insert(
                addr,
                Symbol {
                    name: name.to_owned(),
                    is_unix_socket: name.starts_with("unix_"),
                    is_tcp: name.starts_with("tcp_"),
                },
            );
        }

        if symbols.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.kallsyms_path".to_owned(),
                reason: format!(
                    "no usable symbols in {} (kptr_restrict or wrong file?)",
                    path.display()
                ),
            }
            .into());
        }

        info!(count = symbols.len(), path = %path.display(), "kernel symbols loaded");
        Ok(Self { symbols })
    }

    /// Look up a symbol address by exact name.
    pub fn find_by_name(&self, name: &str) -> Option<u64> {
        self.symbols
            .iter()
            .find(|(_, sym)| sym.name == name)
            .map(|(addr, _)| *addr)
    }
}

impl SymbolResolver for KallsymsResolver {
    fn resolve(&self, addr: u64) -> Option<Symbol> {
        self.symbols
            .range(..=addr)
            .next_back()
            .map(|(_, sym)| sym.clone())
    }
}
