//! A store that writes every dispatch to an output stream.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde_json::Value;

use actionmap_engine::{Action, Store};

pub struct PrintingStore<W> {
    state: Value,
    out: Mutex<W>,
}

impl<W: Write> PrintingStore<W> {
    pub fn new(state: Value, out: W) -> Self {
        Self {
            state,
            out: Mutex::new(out),
        }
    }

    /// Write one `label<TAB>json` line.
    pub fn print(&self, label: &str, action: &Action) -> Result<()> {
        let line = serde_json::to_string(action)?;
        let mut out = self.lock();
        writeln!(out, "{label}\t{line}").context("writing replay output")?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush().context("flushing replay output")
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> Store for PrintingStore<W> {
    type State = Value;

    fn get_state(&self) -> Value {
        self.state.clone()
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        self.print("emit", &action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actionmap_engine::{Descriptor, Mediator, RoutingTable};

    #[test]
    fn prints_emissions_before_forward() {
        let store = PrintingStore::new(Value::Null, Vec::new());
        let mediator = Mediator::new(
            RoutingTable::builder()
                .route("A.in", Descriptor::rename("A.out"))
                .build(),
        );
        let handler = mediator
            .bind(&store)
            .then(|a: Action| store.print("next", &a));

        handler
            .handle(Action::new("A.in").with("src", "foo"))
            .unwrap();
        drop(handler);

        let out = String::from_utf8(store.into_inner()).unwrap();
        assert_eq!(
            out,
            "emit\t{\"kind\":\"A.out\",\"src\":\"foo\"}\nnext\t{\"kind\":\"A.in\",\"src\":\"foo\"}\n"
        );
    }
}
