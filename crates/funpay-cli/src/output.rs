use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use funpay_types::RunnerEvent;

/// Writes events as one JSON object per line and tallies them by kind.
pub(crate) struct EventWriter<W: Write> {
    out: W,
    counts: BTreeMap<&'static str, usize>,
}

impl<W: Write> EventWriter<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out,
            counts: BTreeMap::new(),
        }
    }

    pub(crate) fn write_event(&mut self, event: &RunnerEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("failed to serialize event")?;
        writeln!(self.out, "{line}").context("failed to write event to stdout")?;
        self.out.flush().context("failed to flush stdout")?;
        *self.counts.entry(event.kind().as_str()).or_default() += 1;
        Ok(())
    }

    pub(crate) fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub(crate) fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "funpay-runner: no events".to_string();
        }
        let breakdown = self
            .counts
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("funpay-runner: {} events ({breakdown})", self.total())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn unit_events_are_written_as_ndjson_and_counted() {
        let mut writer = EventWriter::new(Vec::new());
        writer
            .write_event(&RunnerEvent::ChatsListChanged)
            .expect("write");
        writer
            .write_event(&RunnerEvent::OrdersListChanged {
                buyer: 0,
                seller: 2,
            })
            .expect("write");
        writer
            .write_event(&RunnerEvent::ChatsListChanged)
            .expect("write");
        assert_eq!(writer.total(), 3);
        assert_eq!(
            writer.summary(),
            "funpay-runner: 3 events (chats_list_changed=2 orders_list_changed=1)"
        );

        let raw = String::from_utf8(writer.into_inner()).expect("utf8");
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["type"], "orders_list_changed");
        assert_eq!(lines[1]["seller"], 2);
    }

    #[test]
    fn unit_empty_summary() {
        let writer = EventWriter::new(Vec::new());
        assert_eq!(writer.summary(), "funpay-runner: no events");
    }
}
