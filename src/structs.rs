use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;

// A general wrapper to pass a seed along with actual data
#[derive(Debug, Clone)]
pub struct SeededData<T: Clone> {
    pub seed: u64,
    pub data: T,
}

/// An opaque sub-flow identifier.
///
/// Cluster labels are integers, but the tables and model documents exchanged with other tools may
/// carry them as strings, so they are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    pub fn new(s: impl Into<String>) -> Self {
        Label(s.into())
    }

    /// The label of points that belong to no density-based cluster
    pub fn noise() -> Self {
        Label("-1".to_string())
    }

    pub fn is_noise(&self) -> bool {
        self.0 == "-1"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Label {
    fn from(id: i64) -> Self {
        Label(id.to_string())
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label(s.to_string())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // model documents written by other tools use either integers or strings
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLabel {
            Int(i64),
            Text(String),
        }
        Ok(match RawLabel::deserialize(deserializer)? {
            RawLabel::Int(i) => Label::from(i),
            RawLabel::Text(s) => Label(s),
        })
    }
}

/// An application-level message: a timestamp (seconds), a size (bytes) and its sub-flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "Time")]
    pub timestamp: f64,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Label")]
    pub label: Label,
}

impl Packet {
    pub fn new(timestamp: f64, size: u64, label: Label) -> Self {
        Packet {
            timestamp,
            size,
            label,
        }
    }

    /// Chronological order. Ties are equal.
    pub fn cmp_time(&self, other: &Self) -> Ordering {
        self.timestamp.total_cmp(&other.timestamp)
    }
}

/// The packets of one sub-flow, ordered by timestamp
#[derive(Debug, Clone)]
pub struct Flow {
    pub label: Label,
    pub packets: Vec<Packet>,
}

impl Flow {
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Inter-packet times in milliseconds
    pub fn inter_packet_times(&self) -> Vec<f64> {
        self.packets
            .windows(2)
            .map(|p| (p[1].timestamp - p[0].timestamp) * 1000.)
            .collect()
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.packets.iter().map(|p| p.size as f64).collect()
    }
}

/// A packet table, as read from or written to a CSV file
#[derive(Debug, Clone, Default)]
pub struct PacketTable {
    pub packets: Vec<Packet>,
}

impl PacketTable {
    pub fn new(packets: Vec<Packet>) -> Self {
        PacketTable { packets }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn sizes(&self) -> Vec<f64> {
        self.packets.iter().map(|p| p.size as f64).collect()
    }

    /// Inter-packet times in milliseconds, in table order
    pub fn inter_packet_times(&self) -> Vec<f64> {
        self.packets
            .windows(2)
            .map(|p| (p[1].timestamp - p[0].timestamp) * 1000.)
            .collect()
    }

    /// Replace every label, in table order. The label count must match the packet count.
    pub fn relabel(&mut self, labels: Vec<Label>) -> Result<()> {
        if labels.len() != self.packets.len() {
            return Err(Error::InputValidation(format!(
                "{} labels for {} packets",
                labels.len(),
                self.packets.len()
            )));
        }
        for (p, l) in self.packets.iter_mut().zip(labels) {
            p.label = l;
        }
        Ok(())
    }

    /// The whole table seen as a single flow
    pub fn as_single_flow(&self, label: Label) -> Flow {
        let mut packets: Vec<Packet> = self
            .packets
            .iter()
            .map(|p| Packet::new(p.timestamp, p.size, label.clone()))
            .collect();
        packets.sort_by(Packet::cmp_time);
        Flow { label, packets }
    }

    /// Group the packets by label. Sub-flows are returned in order of first appearance and each
    /// of them is sorted by timestamp.
    pub fn sub_flows(&self) -> Vec<Flow> {
        let mut index: HashMap<&Label, usize> = HashMap::new();
        let mut flows: Vec<Flow> = vec![];
        for p in self.packets.iter() {
            let i = *index.entry(&p.label).or_insert_with(|| {
                flows.push(Flow {
                    label: p.label.clone(),
                    packets: vec![],
                });
                flows.len() - 1
            });
            flows[i].packets.push(p.clone());
        }
        for f in flows.iter_mut() {
            // stable, so packets with the same timestamp keep their table order
            f.packets.sort_by(Packet::cmp_time);
        }
        flows
    }

    /// Sort the table chronologically
    pub fn sort(&mut self) {
        self.packets.sort_by(Packet::cmp_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(ts: f64, size: u64, label: &str) -> Packet {
        Packet::new(ts, size, Label::from(label))
    }

    #[test]
    fn test_sub_flows_order() {
        let table = PacketTable::new(vec![
            packet(0.3, 10, "1"),
            packet(0.1, 20, "0"),
            packet(0.2, 30, "1"),
            packet(0.4, 40, "0"),
        ]);
        let flows = table.sub_flows();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].label, Label::from("1"));
        assert_eq!(flows[0].packets[0].timestamp, 0.2);
        assert_eq!(flows[0].packets[1].timestamp, 0.3);
        assert_eq!(flows[1].label, Label::from("0"));
        assert_eq!(flows[1].len(), 2);
    }

    #[test]
    fn test_inter_packet_times_in_ms() {
        let table = PacketTable::new(vec![
            packet(1.0, 10, "0"),
            packet(1.5, 10, "0"),
            packet(1.75, 10, "0"),
        ]);
        let flow = table.as_single_flow(Label::from("0"));
        let ipt = flow.inter_packet_times();
        assert_eq!(ipt.len(), 2);
        assert!((ipt[0] - 500.).abs() < 1e-9);
        assert!((ipt[1] - 250.).abs() < 1e-9);
    }

    #[test]
    fn test_label_json() {
        let l: Label = serde_json::from_str("3").unwrap();
        assert_eq!(l, Label::from(3i64));
        let l: Label = serde_json::from_str("\"-1\"").unwrap();
        assert!(l.is_noise());
        assert_eq!(serde_json::to_string(&Label::from(7i64)).unwrap(), "\"7\"");
    }
}
