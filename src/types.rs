use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use futures_util::Stream;
use std::pin::Pin;

/// One connected peer as reported by `admin_peers`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PeerRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub caps: Vec<String>,
    #[serde(default)]
    pub network: PeerNetwork,
    // opaque per-protocol payload, only ever pretty-printed
    #[serde(default)]
    pub protocols: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerNetwork {
    #[serde(default)]
    pub local_address: String,
    #[serde(default)]
    pub remote_address: String,
}

/// Result of a single remote call, in the order the node returned it.
pub type PeerSnapshot = Vec<PeerRecord>;

pub type GenericBoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_node_shape() {
        let raw = r#"{
            "enode": "enode://abc@10.0.0.2:30303",
            "id": "abc",
            "name": "Geth/v1.13.5-stable/linux-amd64/go1.21.4",
            "caps": ["eth/67", "eth/68", "snap/1"],
            "network": {
                "localAddress": "10.0.0.1:30303",
                "remoteAddress": "10.0.0.2:41234",
                "inbound": true,
                "trusted": false,
                "static": false
            },
            "protocols": {
                "eth": { "version": 68 },
                "snap": { "version": 1 }
            }
        }"#;

        let peer: PeerRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(peer.id, "abc");
        assert_eq!(peer.caps, vec!["eth/67", "eth/68", "snap/1"]);
        assert_eq!(peer.network.local_address, "10.0.0.1:30303");
        assert_eq!(peer.network.remote_address, "10.0.0.2:41234");
        assert_eq!(peer.protocols["eth"]["version"], 68);
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let peer: PeerRecord = serde_json::from_str(r#"{"id": "x", "name": "y"}"#).unwrap();
        assert!(peer.caps.is_empty());
        assert!(peer.protocols.is_empty());
        assert_eq!(peer.network, PeerNetwork::default());
    }

    #[test]
    fn snapshot_keeps_node_order() {
        let raw = r#"[{"id": "c", "name": ""}, {"id": "a", "name": ""}, {"id": "b", "name": ""}]"#;
        let snapshot: PeerSnapshot = serde_json::from_str(raw).unwrap();
        let ids: Vec<_> = snapshot.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
