use crate::types::PeerRecord;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FOOTER: &str = "================================";

/// Render a peer snapshot as the multi-line block written to the log.
///
/// Peers are numbered from 1 in the order the node returned them. A peer whose
/// `eth` payload cannot be rendered gets a placeholder line instead and the
/// remaining peers are still formatted.
pub fn format_snapshot(peers: &[PeerRecord], at: NaiveDateTime) -> String {
    let mut out = format!(
        "=== Connected Peers at {} ===\nTotal Peers: {}\n\n",
        at.format(TIMESTAMP_FORMAT),
        peers.len()
    );

    for (i, peer) in peers.iter().enumerate() {
        out.push_str(&format_peer(i + 1, peer));
        out.push('\n');
    }

    out.push_str(FOOTER);
    out
}

pub fn format_peer(number: usize, peer: &PeerRecord) -> String {
    let mut out = format!(
        "Peer {}:\n  ID: {}\n  Name: {}\n  Remote Address: {}\n  Capabilities: [{}]\n",
        number,
        peer.id,
        peer.name,
        peer.network.remote_address,
        peer.caps.join(" ")
    );

    if let Some(eth) = peer.protocols.get("eth") {
        out.push_str(&eth_protocol_line(&peer.id, eth));
    }

    out
}

// A payload that fails to render is reported in place of the block
fn eth_protocol_line<T: Serialize + ?Sized>(peer_id: &str, eth: &T) -> String {
    match render_protocol(eth) {
        Ok(text) => format!("  ETH Protocol: {}\n", text),
        Err(e) => {
            warn!("Failed to render eth protocol data for peer {}: {}", peer_id, e);
            format!("  ETH Protocol: <unrenderable: {}>\n", e)
        }
    }
}

// Pretty JSON with continuation lines indented under the label
fn render_protocol<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let pretty = serde_json::to_string_pretty(value)?;
    Ok(pretty.replace('\n', "\n  "))
}
