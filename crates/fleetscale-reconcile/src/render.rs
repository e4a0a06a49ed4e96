//! Artifact renderers.
//!
//! Each renderer is a pure function of the membership and its config, so a
//! repeated membership renders byte-identical output.

use fleetscale_core::{InventoryConfig, MonitoringConfig};

/// Marker line from which the Prometheus config is regenerated.
pub const SCRAPE_MARKER: &str = "scrape_configs:";

/// Render the Ansible inventory: the fleet group first, then each static group.
pub fn render_inventory(config: &InventoryConfig, members: &[String]) -> String {
    let mut out = String::new();

    out.push_str(&format!("[{}]\n", config.fleet_group));
    for ip in members {
        out.push_str(&format!("{ip} {}\n", config.host_params));
    }

    for group in &config.static_groups {
        out.push_str(&format!("\n[{}]\n", group.name));
        for host in &group.hosts {
            out.push_str(&format!("{host} {}\n", config.host_params));
        }
    }

    out
}

/// Render the `scrape_configs:` block: Prometheus itself plus one
/// node-exporter target per member.
pub fn render_scrape_configs(config: &MonitoringConfig, members: &[String]) -> String {
    let mut out = String::new();

    out.push_str(SCRAPE_MARKER);
    out.push('\n');
    out.push_str("  - job_name: 'prometheus'\n");
    out.push_str("    static_configs:\n");
    out.push_str(&format!("      - targets: ['{}']\n", config.self_target));
    out.push('\n');
    out.push_str(&format!("  - job_name: '{}'\n", config.fleet_job));
    out.push_str("    static_configs:\n");
    out.push_str("      - targets:\n");
    for ip in members {
        out.push_str(&format!("          - '{ip}:{}'\n", config.exporter_port));
    }

    out
}

/// Keep every line of `existing` before the first one containing the
/// marker and append `block`. `None` when the marker is absent.
pub fn splice_scrape_configs(existing: &str, block: &str) -> Option<String> {
    let mut prefix_len = 0;
    for line in existing.split_inclusive('\n') {
        if line.contains(SCRAPE_MARKER) {
            let mut out = String::with_capacity(prefix_len + block.len());
            out.push_str(&existing[..prefix_len]);
            out.push_str(block);
            return Some(out);
        }
        prefix_len += line.len();
    }
    None
}

/// Render the nginx upstream template, one `server` entry per member.
pub fn render_upstream(members: &[String]) -> String {
    let mut out = String::new();

    out.push_str("upstream backend {\n");
    let servers: Vec<String> = members.iter().map(|ip| format!("    server {ip};")).collect();
    out.push_str(&servers.join("\n"));
    out.push_str("\n}\n\n");
    out.push_str("server {\n");
    out.push_str("    listen 80;\n");
    out.push_str("    server_name _;\n");
    out.push_str("    location / {\n");
    out.push_str("        proxy_pass http://backend;\n");
    out.push_str("    }\n");
    out.push_str("}\n");

    out
}
