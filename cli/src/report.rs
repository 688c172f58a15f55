use std::fmt::{self, Display};

use serde::Serialize;

use common::schemas::{ControllerStatus, FailoverEvent, StatusResponse};
use common::time_utils::format_ms;

/// One node as seen from the terminal: its status, or why it could not be read.
#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub nodes: Vec<NodeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerStatus>,
}

impl Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(st) = &self.status else {
            return writeln!(
                f,
                "{} ({}): {}",
                self.name,
                self.url,
                self.error.as_deref().unwrap_or("unavailable")
            );
        };

        writeln!(f, "{} ({}) {}", st.node.name, st.node.role, self.url)?;
        writeln!(
            f,
            "  status: {}  partner: {}  nvram entries: {}",
            st.node.status, st.node.partner_node, st.nvram_entries
        )?;
        if let Some(ms) = st.node.last_heartbeat_ms {
            writeln!(f, "  last heartbeat: {}", format_ms(ms))?;
        }

        writeln!(f, "  volumes:")?;
        for v in &st.volumes {
            writeln!(
                f,
                "    {:<14} {:>6.1}/{} GB  {}{}",
                v.name,
                v.used_gb,
                v.size_gb,
                v.state,
                if v.is_replica { " (replica)" } else { "" }
            )?;
        }

        writeln!(f, "  lifs:")?;
        for l in &st.lifs {
            writeln!(
                f,
                "    {:<6} {}:{}/{}  home={} current={}  {}",
                l.name, l.ip_address, l.port, l.protocol, l.home_node, l.current_node, l.status
            )?;
        }
        Ok(())
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node}")?;
        }

        let Some(ctl) = &self.controller else {
            return writeln!(f, "controller: unreachable");
        };
        writeln!(f, "controller:")?;
        for (name, rec) in &ctl.node_states {
            let seen = rec
                .last_seen_ms
                .map(format_ms)
                .unwrap_or_else(|| "never".to_string());
            let state = match (rec.healthy, rec.simulated_failure) {
                (true, _) => "healthy",
                (false, true) => "failed (simulated)",
                (false, false) => "unhealthy",
            };
            writeln!(f, "  {name:<8} {state:<18} last seen {seen}")?;
        }
        writeln!(f, "  failover events: {}", ctl.failover_events.len())
    }
}

pub struct EventsReport<'a>(pub &'a [FailoverEvent]);

impl Display for EventsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "no failover events");
        }
        for e in self.0 {
            writeln!(
                f,
                "{}  {:<17} {} -> {}  {:.1} ms",
                format_ms(e.timestamp_ms),
                e.trigger.to_string(),
                e.failed_node,
                e.takeover_node,
                e.duration_ms
            )?;
        }
        Ok(())
    }
}
