use anyhow::bail;

use common::client::NodeClient;

/// The two monitored agents. Each one's partner is the other.
#[derive(Clone, Debug)]
pub struct HaPair {
    members: [NodeClient; 2],
}

impl HaPair {
    pub fn new(a: NodeClient, b: NodeClient) -> anyhow::Result<Self> {
        if a.name() == b.name() {
            bail!("HA pair members must have distinct names, got {} twice", a.name());
        }
        Ok(Self { members: [a, b] })
    }

    pub fn members(&self) -> &[NodeClient; 2] {
        &self.members
    }

    pub fn get(&self, name: &str) -> Option<&NodeClient> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn partner_of(&self, name: &str) -> Option<&NodeClient> {
        match self.members.iter().position(|m| m.name() == name)? {
            0 => Some(&self.members[1]),
            _ => Some(&self.members[0]),
        }
    }
}
