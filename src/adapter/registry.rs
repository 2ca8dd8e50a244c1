use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

/// Bus number handed out by a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusId(pub u32);

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "i2c-{}", self.0)
    }
}

/// Where attached adapters announce themselves to chip drivers.
pub trait BusRegistry {
    fn register(&mut self, name: &str) -> Result<BusId, Error>;

    fn unregister(&mut self, id: BusId) -> Result<(), Error>;
}

/// In-process registry numbering buses in registration order.
#[derive(Default)]
pub struct Registry {
    next: u32,
    buses: BTreeMap<BusId, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First registered bus carrying `name`.
    pub fn lookup(&self, name: &str) -> Option<BusId> {
        self.buses
            .iter()
            .find(|&(_, bus)| bus == name)
            .map(|(&id, _)| id)
    }

    pub fn name(&self, id: BusId) -> Option<&str> {
        self.buses.get(&id).map(|name| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}

impl BusRegistry for Registry {
    fn register(&mut self, name: &str) -> Result<BusId, Error> {
        let id = BusId(self.next);
        self.next += 1;
        self.buses.insert(id, name.to_owned());
        info!("registered {} as {}", name, id);
        Ok(id)
    }

    fn unregister(&mut self, id: BusId) -> Result<(), Error> {
        match self.buses.remove(&id) {
            Some(name) => {
                info!("unregistered {} ({})", name, id);
                Ok(())
            }
            None => Err(Error::Registry(format!("{} is not registered", id))),
        }
    }
}
