//! Named ambient objects attached to a context.

use std::any::Any;
use std::sync::Arc;

use anyhow::{Result, bail};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A shared object stored under a name on the context.
pub type AmbientObject = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub(crate) struct Registry {
    objects: DashMap<String, AmbientObject>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry::default()
    }

    /// Stores `object` under `name`. Fails if the name is taken.
    pub(crate) fn attach(&self, name: &str, object: AmbientObject) -> Result<()> {
        match self.objects.entry(name.to_owned()) {
            Entry::Occupied(_) => bail!("object already attached under name {name:?}"),
            Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<AmbientObject> {
        self.objects.get(name).map(|entry| entry.value().clone())
    }

    /// Removes and returns the object under `name`, if any.
    pub(crate) fn detach(&self, name: &str) -> Option<AmbientObject> {
        self.objects.remove(name).map(|(_, object)| object)
    }
}
