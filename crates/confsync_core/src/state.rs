//! In-memory object graph.
//!
//! Every key known from either side has one [`ObjectState`] node holding
//! the locally loaded object, the remotely loaded object, or both. The
//! manifest records live alongside in the owned [`Manifest`].
//!
//! `State` is owned by the coordinating task. Workers never receive a
//! mutable reference; they return values that the coordinator applies.

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use crate::model::{Branch, Component, ComponentId, ComponentsMap, Key, Object, Record};
use crate::naming::{NamingRegistry, PathGenerator};
use std::collections::BTreeMap;

/// One node of the object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    /// Key of the node.
    pub key: Key,
    /// Object loaded from the project directory.
    pub local: Option<Object>,
    /// Object loaded from the API.
    pub remote: Option<Object>,
}

impl ObjectState {
    /// Creates an empty node.
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            local: None,
            remote: None,
        }
    }

    /// Returns true if a local object is present.
    #[must_use]
    pub fn has_local_state(&self) -> bool {
        self.local.is_some()
    }

    /// Returns true if a remote object is present.
    #[must_use]
    pub fn has_remote_state(&self) -> bool {
        self.remote.is_some()
    }

    /// Local object, else the remote one.
    #[must_use]
    pub fn local_or_remote(&self) -> Option<&Object> {
        self.local.as_ref().or(self.remote.as_ref())
    }
}

/// Object graph plus manifest and components.
#[derive(Debug, Clone, Default)]
pub struct State {
    manifest: Manifest,
    components: ComponentsMap,
    objects: BTreeMap<Key, ObjectState>,
    registry: NamingRegistry,
}

impl State {
    /// Creates a state and registers the paths of all manifest records.
    pub fn new(manifest: Manifest, components: ComponentsMap) -> CoreResult<Self> {
        let mut registry = NamingRegistry::new();
        for record in manifest.records() {
            registry.attach(&record.key, &record.path())?;
        }
        Ok(Self {
            manifest,
            components,
            objects: BTreeMap::new(),
            registry,
        })
    }

    /// The manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Mutable manifest.
    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Known components.
    #[must_use]
    pub fn components(&self) -> &ComponentsMap {
        &self.components
    }

    /// Mutable components.
    pub fn components_mut(&mut self) -> &mut ComponentsMap {
        &mut self.components
    }

    /// Component by id, falling back to an untyped placeholder.
    #[must_use]
    pub fn component(&self, id: &ComponentId) -> Component {
        self.components.get_or_unknown(id)
    }

    /// Path generator over the manifest naming.
    #[must_use]
    pub fn path_generator(&self) -> PathGenerator<'_> {
        PathGenerator::new(&self.manifest.naming)
    }

    /// Path registry.
    #[must_use]
    pub fn registry(&self) -> &NamingRegistry {
        &self.registry
    }

    /// Node of `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&ObjectState> {
        self.objects.get(key)
    }

    /// All nodes sorted parents first.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectState> {
        self.objects.values()
    }

    /// Keys of all nodes sorted parents first.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.objects.keys().cloned().collect()
    }

    /// Local object of `key`.
    #[must_use]
    pub fn local(&self, key: &Key) -> Option<&Object> {
        self.objects.get(key).and_then(|s| s.local.as_ref())
    }

    /// Remote object of `key`.
    #[must_use]
    pub fn remote(&self, key: &Key) -> Option<&Object> {
        self.objects.get(key).and_then(|s| s.remote.as_ref())
    }

    /// Mutable local object of `key`.
    pub fn local_mut(&mut self, key: &Key) -> Option<&mut Object> {
        self.objects.get_mut(key).and_then(|s| s.local.as_mut())
    }

    /// Sets or clears the local object of `key`. Empty nodes are removed.
    pub fn set_local(&mut self, key: &Key, object: Option<Object>) {
        let node = self
            .objects
            .entry(key.clone())
            .or_insert_with(|| ObjectState::new(key.clone()));
        node.local = object;
        self.prune_key(key);
    }

    /// Sets or clears the remote object of `key`. Empty nodes are removed.
    pub fn set_remote(&mut self, key: &Key, object: Option<Object>) {
        let node = self
            .objects
            .entry(key.clone())
            .or_insert_with(|| ObjectState::new(key.clone()));
        node.remote = object;
        self.prune_key(key);
    }

    fn prune_key(&mut self, key: &Key) {
        if let Some(node) = self.objects.get(key) {
            if node.local.is_none() && node.remote.is_none() {
                self.objects.remove(key);
            }
        }
    }

    /// Removes every node without a local and a remote object.
    pub fn prune(&mut self) {
        self.objects
            .retain(|_, node| node.local.is_some() || node.remote.is_some());
    }

    /// Manifest record of `key`.
    #[must_use]
    pub fn record(&self, key: &Key) -> Option<&Record> {
        self.manifest.record(key)
    }

    /// Mutable manifest record of `key`.
    pub fn record_mut(&mut self, key: &Key) -> Option<&mut Record> {
        self.manifest.record_mut(key)
    }

    /// Adds or replaces a record and registers its path.
    pub fn set_record(&mut self, record: Record) -> CoreResult<()> {
        if !record.paths.is_empty() {
            self.registry.attach(&record.key, &record.path())?;
        }
        self.manifest.set_record(record);
        Ok(())
    }

    /// Removes the record of `key` and releases its path.
    pub fn remove_record(&mut self, key: &Key) -> Option<Record> {
        self.registry.detach(key);
        self.manifest.remove_record(key)
    }

    /// Moves a record to a new key, used when a ticket assigns an id.
    pub fn rekey(&mut self, old: &Key, new: &Key) -> CoreResult<()> {
        if let Some(mut node) = self.objects.remove(old) {
            node.key = new.clone();
            if let Some(o) = node.local.as_mut() {
                o.set_key(new.clone())?;
            }
            if let Some(o) = node.remote.as_mut() {
                o.set_key(new.clone())?;
            }
            self.objects.insert(new.clone(), node);
        }
        if let Some(mut record) = self.remove_record(old) {
            record.key = new.clone();
            self.set_record(record)?;
        }
        Ok(())
    }

    /// Branch owning `key`, local first.
    #[must_use]
    pub fn branch_of(&self, key: &Key) -> Option<&Branch> {
        let branch_key = Key::Branch(crate::model::BranchKey {
            id: key.branch_id().clone(),
        });
        match self.get(&branch_key)?.local_or_remote()? {
            Object::Branch(b) => Some(b),
            _ => None,
        }
    }

    /// Returns true if the branch of `key` passes the allowed-branches filter.
    ///
    /// Objects of an unknown branch are visible.
    #[must_use]
    pub fn is_visible(&self, key: &Key) -> bool {
        match self.branch_of(key) {
            Some(branch) => self.manifest.allowed_branches.is_allowed(branch),
            None => true,
        }
    }

    /// Full path of the object of `key`.
    pub fn path_of(&self, key: &Key) -> CoreResult<String> {
        self.record(key)
            .filter(|r| !r.paths.is_empty())
            .map(Record::path)
            .ok_or_else(|| CoreError::not_found(format!("path of {}", key.desc())))
    }

    /// Keys whose structural parent is `parent`.
    #[must_use]
    pub fn children_of(&self, parent: &Key) -> Vec<Key> {
        self.objects
            .keys()
            .filter(|k| k.parent_key().as_ref() == Some(parent))
            .cloned()
            .collect()
    }
}
