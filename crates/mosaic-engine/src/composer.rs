//! Editing facade over pages, instances and the module registry.
//!
//! The composer is what an editing surface talks to: it validates module
//! references against the registry before writing, and it owns the
//! read-modify-write cycle for nested children, which live inside the
//! parent's config document rather than in their own rows.

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use mosaic_core::{ChildSpec, InstanceId, ModuleDefinition, ModuleInstance, PageId};
use mosaic_registry::ModuleRegistry;
use mosaic_store::{Database, InstanceRepo, PageRepo, StoreError};

use crate::children;

pub struct Composer {
    pages: PageRepo,
    instances: InstanceRepo,
    registry: Arc<ModuleRegistry>,
}

impl Composer {
    pub fn new(db: Database, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            pages: PageRepo::new(db.clone()),
            instances: InstanceRepo::new(db),
            registry,
        }
    }

    pub fn pages(&self) -> &PageRepo {
        &self.pages
    }

    pub fn instances(&self) -> &InstanceRepo {
        &self.instances
    }

    /// Resolve a module name or alias to its manifest, if known.
    pub fn get_manifest(&self, name: &str) -> Option<&ModuleDefinition> {
        self.registry.get(self.registry.resolve(name))
    }

    /// Place a module on a page. The module name must resolve to a known
    /// module; placement of unknown names is refused here even though the
    /// store itself would accept any string.
    #[instrument(skip(self, config), fields(page_id = %page_id, module, instance_name))]
    pub fn create_instance(
        &self,
        page_id: &PageId,
        module: &str,
        instance_name: &str,
        config: Value,
        position: Option<i64>,
    ) -> Result<ModuleInstance, StoreError> {
        self.require_known(module)?;
        self.instances.create(page_id, module, instance_name, config, position)
    }

    pub fn update_config(&self, id: &InstanceId, config: &Value) -> Result<(), StoreError> {
        self.instances.replace_config(id, config)
    }

    pub fn rename_instance(&self, id: &InstanceId, name: &str) -> Result<(), StoreError> {
        self.instances.rename(id, name)
    }

    pub fn set_instance_active(&self, id: &InstanceId, active: bool) -> Result<(), StoreError> {
        self.instances.set_active(id, active)
    }

    pub fn duplicate_instance(&self, id: &InstanceId) -> Result<ModuleInstance, StoreError> {
        self.instances.duplicate(id)
    }

    pub fn delete_instance(&self, page_id: &PageId, id: &InstanceId) -> Result<(), StoreError> {
        self.instances.delete(page_id, id)
    }

    pub fn reorder_instances(
        &self,
        page_id: &PageId,
        pairs: &[(InstanceId, i64)],
    ) -> Result<(), StoreError> {
        self.instances.reorder(page_id, pairs)
    }

    /// Append a child placement to a slot of an instance's config.
    #[instrument(skip(self, child), fields(instance_id = %id, slot))]
    pub fn append_child(
        &self,
        id: &InstanceId,
        slot: &str,
        child: ChildSpec,
    ) -> Result<(), StoreError> {
        if let Some(module) = child.module.as_deref() {
            self.require_known(module)?;
        }
        let mut config = self.instances.get(id)?.config;
        children::append_child(&mut config, slot, &child);
        self.instances.replace_config(id, &config)
    }

    /// Remove the child at `index` from a slot.
    #[instrument(skip(self), fields(instance_id = %id, slot, index))]
    pub fn remove_child(
        &self,
        id: &InstanceId,
        slot: &str,
        index: usize,
    ) -> Result<(), StoreError> {
        let mut config = self.instances.get(id)?.config;
        if !children::remove_child(&mut config, slot, index) {
            return Err(StoreError::NotFound(format!(
                "no child at {slot}[{index}] of instance {id}"
            )));
        }
        self.instances.replace_config(id, &config)
    }

    /// Reorder a slot's children by a permutation of current indexes.
    #[instrument(skip(self, order), fields(instance_id = %id, slot))]
    pub fn reorder_children(
        &self,
        id: &InstanceId,
        slot: &str,
        order: &[usize],
    ) -> Result<(), StoreError> {
        let mut config = self.instances.get(id)?.config;
        if !children::reorder_children(&mut config, slot, order) {
            return Err(StoreError::Invalid(format!(
                "order must be a permutation of the children of {slot}"
            )));
        }
        self.instances.replace_config(id, &config)
    }

    fn require_known(&self, module: &str) -> Result<(), StoreError> {
        let slug = self.registry.resolve(module);
        if self.registry.contains(slug) {
            Ok(())
        } else {
            Err(StoreError::Invalid(format!("unknown module '{module}'")))
        }
    }
}
