//! Module instance rows and the sibling ordering discipline.
//!
//! Live siblings of a page always hold `order_index` values `{0..n-1}` with
//! no gaps or duplicates. Positional insert, delete-with-compaction and
//! reorder each maintain that invariant inside a single transaction.
//! Nested children are not rows; they live inside the `config` document and
//! are edited by replacing the whole document (last-write-wins by contract).

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use mosaic_core::{InstanceId, ModuleInstance, PageId};

use crate::database::Database;
use crate::error::StoreError;
use crate::pages::conflict_on_constraint;
use crate::row;

const SELECT_COLUMNS: &str =
    "id, page_id, module, instance_name, config, order_index, active, created_at, updated_at";

pub struct InstanceRepo {
    db: Database,
}

impl InstanceRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List all instances of a page, ordered by `order_index`.
    #[instrument(skip(self), fields(page_id = %page_id))]
    pub fn list(&self, page_id: &PageId) -> Result<Vec<ModuleInstance>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM module_instances
                 WHERE page_id = ?1 ORDER BY order_index"
            ))?;
            let mut rows = stmt.query([page_id.as_str()])?;
            let mut instances = Vec::new();
            while let Some(row) = rows.next()? {
                instances.push(row_to_instance(row)?);
            }
            Ok(instances)
        })
    }

    /// List only active instances of a page, ordered by `order_index`.
    pub fn list_active(&self, page_id: &PageId) -> Result<Vec<ModuleInstance>, StoreError> {
        Ok(self
            .list(page_id)?
            .into_iter()
            .filter(|i| i.active)
            .collect())
    }

    /// Get an instance by ID.
    #[instrument(skip(self), fields(instance_id = %id))]
    pub fn get(&self, id: &InstanceId) -> Result<ModuleInstance, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM module_instances WHERE id = ?1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_instance(row),
                None => Err(StoreError::NotFound(format!("instance {id}"))),
            }
        })
    }

    /// Create an instance at a position among its siblings.
    ///
    /// `position` is clamped to `0..=n`; `None` appends. Siblings at or
    /// after the position shift up by one, all inside one transaction. A
    /// colliding `instance_name` is rejected with Conflict.
    #[instrument(skip(self, config), fields(page_id = %page_id, module, instance_name))]
    pub fn create(
        &self,
        page_id: &PageId,
        module: &str,
        instance_name: &str,
        config: Value,
        position: Option<i64>,
    ) -> Result<ModuleInstance, StoreError> {
        if module.trim().is_empty() {
            return Err(StoreError::Invalid("module must not be empty".into()));
        }
        if instance_name.trim().is_empty() {
            return Err(StoreError::Invalid("instance_name must not be empty".into()));
        }
        if !config.is_object() {
            return Err(StoreError::Invalid("config must be a JSON object".into()));
        }

        let id = InstanceId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_tx(|tx| {
            let page_exists: bool = tx
                .query_row(
                    "SELECT 1 FROM pages WHERE id = ?1",
                    [page_id.as_str()],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !page_exists {
                return Err(StoreError::NotFound(format!("page {page_id}")));
            }

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM module_instances WHERE page_id = ?1",
                [page_id.as_str()],
                |row| row.get(0),
            )?;
            let order_index = position.map_or(count, |p| p.clamp(0, count));

            tx.execute(
                "UPDATE module_instances SET order_index = order_index + 1
                 WHERE page_id = ?1 AND order_index >= ?2",
                rusqlite::params![page_id.as_str(), order_index],
            )?;

            tx.execute(
                "INSERT INTO module_instances
                 (id, page_id, module, instance_name, config, order_index, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
                rusqlite::params![
                    id.as_str(),
                    page_id.as_str(),
                    module,
                    instance_name,
                    config.to_string(),
                    order_index,
                    now,
                    now,
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(
                    e,
                    format!("instance name '{instance_name}' already used on page {page_id}"),
                )
            })?;

            Ok(ModuleInstance {
                id,
                page_id: page_id.clone(),
                module: module.to_string(),
                instance_name: instance_name.to_string(),
                config,
                order_index,
                active: true,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Duplicate an instance: clone the config, derive a deterministic
    /// `-copy` suffixed name, append at the end of the siblings.
    #[instrument(skip(self), fields(instance_id = %id))]
    pub fn duplicate(&self, id: &InstanceId) -> Result<ModuleInstance, StoreError> {
        let new_id = InstanceId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_tx(|tx| {
            let source = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM module_instances WHERE id = ?1"
                ))?;
                let mut rows = stmt.query([id.as_str()])?;
                match rows.next()? {
                    Some(row) => row_to_instance(row)?,
                    None => return Err(StoreError::NotFound(format!("instance {id}"))),
                }
            };

            let taken: HashSet<String> = {
                let mut stmt = tx.prepare(
                    "SELECT instance_name FROM module_instances WHERE page_id = ?1",
                )?;
                let rows = stmt.query_map([source.page_id.as_str()], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let mut candidate = format!("{}-copy", source.instance_name);
            let mut n = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}-copy-{n}", source.instance_name);
                n += 1;
            }

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM module_instances WHERE page_id = ?1",
                [source.page_id.as_str()],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO module_instances
                 (id, page_id, module, instance_name, config, order_index, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    new_id.as_str(),
                    source.page_id.as_str(),
                    source.module,
                    candidate,
                    source.config.to_string(),
                    count,
                    source.active as i64,
                    now,
                    now,
                ],
            )?;

            Ok(ModuleInstance {
                id: new_id,
                instance_name: candidate,
                order_index: count,
                created_at: now.clone(),
                updated_at: now,
                ..source
            })
        })
    }

    /// Replace an instance's entire config document. This is the only way
    /// nested children change; concurrent edits to the same parent are
    /// last-write-wins at document granularity.
    #[instrument(skip(self, config), fields(instance_id = %id))]
    pub fn replace_config(&self, id: &InstanceId, config: &Value) -> Result<(), StoreError> {
        if !config.is_object() {
            return Err(StoreError::Invalid("config must be a JSON object".into()));
        }
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE module_instances SET config = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![config.to_string(), now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("instance {id}")));
            }
            Ok(())
        })
    }

    /// Rename an instance. A colliding name on the same page is rejected.
    #[instrument(skip(self), fields(instance_id = %id, instance_name))]
    pub fn rename(&self, id: &InstanceId, instance_name: &str) -> Result<(), StoreError> {
        if instance_name.trim().is_empty() {
            return Err(StoreError::Invalid("instance_name must not be empty".into()));
        }
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn
                .execute(
                    "UPDATE module_instances SET instance_name = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![instance_name, now, id.as_str()],
                )
                .map_err(|e| {
                    conflict_on_constraint(
                        e,
                        format!("instance name '{instance_name}' already used"),
                    )
                })?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("instance {id}")));
            }
            Ok(())
        })
    }

    /// Toggle an instance's active flag (inactive instances are skipped by
    /// the renderer but keep their position).
    #[instrument(skip(self), fields(instance_id = %id, active))]
    pub fn set_active(&self, id: &InstanceId, active: bool) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE module_instances SET active = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![active as i64, now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("instance {id}")));
            }
            Ok(())
        })
    }

    /// Delete an instance and compact the remaining siblings back to
    /// `{0..n-1}`, preserving relative order, in one transaction.
    #[instrument(skip(self), fields(page_id = %page_id, instance_id = %id))]
    pub fn delete(&self, page_id: &PageId, id: &InstanceId) -> Result<(), StoreError> {
        self.db.with_tx(|tx| {
            let deleted = tx.execute(
                "DELETE FROM module_instances WHERE id = ?1 AND page_id = ?2",
                rusqlite::params![id.as_str(), page_id.as_str()],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("instance {id}")));
            }

            let remaining: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM module_instances WHERE page_id = ?1 ORDER BY order_index",
                )?;
                let rows = stmt.query_map([page_id.as_str()], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            for (index, sibling_id) in remaining.iter().enumerate() {
                tx.execute(
                    "UPDATE module_instances SET order_index = ?1 WHERE id = ?2",
                    rusqlite::params![index as i64, sibling_id],
                )?;
            }

            Ok(())
        })
    }

    /// Atomically apply a full sibling reorder.
    ///
    /// The pairs must name exactly the page's instances and their new
    /// indexes must form `{0..n-1}`; otherwise the whole batch is rejected
    /// and no row changes.
    #[instrument(skip(self, pairs), fields(page_id = %page_id, count = pairs.len()))]
    pub fn reorder(
        &self,
        page_id: &PageId,
        pairs: &[(InstanceId, i64)],
    ) -> Result<(), StoreError> {
        self.db.with_tx(|tx| {
            let current: HashSet<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM module_instances WHERE page_id = ?1",
                )?;
                let rows = stmt.query_map([page_id.as_str()], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };

            let submitted: HashSet<String> =
                pairs.iter().map(|(id, _)| id.as_str().to_string()).collect();
            if submitted != current || submitted.len() != pairs.len() {
                return Err(StoreError::Transaction(format!(
                    "reorder must name exactly the {} instances of page {page_id}",
                    current.len()
                )));
            }

            let mut indexes: Vec<i64> = pairs.iter().map(|(_, idx)| *idx).collect();
            indexes.sort_unstable();
            if indexes.iter().enumerate().any(|(i, idx)| *idx != i as i64) {
                return Err(StoreError::Transaction(
                    "reorder indexes must form a gapless 0..n-1 sequence".into(),
                ));
            }

            let now = Utc::now().to_rfc3339();
            for (id, index) in pairs {
                tx.execute(
                    "UPDATE module_instances SET order_index = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![index, now, id.as_str()],
                )?;
            }

            Ok(())
        })
    }
}

fn row_to_instance(row: &rusqlite::Row<'_>) -> Result<ModuleInstance, StoreError> {
    let config_raw: String = row::get(row, 4, "module_instances", "config")?;
    let active: i64 = row::get(row, 6, "module_instances", "active")?;

    Ok(ModuleInstance {
        id: InstanceId::from_raw(row::get::<String>(row, 0, "module_instances", "id")?),
        page_id: PageId::from_raw(row::get::<String>(row, 1, "module_instances", "page_id")?),
        module: row::get(row, 2, "module_instances", "module")?,
        instance_name: row::get(row, 3, "module_instances", "instance_name")?,
        config: row::parse_json(&config_raw, "module_instances", "config")?,
        order_index: row::get(row, 5, "module_instances", "order_index")?,
        active: active != 0,
        created_at: row::get(row, 7, "module_instances", "created_at")?,
        updated_at: row::get(row, 8, "module_instances", "updated_at")?,
    })
}
