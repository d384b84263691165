use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use mosaic_core::{Page, PageId, PageStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row;

/// Map a constraint violation to Conflict, everything else to Database.
pub(crate) fn conflict_on_constraint(e: rusqlite::Error, message: String) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(message)
        }
        _ => StoreError::Database(e.to_string()),
    }
}

pub struct PageRepo {
    db: Database,
}

impl PageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new draft page.
    #[instrument(skip(self), fields(slug))]
    pub fn create(&self, slug: &str, title: Option<&str>) -> Result<Page, StoreError> {
        if slug.trim().is_empty() {
            return Err(StoreError::Invalid("page slug must not be empty".into()));
        }

        let id = PageId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pages (id, slug, title, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'draft', ?4, ?5)",
                rusqlite::params![id.as_str(), slug, title, now, now],
            )
            .map_err(|e| conflict_on_constraint(e, format!("page slug '{slug}' already exists")))?;

            Ok(Page {
                id,
                slug: slug.to_string(),
                title: title.map(String::from),
                status: PageStatus::Draft,
                css_variables: Value::Object(Default::default()),
                layout_config: Value::Object(Default::default()),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Get a page by ID (any status).
    #[instrument(skip(self), fields(page_id = %id))]
    pub fn get(&self, id: &PageId) -> Result<Page, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, title, status, css_variables, layout_config, created_at, updated_at
                 FROM pages WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_page(row),
                None => Err(StoreError::NotFound(format!("page {id}"))),
            }
        })
    }

    /// Get a page by slug (any status; render-path publication filtering is
    /// the caller's concern).
    #[instrument(skip(self), fields(slug))]
    pub fn get_by_slug(&self, slug: &str) -> Result<Page, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, title, status, css_variables, layout_config, created_at, updated_at
                 FROM pages WHERE slug = ?1",
            )?;
            let mut rows = stmt.query([slug])?;
            match rows.next()? {
                Some(row) => row_to_page(row),
                None => Err(StoreError::NotFound(format!("page '{slug}'"))),
            }
        })
    }

    /// List all pages ordered by slug.
    pub fn list(&self) -> Result<Vec<Page>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, title, status, css_variables, layout_config, created_at, updated_at
                 FROM pages ORDER BY slug",
            )?;
            let mut rows = stmt.query([])?;
            let mut pages = Vec::new();
            while let Some(row) = rows.next()? {
                pages.push(row_to_page(row)?);
            }
            Ok(pages)
        })
    }

    /// Publish or unpublish a page.
    #[instrument(skip(self), fields(page_id = %id, status = %status))]
    pub fn update_status(&self, id: &PageId, status: PageStatus) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE pages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.to_string(), now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("page {id}")));
            }
            Ok(())
        })
    }

    /// Replace the page-level CSS variables document.
    #[instrument(skip(self, css_variables), fields(page_id = %id))]
    pub fn set_css_variables(&self, id: &PageId, css_variables: &Value) -> Result<(), StoreError> {
        if !css_variables.is_object() {
            return Err(StoreError::Invalid("css_variables must be a JSON object".into()));
        }
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE pages SET css_variables = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![css_variables.to_string(), now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("page {id}")));
            }
            Ok(())
        })
    }

    /// Replace the page-level layout configuration document.
    #[instrument(skip(self, layout_config), fields(page_id = %id))]
    pub fn set_layout_config(&self, id: &PageId, layout_config: &Value) -> Result<(), StoreError> {
        if !layout_config.is_object() {
            return Err(StoreError::Invalid("layout_config must be a JSON object".into()));
        }
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let updated = conn.execute(
                "UPDATE pages SET layout_config = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![layout_config.to_string(), now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("page {id}")));
            }
            Ok(())
        })
    }

    /// Delete a page and all of its instances.
    #[instrument(skip(self), fields(page_id = %id))]
    pub fn delete(&self, id: &PageId) -> Result<(), StoreError> {
        self.db.with_tx(|tx| {
            tx.execute(
                "DELETE FROM module_instances WHERE page_id = ?1",
                [id.as_str()],
            )?;
            let deleted = tx.execute("DELETE FROM pages WHERE id = ?1", [id.as_str()])?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("page {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_page(row: &rusqlite::Row<'_>) -> Result<Page, StoreError> {
    let status_str: String = row::get(row, 3, "pages", "status")?;
    let css_raw: String = row::get(row, 4, "pages", "css_variables")?;
    let layout_raw: String = row::get(row, 5, "pages", "layout_config")?;

    Ok(Page {
        id: PageId::from_raw(row::get::<String>(row, 0, "pages", "id")?),
        slug: row::get(row, 1, "pages", "slug")?,
        title: row::get_opt(row, 2, "pages", "title")?,
        status: row::parse_enum(&status_str, "pages", "status")?,
        css_variables: row::parse_json(&css_raw, "pages", "css_variables")?,
        layout_config: row::parse_json(&layout_raw, "pages", "layout_config")?,
        created_at: row::get(row, 6, "pages", "created_at")?,
        updated_at: row::get(row, 7, "pages", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> PageRepo {
        PageRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn create_page_defaults() {
        let repo = repo();
        let page = repo.create("home", Some("Home")).unwrap();
        assert!(page.id.as_str().starts_with("page_"));
        assert_eq!(page.status, PageStatus::Draft);
        assert!(page.css_variables.is_object());
    }

    #[test]
    fn create_duplicate_slug_conflicts() {
        let repo = repo();
        repo.create("home", None).unwrap();
        let result = repo.create("home", None);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn create_empty_slug_invalid() {
        let repo = repo();
        assert!(matches!(repo.create("  ", None), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn get_by_id_and_slug() {
        let repo = repo();
        let page = repo.create("about", None).unwrap();
        assert_eq!(repo.get(&page.id).unwrap().slug, "about");
        assert_eq!(repo.get_by_slug("about").unwrap().id, page.id);
    }

    #[test]
    fn get_missing_page_not_found() {
        let repo = repo();
        assert!(matches!(
            repo.get(&PageId::from_raw("page_missing")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_slug("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn publish_roundtrip() {
        let repo = repo();
        let page = repo.create("home", None).unwrap();
        repo.update_status(&page.id, PageStatus::Published).unwrap();
        assert_eq!(repo.get(&page.id).unwrap().status, PageStatus::Published);
    }

    #[test]
    fn set_css_variables_replaces_document() {
        let repo = repo();
        let page = repo.create("home", None).unwrap();
        repo.set_css_variables(&page.id, &json!({"--accent": "#f00"}))
            .unwrap();
        assert_eq!(repo.get(&page.id).unwrap().css_variables["--accent"], "#f00");
    }

    #[test]
    fn set_css_variables_rejects_non_object() {
        let repo = repo();
        let page = repo.create("home", None).unwrap();
        assert!(matches!(
            repo.set_css_variables(&page.id, &json!([1, 2])),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn list_ordered_by_slug() {
        let repo = repo();
        repo.create("zoo", None).unwrap();
        repo.create("about", None).unwrap();
        let slugs: Vec<String> = repo.list().unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["about", "zoo"]);
    }

    #[test]
    fn delete_page() {
        let repo = repo();
        let page = repo.create("home", None).unwrap();
        repo.delete(&page.id).unwrap();
        assert!(repo.get(&page.id).is_err());
        assert!(matches!(repo.delete(&page.id), Err(StoreError::NotFound(_))));
    }
}
