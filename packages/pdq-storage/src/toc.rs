use sqlx::PgPool;

use crate::Result;

/// One table-of-contents span from document ingestion. Page bounds are
/// inclusive.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TocEntry {
	pub doc_id: String,
	pub title: String,
	pub page_start: i32,
	pub page_end: i32,
}

/// TOC spans for a project, optionally narrowed to one document. Ordered so
/// boost clauses come out deterministic.
pub async fn lookup(pool: &PgPool, project_id: &str, doc_id: Option<&str>) -> Result<Vec<TocEntry>> {
	let entries = match doc_id {
		Some(doc_id) => {
			sqlx::query_as::<_, TocEntry>(
				"\
SELECT t.doc_id, t.title, t.page_start, t.page_end
FROM toc_entries t
JOIN documents d ON d.doc_id = t.doc_id
WHERE d.project_id = $1
	AND t.doc_id = $2
ORDER BY t.doc_id, t.page_start",
			)
			.bind(project_id)
			.bind(doc_id)
			.fetch_all(pool)
			.await?
		},
		None => {
			sqlx::query_as::<_, TocEntry>(
				"\
SELECT t.doc_id, t.title, t.page_start, t.page_end
FROM toc_entries t
JOIN documents d ON d.doc_id = t.doc_id
WHERE d.project_id = $1
ORDER BY t.doc_id, t.page_start",
			)
			.bind(project_id)
			.fetch_all(pool)
			.await?
		},
	};

	Ok(entries)
}
