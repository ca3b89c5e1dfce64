use serde_json::Value;

use crate::search::{FilterValue, SearchFilters};

/// Fields with a free-text default analyzer; exact matching must target the
/// keyword subfield or a filter value would match on individual tokens.
/// `doc_id` is mapped as a plain keyword field and is matched bare.
const KEYWORD_FIELDS: &[&str] = &["project_id", "doc_type", "discipline"];

/// Compiles the request filters into exact-match clauses. Scalars become
/// `term` tests, lists become `terms` tests, absent filters are dropped.
pub fn build_filter_clauses(filters: &SearchFilters) -> Vec<Value> {
	let mut clauses = vec![clause("project_id", &FilterValue::One(filters.project_id.clone()))];

	for (field, value) in [
		("doc_id", &filters.doc_id),
		("doc_type", &filters.doc_type),
		("discipline", &filters.discipline),
	] {
		if let Some(value) = value {
			clauses.push(clause(field, value));
		}
	}

	clauses
}

fn clause(field: &str, value: &FilterValue) -> Value {
	let field = if KEYWORD_FIELDS.contains(&field) {
		format!("{field}.keyword")
	} else {
		field.to_string()
	};

	match value {
		FilterValue::One(value) => serde_json::json!({ "term": { field: value } }),
		FilterValue::Many(values) => serde_json::json!({ "terms": { field: values } }),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filters() -> SearchFilters {
		SearchFilters {
			project_id: "proj_1".to_string(),
			doc_id: None,
			doc_type: Some(FilterValue::One("permit".to_string())),
			discipline: Some(FilterValue::Many(vec![
				"mechanical".to_string(),
				"electrical".to_string(),
			])),
		}
	}

	#[test]
	fn scalar_and_list_values_compile_to_term_and_terms() {
		let clauses = build_filter_clauses(&filters());
		assert_eq!(clauses.len(), 3);
		assert_eq!(clauses[0], serde_json::json!({ "term": { "project_id.keyword": "proj_1" } }));
		assert_eq!(clauses[1], serde_json::json!({ "term": { "doc_type.keyword": "permit" } }));
		assert_eq!(
			clauses[2],
			serde_json::json!({ "terms": { "discipline.keyword": ["mechanical", "electrical"] } })
		);
	}

	#[test]
	fn project_id_is_keyworded_and_doc_id_is_matched_bare() {
		let filters = SearchFilters {
			project_id: "proj_1".to_string(),
			doc_id: Some(FilterValue::One("doc_7".to_string())),
			doc_type: None,
			discipline: None,
		};
		let clauses = build_filter_clauses(&filters);
		assert_eq!(clauses[0], serde_json::json!({ "term": { "project_id.keyword": "proj_1" } }));
		assert_eq!(clauses[1], serde_json::json!({ "term": { "doc_id": "doc_7" } }));
	}

	#[test]
	fn absent_filters_are_dropped() {
		let filters = SearchFilters {
			project_id: "proj_1".to_string(),
			doc_id: None,
			doc_type: None,
			discipline: None,
		};
		assert_eq!(build_filter_clauses(&filters).len(), 1);
	}
}
