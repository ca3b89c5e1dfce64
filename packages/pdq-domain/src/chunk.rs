use serde::{Deserialize, Serialize};

/// Rectangle in page-point coordinates, serialized as `[x0, y0, x1, y1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
	pub x0: f32,
	pub y0: f32,
	pub x1: f32,
	pub y1: f32,
}
impl BBox {
	pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
		Self { x0, y0, x1, y1 }
	}

	/// The degenerate rectangle generative models tend to emit when they
	/// failed to copy a real box from the context.
	pub fn is_zero(&self) -> bool {
		self.x0 == 0.0 && self.y0 == 0.0 && self.x1 == 0.0 && self.y1 == 0.0
	}

	pub fn from_slice(values: &[f32]) -> Option<Self> {
		match values {
			[x0, y0, x1, y1] => Some(Self::new(*x0, *y0, *x1, *y1)),
			_ => None,
		}
	}
}
impl From<[f32; 4]> for BBox {
	fn from(values: [f32; 4]) -> Self {
		Self::new(values[0], values[1], values[2], values[3])
	}
}
impl From<BBox> for [f32; 4] {
	fn from(bbox: BBox) -> Self {
		[bbox.x0, bbox.y0, bbox.x1, bbox.y1]
	}
}

/// How a chunk's text was obtained during ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
	Text,
	Ocr,
	Table,
	VisionLlm,
}
impl Source {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Ocr => "ocr",
			Self::Table => "table",
			Self::VisionLlm => "vision_llm",
		}
	}

	/// Unknown tags fall back to `text`; origin tags are advisory.
	pub fn from_tag(tag: &str) -> Self {
		match tag {
			"ocr" => Self::Ocr,
			"table" => Self::Table,
			"vision_llm" => Self::VisionLlm,
			_ => Self::Text,
		}
	}
}

/// A contiguous span of page text. Immutable once ingested; the engine holds
/// request-scoped copies only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
	pub chunk_id: String,
	pub doc_id: String,
	pub project_id: String,
	pub page_number: u32,
	pub section: Option<String>,
	pub text: String,
	pub bbox: Option<BBox>,
	pub source: Source,
	pub confidence: Option<f32>,
}

/// One structurally parsed row of a detected table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableRow {
	pub row_id: String,
	pub doc_id: String,
	pub project_id: String,
	pub page_number: u32,
	pub table_label: Option<String>,
	pub table_text: String,
	#[serde(default)]
	pub labels: Vec<String>,
	pub bbox: Option<BBox>,
}
impl TableRow {
	/// Flattens the row into the unified chunk shape so it can flow through
	/// reranking and context building. Tables are treated as reliable.
	pub fn into_chunk(self) -> Chunk {
		Chunk {
			chunk_id: self.row_id,
			doc_id: self.doc_id,
			project_id: self.project_id,
			page_number: self.page_number,
			section: self.table_label,
			text: self.table_text,
			bbox: self.bbox,
			source: Source::Table,
			confidence: Some(1.0),
		}
	}
}
