use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::UInt64, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("header", DataType::Utf8, true),
		Field::new("source", DataType::Utf8, true),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
