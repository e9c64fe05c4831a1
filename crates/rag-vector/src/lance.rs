//! LanceDB-backed collection.
//!
//! Rows carry the chunk id, text, header/source columns for quick inspection
//! and the full metadata map as JSON. LanceDB reports `_distance` (lower is
//! better); hits are converted with `relevance = 1 / (1 + distance)`.
use anyhow::{Result, anyhow};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt64Array};
use async_trait::async_trait;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::HashSet;
use std::sync::Arc;

use rag_core::traits::{Collection, Embedder};
use rag_core::types::{relevance_from_distance, Chunk, ChunkId, Meta, RetrievalHit, HEADER_KEY, SOURCE_KEY};

use crate::schema::build_arrow_schema;

const INSERT_BATCH: usize = 256;

pub struct LanceCollection { db: Connection, table_name: String, embedder: Arc<dyn Embedder> }

impl LanceCollection {
	pub async fn new(uri: &str, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let db = connect(uri).execute().await?;
		Ok(Self { db, table_name: table_name.to_string(), embedder })
	}

	async fn table_exists(&self) -> Result<bool> {
		Ok(self.db.table_names().execute().await?.contains(&self.table_name))
	}

	async fn insert_batch(&self, chunks: &[Chunk]) -> Result<()> {
		if chunks.is_empty() { return Ok(()); }
		let record_batch = self.to_record_batch(chunks)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.table_exists().await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}

	fn to_record_batch(&self, chunks: &[Chunk]) -> Result<RecordBatch> {
		let dim = self.embedder.dim();
		let dim_i32 = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {} too large", dim))?;
		let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
		let embeddings = self.embedder.embed_batch(&texts)?;
		if embeddings.len() != chunks.len() { return Err(anyhow!("embedder returned {} vectors for {} chunks", embeddings.len(), chunks.len())); }
		let mut ids = Vec::new(); let mut headers = Vec::new(); let mut sources = Vec::new(); let mut metas = Vec::new();
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for (chunk, embedding) in chunks.iter().zip(embeddings) {
			if embedding.len() != dim { return Err(anyhow!("embedding for chunk {} has {} dimensions, expected {}", chunk.id, embedding.len(), dim)); }
			ids.push(chunk.id);
			headers.push(chunk.header().map(str::to_string));
			sources.push(chunk.source().map(str::to_string));
			metas.push(serde_json::to_string(&chunk.metadata)?);
			vectors.push(Some(embedding.into_iter().map(Some).collect()));
		}
		let record_batch = RecordBatch::try_new(build_arrow_schema(dim_i32), vec![
			Arc::new(UInt64Array::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(headers)),
			Arc::new(StringArray::from(sources)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim_i32)),
		])?;
		Ok(record_batch)
	}
}

#[async_trait]
impl Collection for LanceCollection {
	async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievalHit>> {
		if k == 0 || !self.table_exists().await? { return Ok(vec![]); }
		let query_vec = self.embedder.embed_batch(&[query_text.to_string()])?.pop().ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.vector_search(query_vec)?.limit(k).execute().await?;
		let mut hits = Vec::new(); let mut seen = HashSet::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(hits_from_batch(&batch)?.into_iter().filter(|h| seen.insert(h.chunk.id)));
		}
		order_hits(&mut hits);
		hits.truncate(k);
		Ok(hits)
	}

	async fn scroll_by_id(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
		if ids.is_empty() || !self.table_exists().await? { return Ok(vec![]); }
		let unique: Vec<ChunkId> = { let mut seen = HashSet::new(); ids.iter().copied().filter(|id| seen.insert(*id)).collect() };
		let list = unique.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.query().only_if(format!("id IN ({})", list)).limit(unique.len()).execute().await?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await? { out.extend(chunks_from_batch(&batch)?); }
		out.sort_by_key(|c| c.id);
		Ok(out)
	}

	async fn insert(&self, elements: &[Chunk]) -> Result<usize> {
		if elements.is_empty() { return Ok(0); }
		tracing::info!(chunks = elements.len(), table = %self.table_name, "inserting into LanceDB");
		let pb = ProgressBar::new(elements.len() as u64);
		if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)") {
			pb.set_style(style.progress_chars("#>-"));
		}
		for batch in elements.chunks(INSERT_BATCH) {
			self.insert_batch(batch).await?;
			pb.inc(batch.len() as u64);
		}
		pb.finish_and_clear();
		Ok(elements.len())
	}

	async fn reset(&self) -> Result<()> {
		if !self.table_exists().await? { return Ok(()); }
		let table = self.db.open_table(&self.table_name).execute().await?;
		table.delete("id >= 0").await?;
		Ok(())
	}
}

/// Search rows with their `_distance` converted to relevance.
fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<RetrievalHit>> {
	let distances = column::<Float32Array>(batch, "_distance")?;
	Ok(chunks_from_batch(batch)?
		.into_iter()
		.enumerate()
		.map(|(i, chunk)| RetrievalHit::new(chunk, relevance_from_distance(distances.value(i))))
		.collect())
}

/// Best first; equal relevance falls back to ascending id.
fn order_hits(hits: &mut [RetrievalHit]) {
	hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then(a.chunk.id.cmp(&b.chunk.id)));
}

fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<Chunk>> {
	let ids = column::<UInt64Array>(batch, "id")?;
	let texts = column::<StringArray>(batch, "text")?;
	let headers = column::<StringArray>(batch, "header")?;
	let sources = column::<StringArray>(batch, "source")?;
	let metas = column::<StringArray>(batch, "metadata")?;
	let mut chunks = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let mut metadata: Meta = serde_json::from_str(metas.value(i)).unwrap_or_default();
		if !headers.is_null(i) { metadata.entry(HEADER_KEY.to_string()).or_insert_with(|| headers.value(i).into()); }
		if !sources.is_null(i) { metadata.entry(SOURCE_KEY.to_string()).or_insert_with(|| sources.value(i).into()); }
		chunks.push(Chunk { id: ids.value(i), text: texts.value(i).to_string(), metadata, embedding: None });
	}
	Ok(chunks)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("column '{}' missing or of unexpected type", name))
}
