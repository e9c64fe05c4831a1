//! Collection backends: an in-process store for tests and small corpora, and
//! a LanceDB table for persistent ones.
pub mod lance;
pub mod memory;
pub mod schema;

pub use lance::LanceCollection;
pub use memory::MemoryCollection;

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
