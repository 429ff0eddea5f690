//! Seeded random tables for unit tests.

use anchor_core::config::ModelConfig;
use anchor_core::tables::{DocFeatures, KnowledgeEmbeddings, NeighborTable};
use anchor_core::{init_cpu_device, CpuBackend};
use burn::tensor::{Tensor, TensorData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn padded_table(rng: &mut ChaCha8Rng, rows: usize, dim: usize) -> Tensor<CpuBackend, 2> {
    let mut values = vec![0.0f32; (rows + 1) * dim];
    for v in values.iter_mut().skip(dim) {
        *v = rng.gen_range(-1.0..1.0);
    }
    Tensor::from_data(TensorData::new(values, [rows + 1, dim]), &init_cpu_device())
}

/// `n_entities` / `n_relations` real rows plus the zero padding row.
pub(crate) fn random_tables(
    config: &ModelConfig,
    n_entities: usize,
    n_relations: usize,
    seed: u64,
) -> KnowledgeEmbeddings<CpuBackend> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let entity = padded_table(&mut rng, n_entities, config.entity_embedding_size);
    let relation = padded_table(&mut rng, n_relations, config.entity_embedding_size);
    KnowledgeEmbeddings::new(entity, relation).expect("padding rows are zero")
}

/// Neighbor table where entity `e` links to `e + 1` and `e + 2` (wrapping).
pub(crate) fn ring_neighbors(config: &ModelConfig, n_entities: usize) -> NeighborTable {
    let triples: Vec<anchor_core::KgTriple> = (1..=n_entities as u32)
        .flat_map(|e| {
            let next = |step: u32| (e - 1 + step) % n_entities as u32 + 1;
            [
                anchor_core::KgTriple::new(e, 1, next(1)),
                anchor_core::KgTriple::new(e, 2, next(2)),
            ]
        })
        .collect();
    NeighborTable::from_triples(&triples, n_entities + 1, config.neighbor_slots)
        .expect("ring triples are in range")
}

/// Random document features for the given items.
pub(crate) fn random_docs(
    config: &ModelConfig,
    items: &[&str],
    seed: u64,
) -> DocFeatures<CpuBackend> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dim = config.doc_embedding_size;
    let values: Vec<f32> = (0..items.len() * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let features =
        Tensor::from_data(TensorData::new(values, [items.len(), dim]), &init_cpu_device());
    DocFeatures::new(items.iter().map(|s| s.to_string()).collect(), features)
        .expect("distinct item ids")
}
