//! SafeTensors loading for the pretrained knowledge artifacts.
//!
//! # Supported Files
//!
//! | File | Tensors | Use Case |
//! |------|---------|----------|
//! | Knowledge | `entity_embedding`, `relation_embedding`, optional `neighbor_entities` + `neighbor_relations` | Shared KG tables |
//! | Doc features | `doc_features` + `item_ids` metadata | Recommender content input |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use anchor_core::loader::{load_doc_features, load_knowledge_artifacts};
//!
//! let knowledge = load_knowledge_artifacts::<CpuBackend>(Path::new("knowledge.safetensors"), &device)?;
//! let docs = load_doc_features::<CpuBackend>(Path::new("doc_features.safetensors"), &device)?;
//! ```

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::path::Path;

use crate::ids::ItemId;
use crate::tables::{DocFeatures, KnowledgeEmbeddings, NeighborTable};

/// Metadata key holding the JSON array of item IDs in a doc-feature file.
pub const ITEM_IDS_METADATA_KEY: &str = "item_ids";

/// Everything read from a knowledge file.
#[derive(Debug)]
pub struct KnowledgeArtifacts<B: Backend> {
    pub embeddings: KnowledgeEmbeddings<B>,
    /// Present when the file carries `neighbor_entities` / `neighbor_relations`.
    pub neighbors: Option<NeighborTable>,
}

/// Loads the shared embedding tables (and neighbor tables if present).
///
/// # Required Tensors
///
/// | Name | Shape | Dtype | Description |
/// |------|-------|-------|-------------|
/// | `entity_embedding` | \[E+1, D\] | F32 | Row 0 zero (padding) |
/// | `relation_embedding` | \[R+1, D\] | F32 | Row 0 zero (padding) |
///
/// # Optional Tensors
///
/// | Name | Shape | Dtype | Description |
/// |------|-------|-------|-------------|
/// | `neighbor_entities` | \[E+1, S\] | I32/I64 | First-order neighbors |
/// | `neighbor_relations` | \[E+1, S\] | I32/I64 | Matching relations |
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read or is not valid SafeTensors format
/// - Required tensors are missing or have the wrong dtype/rank
/// - Row 0 of an embedding table is not zero
/// - Only one of the two neighbor tensors is present, or their shapes differ
pub fn load_knowledge_artifacts<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<KnowledgeArtifacts<B>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("Failed to deserialize SafeTensors from {:?}", path))?;

    let entity_view = tensors
        .tensor("entity_embedding")
        .context("SafeTensors file missing 'entity_embedding' tensor")?;
    let entity =
        tensor_to_burn_2d::<B>(&entity_view, device).context("Failed to convert entity_embedding")?;

    let relation_view = tensors
        .tensor("relation_embedding")
        .context("SafeTensors file missing 'relation_embedding' tensor")?;
    let relation = tensor_to_burn_2d::<B>(&relation_view, device)
        .context("Failed to convert relation_embedding")?;

    let embeddings = KnowledgeEmbeddings::new(entity, relation)
        .with_context(|| format!("Invalid embedding tables in {:?}", path))?;

    let neighbors = match (
        tensors.tensor("neighbor_entities").ok(),
        tensors.tensor("neighbor_relations").ok(),
    ) {
        (Some(ent_view), Some(rel_view)) => {
            anyhow::ensure!(
                ent_view.shape() == rel_view.shape() && ent_view.shape().len() == 2,
                "neighbor_entities {:?} and neighbor_relations {:?} must share a 2D shape",
                ent_view.shape(),
                rel_view.shape()
            );
            let slots = ent_view.shape()[1];
            let entities = view_to_ids(&ent_view).context("Failed to convert neighbor_entities")?;
            let relations =
                view_to_ids(&rel_view).context("Failed to convert neighbor_relations")?;
            Some(NeighborTable::from_flat(slots, entities, relations)?)
        }
        (None, None) => None,
        _ => anyhow::bail!(
            "{:?} carries only one of neighbor_entities / neighbor_relations",
            path
        ),
    };

    tracing::info!(
        path = ?path,
        entities = embeddings.n_entities(),
        relations = embeddings.n_relations(),
        dim = embeddings.dim(),
        neighbor_slots = neighbors.as_ref().map(|n| n.slots()),
        "Loaded knowledge artifacts"
    );

    Ok(KnowledgeArtifacts {
        embeddings,
        neighbors,
    })
}

/// Loads per-item document features.
///
/// The file holds one F32 tensor `doc_features` \[N, doc_dim\]; the SafeTensors
/// metadata maps `item_ids` to a JSON array of N item IDs in row order.
pub fn load_doc_features<B: Backend>(path: &Path, device: &B::Device) -> Result<DocFeatures<B>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let (_, metadata) = SafeTensors::read_metadata(&bytes)
        .with_context(|| format!("Failed to read SafeTensors header from {:?}", path))?;
    let item_ids_json = metadata
        .metadata()
        .as_ref()
        .and_then(|m| m.get(ITEM_IDS_METADATA_KEY).cloned())
        .with_context(|| format!("{:?} has no '{}' metadata", path, ITEM_IDS_METADATA_KEY))?;
    let item_ids: Vec<ItemId> =
        serde_json::from_str(&item_ids_json).context("Invalid item_ids metadata")?;

    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("Failed to deserialize SafeTensors from {:?}", path))?;
    let view = tensors
        .tensor("doc_features")
        .context("SafeTensors file missing 'doc_features' tensor")?;
    let features = tensor_to_burn_2d::<B>(&view, device).context("Failed to convert doc_features")?;

    let docs = DocFeatures::new(item_ids, features)?;
    tracing::info!(path = ?path, items = docs.len(), dim = docs.dim(), "Loaded document features");
    Ok(docs)
}

/// Convert a SafeTensors F32 view to a Burn 2D tensor.
///
/// Handles both unbatched [N, D] and batched [1, N, D] formats.
fn tensor_to_burn_2d<B: Backend>(view: &TensorView, device: &B::Device) -> Result<Tensor<B, 2>> {
    let shape = view.shape();
    anyhow::ensure!(
        view.dtype() == Dtype::F32,
        "Expected F32 dtype, got {:?}",
        view.dtype()
    );

    let floats: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());

    let (n, d) = match shape.len() {
        2 => (shape[0], shape[1]),
        3 if shape[0] == 1 => (shape[1], shape[2]),
        _ => anyhow::bail!(
            "Expected 2D tensor [N, D] or batched [1, N, D], got shape {:?}",
            shape
        ),
    };
    Ok(Tensor::from_data(TensorData::new(floats, [n, d]), device))
}

/// Convert an integer view (I32 or I64) to non-negative IDs.
fn view_to_ids(view: &TensorView) -> Result<Vec<u32>> {
    let raw: Vec<i64> = match view.dtype() {
        Dtype::I32 => bytemuck::pod_collect_to_vec::<u8, i32>(view.data())
            .into_iter()
            .map(i64::from)
            .collect(),
        Dtype::I64 => bytemuck::pod_collect_to_vec(view.data()),
        other => anyhow::bail!("Expected I32 or I64 ids, got {:?}", other),
    };

    raw.into_iter()
        .map(|id| {
            u32::try_from(id).with_context(|| format!("Id {} is not a valid table index", id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{init_cpu_device, to_host_f32, CpuBackend};

    fn view_bytes(values: &[i64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_view_to_ids_rejects_negative() {
        let bytes = view_bytes(&[1, -2]);
        let view = TensorView::new(Dtype::I64, vec![2], &bytes).expect("view");
        assert!(view_to_ids(&view).is_err());

        let bytes = view_bytes(&[0, 7]);
        let view = TensorView::new(Dtype::I64, vec![2], &bytes).expect("view");
        assert_eq!(view_to_ids(&view).expect("ids"), vec![0, 7]);
    }

    #[test]
    fn test_decodes_unaligned_buffers() {
        // One leading byte pushes the payload off its natural alignment
        let mut floats = vec![0u8];
        floats.extend([1.5f32, -2.0, 0.25, 4.0].iter().flat_map(|v| v.to_le_bytes()));
        let view = TensorView::new(Dtype::F32, vec![2, 2], &floats[1..]).expect("view");
        let tensor = tensor_to_burn_2d::<CpuBackend>(&view, &init_cpu_device()).expect("decode");
        assert_eq!(to_host_f32(tensor), vec![1.5, -2.0, 0.25, 4.0]);

        let mut ids = vec![0u8];
        ids.extend([3i32, 0, 12].iter().flat_map(|v| v.to_le_bytes()));
        let view = TensorView::new(Dtype::I32, vec![3], &ids[1..]).expect("view");
        assert_eq!(view_to_ids(&view).expect("ids"), vec![3, 0, 12]);
    }
}
