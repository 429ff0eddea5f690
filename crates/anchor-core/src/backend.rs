//! Backend and device helpers.
//!
//! Every model in the workspace is generic over [`Backend`]; these aliases pick
//! the concrete backend used by the CLI and the test-suite. The NdArray CPU
//! backend is always available, WGPU sits behind the `gpu` feature.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

/// CPU backend used by default and by all tests.
pub type CpuBackend = burn::backend::NdArray<f32>;

/// Create the CPU device.
pub fn init_cpu_device() -> <CpuBackend as Backend>::Device {
    Default::default()
}

#[cfg(feature = "gpu")]
pub type WgpuBackend = burn::backend::Wgpu;

#[cfg(feature = "gpu")]
pub fn init_gpu_device() -> burn::backend::wgpu::WgpuDevice {
    // Burn picks Metal/Vulkan/DX12 automatically for the default device
    burn::backend::wgpu::WgpuDevice::default()
}

/// Build a 1D `Int` tensor from host IDs.
pub fn int_tensor_1d<B: Backend>(ids: Vec<i64>, device: &B::Device) -> Tensor<B, 1, Int> {
    let n = ids.len();
    Tensor::from_data(TensorData::new(ids, [n]), device)
}

/// Build a 1D float tensor from host values.
pub fn float_tensor_1d<B: Backend>(values: Vec<f32>, device: &B::Device) -> Tensor<B, 1> {
    let n = values.len();
    Tensor::from_data(TensorData::new(values, [n]), device)
}

/// Copy a float tensor back to the host as `f32`.
///
/// # Panics
///
/// Panics if the backend hands back data that cannot be converted to `f32`,
/// which no supported backend does.
pub fn to_host_f32<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .expect("float tensor converts to f32")
}

/// Copy an `Int` tensor back to the host as `i64`.
///
/// # Panics
///
/// Same contract as [`to_host_f32`].
pub fn to_host_i64<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<i64> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .expect("int tensor converts to i64")
}
