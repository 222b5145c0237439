use burn::{backend::Autodiff, tensor::backend::Backend};

/// The backend used for inference and evaluation
#[cfg(not(feature = "tch"))]
pub type Inner = burn::backend::NdArray<f32>;

/// The backend used for inference and evaluation
#[cfg(feature = "tch")]
pub type Inner = burn::backend::LibTorch<f32>;

/// The backend used for training
pub type Training = Autodiff<Inner>;

/// The device to run on: the CPU, or the first CUDA device when built with `tch`
pub fn device() -> <Inner as Backend>::Device {
    #[cfg(feature = "tch")]
    {
        burn::backend::libtorch::LibTorchDevice::Cuda(0)
    }

    #[cfg(not(feature = "tch"))]
    {
        Default::default()
    }
}
