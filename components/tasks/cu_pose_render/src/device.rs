//! Device memory backends.
//!
//! A [`Device`] hands out buffers of `f32` and copies between host slices and those buffers.
//! Copies block the calling thread until they are complete. Buffers release their memory
//! when dropped.

use crate::error::{RenderError, RenderResult};
use std::fmt::Debug;
use std::mem::size_of_val;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait DeviceBuffer: Debug + Send {
    /// Number of `f32` the buffer holds.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Device: Send + Sync {
    type Buffer: DeviceBuffer;

    /// Allocate a zeroed buffer of `len` floats.
    fn alloc(&self, len: usize) -> RenderResult<Self::Buffer>;

    /// Copy `src` to the beginning of `dst`.
    fn upload(&self, src: &[f32], dst: &mut Self::Buffer) -> RenderResult<()>;

    /// Fill `dst` from the beginning of `src`.
    fn download(&self, src: &Self::Buffer, dst: &mut [f32]) -> RenderResult<()>;
}

fn check_fits(what: &str, len: usize, capacity: usize) -> RenderResult<()> {
    if len > capacity {
        return Err(RenderError::device(
            what,
            format!("{len} floats do not fit in a buffer of {capacity}"),
        ));
    }
    Ok(())
}

/// Snapshot of the transfers a [`HostDevice`] performed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub allocations: usize,
    pub uploads: usize,
    pub downloads: usize,
    pub uploaded_bytes: usize,
    pub downloaded_bytes: usize,
}

/// Device living in host memory, for machines without a GPU.
/// Kernels can reach the pixels through [`HostBuffer::as_mut_slice`].
#[derive(Debug, Default)]
pub struct HostDevice {
    allocations: AtomicUsize,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
    uploaded_bytes: AtomicUsize,
    downloaded_bytes: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffer(Vec<f32>);

impl HostBuffer {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TransferStats {
        TransferStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            uploaded_bytes: self.uploaded_bytes.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Device for HostDevice {
    type Buffer = HostBuffer;

    fn alloc(&self, len: usize) -> RenderResult<HostBuffer> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(HostBuffer(vec![0.0; len]))
    }

    fn upload(&self, src: &[f32], dst: &mut HostBuffer) -> RenderResult<()> {
        check_fits("uploading to the device", src.len(), dst.len())?;
        dst.0[..src.len()].copy_from_slice(src);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.uploaded_bytes
            .fetch_add(size_of_val(src), Ordering::Relaxed);
        Ok(())
    }

    fn download(&self, src: &HostBuffer, dst: &mut [f32]) -> RenderResult<()> {
        check_fits("downloading from the device", dst.len(), src.len())?;
        dst.copy_from_slice(&src.0[..dst.len()]);
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.downloaded_bytes
            .fetch_add(size_of_val(dst), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(feature = "cuda")]
mod cuda {
    use super::*;
    use cudarc::driver::{CudaContext, CudaSlice, CudaStream};
    use std::sync::Arc;

    /// CUDA device memory, all copies go through the context default stream.
    pub struct CudaDevice {
        stream: Arc<CudaStream>,
    }

    #[derive(Debug)]
    pub struct CudaBuffer(CudaSlice<f32>);

    impl CudaBuffer {
        /// For kernel launches.
        pub fn as_cuda_slice(&self) -> &CudaSlice<f32> {
            &self.0
        }

        pub fn as_cuda_slice_mut(&mut self) -> &mut CudaSlice<f32> {
            &mut self.0
        }
    }

    impl DeviceBuffer for CudaBuffer {
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    impl CudaDevice {
        pub fn new(ordinal: usize) -> RenderResult<Self> {
            let ctx = CudaContext::new(ordinal)
                .map_err(|e| RenderError::device("creating the CUDA context", e))?;
            Ok(Self {
                stream: ctx.default_stream(),
            })
        }

        pub fn stream(&self) -> &Arc<CudaStream> {
            &self.stream
        }
    }

    impl Device for CudaDevice {
        type Buffer = CudaBuffer;

        fn alloc(&self, len: usize) -> RenderResult<CudaBuffer> {
            self.stream
                .alloc_zeros::<f32>(len)
                .map(CudaBuffer)
                .map_err(|e| RenderError::device("allocating device memory", e))
        }

        fn upload(&self, src: &[f32], dst: &mut CudaBuffer) -> RenderResult<()> {
            check_fits("uploading to the device", src.len(), dst.len())?;
            let mut view = dst.0.slice_mut(0..src.len());
            self.stream
                .memcpy_htod(src, &mut view)
                .map_err(|e| RenderError::device("uploading to the device", e))
        }

        fn download(&self, src: &CudaBuffer, dst: &mut [f32]) -> RenderResult<()> {
            check_fits("downloading from the device", dst.len(), src.len())?;
            let view = src.0.slice(0..dst.len());
            self.stream
                .memcpy_dtoh(&view, dst)
                .map_err(|e| RenderError::device("downloading from the device", e))
        }
    }
}

#[cfg(feature = "cuda")]
pub use cuda::{CudaBuffer, CudaDevice};
