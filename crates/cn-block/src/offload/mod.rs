// Accelerator-style offload backend.
//
// Models a device with its own memory: operands are copied into device
// buffers, a kernel runs one work item per output cell on the device's
// execution grid (a dedicated rayon pool), and the partial product is copied
// back and accumulated into C on the host.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::backend::{check_operands, MultiplyKernel};
use crate::block::Block;
use crate::error::Result;

/// Device-resident copy of a block.
#[derive(Debug)]
struct DeviceBuffer {
    side: usize,
    data: Vec<f32>,
}

impl DeviceBuffer {
    fn copy_in(block: &Block) -> Self {
        DeviceBuffer {
            side: block.side(),
            data: block.as_slice().to_vec(),
        }
    }

    fn zeroed(side: usize) -> Self {
        DeviceBuffer {
            side,
            data: vec![0.0; side * side],
        }
    }
}

/// Offload backend.
///
/// Each output cell's k-reduction is computed privately by one work item and
/// written once, then added to the host accumulator. Because the device works
/// from staged copies, the exchange step needs a global barrier after the
/// host-side buffer swap.
#[derive(Debug)]
pub struct OffloadKernel {
    device: ThreadPool,
}

impl OffloadKernel {
    /// Create an offload kernel whose execution grid has `threads` lanes
    /// (`None` means one per core).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("cn-offload-{}", i));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        Ok(OffloadKernel {
            device: builder.build()?,
        })
    }

    /// Runs the product kernel on device buffers, returning `a @ b`.
    fn launch(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> DeviceBuffer {
        let n = a.side;
        let mut out = DeviceBuffer::zeroed(n);
        self.device.install(|| {
            out.data.par_iter_mut().enumerate().for_each(|(cell, dst)| {
                let (i, j) = (cell / n, cell % n);
                let mut sum = 0.0f32;
                for k in 0..n {
                    sum += a.data[i * n + k] * b.data[k * n + j];
                }
                *dst = sum;
            });
        });
        out
    }
}

impl MultiplyKernel for OffloadKernel {
    fn name(&self) -> &str {
        "offload"
    }

    fn multiply_accumulate(&self, a: &Block, b: &Block, c: &mut Block) -> Result<()> {
        check_operands(a, b, c)?;
        let dev_a = DeviceBuffer::copy_in(a);
        let dev_b = DeviceBuffer::copy_in(b);
        let partial = self.launch(&dev_a, &dev_b);
        for (c_ij, p) in c.as_mut_slice().iter_mut().zip(&partial.data) {
            *c_ij += p;
        }
        Ok(())
    }

    fn needs_exchange_barrier(&self) -> bool {
        true
    }
}
