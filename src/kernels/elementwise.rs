//! Element-wise kernels: the addition variants and the multiply that feeds
//! the dot-product reduction.

use rayon::prelude::*;

use super::KernelName;
use crate::backend::{Buffer, BuildOptions};
use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;

/// How many elements one work-item handles.
///
/// A work-item performs `vectors` loads of `width` lanes each, over
/// consecutive elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ItemLayout {
    pub vectors: usize,
    pub width: usize,
}

impl ItemLayout {
    pub const SCALAR: ItemLayout = ItemLayout {
        vectors: 1,
        width: 1,
    };

    pub fn for_kernel(name: KernelName, options: &BuildOptions) -> BenchResult<Self> {
        let per_item = || {
            options.count_per_work_item.ok_or_else(|| {
                BenchError::backend(format!("{name} built without COUNT_PER_WORKITEM"))
            })
        };
        let width = || {
            options
                .vector_width
                .ok_or_else(|| BenchError::backend(format!("{name} built without VECTOR_WIDTH")))
        };

        Ok(match name {
            KernelName::AddMoreElement => ItemLayout {
                vectors: per_item()?,
                width: 1,
            },
            KernelName::AddOneVector => ItemLayout {
                vectors: 1,
                width: width()?,
            },
            KernelName::AddMoreVector => ItemLayout {
                vectors: per_item()?,
                width: width()?,
            },
            _ => Self::SCALAR,
        })
    }

    pub fn elements(&self) -> usize {
        self.vectors * self.width
    }
}

/// `out[i] = left[i] + right[i]` for `i < count`.
pub(super) fn add<T: Real>(
    out: &Buffer<T>,
    left: &Buffer<T>,
    right: &Buffer<T>,
    count: usize,
    layout: ItemLayout,
    global: usize,
) -> BenchResult<()> {
    apply(out, left, right, count, layout, global, |a, b| a + b)
}

/// `out[i] = left[i] * right[i]` for `i < count`.
pub(super) fn multiply<T: Real>(
    out: &Buffer<T>,
    left: &Buffer<T>,
    right: &Buffer<T>,
    count: usize,
    global: usize,
) -> BenchResult<()> {
    apply(out, left, right, count, ItemLayout::SCALAR, global, |a, b| a * b)
}

fn apply<T, F>(
    out: &Buffer<T>,
    left: &Buffer<T>,
    right: &Buffer<T>,
    count: usize,
    layout: ItemLayout,
    global: usize,
    op: F,
) -> BenchResult<()>
where
    T: Real,
    F: Fn(T, T) -> T + Sync,
{
    let per_item = layout.elements();
    let count = count.min(global.saturating_mul(per_item)).min(out.len());

    // Output storage may be shared by sibling sub-buffers on other queues;
    // it is locked only for the final copy.
    let mut staged = vec![T::zero(); count];
    {
        let left = left.read()?;
        let right = right.read()?;
        staged
            .par_chunks_mut(per_item)
            .zip(left[..count].par_chunks(per_item))
            .zip(right[..count].par_chunks(per_item))
            .for_each(|((out, left), right)| {
                // Tail items may hold a partial vector.
                for ((out, left), right) in out
                    .chunks_mut(layout.width)
                    .zip(left.chunks(layout.width))
                    .zip(right.chunks(layout.width))
                {
                    for lane in 0..out.len() {
                        out[lane] = op(left[lane], right[lane]);
                    }
                }
            });
    }

    out.write()?[..count].copy_from_slice(&staged);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostArray, MemoryAccess};
    use crate::numeric::Precision;

    fn operands(count: usize) -> (Buffer<f64>, Buffer<f64>, Buffer<f64>) {
        let out = Buffer::device_private(count, MemoryAccess::WriteOnly);
        let left = Buffer::device_private(count, MemoryAccess::ReadOnly);
        let right = Buffer::device_private(count, MemoryAccess::ReadOnly);
        for (i, value) in left.write().unwrap().iter_mut().enumerate() {
            *value = i as f64;
        }
        right.write().unwrap().fill(0.5);
        (out, left, right)
    }

    #[test]
    fn vector_layout_handles_ragged_tail() {
        let (out, left, right) = operands(11);
        let layout = ItemLayout {
            vectors: 2,
            width: 4,
        };
        add(&out, &left, &right, 11, layout, 2).unwrap();
        let expected: Vec<f64> = (0..11).map(|i| i as f64 + 0.5).collect();
        assert_eq!(out.read().unwrap().to_vec(), expected);
    }

    #[test]
    fn multiply_leaves_elements_past_count() {
        let (out, left, right) = operands(6);
        multiply(&out, &left, &right, 4, 4).unwrap();
        assert_eq!(out.read().unwrap().to_vec(), vec![0.0, 0.5, 1.0, 1.5, 0.0, 0.0]);
    }

    #[test]
    fn output_lock_is_not_held_while_operands_are_read() {
        let host = HostArray::new(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let shared = Buffer::use_host(&host, MemoryAccess::ReadWrite).unwrap();
        let low = shared.sub_buffer(0, 3, MemoryAccess::ReadWrite).unwrap();
        let high = shared.sub_buffer(3, 3, MemoryAccess::ReadWrite).unwrap();

        // Both operands and the output live in the same storage.
        add(&high, &low, &high, 3, ItemLayout::SCALAR, 3).unwrap();
        add(&low, &low, &low, 3, ItemLayout::SCALAR, 3).unwrap();

        assert_eq!(host.to_vec().unwrap(), vec![2.0, 4.0, 6.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn sibling_windows_run_from_concurrent_threads() {
        let count = 1 << 16;
        let host = HostArray::filled(2 * count, 0.0f64);
        let shared = Buffer::use_host(&host, MemoryAccess::WriteOnly).unwrap();
        let (_, left, right) = operands(2 * count);

        std::thread::scope(|scope| {
            for unit in 0..2 {
                let out = shared.sub_buffer(unit * count, count, MemoryAccess::WriteOnly).unwrap();
                let left = left.sub_buffer(unit * count, count, MemoryAccess::ReadOnly).unwrap();
                let right = right.sub_buffer(unit * count, count, MemoryAccess::ReadOnly).unwrap();
                scope.spawn(move || add(&out, &left, &right, count, ItemLayout::SCALAR, count).unwrap());
            }
        });

        let result = host.to_vec().unwrap();
        assert!(result.iter().enumerate().all(|(i, &v)| v == i as f64 + 0.5));
    }

    #[test]
    fn layout_follows_build_defines() {
        let options = BuildOptions::new(Precision::Double)
            .with_count_per_work_item(16)
            .with_vector_width(4);
        assert_eq!(
            ItemLayout::for_kernel(KernelName::AddMoreVector, &options).unwrap().elements(),
            64
        );
        assert_eq!(
            ItemLayout::for_kernel(KernelName::AddOneElement, &options).unwrap(),
            ItemLayout::SCALAR
        );
        let bare = BuildOptions::new(Precision::Double);
        assert!(ItemLayout::for_kernel(KernelName::AddOneVector, &bare).is_err());
    }
}
