//! Typed kernel arguments and bind-time validation.

use core::mem::size_of;

use smallvec::SmallVec;

use super::{KernelName, elementwise, matvec, reduction};
use crate::backend::{Buffer, BuildOptions, DeviceInfo, Kernel, MemoryAccess};
use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;

/// What a kernel expects at one argument position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Real buffer the kernel writes.
    Output,
    /// Real buffer the kernel reads.
    Input,
    /// Real buffer updated in place.
    InOut,
    /// `u32` buffer the kernel reads.
    IndexInput,
    Scalar,
    /// Per-group scratch, given in bytes.
    Local,
}

impl ArgKind {
    pub fn label(self) -> &'static str {
        match self {
            ArgKind::Output => "output buffer",
            ArgKind::Input => "input buffer",
            ArgKind::InOut => "read-write buffer",
            ArgKind::IndexInput => "index buffer",
            ArgKind::Scalar => "scalar",
            ArgKind::Local => "local scratch",
        }
    }
}

/// One bound argument.
#[derive(Debug, Clone)]
pub enum KernelArg<T> {
    Real(Buffer<T>),
    Index(Buffer<u32>),
    Scalar(u32),
    Local(usize),
}

impl<T> KernelArg<T> {
    fn label(&self) -> &'static str {
        match self {
            KernelArg::Real(_) => "real buffer",
            KernelArg::Index(_) => "index buffer",
            KernelArg::Scalar(_) => "scalar",
            KernelArg::Local(_) => "local scratch",
        }
    }
}

/// Positional argument list, built in kernel signature order.
///
/// ```ignore
/// let args = ArgList::new()
///     .buffer(&partials)
///     .buffer(&values)
///     .scalar(count)
///     .local(local * size_of::<f64>());
/// ```
#[derive(Debug, Clone)]
pub struct ArgList<T> {
    args: SmallVec<[KernelArg<T>; 6]>,
}

impl<T: Real> ArgList<T> {
    pub fn new() -> Self {
        Self {
            args: SmallVec::new(),
        }
    }

    pub fn buffer(mut self, buffer: &Buffer<T>) -> Self {
        self.args.push(KernelArg::Real(buffer.clone()));
        self
    }

    pub fn indices(mut self, buffer: &Buffer<u32>) -> Self {
        self.args.push(KernelArg::Index(buffer.clone()));
        self
    }

    pub fn scalar(mut self, value: u32) -> Self {
        self.args.push(KernelArg::Scalar(value));
        self
    }

    /// Local scratch size in bytes.
    pub fn local(mut self, bytes: usize) -> Self {
        self.args.push(KernelArg::Local(bytes));
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl<T: Real> Default for ArgList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Global and optional local (work-group) size of a 1-D launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkShape {
    pub global: usize,
    pub local: Option<usize>,
}

impl WorkShape {
    /// Launch with the device choosing the group size.
    pub fn linear(global: usize) -> Self {
        Self {
            global,
            local: None,
        }
    }

    pub fn tiled(global: usize, local: usize) -> Self {
        Self {
            global,
            local: Some(local),
        }
    }

    pub fn group_count(&self) -> usize {
        self.global / self.local.unwrap_or(1)
    }
}

/// Kernel plus arguments, validated and ready to enqueue.
#[derive(Debug, Clone)]
pub struct KernelLaunch<T> {
    name: KernelName,
    options: BuildOptions,
    args: SmallVec<[KernelArg<T>; 6]>,
    shape: WorkShape,
}

impl Kernel {
    /// Elements one work-item covers; sizes the global range of element-wise launches.
    pub fn elements_per_work_item(&self) -> BenchResult<usize> {
        Ok(elementwise::ItemLayout::for_kernel(self.name(), self.options())?.elements())
    }

    /// Validates `args` against this kernel's signature and the device limits.
    ///
    /// All argument mismatches surface here; a successful bind never fails
    /// for argument reasons once enqueued.
    pub fn bind<T: Real>(
        &self,
        args: ArgList<T>,
        shape: WorkShape,
        device: &DeviceInfo,
    ) -> BenchResult<KernelLaunch<T>> {
        let name = self.name();
        let kernel = name.as_str();

        let built = self.options().precision;
        if built != T::PRECISION {
            return Err(BenchError::PrecisionMismatch {
                kernel,
                built: built.type_name(),
                requested: T::PRECISION.type_name(),
            });
        }

        let signature = name.signature();
        if args.len() != signature.len() {
            return Err(BenchError::ArgumentCount {
                kernel,
                expected: signature.len(),
                got: args.len(),
            });
        }
        for (position, (arg, &kind)) in args.args.iter().zip(signature).enumerate() {
            check_arg(kernel, position, arg, kind)?;
        }
        check_aliasing(kernel, &args.args)?;
        check_shape(kernel, shape, device)?;
        if name == KernelName::ReductionSum2 && shape.local.is_some_and(|local| local < 2) {
            return Err(BenchError::work_shape(format!(
                "{kernel}: the fused load halves the group, local size must be at least 2"
            )));
        }

        let launch = KernelLaunch {
            name,
            options: self.options().clone(),
            args: args.args,
            shape,
        };
        launch.check_ranges()?;
        Ok(launch)
    }
}

fn check_arg<T>(kernel: &'static str, position: usize, arg: &KernelArg<T>, kind: ArgKind) -> BenchResult<()>
where
    T: Real,
{
    let access = match (kind, arg) {
        (ArgKind::Output | ArgKind::Input | ArgKind::InOut, KernelArg::Real(buffer)) => buffer.access(),
        (ArgKind::IndexInput, KernelArg::Index(buffer)) => buffer.access(),
        (ArgKind::Scalar, KernelArg::Scalar(_)) | (ArgKind::Local, KernelArg::Local(_)) => return Ok(()),
        _ => {
            return Err(BenchError::ArgumentKind {
                kernel,
                position,
                expected: kind.label(),
                got: arg.label(),
            });
        }
    };

    let reads = matches!(kind, ArgKind::Input | ArgKind::InOut | ArgKind::IndexInput);
    let writes = matches!(kind, ArgKind::Output | ArgKind::InOut);
    if reads && !access.readable() {
        return Err(access_error(kernel, position, kind, access));
    }
    if writes && !access.writable() {
        return Err(access_error(kernel, position, kind, access));
    }
    Ok(())
}

fn access_error(kernel: &'static str, position: usize, kind: ArgKind, access: MemoryAccess) -> BenchError {
    BenchError::BufferAccess {
        kernel,
        position,
        message: format!("{} bound to a {access:?} buffer", kind.label()),
    }
}

fn check_aliasing<T: Real>(kernel: &'static str, args: &[KernelArg<T>]) -> BenchResult<()> {
    let storages: SmallVec<[(usize, usize); 6]> = args
        .iter()
        .enumerate()
        .filter_map(|(position, arg)| match arg {
            KernelArg::Real(buffer) => Some((position, buffer.storage_id())),
            KernelArg::Index(buffer) => Some((position, buffer.storage_id())),
            _ => None,
        })
        .collect();

    for (i, &(first, storage)) in storages.iter().enumerate() {
        if let Some(&(second, _)) = storages[i + 1..].iter().find(|(_, other)| *other == storage) {
            return Err(BenchError::BufferAliasing {
                kernel,
                first,
                second,
            });
        }
    }
    Ok(())
}

fn check_shape(kernel: &'static str, shape: WorkShape, device: &DeviceInfo) -> BenchResult<()> {
    if shape.global == 0 {
        return Err(BenchError::work_shape(format!("{kernel}: global size is zero")));
    }
    let Some(local) = shape.local else {
        return Ok(());
    };
    if !local.is_power_of_two() {
        return Err(BenchError::work_shape(format!(
            "{kernel}: local size {local} is not a power of two"
        )));
    }
    if local > device.max_work_group_size {
        return Err(BenchError::work_shape(format!(
            "{kernel}: local size {local} exceeds device {} maximum {}",
            device.id, device.max_work_group_size
        )));
    }
    if shape.global % local != 0 {
        return Err(BenchError::work_shape(format!(
            "{kernel}: global size {} is not a multiple of local size {local}",
            shape.global
        )));
    }
    Ok(())
}

fn ensure_len(kernel: &'static str, position: usize, len: usize, needed: usize) -> BenchResult<()> {
    if len < needed {
        return Err(BenchError::out_of_bounds(format!(
            "{kernel} argument {position}: buffer holds {len} elements, kernel touches {needed}"
        )));
    }
    Ok(())
}

fn ensure_coverage(kernel: &'static str, covered: usize, count: usize) -> BenchResult<()> {
    if covered < count {
        return Err(BenchError::work_shape(format!(
            "{kernel}: launch covers {covered} elements, {count} requested"
        )));
    }
    Ok(())
}

impl<T: Real> KernelLaunch<T> {
    pub fn kernel_name(&self) -> KernelName {
        self.name
    }

    pub fn shape(&self) -> WorkShape {
        self.shape
    }

    fn real(&self, position: usize) -> BenchResult<&Buffer<T>> {
        match self.args.get(position) {
            Some(KernelArg::Real(buffer)) => Ok(buffer),
            _ => Err(self.unbound(position)),
        }
    }

    fn index(&self, position: usize) -> BenchResult<&Buffer<u32>> {
        match self.args.get(position) {
            Some(KernelArg::Index(buffer)) => Ok(buffer),
            _ => Err(self.unbound(position)),
        }
    }

    fn scalar(&self, position: usize) -> BenchResult<usize> {
        match self.args.get(position) {
            Some(KernelArg::Scalar(value)) => Ok(*value as usize),
            _ => Err(self.unbound(position)),
        }
    }

    fn local_bytes(&self, position: usize) -> BenchResult<usize> {
        match self.args.get(position) {
            Some(KernelArg::Local(bytes)) => Ok(*bytes),
            _ => Err(self.unbound(position)),
        }
    }

    fn unbound(&self, position: usize) -> BenchError {
        BenchError::backend(format!("{}: argument {position} not bound as expected", self.name))
    }

    fn local_size(&self) -> BenchResult<usize> {
        self.shape.local.ok_or_else(|| {
            BenchError::work_shape(format!("{} needs an explicit local size", self.name))
        })
    }

    /// Kernel-specific size checks against the bound buffers.
    fn check_ranges(&self) -> BenchResult<()> {
        let kernel = self.name.as_str();
        match self.name {
            KernelName::AddOneElement
            | KernelName::AddMoreElement
            | KernelName::AddOneVector
            | KernelName::AddMoreVector
            | KernelName::MultiplyEachElement => {
                let count = self.scalar(3)?;
                for position in 0..3 {
                    ensure_len(kernel, position, self.real(position)?.len(), count)?;
                }
                let per_item = elementwise::ItemLayout::for_kernel(self.name, &self.options)?.elements();
                ensure_coverage(kernel, self.shape.global.saturating_mul(per_item), count)
            }
            KernelName::MatrixXVector => {
                let rows = self.scalar(5)?;
                let width = matvec::row_width(&self.options)?;
                let slots = rows.checked_mul(width).ok_or_else(|| {
                    BenchError::too_large(format!("{rows} rows x {width} slots overflows"))
                })?;
                ensure_len(kernel, 0, self.real(0)?.len(), rows)?;
                ensure_len(kernel, 1, self.real(1)?.len(), slots)?;
                ensure_len(kernel, 3, self.index(3)?.len(), slots)?;
                ensure_len(kernel, 4, self.index(4)?.len(), rows)?;
                ensure_coverage(kernel, self.shape.global, rows)
            }
            KernelName::ReductionSum0 => {
                let count = self.scalar(1)?;
                let stride = self.scalar(2)?;
                if stride == 0 {
                    return Err(BenchError::work_shape(format!("{kernel}: stride must be positive")));
                }
                ensure_len(kernel, 0, self.real(0)?.len(), count)?;
                ensure_coverage(kernel, self.shape.global.saturating_mul(2 * stride), count)
            }
            KernelName::ReductionSum1
            | KernelName::ReductionSum2
            | KernelName::ReductionSum3
            | KernelName::ReductionSum4 => {
                let count = self.scalar(2)?;
                let local = self.local_size()?;
                let bytes = self.local_bytes(3)?;
                let expected = local * size_of::<T>();
                if bytes != expected {
                    return Err(BenchError::work_shape(format!(
                        "{kernel}: local scratch of {bytes} bytes, group of {local} needs {expected}"
                    )));
                }
                let groups = self.shape.group_count();
                ensure_len(kernel, 1, self.real(1)?.len(), count)?;
                ensure_len(kernel, 0, self.real(0)?.len(), groups)?;
                let per_group = reduction::elements_per_group(self.name, local);
                ensure_coverage(kernel, groups.saturating_mul(per_group), count)
            }
        }
    }

    /// Runs the kernel body. Called on the owning queue's worker thread.
    pub(crate) fn execute(self) -> BenchResult<()> {
        let global = self.shape.global;
        match self.name {
            KernelName::AddOneElement
            | KernelName::AddMoreElement
            | KernelName::AddOneVector
            | KernelName::AddMoreVector => elementwise::add(
                self.real(0)?,
                self.real(1)?,
                self.real(2)?,
                self.scalar(3)?,
                elementwise::ItemLayout::for_kernel(self.name, &self.options)?,
                global,
            ),
            KernelName::MultiplyEachElement => elementwise::multiply(
                self.real(0)?,
                self.real(1)?,
                self.real(2)?,
                self.scalar(3)?,
                global,
            ),
            KernelName::MatrixXVector => matvec::multiply(
                self.real(0)?,
                self.real(1)?,
                self.real(2)?,
                self.index(3)?,
                self.index(4)?,
                self.scalar(5)?,
                matvec::row_width(&self.options)?,
                global,
            ),
            KernelName::ReductionSum0 => {
                reduction::stride_doubling(self.real(0)?, self.scalar(1)?, self.scalar(2)?, global)
            }
            KernelName::ReductionSum1
            | KernelName::ReductionSum2
            | KernelName::ReductionSum3
            | KernelName::ReductionSum4 => reduction::tree(
                self.name,
                self.real(0)?,
                self.real(1)?,
                self.scalar(2)?,
                global,
                self.local_size()?,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Platform, ProgramSource, build_program};

    fn dot_kernel(name: &str, flags: &str) -> (Kernel, DeviceInfo) {
        let platform = Platform::host(1, 64).unwrap();
        let program = build_program(&platform, ProgramSource::VECTOR_DOT, flags).unwrap();
        (program.create_kernel(name).unwrap(), platform.devices()[0].clone())
    }

    fn buffer(len: usize, access: MemoryAccess) -> Buffer<f64> {
        Buffer::device_private(len, access)
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let (kernel, device) = dot_kernel("MultiplyEachElement", "-D REAL=double");
        let out = buffer(4, MemoryAccess::WriteOnly);
        let args = ArgList::new().buffer(&out).scalar(4);
        assert!(matches!(
            kernel.bind(args, WorkShape::linear(4), &device),
            Err(BenchError::ArgumentCount { expected: 4, got: 2, .. })
        ));
    }

    #[test]
    fn scalar_in_buffer_slot_is_rejected() {
        let (kernel, device) = dot_kernel("MultiplyEachElement", "-D REAL=double");
        let out = buffer(4, MemoryAccess::WriteOnly);
        let a = buffer(4, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&a).scalar(1).scalar(4);
        assert!(matches!(
            kernel.bind(args, WorkShape::linear(4), &device),
            Err(BenchError::ArgumentKind { position: 2, .. })
        ));
    }

    #[test]
    fn read_only_output_is_rejected() {
        let (kernel, device) = dot_kernel("MultiplyEachElement", "-D REAL=double");
        let out = buffer(4, MemoryAccess::ReadOnly);
        let a = buffer(4, MemoryAccess::ReadOnly);
        let b = buffer(4, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&a).buffer(&b).scalar(4);
        assert!(matches!(
            kernel.bind(args, WorkShape::linear(4), &device),
            Err(BenchError::BufferAccess { position: 0, .. })
        ));
    }

    #[test]
    fn aliased_buffers_are_rejected() {
        let (kernel, device) = dot_kernel("MultiplyEachElement", "-D REAL=double");
        let out = buffer(8, MemoryAccess::ReadWrite);
        let a = out.sub_buffer(4, 4, MemoryAccess::ReadOnly).unwrap();
        let b = buffer(4, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&a).buffer(&b).scalar(4);
        assert!(matches!(
            kernel.bind(args, WorkShape::linear(4), &device),
            Err(BenchError::BufferAliasing { first: 0, second: 1, .. })
        ));
    }

    #[test]
    fn precision_must_match_build() {
        let (kernel, device) = dot_kernel("MultiplyEachElement", "-D REAL=float");
        let out = buffer(4, MemoryAccess::WriteOnly);
        let a = buffer(4, MemoryAccess::ReadOnly);
        let b = buffer(4, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&a).buffer(&b).scalar(4);
        assert!(matches!(
            kernel.bind(args, WorkShape::linear(4), &device),
            Err(BenchError::PrecisionMismatch { built: "float", requested: "double", .. })
        ));
    }

    #[test]
    fn fused_load_rejects_single_item_groups() {
        let (kernel, device) = dot_kernel("ReductionSum2", "-D REAL=double");
        let out = buffer(4, MemoryAccess::WriteOnly);
        let input = buffer(4, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&input).scalar(4).local(8);
        assert!(matches!(
            kernel.bind(args, WorkShape::tiled(4, 1), &device),
            Err(BenchError::InvalidWorkShape { .. })
        ));
    }

    #[test]
    fn local_scratch_must_match_group_size() {
        let (kernel, device) = dot_kernel("ReductionSum1", "-D REAL=double");
        let out = buffer(2, MemoryAccess::WriteOnly);
        let input = buffer(16, MemoryAccess::ReadOnly);
        let args = ArgList::new().buffer(&out).buffer(&input).scalar(16).local(8 * 4);
        assert!(matches!(
            kernel.bind(args, WorkShape::tiled(16, 8), &device),
            Err(BenchError::InvalidWorkShape { .. })
        ));

        let args = ArgList::new().buffer(&out).buffer(&input).scalar(16).local(8 * 8);
        assert!(kernel.bind(args, WorkShape::tiled(16, 8), &device).is_ok());
    }

    #[test]
    fn empty_and_oversized_shapes_are_rejected() {
        let (kernel, device) = dot_kernel("ReductionSum3", "-D REAL=double");
        let out = buffer(1, MemoryAccess::WriteOnly);
        let input = buffer(4, MemoryAccess::ReadOnly);

        let args = ArgList::new().buffer(&out).buffer(&input).scalar(0).local(8);
        assert!(kernel.bind(args, WorkShape::tiled(0, 1), &device).is_err());

        let args = ArgList::new().buffer(&out).buffer(&input).scalar(4).local(128 * 8);
        assert!(matches!(
            kernel.bind(args, WorkShape::tiled(128, 128), &device),
            Err(BenchError::InvalidWorkShape { .. })
        ));
    }

    #[test]
    fn launch_must_cover_the_count() {
        let (kernel, device) = dot_kernel("ReductionSum0", "-D REAL=double");
        let data = buffer(10, MemoryAccess::ReadWrite);
        let args = ArgList::new().buffer(&data).scalar(10).scalar(1);
        assert!(kernel.bind(args.clone(), WorkShape::linear(4), &device).is_err());
        assert!(kernel.bind(args, WorkShape::linear(5), &device).is_ok());
    }
}
