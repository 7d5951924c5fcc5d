use core::fmt;
use core::num::NonZeroU32;

/// Thread identifier
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ThreadHandle(NonZeroU32);

impl ThreadHandle {
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    pub fn val(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tunables for [`HostKernel`](crate::HostKernel).
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Granularity stacks are rounded up to.
    pub page_size: usize,
    /// Smallest stack handed to the host when spawning.
    pub min_stack_size: usize,
    /// Prefix for native thread names, e.g. `strand-3`.
    pub name_prefix: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            min_stack_size: 16 * 1024,
            name_prefix: "strand".into(),
        }
    }
}
