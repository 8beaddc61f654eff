//! Inode number allocation for the metadata authority.
//!
//! Inode IDs are handed out from a single counter and never reused. They are
//! not tied to a volume or path; binding happens later through
//! [`crate::directory::Namespace::bind_file_inode`].

use crate::types::InodeId;

/// Monotonic inode ID counter.
#[derive(Debug, Default)]
pub struct InodeAllocator {
    last: u64,
}

impl InodeAllocator {
    /// Creates an allocator. The first allocated ID is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new unique inode ID.
    pub fn allocate(&mut self) -> InodeId {
        self.last += 1;
        InodeId::new(self.last)
    }
}
