/// Configuration for a [`Reader`](crate::Reader).
///
/// # Default
///
/// No nesting limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Maximum number of simultaneously open containers.
    ///
    /// Entering a container beyond this depth fails with an unsupported
    /// value error. The scope stack itself is unbounded; this limit exists
    /// for callers that feed untrusted input into recursive consumers.
    ///
    /// # Default
    ///
    /// `None`
    pub max_depth: Option<usize>,
}

impl ReaderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Default number of buffered bytes after which a writer commits.
pub const DEFAULT_COMMIT_THRESHOLD: usize = 4096;

/// Configuration for a [`Writer`](crate::Writer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Whether each key must compare strictly greater than the previous key
    /// in the same dictionary.
    ///
    /// Disable only for trusted producers that already emit keys in order.
    ///
    /// # Default
    ///
    /// `true`
    pub validate_key_order: bool,

    /// Number of written-but-uncommitted bytes after which the writer
    /// commits to its sink on its own.
    ///
    /// # Default
    ///
    /// [`DEFAULT_COMMIT_THRESHOLD`]
    pub commit_threshold: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            validate_key_order: true,
            commit_threshold: DEFAULT_COMMIT_THRESHOLD,
        }
    }
}

impl WriterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_validate_key_order(mut self, validate_key_order: bool) -> Self {
        self.validate_key_order = validate_key_order;
        self
    }

    #[must_use]
    pub fn with_commit_threshold(mut self, commit_threshold: usize) -> Self {
        self.commit_threshold = commit_threshold;
        self
    }
}
