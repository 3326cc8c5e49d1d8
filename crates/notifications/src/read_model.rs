/// Query access to a view maintained by a projection.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently held; 0 while the view is being written.
    fn count(&self) -> usize;
}
