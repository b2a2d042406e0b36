/// Tunables for [`crate::HybridEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Result size used by `recommend_default`
    pub default_top_n: usize,
    /// Collaborative candidates kept before merging
    pub collaborative_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_top_n: 10,
            collaborative_limit: 300,
        }
    }
}

impl EngineConfig {
    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    pub fn with_collaborative_limit(mut self, limit: usize) -> Self {
        self.collaborative_limit = limit;
        self
    }
}
