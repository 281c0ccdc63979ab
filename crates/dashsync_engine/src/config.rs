//! Configuration for the sync engine.

/// Reconciliation choices.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delete the extra visualizations the remote auto-creates next to the
    /// default one when a query is created.
    pub delete_superseded_visualizations: bool,
    /// On query update, delete remote visualizations beyond the local
    /// count. The default visualization is never pruned.
    pub prune_stale_visualizations: bool,
    /// Send dashboard tags when naming or updating a dashboard.
    pub carry_dashboard_tags: bool,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            delete_superseded_visualizations: true,
            prune_stale_visualizations: false,
            carry_dashboard_tags: true,
        }
    }

    /// Sets whether auto-created extra visualizations are deleted.
    pub fn with_delete_superseded_visualizations(mut self, enabled: bool) -> Self {
        self.delete_superseded_visualizations = enabled;
        self
    }

    /// Sets whether stale remote visualizations are pruned on update.
    pub fn with_prune_stale_visualizations(mut self, enabled: bool) -> Self {
        self.prune_stale_visualizations = enabled;
        self
    }

    /// Sets whether dashboard tags are sent.
    pub fn with_carry_dashboard_tags(mut self, enabled: bool) -> Self {
        self.carry_dashboard_tags = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_prune_stale_visualizations(true)
            .with_carry_dashboard_tags(false);

        assert!(config.delete_superseded_visualizations);
        assert!(config.prune_stale_visualizations);
        assert!(!config.carry_dashboard_tags);
    }

    #[test]
    fn defaults_preserve_remote_visualizations() {
        let config = SyncConfig::default();
        assert!(!config.prune_stale_visualizations);
        assert!(config.carry_dashboard_tags);
    }
}
