use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Field manager recorded on every write to the api server.
    /// Env: OSTK_CTLPLANE_FIELD_MANAGER
    #[envconfig(
        from = "OSTK_CTLPLANE_FIELD_MANAGER",
        default = "ostk-ctlplane"
    )]
    pub field_manager: String,

    /// Deadline for a single store operation, in seconds.
    /// Env: OSTK_CTLPLANE_APPLY_TIMEOUT_SECS
    #[envconfig(from = "OSTK_CTLPLANE_APPLY_TIMEOUT_SECS", default = "30")]
    pub apply_timeout_secs: u64,

    /// Requeue delay after a failed reconcile, in seconds.
    /// Env: OSTK_CTLPLANE_ERROR_REQUEUE_SECS
    #[envconfig(from = "OSTK_CTLPLANE_ERROR_REQUEUE_SECS", default = "60")]
    pub error_requeue_secs: u64,
}

impl OperatorConfig {
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_without_env() {
        let cfg =
            OperatorConfig::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(cfg.field_manager, "ostk-ctlplane");
        assert_eq!(cfg.apply_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.error_requeue(), Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_take_effect() {
        let mut env = HashMap::new();
        env.insert(
            "OSTK_CTLPLANE_APPLY_TIMEOUT_SECS".to_string(),
            "5".to_string(),
        );
        let cfg = OperatorConfig::init_from_hashmap(&env).unwrap();
        assert_eq!(cfg.apply_timeout(), Duration::from_secs(5));
    }
}
