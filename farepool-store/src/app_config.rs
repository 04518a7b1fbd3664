use farepool_core::payment::GatewayConfig;
use farepool_domain::PenaltyPolicy;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub free_cancellation_hours: i64,
    pub late_penalty_percent: u32,
    pub gateway_fee_bps: i64,
    pub gateway_fee_fixed_cents: i64,
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: u32,
}

fn default_platform_fee_percent() -> u32 {
    10
}

impl BusinessRules {
    pub fn penalty_policy(&self) -> PenaltyPolicy {
        PenaltyPolicy {
            free_cancellation_hours: self.free_cancellation_hours,
            late_penalty_percent: self.late_penalty_percent,
            gateway_fee_bps: self.gateway_fee_bps,
            gateway_fee_fixed_cents: self.gateway_fee_fixed_cents,
        }
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            free_cancellation_hours: 24,
            late_penalty_percent: 30,
            gateway_fee_bps: 290,
            gateway_fee_fixed_cents: 30,
            platform_fee_percent: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file is optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. FAREPOOL__GATEWAY__API_KEY=sk_test_123
            .add_source(config::Environment::with_prefix("FAREPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_business_rules_match_policy() {
        let rules = BusinessRules::default();
        let policy = rules.penalty_policy();
        assert_eq!(policy.free_cancellation_hours, 24);
        assert_eq!(policy.late_penalty_percent, 30);
        assert_eq!(policy.gateway_fee_bps, 290);
        assert_eq!(policy.gateway_fee_fixed_cents, 30);
    }
}
