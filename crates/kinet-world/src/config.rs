use std::path::Path;

use kinet_core::{PhysicsError, Result, Vec3};
use serde::{Deserialize, Serialize};

/// Per-world engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: [f32; 3],
    pub fixed_dt: f32,
    pub max_substeps: u32,
    pub solver_iterations: u32,
    pub erp: f32,
    pub contact_slop: f32,
    pub contact_beta: f32,
    pub linear_sleep_threshold: f32,
    pub angular_sleep_threshold: f32,
    pub deactivation_time: f32,
    pub sleeping_enabled: bool,
    /// Upper bound on the speed-based broadphase expansion.
    pub speculative_margin: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.8, 0.0],
            fixed_dt: 1.0 / 60.0,
            max_substeps: 1,
            solver_iterations: 10,
            erp: 0.2,
            contact_slop: 0.01,
            contact_beta: 0.2,
            linear_sleep_threshold: 0.8,
            angular_sleep_threshold: 1.0,
            deactivation_time: 2.0,
            sleeping_enabled: true,
            speculative_margin: 1.0,
        }
    }
}

// ---------- tiny env helpers ----------
fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<u32>().ok())
}
fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<f32>().ok())
}
fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|s| match s.trim() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    })
}

impl WorldConfig {
    pub fn with_gravity(mut self, g: Vec3) -> Self { self.gravity = g.to_array(); self }
    #[inline] pub fn gravity_vec(&self) -> Vec3 { Vec3::from_array(self.gravity) }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| PhysicsError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PhysicsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Pretty JSON that `from_json_str` reads back. Invalid configs are refused.
    pub fn to_json_string(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string_pretty(self).map_err(|e| PhysicsError::InvalidConfig(e.to_string()))
    }

    /// KINET_FIXED_DT, KINET_MAX_SUBSTEPS, KINET_SOLVER_ITERATIONS, KINET_SLEEPING.
    /// Unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_f32("KINET_FIXED_DT") { self.fixed_dt = v; }
        if let Some(v) = env_u32("KINET_MAX_SUBSTEPS") { self.max_substeps = v; }
        if let Some(v) = env_u32("KINET_SOLVER_ITERATIONS") { self.solver_iterations = v; }
        if let Some(v) = env_bool("KINET_SLEEPING") { self.sleeping_enabled = v; }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |what: &str| Err(PhysicsError::InvalidConfig(what.to_string()));
        if !self.gravity.iter().all(|g| g.is_finite()) { return bad("gravity must be finite"); }
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) { return bad("fixed_dt must be positive"); }
        if self.solver_iterations == 0 { return bad("solver_iterations must be at least 1"); }
        if !(0.0..=1.0).contains(&self.erp) { return bad("erp must be in [0, 1]"); }
        if !(0.0..=1.0).contains(&self.contact_beta) { return bad("contact_beta must be in [0, 1]"); }
        for (name, v) in [
            ("contact_slop", self.contact_slop),
            ("linear_sleep_threshold", self.linear_sleep_threshold),
            ("angular_sleep_threshold", self.angular_sleep_threshold),
            ("deactivation_time", self.deactivation_time),
            ("speculative_margin", self.speculative_margin),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(PhysicsError::InvalidConfig(format!("{name} must be finite and non-negative")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = WorldConfig::default();
        c.validate().unwrap();
        assert_eq!(c.gravity, [0.0, -9.8, 0.0]);
        assert_eq!(c.max_substeps, 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c = WorldConfig::from_json_str(r#"{ "solver_iterations": 20, "sleeping_enabled": false }"#).unwrap();
        assert_eq!(c.solver_iterations, 20);
        assert!(!c.sleeping_enabled);
        assert_eq!(c.fixed_dt, 1.0 / 60.0);
    }

    #[test]
    fn invalid_json_and_values_are_reported() {
        assert!(matches!(WorldConfig::from_json_str("{ nope"), Err(PhysicsError::InvalidConfig(_))));
        assert!(matches!(WorldConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#), Err(PhysicsError::InvalidConfig(_))));
        assert!(matches!(WorldConfig::from_json_str(r#"{ "erp": 2.0 }"#), Err(PhysicsError::InvalidConfig(_))));
    }

    #[test]
    fn json_round_trip() {
        let c = WorldConfig { max_substeps: 4, ..WorldConfig::default() };
        assert_eq!(WorldConfig::from_json_str(&c.to_json_string().unwrap()).unwrap(), c);
    }

    #[test]
    fn unreadable_config_is_not_written() {
        // NaN would serialize as null and never load again
        let c = WorldConfig { fixed_dt: f32::NAN, ..WorldConfig::default() };
        assert!(matches!(c.to_json_string(), Err(PhysicsError::InvalidConfig(_))));
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("KINET_SOLVER_ITERATIONS", "17");
        std::env::set_var("KINET_SLEEPING", "off");
        let c = WorldConfig::default().with_env_overrides();
        std::env::remove_var("KINET_SOLVER_ITERATIONS");
        std::env::remove_var("KINET_SLEEPING");
        assert_eq!(c.solver_iterations, 17);
        assert!(!c.sleeping_enabled);
    }
}
