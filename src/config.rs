use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::optimizer::{Objective, PackOptions, PackerKind};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACK_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "PACK_IT_NOW_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Default packing options of the service.
#[derive(Clone, Debug, Default)]
pub struct OptimizerConfig {
    options: PackOptions,
}

impl OptimizerConfig {
    const CLEARANCE_VAR: &'static str = "PACK_IT_NOW_CLEARANCE";
    const KEEP_Z_BASE_VAR: &'static str = "PACK_IT_NOW_KEEP_Z_BASE";
    const LOCK_AXES_VAR: &'static str = "PACK_IT_NOW_LOCK_AXES_FULLY";
    const FORBID_Z_ROTATION_VAR: &'static str = "PACK_IT_NOW_FORBID_Z_ROTATION";
    const MAX_STACK_HEIGHT_VAR: &'static str = "PACK_IT_NOW_MAX_STACK_HEIGHT";
    const OBJECTIVE_VAR: &'static str = "PACK_IT_NOW_OBJECTIVE";
    const PACKER_VAR: &'static str = "PACK_IT_NOW_PACKER";
    const MAX_ITERATIONS_VAR: &'static str = "PACK_IT_NOW_MAX_ITERATIONS";

    fn from_env() -> Self {
        Self::from_values(env_string)
    }

    /// Builds the options from raw variable values; `lookup` returns the trimmed value of a variable.
    fn from_values(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let clearance = load_f64_with_warning(
            Self::CLEARANCE_VAR,
            lookup(Self::CLEARANCE_VAR),
            PackOptions::DEFAULT_CLEARANCE,
            |value| value >= 0.0,
            "must not be negative",
            "Clearance is applied on every side of every item",
        );

        let max_stack_height = lookup(Self::MAX_STACK_HEIGHT_VAR).and_then(|raw| {
            match raw.parse::<f64>() {
                Ok(value) if value > 0.0 && value.is_finite() => Some(value),
                Ok(_) => {
                    warn!(
                        "⚠️ {} must be greater than 0. Ignoring '{}'.",
                        Self::MAX_STACK_HEIGHT_VAR,
                        raw
                    );
                    None
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}') as number: {}. Ignoring it.",
                        Self::MAX_STACK_HEIGHT_VAR,
                        raw,
                        err
                    );
                    None
                }
            }
        });

        let objective = lookup(Self::OBJECTIVE_VAR)
            .and_then(|raw| match raw.parse::<Objective>() {
                Ok(objective) => Some(objective),
                Err(err) => {
                    warn!("⚠️ {}: {}. Using min_vans.", Self::OBJECTIVE_VAR, err);
                    None
                }
            })
            .unwrap_or_default();

        let packer = lookup(Self::PACKER_VAR)
            .and_then(|raw| match raw.parse::<PackerKind>() {
                Ok(packer) => Some(packer),
                Err(err) => {
                    warn!("⚠️ {}: {}. Using auto.", Self::PACKER_VAR, err);
                    None
                }
            })
            .unwrap_or_default();

        let max_iterations = match lookup(Self::MAX_ITERATIONS_VAR) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    warn!(
                        "⚠️ {} contains invalid value '{}': must be a positive integer. Using {}.",
                        Self::MAX_ITERATIONS_VAR,
                        raw,
                        PackOptions::DEFAULT_MAX_ITERATIONS
                    );
                    PackOptions::DEFAULT_MAX_ITERATIONS
                }
            },
            None => PackOptions::DEFAULT_MAX_ITERATIONS,
        };

        let options = PackOptions::builder()
            .clearance(clearance)
            .keep_z_base(load_bool(
                Self::KEEP_Z_BASE_VAR,
                lookup(Self::KEEP_Z_BASE_VAR),
                PackOptions::DEFAULT_KEEP_Z_BASE,
            ))
            .lock_axes_fully(load_bool(
                Self::LOCK_AXES_VAR,
                lookup(Self::LOCK_AXES_VAR),
                PackOptions::DEFAULT_LOCK_AXES_FULLY,
            ))
            .forbid_z_rotation(load_bool(
                Self::FORBID_Z_ROTATION_VAR,
                lookup(Self::FORBID_Z_ROTATION_VAR),
                PackOptions::DEFAULT_FORBID_Z_ROTATION,
            ))
            .max_stack_height(max_stack_height)
            .objective(objective)
            .packer(packer)
            .max_iterations(max_iterations)
            .build();

        Self { options }
    }

    /// Returns the configured default options.
    pub fn pack_options(&self) -> PackOptions {
        self.options
    }
}

impl From<PackOptions> for OptimizerConfig {
    fn from(options: PackOptions) -> Self {
        Self { options }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_bool(var_name: &str, raw: Option<String>, default: bool) -> bool {
    raw.and_then(|raw| parse_bool(&raw, var_name))
        .unwrap_or(default)
}

fn load_f64_with_warning(
    var_name: &str,
    raw: Option<String>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    match raw {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && validator(value) => {
                let tolerance = (default.abs().max(1.0)) * 1e-9;
                if (value - default).abs() > tolerance {
                    info!("⚙️ {} ({} = {}).", notice, var_name, value);
                }
                value
            }
            Ok(_) => {
                warn!(
                    "⚠️ {} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        for raw in ["1", "true", "yes", "y", "on", "TRUE", "Yes", " on ", "  1  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(true), "value {raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_false_values() {
        for raw in ["0", "false", "no", "n", "off", "FALSE", "No", " off ", "  0  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(false), "value {raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn api_config_falls_back_on_bad_values() {
        let config = ApiConfig::from_values(Some("not-an-ip".into()), Some("0".into()));
        assert_eq!(config.display_host(), "0.0.0.0");
        assert_eq!(config.port(), 8080);
        assert!(config.binds_to_all_interfaces());
        assert!(config.uses_default_host());
    }

    #[test]
    fn api_config_accepts_explicit_address() {
        let config = ApiConfig::from_values(Some("127.0.0.1".into()), Some("9090".into()));
        assert_eq!(config.socket_addr(), "127.0.0.1:9090".parse().unwrap());
        assert!(!config.binds_to_all_interfaces());
        assert!(!config.uses_default_host());
    }

    fn optimizer_config(vars: &[(&str, &str)]) -> PackOptions {
        OptimizerConfig::from_values(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
        .pack_options()
    }

    #[test]
    fn optimizer_config_defaults_match_pack_options() {
        assert_eq!(OptimizerConfig::default().pack_options(), PackOptions::default());
        assert_eq!(optimizer_config(&[]), PackOptions::default());
    }

    #[test]
    fn optimizer_config_reads_every_variable() {
        let options = optimizer_config(&[
            ("PACK_IT_NOW_CLEARANCE", "0.5"),
            ("PACK_IT_NOW_KEEP_Z_BASE", "yes"),
            ("PACK_IT_NOW_LOCK_AXES_FULLY", "off"),
            ("PACK_IT_NOW_FORBID_Z_ROTATION", "1"),
            ("PACK_IT_NOW_MAX_STACK_HEIGHT", "80"),
            ("PACK_IT_NOW_OBJECTIVE", "min_cost"),
            ("PACK_IT_NOW_PACKER", "columns"),
            ("PACK_IT_NOW_MAX_ITERATIONS", "250"),
        ]);

        assert_eq!(options.clearance, 0.5);
        assert!(options.keep_z_base);
        assert!(!options.lock_axes_fully);
        assert!(options.forbid_z_rotation);
        assert_eq!(options.max_stack_height, Some(80.0));
        assert_eq!(options.objective, Objective::MinCost);
        assert_eq!(options.packer, PackerKind::Columns);
        assert_eq!(options.max_iterations, 250);
    }

    #[test]
    fn optimizer_config_falls_back_on_bad_values() {
        let options = optimizer_config(&[
            ("PACK_IT_NOW_CLEARANCE", "-1"),
            ("PACK_IT_NOW_KEEP_Z_BASE", "maybe"),
            ("PACK_IT_NOW_MAX_STACK_HEIGHT", "-5"),
            ("PACK_IT_NOW_OBJECTIVE", "cheapest"),
            ("PACK_IT_NOW_PACKER", "shelves"),
            ("PACK_IT_NOW_MAX_ITERATIONS", "0"),
        ]);
        assert_eq!(options, PackOptions::default());

        let options = optimizer_config(&[
            ("PACK_IT_NOW_CLEARANCE", "abc"),
            ("PACK_IT_NOW_MAX_STACK_HEIGHT", "tall"),
            ("PACK_IT_NOW_MAX_ITERATIONS", "abc"),
        ]);
        assert_eq!(options.clearance, PackOptions::DEFAULT_CLEARANCE);
        assert_eq!(options.max_stack_height, None);
        assert_eq!(options.max_iterations, PackOptions::DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn optimizer_config_wraps_explicit_options() {
        let options = PackOptions::builder().clearance(2.0).build();
        assert_eq!(OptimizerConfig::from(options).pack_options(), options);
    }
}
