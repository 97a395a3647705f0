use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Memory handed to the broker when the cluster declares no memory limit.
pub const DEFAULT_MEMORY: &str = "2Gi";
/// Capacity requested by the data volume claim template.
pub const DEFAULT_STORAGE: &str = "100Gi";

/// Fixed values used while synthesizing the broker StatefulSet.
///
/// Synthesis is a pure function of a `Cluster` and this policy, so two calls with
/// equal inputs produce equal objects.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPolicy {
    /// Memory limit assumed when `resources.limits.memory` is unset
    pub default_memory: Quantity,
    /// Storage request of the `datadir` claim template
    pub default_storage: Quantity,
    /// File mode of the projected configuration map
    pub config_map_default_mode: i32,
    /// Group owning mounted volumes
    pub fs_group: i64,
    /// Mount path of the persistent data volume
    pub data_directory: String,
    /// Mount path of the rendered configuration
    pub config_dir: String,
    /// Mount path of the configuration map read by the configurator
    pub configurator_dir: String,
    /// Script run by the configurator init container, relative to `configurator_dir`
    pub configurator_script: String,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self {
            default_memory: Quantity(DEFAULT_MEMORY.to_string()),
            default_storage: Quantity(DEFAULT_STORAGE.to_string()),
            config_map_default_mode: 0o754,
            fs_group: 101,
            data_directory: "/var/lib/redpanda/data".to_string(),
            config_dir: "/etc/redpanda".to_string(),
            configurator_dir: "/mnt/operator".to_string(),
            configurator_script: "configurator.sh".to_string(),
        }
    }
}

impl SynthesisPolicy {
    /// Absolute path of the configurator script inside the init container.
    pub fn configurator_path(&self) -> String {
        format!(
            "{}/{}",
            self.configurator_dir.trim_end_matches('/'),
            self.configurator_script
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configurator_path_joins_dir_and_script() {
        let policy = SynthesisPolicy::default();
        assert_eq!(policy.configurator_path(), "/mnt/operator/configurator.sh");

        let policy = SynthesisPolicy {
            configurator_dir: "/opt/".to_string(),
            ..SynthesisPolicy::default()
        };
        assert_eq!(policy.configurator_path(), "/opt/configurator.sh");
    }
}
