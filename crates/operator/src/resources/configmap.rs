use api_types::Cluster;

use super::ObjectKey;

/// Key of the base configuration map rendered for `cluster`.
///
/// The map itself is produced by the configuration generator; the StatefulSet only
/// mounts it for the configurator init container.
pub fn config_map_key(cluster: &Cluster) -> ObjectKey {
    let key = ObjectKey::for_cluster(cluster);
    ObjectKey::new(key.namespace, format!("{}-base", key.name))
}

#[cfg(test)]
mod tests {
    use api_types::ClusterSpec;

    use super::*;

    #[test]
    fn base_suffix_in_cluster_namespace() {
        let mut cluster = Cluster::new("c1", ClusterSpec::default());
        cluster.metadata.namespace = Some("ns1".to_string());

        assert_eq!(config_map_key(&cluster), ObjectKey::new("ns1", "c1-base"));
    }
}
