//! Kubernetes operator converging Redpanda `Cluster` resources into broker StatefulSets.

pub mod config;
pub mod controller;
pub mod kube_client;
pub mod resources;
