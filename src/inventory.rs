//! Inventory context for one collection target.
//!
//! Holds what the record builder needs to know about entities beyond their
//! samples: display names, enrichment tags (cluster, resource pool, ESX host,
//! datastore) and extra numeric facts such as the host thread count. The
//! context is assembled once per run from the inventory walk and is read-only
//! afterwards.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use crate::source::{Discovery, EntityRef};

/// Tag carrying the target's display name on every record.
pub const TAG_HOST: &str = "host";
/// Tag carrying the entity's display name.
pub const TAG_NAME: &str = "name";
pub const TAG_CLUSTER: &str = "cluster";
pub const TAG_RESPOOL: &str = "respool";
/// ESX host a VM runs on. Named `esx` so it never shadows [`TAG_HOST`].
pub const TAG_ESX: &str = "esx";
pub const TAG_DATASTORE: &str = "datastore";

/// Extra field carrying a host's hardware thread count.
pub const FIELD_CPU_CORECOUNT: &str = "cpu_corecount_total";

static DATASTORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.*?)\]").expect("datastore regex is valid"));

/// Limits of one resource pool, reported once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePoolFacts {
    pub name: String,
    pub cpu_limit: i64,
    pub memory_limit: i64,
}

/// Read-only per-target lookup tables.
#[derive(Debug, Clone, Default)]
pub struct InventoryContext {
    target_name: String,
    names: HashMap<EntityRef, String>,
    tags: HashMap<EntityRef, BTreeMap<String, String>>,
    extra_fields: HashMap<EntityRef, BTreeMap<String, i64>>,
    resource_pools: Vec<ResourcePoolFacts>,
}

/// Removes every occurrence of `domain` from `name`.
pub fn strip_domain(name: &str, domain: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        name.replace(domain, "")
    }
}

/// Extracts the datastore label from a path like `[ds01] vm/vm.vmx`.
pub fn datastore_from_path(path: &str) -> Option<String> {
    DATASTORE_RE
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

impl InventoryContext {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            ..Default::default()
        }
    }

    /// Assembles the context from an inventory walk of `hostname`.
    ///
    /// Display names are lower-cased with `domain` removed; the target name
    /// only has `domain` removed.
    pub fn from_discovery(hostname: &str, discovery: &Discovery, domain: &str) -> Self {
        let mut ctx = Self::new(strip_domain(hostname, domain));

        for entity in &discovery.entities {
            ctx.names.insert(
                entity.entity.clone(),
                strip_domain(&entity.name, domain).to_lowercase(),
            );
        }

        let mut vm_to_cluster: HashMap<&EntityRef, &str> = HashMap::new();
        for cluster in &discovery.clusters {
            debug!("Cluster {} lists {} VMs", cluster.name, cluster.vms.len());
            for vm in &cluster.vms {
                vm_to_cluster.insert(vm, &cluster.name);
            }
        }

        let mut vm_to_pool: HashMap<&EntityRef, &str> = HashMap::new();
        for pool in &discovery.resource_pools {
            debug!("Resource pool {} lists {} VMs", pool.name, pool.vms.len());
            for vm in &pool.vms {
                vm_to_pool.insert(vm, &pool.name);
            }
            ctx.resource_pools.push(ResourcePoolFacts {
                name: pool.name.clone(),
                cpu_limit: pool.cpu_limit,
                memory_limit: pool.memory_limit,
            });
        }

        let mut host_names: HashMap<&EntityRef, &str> = HashMap::new();
        for host in &discovery.hosts {
            host_names.insert(&host.entity, &host.name);
            ctx.insert_extra_field(&host.entity, FIELD_CPU_CORECOUNT, host.cpu_threads);
        }

        for vm in &discovery.virtual_machines {
            if let Some(ds) = vm.vm_path_name.as_deref().and_then(datastore_from_path) {
                ctx.insert_tag(&vm.entity, TAG_DATASTORE, ds);
            }
            if let Some(cluster) = vm_to_cluster.get(&vm.entity) {
                ctx.insert_tag(&vm.entity, TAG_CLUSTER, *cluster);
            }
            if let Some(pool) = vm_to_pool.get(&vm.entity) {
                ctx.insert_tag(&vm.entity, TAG_RESPOOL, *pool);
            }
            if let Some(esx) = vm.host.as_ref().and_then(|h| host_names.get(h)) {
                ctx.insert_tag(&vm.entity, TAG_ESX, *esx);
            }
        }

        ctx
    }

    pub fn insert_name(&mut self, entity: &EntityRef, name: impl Into<String>) {
        self.names.insert(entity.clone(), name.into());
    }

    /// Adds an enrichment tag. Empty values and the reserved `host`/`name`
    /// keys are ignored.
    pub fn insert_tag(&mut self, entity: &EntityRef, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || key == TAG_HOST || key == TAG_NAME {
            return;
        }
        self.tags
            .entry(entity.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn insert_extra_field(&mut self, entity: &EntityRef, key: &str, value: i64) {
        self.extra_fields
            .entry(entity.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn push_resource_pool(&mut self, facts: ResourcePoolFacts) {
        self.resource_pools.push(facts);
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn display_name(&self, entity: &EntityRef) -> Option<&str> {
        self.names.get(entity).map(String::as_str)
    }

    /// Full tag set of an entity's primary record: `host`, `name` and the
    /// resolved enrichment tags.
    ///
    /// Entities missing from the inventory are named by their opaque id.
    pub fn entity_tags(&self, entity: &EntityRef) -> BTreeMap<String, String> {
        let mut tags = self.tags.get(entity).cloned().unwrap_or_default();
        let name = match self.display_name(entity) {
            Some(name) => name.to_string(),
            None => {
                debug!("No display name for {}, using its id", entity);
                entity.value.clone()
            }
        };
        tags.insert(TAG_HOST.to_string(), self.target_name.clone());
        tags.insert(TAG_NAME.to_string(), name);
        tags
    }

    pub fn extra_fields(&self, entity: &EntityRef) -> Option<&BTreeMap<String, i64>> {
        self.extra_fields.get(entity)
    }

    pub fn resource_pools(&self) -> &[ResourcePoolFacts] {
        &self.resource_pools
    }

    pub fn entity_count(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ClusterInfo, HostSummary, ManagedEntity, ResourcePoolInfo, VmSummary};

    fn vm(id: &str) -> EntityRef {
        EntityRef::new("VirtualMachine", id)
    }

    fn host(id: &str) -> EntityRef {
        EntityRef::new("HostSystem", id)
    }

    fn discovery() -> Discovery {
        Discovery {
            entities: vec![
                ManagedEntity {
                    entity: vm("vm-1"),
                    name: "WEB01.corp.example.com".into(),
                },
                ManagedEntity {
                    entity: vm("vm-2"),
                    name: "db01".into(),
                },
                ManagedEntity {
                    entity: host("host-1"),
                    name: "esx01.corp.example.com".into(),
                },
            ],
            virtual_machines: vec![
                VmSummary {
                    entity: vm("vm-1"),
                    host: Some(host("host-1")),
                    vm_path_name: Some("[ssd-01] web01/web01.vmx".into()),
                },
                VmSummary {
                    entity: vm("vm-2"),
                    host: Some(host("host-9")),
                    vm_path_name: None,
                },
            ],
            hosts: vec![HostSummary {
                entity: host("host-1"),
                name: "esx01".into(),
                cpu_threads: 48,
            }],
            clusters: vec![ClusterInfo {
                entity: EntityRef::new("ClusterComputeResource", "domain-c7"),
                name: "prod".into(),
                vms: vec![vm("vm-1")],
            }],
            resource_pools: vec![ResourcePoolInfo {
                entity: EntityRef::new("ResourcePool", "resgroup-10"),
                name: "gold".into(),
                vms: vec![vm("vm-1"), vm("vm-2")],
                cpu_limit: 4000,
                memory_limit: -1,
            }],
        }
    }

    #[test]
    fn test_strip_domain() {
        assert_eq!(strip_domain("vc01.corp.example.com", ".corp.example.com"), "vc01");
        assert_eq!(strip_domain("vc01", ""), "vc01");
    }

    #[test]
    fn test_datastore_from_path() {
        assert_eq!(
            datastore_from_path("[nfs store] a/b.vmx"),
            Some("nfs store".to_string())
        );
        assert_eq!(datastore_from_path("no brackets"), None);
        assert_eq!(datastore_from_path("[] empty"), None);
    }

    #[test]
    fn test_from_discovery_resolves_vm_tags() {
        let ctx =
            InventoryContext::from_discovery("vc01.corp.example.com", &discovery(), ".corp.example.com");

        assert_eq!(ctx.target_name(), "vc01");
        assert_eq!(ctx.entity_count(), 3);
        let tags = ctx.entity_tags(&vm("vm-1"));
        assert_eq!(tags.get("host").map(String::as_str), Some("vc01"));
        assert_eq!(tags.get("name").map(String::as_str), Some("web01"));
        assert_eq!(tags.get("cluster").map(String::as_str), Some("prod"));
        assert_eq!(tags.get("respool").map(String::as_str), Some("gold"));
        assert_eq!(tags.get("esx").map(String::as_str), Some("esx01"));
        assert_eq!(tags.get("datastore").map(String::as_str), Some("ssd-01"));
    }

    #[test]
    fn test_unresolvable_tags_are_absent() {
        let ctx = InventoryContext::from_discovery("vc01", &discovery(), "");
        let tags = ctx.entity_tags(&vm("vm-2"));
        assert_eq!(tags.get("respool").map(String::as_str), Some("gold"));
        assert!(!tags.contains_key("cluster"));
        assert!(!tags.contains_key("esx"));
        assert!(!tags.contains_key("datastore"));
    }

    #[test]
    fn test_host_extra_fields() {
        let ctx = InventoryContext::from_discovery("vc01", &discovery(), "");
        let extra = ctx.extra_fields(&host("host-1")).unwrap();
        assert_eq!(extra.get(FIELD_CPU_CORECOUNT), Some(&48));
        assert!(ctx.extra_fields(&vm("vm-1")).is_none());
        assert_eq!(ctx.resource_pools().len(), 1);
        assert_eq!(ctx.resource_pools()[0].cpu_limit, 4000);
    }

    #[test]
    fn test_reserved_tags_cannot_be_overwritten() {
        let mut ctx = InventoryContext::new("vc01");
        let entity = vm("vm-1");
        ctx.insert_name(&entity, "web01");
        ctx.insert_tag(&entity, "name", "other");
        ctx.insert_tag(&entity, "host", "other");
        ctx.insert_tag(&entity, "cluster", "");

        let tags = ctx.entity_tags(&entity);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["name"], "web01");
        assert_eq!(tags["host"], "vc01");
    }

    #[test]
    fn test_unknown_entity_uses_id() {
        let ctx = InventoryContext::new("vc01");
        let tags = ctx.entity_tags(&vm("vm-404"));
        assert_eq!(tags["name"], "vm-404");
    }
}
