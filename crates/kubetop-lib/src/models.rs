//! Core data models for the report engine
//!
//! Quantities are normalized at the collection boundary: CPU in millicores,
//! memory in MiB (base 1024). Every type below uses those units.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// CPU and memory amounts in normalized units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub cpu_millis: u64,
    pub memory_mib: u64,
}

impl ResourceTotals {
    pub const fn new(cpu_millis: u64, memory_mib: u64) -> Self {
        Self {
            cpu_millis,
            memory_mib,
        }
    }
}

impl Add for ResourceTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            cpu_millis: self.cpu_millis.saturating_add(rhs.cpu_millis),
            memory_mib: self.memory_mib.saturating_add(rhs.memory_mib),
        }
    }
}

impl AddAssign for ResourceTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for ResourceTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Requests or limits as declared on a single container
///
/// `None` means the dimension was not declared at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredQuantity {
    pub cpu_millis: Option<u64>,
    pub memory_mib: Option<u64>,
}

impl DeclaredQuantity {
    /// Totals with undeclared dimensions counted as zero
    pub fn totals(&self) -> ResourceTotals {
        ResourceTotals {
            cpu_millis: self.cpu_millis.unwrap_or(0),
            memory_mib: self.memory_mib.unwrap_or(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider inputs
// ---------------------------------------------------------------------------

/// Declared resources of one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInventory {
    pub name: String,
    pub requests: DeclaredQuantity,
    pub limits: DeclaredQuantity,
}

/// A pod as returned by the inventory provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInventory {
    pub namespace: String,
    pub name: String,
    /// Node the pod is scheduled on, `None` while pending
    pub node_name: Option<String>,
    pub containers: Vec<ContainerInventory>,
    /// Kept for completeness; never counted toward totals
    pub init_containers: Vec<ContainerInventory>,
}

impl PodInventory {
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }
}

/// A node as returned by the inventory provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInventory {
    pub name: String,
    pub allocatable: ResourceTotals,
    pub capacity: ResourceTotals,
}

/// Live usage sample for one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: ResourceTotals,
}

/// Live usage sample for one pod
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsage {
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }
}

/// Live usage sample for one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    pub usage: ResourceTotals,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Identity of a pod across the inventory and metrics datasets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Requests and limits summed over a set of containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredResources {
    pub requests: ResourceTotals,
    pub limits: ResourceTotals,
}

impl AddAssign for DeclaredResources {
    fn add_assign(&mut self, rhs: Self) {
        self.requests += rhs.requests;
        self.limits += rhs.limits;
    }
}

impl Sum for DeclaredResources {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, item| {
            acc += item;
            acc
        })
    }
}

/// Declared resources of one container, kept alongside the pod total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDeclared {
    pub name: String,
    pub resources: DeclaredResources,
}

/// Declared resources of one pod after aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDeclared {
    pub key: PodKey,
    pub node_name: Option<String>,
    pub totals: DeclaredResources,
    /// Regular containers in spec order
    pub containers: Vec<ContainerDeclared>,
}

/// Observed usage of one pod after aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodObserved {
    pub key: PodKey,
    pub usage: ResourceTotals,
    pub containers: BTreeMap<String, ResourceTotals>,
}

/// Allocation accounting for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeclared {
    pub name: String,
    pub allocatable: ResourceTotals,
    pub capacity: ResourceTotals,
    /// Sum of the requests of every pod scheduled on the node
    pub allocated: ResourceTotals,
}

// ---------------------------------------------------------------------------
// Joined results
// ---------------------------------------------------------------------------

/// Usage as a percentage of requests and limits
///
/// A ratio is `None` when its denominator is zero or undeclared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilizationRatios {
    pub cpu_request: Option<f64>,
    pub memory_request: Option<f64>,
    pub cpu_limit: Option<f64>,
    pub memory_limit: Option<f64>,
}

/// Container-level slice of a pod report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerReport {
    pub name: String,
    pub resources: DeclaredResources,
    /// `None` when the metrics snapshot has no sample for this container
    pub usage: Option<ResourceTotals>,
    pub ratios: UtilizationRatios,
}

/// One pod with declared resources, usage and ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodReport {
    #[serde(flatten)]
    pub key: PodKey,
    pub node_name: Option<String>,
    pub resources: DeclaredResources,
    pub usage: ResourceTotals,
    pub ratios: UtilizationRatios,
    pub containers: Vec<ContainerReport>,
}

/// One node with remaining allocatable and live utilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub name: String,
    pub allocatable: ResourceTotals,
    pub capacity: ResourceTotals,
    pub allocated: ResourceTotals,
    pub usage: ResourceTotals,
    /// Percentage of allocatable CPU not yet requested, in `[0, 100]`
    pub cpu_remaining: Option<f64>,
    /// Percentage of allocatable memory not yet requested, in `[0, 100]`
    pub memory_remaining: Option<f64>,
    /// Live CPU usage as a percentage of capacity
    pub cpu_utilization: f64,
    /// Live memory usage as a percentage of capacity
    pub memory_utilization: f64,
}
