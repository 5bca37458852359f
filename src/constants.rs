// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the capdo provider.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the infrastructure CRDs
pub const API_GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// Storage (hub) version for the infrastructure CRDs
pub const API_VERSION: &str = "v1beta1";

/// Fully qualified hub API version (group/version)
pub const API_GROUP_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";

/// Oldest served API version
pub const API_VERSION_V1ALPHA3: &str = "infrastructure.cluster.x-k8s.io/v1alpha3";

/// Intermediate served API version
pub const API_VERSION_V1ALPHA4: &str = "infrastructure.cluster.x-k8s.io/v1alpha4";

/// API group for the managed control plane CRD
pub const CONTROLPLANE_API_GROUP: &str = "controlplane.cluster.x-k8s.io";

/// API group of the core Cluster API types
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";

/// Kind name for `DOCluster` resource
pub const KIND_DO_CLUSTER: &str = "DOCluster";

/// Kind name for `DOMachine` resource
pub const KIND_DO_MACHINE: &str = "DOMachine";

/// Kind name for `DOMachineTemplate` resource
pub const KIND_DO_MACHINE_TEMPLATE: &str = "DOMachineTemplate";

/// Kind name for `DOClusterTemplate` resource
pub const KIND_DO_CLUSTER_TEMPLATE: &str = "DOClusterTemplate";

/// Kind name for `DOKSCluster` resource
pub const KIND_DOKS_CLUSTER: &str = "DOKSCluster";

/// Kind name for `DOKSControlPlane` resource
pub const KIND_DOKS_CONTROL_PLANE: &str = "DOKSControlPlane";

/// Kind name for `DOKSNodePool` resource
pub const KIND_DOKS_NODE_POOL: &str = "DOKSNodePool";

/// Kind name of the owning Cluster API `Cluster`
pub const KIND_CLUSTER: &str = "Cluster";

/// Kind name of the owning Cluster API `Machine`
pub const KIND_MACHINE: &str = "Machine";

/// Kind name of the owning Cluster API `MachinePool`
pub const KIND_MACHINE_POOL: &str = "MachinePool";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer guarding the API server load balancer of a `DOCluster`
pub const FINALIZER_DO_CLUSTER: &str = "docluster.infrastructure.cluster.x-k8s.io";

/// Finalizer guarding the droplet and volumes of a `DOMachine`
pub const FINALIZER_DO_MACHINE: &str = "domachine.infrastructure.cluster.x-k8s.io";

/// Finalizer guarding the managed cluster of a `DOKSCluster`
pub const FINALIZER_DOKS_CLUSTER: &str = "dokscluster.infrastructure.cluster.x-k8s.io";

/// Finalizer guarding the node pool of a `DOKSNodePool`
pub const FINALIZER_DOKS_NODE_POOL: &str = "doksnodepool.infrastructure.cluster.x-k8s.io";

// ============================================================================
// DigitalOcean API Constants
// ============================================================================

/// Base URL of the public DigitalOcean API
pub const DO_API_URL: &str = "https://api.digitalocean.com/";

/// Environment variable holding the DigitalOcean access token
pub const DO_ACCESS_TOKEN_ENV: &str = "DIGITALOCEAN_ACCESS_TOKEN";

/// Page size used when listing DigitalOcean collections
pub const DO_LIST_PAGE_SIZE: u32 = 200;

/// Per-request timeout for DigitalOcean API calls
pub const DO_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every DigitalOcean API request
pub const DO_USER_AGENT: &str = concat!("capdo/", env!("CARGO_PKG_VERSION"));

/// Attempts per API call before a retryable failure is returned
pub const DO_MAX_REQUEST_ATTEMPTS: u32 = 5;

/// Droplet status reported while provisioning
pub const DROPLET_STATUS_NEW: &str = "new";

/// Droplet status reported once running
pub const DROPLET_STATUS_ACTIVE: &str = "active";

/// Load balancer status reported once provisioned
pub const LOAD_BALANCER_STATUS_ACTIVE: &str = "active";

/// Managed cluster state reported once provisioned
pub const DOKS_STATE_RUNNING: &str = "running";

/// Resource type used when attaching tags to droplets
pub const TAG_RESOURCE_TYPE_DROPLET: &str = "droplet";

// ============================================================================
// Load Balancer Defaults
// ============================================================================

/// Default API server port fronted by the load balancer
pub const DEFAULT_LB_PORT: i32 = 6443;

/// Default load balancer algorithm
pub const DEFAULT_LB_ALGORITHM: &str = "round_robin";

/// Default health check interval in seconds
pub const DEFAULT_LB_HEALTH_CHECK_INTERVAL_SECS: i32 = 10;

/// Default health check timeout in seconds
pub const DEFAULT_LB_HEALTH_CHECK_TIMEOUT_SECS: i32 = 5;

/// Default number of failed checks before a target is marked unhealthy
pub const DEFAULT_LB_UNHEALTHY_THRESHOLD: i32 = 3;

/// Default number of passed checks before a target is marked healthy
pub const DEFAULT_LB_HEALTHY_THRESHOLD: i32 = 5;

/// Lower bound of the load balancer port
pub const LB_PORT_MIN: i32 = 1;

/// Upper bound of the load balancer port
pub const LB_PORT_MAX: i32 = 65535;

/// Lower bound of the health check interval and timeout
pub const LB_HEALTH_CHECK_SECS_MIN: i32 = 3;

/// Upper bound of the health check interval and timeout
pub const LB_HEALTH_CHECK_SECS_MAX: i32 = 300;

/// Lower bound of the health check thresholds
pub const LB_HEALTH_CHECK_THRESHOLD_MIN: i32 = 2;

/// Upper bound of the health check thresholds
pub const LB_HEALTH_CHECK_THRESHOLD_MAX: i32 = 10;

// ============================================================================
// DNS Constants
// ============================================================================

/// Standard DNS port for queries
pub const DNS_PORT: u16 = 53;

/// TTL of the control plane A record
pub const CONTROL_PLANE_DNS_TTL_SECS: u32 = 30;

/// Timeout for a single DNS exchange
pub const DNS_QUERY_TIMEOUT_SECS: u64 = 5;

/// Default location of the local resolver configuration
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

// ============================================================================
// Managed Cluster Constants
// ============================================================================

/// Port of the managed cluster API endpoint
pub const DOKS_API_SERVER_PORT: i32 = 443;

/// Secret type used by Cluster API for kubeconfig secrets
pub const KUBECONFIG_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";

/// Data key of the kubeconfig inside its secret
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Data key of the bootstrap data inside the bootstrap secret
pub const BOOTSTRAP_DATA_SECRET_KEY: &str = "value";

/// Field manager for server-side applied objects
pub const FIELD_MANAGER: &str = "capdo-controller";

// ============================================================================
// Reconciliation Intervals
// ============================================================================

/// Requeue while the load balancer is still provisioning
pub const LOAD_BALANCER_PENDING_REQUEUE_SECS: u64 = 15;

/// Requeue while the control plane DNS record propagates
pub const DNS_PENDING_REQUEUE_SECS: u64 = 15;

/// Requeue while a droplet is still in `new` state
pub const DROPLET_PENDING_REQUEUE_SECS: u64 = 10;

/// Requeue while droplet deletion completes before volumes are removed
pub const DROPLET_DELETE_REQUEUE_SECS: u64 = 10;

/// Requeue while a managed cluster or node pool is provisioning
pub const DOKS_PENDING_REQUEUE_SECS: u64 = 30;

/// Default resync period for successfully reconciled objects (10 minutes)
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 600;

/// Default upper bound of a single reconcile (5 minutes)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;

/// Base delay of the per-object error backoff
pub const ERROR_BACKOFF_BASE_SECS: u64 = 5;

/// Maximum delay of the per-object error backoff
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Idle time after which a key's failure history is dropped
pub const ERROR_BACKOFF_EXPIRY_SECS: u64 = 4 * ERROR_BACKOFF_MAX_SECS;

/// Lower bound of the jittered requeue after a throttled cloud call
pub const THROTTLED_REQUEUE_MIN_SECS: u64 = 5;

/// Upper bound of the jittered requeue after a throttled cloud call
pub const THROTTLED_REQUEUE_MAX_SECS: u64 = 20;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default lease name for leader election
pub const DEFAULT_LEASE_NAME: &str = "capdo-leader-election";

/// Default leader election lease duration in seconds
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default deadline for renewing the lease in seconds
pub const DEFAULT_LEASE_RENEW_DEADLINE_SECS: u64 = 10;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Reporting component of Kubernetes Events
pub const CONTROLLER_NAME: &str = "capdo-controller-manager";

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of concurrent reconciles per controller
pub const DEFAULT_CONTROLLER_CONCURRENCY: u16 = 10;

/// Default webhook listener port
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Default directory holding the webhook serving certificate
pub const DEFAULT_WEBHOOK_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";

/// Interval between webhook certificate change checks
pub const CERT_WATCH_INTERVAL_SECS: u64 = 10;

/// Default metrics listener address
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Default health probe listener address
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:9440";
