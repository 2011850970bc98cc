//! Tolerances and thresholds used while reducing an action log.

use serde::{Deserialize, Serialize};

/// Tuning values for [`reduce_history_with`](crate::reduce_history_with) and the
/// side-mounted helpers. Lengths are in metres.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use framex::ReduceConfig;
///
/// let config: ReduceConfig = serde_json::from_str(r#"{"sideMountOffset": 0.25}"#).unwrap();
/// assert_eq!(config.side_mount_offset, 0.25);
/// assert_eq!(config.pinned_endpoint_tolerance, 0.001);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReduceConfig {
    /// Largest gap between a distributed-load constraint value and a moved
    /// node's previous coordinate for which the load end follows the node.
    pub pinned_endpoint_tolerance: f64,
    /// A member with `|slope|` below this counts as horizontal.
    pub horizontal_slope_threshold: f64,
    /// A member with `|slope|` above this counts as vertical.
    pub vertical_slope_threshold: f64,
    /// Distance side-mounted nodes are drawn away from their host member.
    pub side_mount_offset: f64,
    /// Slack allowed when testing whether a coordinate lies within a member.
    pub bounds_epsilon: f64,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            pinned_endpoint_tolerance: 0.001,
            horizontal_slope_threshold: 0.01,
            vertical_slope_threshold: 100.0,
            side_mount_offset: 0.1,
            bounds_epsilon: 1.0e-9,
        }
    }
}
