use std::collections::HashMap;
use std::num::NonZeroU32;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;


#[derive(Error, Debug, PartialEq)]
pub enum QueueError {
  #[error("Unknown queue '{queue}': no '{field}' value configured and no built-in default")]
  UnknownQueue { queue: String, field: &'static str },
}

/// Built-in capacities: (queue, cores per node, max nodes, max tasks).
const DEFAULT_QUEUES: &[(&str, u32, u32, u32)] = &[
  ("normal", 48, 171, 4104),
  ("largemem", 32, 342, 8208),
  ("hugemem", 20, 2, 40),
  ("development", 48, 11, 264),
  ("gpu", 10, 4, 40),
  ("largemem512GB", 64, 4, 256),
];

/// One queue entry as it appears in the config file. Every field is optional,
/// a missing field means "use the built-in default".
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct QueueOverride {
  pub cores: Option<NonZeroU32>,
  pub max_nodes: Option<NonZeroU32>,
  pub max_cores: Option<NonZeroU32>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct QueueOverrides(pub HashMap<String, QueueOverride>);

/// Capacities of a single queue after merging config over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueProfile {
  pub name: String,
  pub cores_per_node: Option<u32>,
  pub max_nodes: Option<u32>,
  pub max_tasks: Option<u32>,
}

impl QueueProfile {
  pub fn cores_per_node(&self) -> Result<u32, QueueError> {
    self.cores_per_node.ok_or_else(|| QueueError::UnknownQueue {
      queue: self.name.clone(),
      field: "cores",
    })
  }

  pub fn is_known(&self) -> bool {
    self.cores_per_node.is_some() || self.max_nodes.is_some() || self.max_tasks.is_some()
  }
}

/// Queue name -> capacities. Built once at startup and never mutated.
#[derive(Debug, Default, Clone)]
pub struct QueueTable {
  overrides: QueueOverrides,
}

impl QueueTable {
  /// A table holding only the compiled-in defaults.
  pub fn builtin() -> Self {
    Self::default()
  }

  pub fn with_overrides(overrides: QueueOverrides) -> Self {
    QueueTable { overrides }
  }

  fn default_profile(name: &str) -> Option<QueueProfile> {
    DEFAULT_QUEUES
      .iter()
      .find(|(queue, ..)| *queue == name)
      .map(|&(queue, cores, max_nodes, max_tasks)| QueueProfile {
        name: queue.to_string(),
        cores_per_node: Some(cores),
        max_nodes: Some(max_nodes),
        max_tasks: Some(max_tasks),
      })
  }

  /// Merges the configured entry for `name` over its built-in default.
  /// Never fails: missing values only become an error when they are asked for.
  pub fn resolve(&self, name: &str) -> QueueProfile {
    let mut profile = Self::default_profile(name).unwrap_or(QueueProfile {
      name: name.to_string(),
      cores_per_node: None,
      max_nodes: None,
      max_tasks: None,
    });

    if let Some(entry) = self.overrides.0.get(name) {
      debug!("Applying configured overrides for queue '{}': {:?}", name, entry);
      if let Some(cores) = entry.cores {
        profile.cores_per_node = Some(cores.get());
      }
      if let Some(max_nodes) = entry.max_nodes {
        profile.max_nodes = Some(max_nodes.get());
      }
      if let Some(max_cores) = entry.max_cores {
        profile.max_tasks = Some(max_cores.get());
      }
    }

    profile
  }
}
