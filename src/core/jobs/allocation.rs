use log::debug;

use crate::core::jobs::{JobCommands, SubmissionRequest};
use crate::core::queues::{QueueError, QueueTable};

/// Nodes and tasks requested from the scheduler for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAllocation {
  pub nodes: u32,
  pub tasks: u32,
  pub parametric: bool,
}

impl ResolvedAllocation {
  pub fn serial() -> Self {
    ResolvedAllocation {
      nodes: 1,
      tasks: 1,
      parametric: false,
    }
  }
}

/// Turns a request into a node/task allocation.
///
/// A single command always gets one node and one task, whatever counts were
/// requested. For command lists the first rule that applies wins:
/// tasks per node, then nothing given (one task per core), then tasks only,
/// then nodes only, then both as given. The result is clamped to the queue
/// limits without error.
pub fn resolve_allocation(
  commands: &JobCommands,
  request: &SubmissionRequest,
  queues: &QueueTable,
) -> Result<ResolvedAllocation, QueueError> {
  if !commands.is_parametric() {
    return Ok(ResolvedAllocation::serial());
  }

  let count = commands.count();
  let profile = queues.resolve(&request.queue);
  let nodes_req = request.nodes.map(|n| n.get());
  let tasks_req = request.tasks.map(|n| n.get());

  let (mut nodes, mut tasks) = match (request.tasks_per_node.map(|n| n.get()), nodes_req, tasks_req) {
    (Some(tpn), _, _) => {
      let nodes = count.div_ceil(tpn);
      (nodes, nodes.saturating_mul(tpn))
    }
    (None, None, None) => {
      let cores = profile.cores_per_node()?;
      let nodes = count.div_ceil(cores);
      debug!("Estimated {} nodes at {} cores per node", nodes, cores);
      (nodes, nodes.saturating_mul(cores))
    }
    (None, None, Some(tasks)) => {
      let nodes = tasks.div_ceil(profile.cores_per_node()?);
      debug!("Number of nodes not specified; estimated as {}", nodes);
      (nodes, tasks)
    }
    (None, Some(nodes), None) => {
      let tasks = nodes.saturating_mul(profile.cores_per_node()?);
      debug!("Number of tasks not specified; estimated as {}", tasks);
      (nodes, tasks)
    }
    (None, Some(nodes), Some(tasks)) => (nodes, tasks),
  };

  // Limits of a queue outside the table are unknown; nothing to clamp to
  if let Some(max_nodes) = profile.max_nodes {
    if nodes > max_nodes {
      debug!("Clamping {} nodes to queue limit {}", nodes, max_nodes);
      nodes = max_nodes;
    }
  }
  if let Some(max_tasks) = profile.max_tasks {
    if tasks > max_tasks {
      debug!("Clamping {} tasks to queue limit {}", tasks, max_tasks);
      tasks = max_tasks;
    }
  }

  Ok(ResolvedAllocation {
    nodes,
    tasks,
    parametric: true,
  })
}
