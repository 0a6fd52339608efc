//! Dependency ordering over the declared resources.
//!
//! Edges come from attribute references plus explicit `depends_on`. The
//! plan is a topological order computed with Kahn's algorithm; ties break
//! by declaration order so the same declaration always yields the same
//! plan. Unresolved references and cycles are rejected before any engine
//! call is made.

use std::collections::HashMap;

use crate::domain::error::StackError;
use crate::domain::resource::Resource;

/// Compute the deterministic execution order for `resources`.
///
/// # Errors
///
/// Returns [`StackError::DuplicateResource`] for a repeated logical id,
/// [`StackError::UnknownReference`] for an edge to an undeclared resource,
/// and [`StackError::DependencyCycle`] when no topological order exists.
pub fn plan(resources: &[Resource]) -> Result<Vec<&Resource>, StackError> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(resources.len());
    for (i, resource) in resources.iter().enumerate() {
        if index_of.insert(resource.id.as_str(), i).is_some() {
            return Err(StackError::DuplicateResource(resource.id.clone()));
        }
    }

    // deps[i] holds the declaration indices resource i must wait for
    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
    for (i, resource) in resources.iter().enumerate() {
        let targets = resource
            .references()
            .into_iter()
            .map(|r| r.target.as_str())
            .chain(resource.depends_on.iter().map(String::as_str));
        for target in targets {
            let Some(&t) = index_of.get(target) else {
                return Err(StackError::UnknownReference {
                    from: resource.id.clone(),
                    to: target.to_string(),
                });
            };
            if !deps[i].contains(&t) {
                deps[i].push(t);
            }
        }
    }

    let mut indegree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
    for (i, dep_list) in deps.iter().enumerate() {
        for &t in dep_list {
            dependents[t].push(i);
        }
    }

    let mut placed = vec![false; resources.len()];
    let mut order = Vec::with_capacity(resources.len());
    while order.len() < resources.len() {
        // lowest declaration index among the ready nodes keeps the plan stable
        let Some(next) = (0..resources.len()).find(|&i| !placed[i] && indegree[i] == 0) else {
            let stuck: Vec<String> = resources
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .map(|(_, r)| r.id.clone())
                .collect();
            return Err(StackError::DependencyCycle(stuck));
        };
        placed[next] = true;
        order.push(&resources[next]);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
        }
    }

    Ok(order)
}
