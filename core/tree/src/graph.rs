//! In-memory graph of group expansion rules.
//!
//! Graphs are built from a snapshot of the stored groups for the duration of one
//! operation and are never cached.
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use netauth_models::ExpansionRule;
use netauth_models::Group;
use netauth_models::RuleMode;

/// Arena of group nodes indexed by name.
#[derive(Debug, Default)]
pub struct GroupGraph {
    index: HashMap<String, usize>,
    nodes: Vec<GroupNode>,

    /// Groups including each group, by name of the included group.
    included_by: HashMap<String, Vec<usize>>,
}

#[derive(Debug)]
struct GroupNode {
    name: String,
    rules: Vec<ExpansionRule>,
}

impl GroupGraph {
    /// Build the graph of all given groups.
    pub fn from_groups<'a, I>(groups: I) -> GroupGraph
    where
        I: IntoIterator<Item = &'a Group>,
    {
        let mut graph = GroupGraph::default();
        for group in groups {
            graph.insert(group);
        }
        graph
    }

    /// Add a group to the graph, replacing any node with the same name.
    pub fn insert(&mut self, group: &Group) {
        let rules = ExpansionRule::parse_all(&group.expansions);
        if let Some(id) = self.index.get(&group.name).copied() {
            for rule in &self.nodes[id].rules {
                if let Some(parents) = self.included_by.get_mut(&rule.target) {
                    parents.retain(|parent| *parent != id);
                }
            }
            self.nodes[id].rules.clear();
        }

        let id = match self.index.get(&group.name) {
            Some(id) => *id,
            None => {
                let id = self.nodes.len();
                self.nodes.push(GroupNode {
                    name: group.name.clone(),
                    rules: Vec::new(),
                });
                self.index.insert(group.name.clone(), id);
                id
            }
        };
        for rule in &rules {
            if rule.mode == RuleMode::Include {
                self.included_by
                    .entry(rule.target.clone())
                    .or_default()
                    .push(id);
            }
        }
        self.nodes[id].rules = rules;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of the groups the rules of a group point to.
    pub fn targets(&self, name: &str) -> Option<Vec<&str>> {
        let id = self.index.get(name)?;
        let targets = self.nodes[*id]
            .rules
            .iter()
            .map(|rule| rule.target.as_str())
            .collect();
        Some(targets)
    }

    /// Effective memberships of an entity directly member of the given groups.
    ///
    /// Groups including a membership group (transitively) are added.
    /// A group with an `EXCLUDE:<x>` rule is pruned if `x` is one of the memberships
    /// found this way, along with any group reachable only through pruned groups.
    /// Pruning applies to direct memberships as well.
    pub fn memberships<S: AsRef<str>>(&self, direct: &[S]) -> BTreeSet<String> {
        let direct: Vec<&str> = direct.iter().map(|group| group.as_ref()).collect();
        let candidates = self.include_closure(&direct, &HashSet::new());

        let pruned: HashSet<String> = candidates
            .iter()
            .filter(|name| {
                let id = match self.index.get(name.as_str()) {
                    None => return false,
                    Some(id) => *id,
                };
                self.nodes[id].rules.iter().any(|rule| {
                    rule.mode == RuleMode::Exclude && candidates.contains(&rule.target)
                })
            })
            .cloned()
            .collect();

        let direct: Vec<&str> = direct
            .into_iter()
            .filter(|group| !pruned.contains(*group))
            .collect();
        self.include_closure(&direct, &pruned)
            .into_iter()
            .collect()
    }

    /// Groups reachable from `start` by following "included by" edges, avoiding `blocked`.
    fn include_closure(&self, start: &[&str], blocked: &HashSet<String>) -> HashSet<String> {
        let mut found: HashSet<String> = HashSet::new();
        let mut queue: Vec<String> = start.iter().map(|name| name.to_string()).collect();
        while let Some(name) = queue.pop() {
            if blocked.contains(&name) || !found.insert(name.clone()) {
                continue;
            }
            if let Some(parents) = self.included_by.get(&name) {
                for parent in parents {
                    let parent = &self.nodes[*parent].name;
                    if !found.contains(parent) {
                        queue.push(parent.clone());
                    }
                }
            }
        }
        found
    }
}
