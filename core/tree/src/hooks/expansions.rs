//! Group hooks validating and applying expansion rule changes.
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_db::Db;
use netauth_errors::Error;
use netauth_models::ExpansionRule;
use netauth_models::Group;
use netauth_models::RuleMode;

use crate::graph::GroupGraph;
use crate::hook::GroupHook;
use crate::hook::HookRegistryBuilder;
use crate::hook::PureGroupHook;

pub fn register(builder: &mut HookRegistryBuilder) -> Result<()> {
    builder.group("check-expansion-targets", |refs| {
        Ok(Arc::new(CheckExpansionTargets {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("check-expansion-cycles", |refs| {
        Ok(Arc::new(CheckExpansionCycles {
            db: refs.db.clone(),
        }))
    })?;
    builder.group("check-immediate-expansions", |_| {
        let hook = PureGroupHook::new("check-immediate-expansions", 40, check_immediate_expansions);
        Ok(Arc::new(hook))
    })?;
    builder.group("patch-group-expansions", |_| {
        let hook = PureGroupHook::new("patch-group-expansions", 50, patch_group_expansions);
        Ok(Arc::new(hook))
    })?;
    Ok(())
}

/// Parse the rules carried by a request, rejecting malformed rules.
fn requested_rules(request: &Group) -> Result<Vec<ExpansionRule>> {
    let mut rules = Vec::with_capacity(request.expansions.len());
    for raw in &request.expansions {
        rules.push(ExpansionRule::parse(raw)?);
    }
    Ok(rules)
}

/// Require the target of every new rule to exist.
pub struct CheckExpansionTargets {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for CheckExpansionTargets {
    fn name(&self) -> &str {
        "check-expansion-targets"
    }

    fn priority(&self) -> u8 {
        40
    }

    async fn run(&self, context: &Context, _: &mut Group, request: &Group) -> Result<()> {
        for rule in requested_rules(request)? {
            if rule.mode == RuleMode::Drop {
                continue;
            }
            self.db.load_group(context, &rule.target).await?;
        }
        Ok(())
    }
}

/// Reject new rules whose target appears in any existing rule of the group.
///
/// Matching is by substring, the same way `DROP` finds the rules it removes.
fn check_immediate_expansions(working: &mut Group, request: &Group) -> Result<()> {
    for rule in requested_rules(request)? {
        if rule.mode == RuleMode::Drop {
            continue;
        }
        if working
            .expansions
            .iter()
            .any(|current| current.contains(rule.target.as_str()))
        {
            anyhow::bail!(Error::ExistingExpansion(rule.to_string()));
        }
    }
    Ok(())
}

/// Reject new rules that would make a group reachable from itself.
///
/// Missing groups along the way are treated as a cycle.
pub struct CheckExpansionCycles {
    db: Db,
}

#[async_trait::async_trait]
impl GroupHook for CheckExpansionCycles {
    fn name(&self) -> &str {
        "check-expansion-cycles"
    }

    fn priority(&self) -> u8 {
        40
    }

    async fn run(&self, context: &Context, working: &mut Group, request: &Group) -> Result<()> {
        let rules: Vec<ExpansionRule> = requested_rules(request)?
            .into_iter()
            .filter(|rule| rule.mode != RuleMode::Drop)
            .collect();
        if rules.is_empty() {
            return Ok(());
        }

        let groups = self.db.all_groups(context).await?;
        let graph = GroupGraph::from_groups(&groups);
        for rule in rules {
            if reaches(&graph, &rule.target, &working.name) {
                anyhow::bail!(Error::ExistingExpansion(rule.to_string()));
            }
        }
        Ok(())
    }
}

/// Check if `target` is `start` or is found following rules from `start`.
fn reaches(graph: &GroupGraph, start: &str, target: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(name) = stack.pop() {
        if name == target {
            return true;
        }
        if !visited.insert(name) {
            continue;
        }
        match graph.targets(name) {
            None => return true,
            Some(children) => stack.extend(children),
        }
    }
    false
}

/// Apply new rules: add INCLUDE and EXCLUDE rules, DROP rules remove matching rules.
fn patch_group_expansions(working: &mut Group, request: &Group) -> Result<()> {
    for rule in requested_rules(request)? {
        match rule.mode {
            RuleMode::Drop => working
                .expansions
                .retain(|current| !current.contains(&rule.target)),
            RuleMode::Include | RuleMode::Exclude => {
                let rule = rule.to_string();
                if !working.expansions.contains(&rule) {
                    working.expansions.push(rule);
                }
            }
        }
    }
    working.expansions.sort();
    Ok(())
}
