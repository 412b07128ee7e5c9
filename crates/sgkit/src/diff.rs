//! Diff between desired and live rules.

use crate::rule::Rule;
use crate::types::Direction;

/// Changes needed for one direction.
#[derive(Debug, Clone, Default)]
pub struct DirectionDiff {
    /// Desired rules with no live equivalent
    pub additions: Vec<Rule>,
    /// Live rules with no desired equivalent
    pub deletions: Vec<Rule>,
}

impl DirectionDiff {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Changes needed for a whole group, per direction.
#[derive(Debug, Clone, Default)]
pub struct RulesDiff {
    pub outbound: DirectionDiff,
    pub inbound: DirectionDiff,
}

impl RulesDiff {
    pub fn get(&self, direction: Direction) -> &DirectionDiff {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut DirectionDiff {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.inbound.is_empty()
    }

    /// All additions, outbound first.
    pub fn additions(&self) -> impl Iterator<Item = &Rule> {
        Direction::ALL
            .into_iter()
            .flat_map(move |d| self.get(d).additions.iter())
    }

    /// All deletions, outbound first.
    pub fn deletions(&self) -> impl Iterator<Item = &Rule> {
        Direction::ALL
            .into_iter()
            .flat_map(move |d| self.get(d).deletions.iter())
    }
}

/// Diff one direction.
///
/// Desired rules are a set: equivalent desired rules yield one addition.
/// Every live rule removes all equivalent desired rules from the additions.
/// A live rule with no equivalent among the desired rules is a deletion, so
/// duplicated live rules are both kept when one of them is wanted.
pub fn diff_rules(desired: &[Rule], live: &[Rule]) -> DirectionDiff {
    let mut additions: Vec<Rule> = Vec::with_capacity(desired.len());
    for rule in desired {
        if !additions.iter().any(|seen| seen.equivalent_to(rule)) {
            additions.push(rule.clone());
        }
    }
    let mut deletions = Vec::new();

    for current in live {
        additions.retain(|rule| !rule.equivalent_to(current));
        if !desired.iter().any(|rule| rule.equivalent_to(current)) {
            deletions.push(current.clone());
        }
    }

    DirectionDiff {
        additions,
        deletions,
    }
}
