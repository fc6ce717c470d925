use std::collections::{HashMap, HashSet};

use crate::error::GrammarError;
use crate::token::{TokenCode, CODE_END};
use crate::value::Value;

use super::{Analysis, Grammar, RuleEntryKind};

/// FIRST/nullability of a concatenation of rule entries (or a suffix of
/// one, for FOLLOW propagation): returns the terminal codes that can start
/// the concatenation and whether the whole concatenation can derive ε.
fn concat_first(
    entries: &[RuleEntryKind],
    first: &HashMap<String, HashSet<TokenCode>>,
    nullable: &HashMap<String, bool>,
) -> (HashSet<TokenCode>, bool) {
    let mut set = HashSet::new();
    for kind in entries {
        match kind {
            RuleEntryKind::Empty => {}
            RuleEntryKind::Terminal(code) => {
                set.insert(*code);
                return (set, false);
            }
            RuleEntryKind::NonTerminalRef(name) => {
                if let Some(f) = first.get(name) {
                    set.extend(f.iter().copied());
                }
                if !*nullable.get(name).unwrap_or(&false) {
                    return (set, false);
                }
            }
        }
    }
    (set, true)
}

impl<V: Value> Grammar<V> {
    /// Run the four-phase analysis (nullability, FIRST, FOLLOW, LL(1) check
    /// and parse table) described in `SPEC_FULL.md` §D / spec §4.3. The
    /// grammar is unusable if this returns an error.
    pub fn analyze(&mut self) -> Result<(), GrammarError> {
        let nullable = self.compute_nullable();
        let first = self.compute_first(&nullable);
        let follow = self.compute_follow(&nullable, &first)?;
        self.check_ll1(&nullable, &first, &follow)?;
        let parse_table = self.build_parse_table(&nullable, &first, &follow);

        let analysis = Analysis {
            nullable,
            first,
            follow,
            parse_table,
        };
        // `analyze` is only ever called once per grammar (a fresh grammar
        // builds its `OnceCell` empty), so `set` cannot fail here.
        let _ = self.analysis.set(analysis);
        Ok(())
    }

    pub(crate) fn analysis(&self) -> &Analysis {
        self.analysis
            .get()
            .expect("Grammar::analyze must run before the grammar is used")
    }

    fn compute_nullable(&self) -> HashMap<String, bool> {
        let mut nullable: HashMap<String, bool> =
            self.nonterminal_order.iter().map(|n| (n.clone(), false)).collect();
        loop {
            let mut changed = false;
            for name in &self.nonterminal_order {
                if nullable[name] {
                    continue;
                }
                let nt = &self.nonterminals[name];
                let is_nullable = nt.rules.iter().any(|rule| {
                    rule.entries.iter().all(|e| match &e.kind {
                        RuleEntryKind::Empty => true,
                        RuleEntryKind::Terminal(_) => false,
                        RuleEntryKind::NonTerminalRef(r) => *nullable.get(r).unwrap_or(&false),
                    })
                });
                if is_nullable {
                    nullable.insert(name.clone(), true);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        nullable
    }

    fn compute_first(&self, nullable: &HashMap<String, bool>) -> HashMap<String, HashSet<TokenCode>> {
        let mut first: HashMap<String, HashSet<TokenCode>> =
            self.nonterminal_order.iter().map(|n| (n.clone(), HashSet::new())).collect();
        loop {
            let mut changed = false;
            for name in &self.nonterminal_order {
                let nt = &self.nonterminals[name];
                let mut set = first[name].clone();
                let before = set.len();
                for rule in &nt.rules {
                    let kinds: Vec<RuleEntryKind> =
                        rule.entries.iter().map(|e| e.kind.clone()).collect();
                    let (rule_first, _) = concat_first(&kinds, &first, nullable);
                    set.extend(rule_first);
                }
                if set.len() != before {
                    changed = true;
                }
                first.insert(name.clone(), set);
            }
            if !changed {
                break;
            }
        }
        first
    }

    fn compute_follow(
        &self,
        nullable: &HashMap<String, bool>,
        first: &HashMap<String, HashSet<TokenCode>>,
    ) -> Result<HashMap<String, HashSet<TokenCode>>, GrammarError> {
        let mut follow: HashMap<String, HashSet<TokenCode>> =
            self.nonterminal_order.iter().map(|n| (n.clone(), HashSet::new())).collect();
        if let Some(entrypoint) = self.entrypoint.as_ref() {
            follow.entry(entrypoint.clone()).or_default().insert(CODE_END);
        } else if !self.nonterminal_order.is_empty() {
            return Err(GrammarError::new("NoEntrypoint", "grammar has no nonterminals"));
        }

        loop {
            let mut changed = false;
            for a_name in &self.nonterminal_order {
                let nt = &self.nonterminals[a_name];
                for rule in &nt.rules {
                    for (i, entry) in rule.entries.iter().enumerate() {
                        let b_name = match &entry.kind {
                            RuleEntryKind::NonTerminalRef(n) => n.clone(),
                            _ => continue,
                        };
                        let beta: Vec<RuleEntryKind> =
                            rule.entries[i + 1..].iter().map(|e| e.kind.clone()).collect();
                        let (beta_first, beta_nullable) = concat_first(&beta, first, nullable);

                        let entry_b = follow.entry(b_name.clone()).or_default();
                        let before = entry_b.len();
                        entry_b.extend(beta_first);
                        if entry_b.len() != before {
                            changed = true;
                        }

                        if beta_nullable {
                            let a_follow = follow.get(a_name).cloned().unwrap_or_default();
                            let entry_b = follow.entry(b_name).or_default();
                            let before = entry_b.len();
                            entry_b.extend(a_follow);
                            if entry_b.len() != before {
                                changed = true;
                            }
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        Ok(follow)
    }

    fn check_ll1(
        &self,
        nullable: &HashMap<String, bool>,
        first: &HashMap<String, HashSet<TokenCode>>,
        follow: &HashMap<String, HashSet<TokenCode>>,
    ) -> Result<(), GrammarError> {
        for name in &self.nonterminal_order {
            let nt = &self.nonterminals[name];
            let mut rule_firsts = Vec::with_capacity(nt.rules.len());
            let mut rule_nullable = Vec::with_capacity(nt.rules.len());
            for rule in &nt.rules {
                let kinds: Vec<RuleEntryKind> = rule.entries.iter().map(|e| e.kind.clone()).collect();
                let (f, n) = concat_first(&kinds, first, nullable);
                rule_firsts.push(f);
                rule_nullable.push(n);
            }

            for i in 0..rule_firsts.len() {
                for j in (i + 1)..rule_firsts.len() {
                    if !rule_firsts[i].is_disjoint(&rule_firsts[j]) {
                        return Err(GrammarError::new(
                            "NotLL1",
                            format!(
                                "nonterminal '{}' has overlapping FIRST sets between rule {} and rule {}",
                                name, i, j
                            ),
                        ));
                    }
                }
            }

            if rule_nullable.iter().any(|n| *n) {
                let follow_n = follow.get(name).cloned().unwrap_or_default();
                for (i, f) in rule_firsts.iter().enumerate() {
                    if rule_nullable[i] {
                        continue;
                    }
                    if !f.is_disjoint(&follow_n) {
                        return Err(GrammarError::new(
                            "NotLL1",
                            format!(
                                "nonterminal '{}' rule {} FIRST overlaps FOLLOW due to a nullable alternative",
                                name, i
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn build_parse_table(
        &self,
        nullable: &HashMap<String, bool>,
        first: &HashMap<String, HashSet<TokenCode>>,
        follow: &HashMap<String, HashSet<TokenCode>>,
    ) -> HashMap<String, HashMap<TokenCode, usize>> {
        let mut tables = HashMap::new();
        for name in &self.nonterminal_order {
            let nt = &self.nonterminals[name];
            let mut table: HashMap<TokenCode, usize> = HashMap::new();
            for (i, rule) in nt.rules.iter().enumerate() {
                let kinds: Vec<RuleEntryKind> = rule.entries.iter().map(|e| e.kind.clone()).collect();
                let (rule_first, rule_is_nullable) = concat_first(&kinds, first, nullable);
                for t in rule_first {
                    table.entry(t).or_insert(i);
                }
                if rule_is_nullable {
                    for t in follow.get(name).cloned().unwrap_or_default() {
                        table.entry(t).or_insert(i);
                    }
                }
            }
            tables.insert(name.clone(), table);
        }
        tables
    }
}
