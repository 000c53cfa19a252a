/*!
 * Shared term index.
 *
 * Terms are registered from full references ("John Smith") and resolved from
 * partial ones ("Smith", "Mr. Smith"). Once an alias has resolved to exactly
 * one term it stays pinned to that term, even if a later term shares it.
 * Aliases that could not be resolved are kept pending and re-attempted on
 * every later observation.
 *
 * The index is a cheap cloneable handle; clones share state, so concurrent
 * documents see each other's terms.
 */

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::terms::{
    NameCandidate, Observation, RenderingEvent, Resolution, Term, TermExtractor, TermId,
};

#[derive(Debug, Default)]
struct IndexState {
    terms: Vec<Term>,
    by_canonical: HashMap<String, TermId>,
    aliases: HashMap<String, BTreeSet<TermId>>,
    pinned: HashMap<String, TermId>,
    pending: BTreeSet<String>,
}

impl IndexState {
    fn term(&self, id: TermId) -> Option<Term> {
        self.terms.get(id.0).cloned()
    }

    fn add_alias(&mut self, id: TermId, alias: &str) {
        let key = normalize(alias);
        if key.is_empty() {
            return;
        }
        self.aliases.entry(key.clone()).or_default().insert(id);
        if let Some(term) = self.terms.get_mut(id.0) {
            term.aliases.insert(key);
        }
    }
}

/// Cloneable handle over the shared term index
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    state: Arc<RwLock<IndexState>>,
    extractor: Arc<TermExtractor>,
}

impl TermIndex {
    pub fn new(extractor: TermExtractor) -> Self {
        Self {
            state: Arc::new(RwLock::new(IndexState::default())),
            extractor: Arc::new(extractor),
        }
    }

    pub fn extractor(&self) -> &TermExtractor {
        &self.extractor
    }

    /// Candidate aliases in `text`: extracted names plus known aliases.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut found = self.extractor.extract(text);
        found.extend(self.known_aliases_in(text));
        found
    }

    /// Register a full reference and derive its atomic aliases.
    ///
    /// Registering an existing canonical name returns the same id and only
    /// adds aliases.
    pub fn register(&self, canonical: &str) -> TermId {
        self.register_with_aliases(canonical, std::iter::empty::<String>())
    }

    /// Register a term with extra aliases beyond the derived ones.
    pub fn register_with_aliases<I, S>(&self, canonical: &str, extra: I) -> TermId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (honorific, parts) = self.extractor.split_name(canonical);
        let name = if parts.is_empty() {
            normalize(canonical)
        } else {
            parts.join(" ")
        };

        let mut aliases = vec![name.clone(), normalize(canonical)];
        if parts.len() > 1 {
            aliases.extend(
                parts
                    .iter()
                    .filter(|p| p.chars().count() >= self.extractor.config().min_word_chars)
                    .filter(|p| !self.extractor.is_honorific(p))
                    .cloned(),
            );
        }
        if let (Some(honorific), Some(last)) = (&honorific, parts.last()) {
            aliases.push(format!("{}. {}", honorific, last));
            aliases.push(format!("{} {}", honorific, last));
        }
        aliases.extend(extra.into_iter().map(|a| a.as_ref().to_string()));

        let mut state = self.state.write();
        let id = match state.by_canonical.get(&name) {
            Some(id) => *id,
            None => {
                let id = TermId(state.terms.len());
                state.terms.push(Term {
                    id,
                    canonical: name.clone(),
                    aliases: BTreeSet::new(),
                    rendering: None,
                    description: None,
                });
                state.by_canonical.insert(name.clone(), id);
                debug!("Registered term {} '{}'", id, name);
                id
            }
        };
        for alias in &aliases {
            state.add_alias(id, alias);
        }
        id
    }

    /// Add one alias to an existing term. Returns false for an unknown id.
    pub fn add_alias(&self, id: TermId, alias: &str) -> bool {
        let mut state = self.state.write();
        if id.0 >= state.terms.len() {
            return false;
        }
        state.add_alias(id, alias);
        true
    }

    /// Resolve an alias to a term.
    pub fn resolve(&self, alias: &str) -> Resolution {
        let key = normalize(alias);
        let stripped = self.strip_honorific(&key);

        let unique = {
            let state = self.state.read();
            for k in std::iter::once(&key).chain(stripped.as_ref()) {
                if let Some(id) = state.pinned.get(k) {
                    if let Some(term) = state.term(*id) {
                        return Resolution::Resolved(term);
                    }
                }
            }

            let ids = state
                .aliases
                .get(&key)
                .or_else(|| stripped.as_ref().and_then(|s| state.aliases.get(s)));
            match ids {
                None => return Resolution::Unresolved,
                Some(ids) if ids.len() > 1 => {
                    return Resolution::Ambiguous(ids.iter().filter_map(|id| state.term(*id)).collect());
                }
                Some(ids) => match ids.iter().next() {
                    Some(id) => *id,
                    None => return Resolution::Unresolved,
                },
            }
        };

        let mut state = self.state.write();
        // Another resolver may have pinned the alias in between
        let id = *state.pinned.entry(key).or_insert(unique);
        match state.term(id) {
            Some(term) => Resolution::Resolved(term),
            None => Resolution::Unresolved,
        }
    }

    /// Learn from a chunk: register full references, resolve every alias
    /// present, and re-attempt aliases left pending by earlier chunks.
    pub fn observe(&self, text: &str) -> Observation {
        self.scan(text, true)
    }

    /// Like `observe`, but registers nothing and leaves the pending set alone.
    pub fn lookup(&self, text: &str) -> Observation {
        self.scan(text, false)
    }

    fn scan(&self, text: &str, learn: bool) -> Observation {
        let mut observation = Observation::default();
        let candidates: Vec<NameCandidate> = self
            .extractor
            .candidates(text)
            .into_iter()
            .map(|candidate| self.drop_sentence_opener(text, candidate))
            .collect();

        if learn {
            for candidate in candidates.iter().filter(|c| c.is_full_reference()) {
                let id = self.register(&candidate.surface);
                if !observation.registered.contains(&id) {
                    observation.registered.push(id);
                }
            }
        }

        let surfaces: Vec<String> = candidates.iter().map(|c| c.surface.clone()).collect();
        let mut aliases = surfaces.clone();
        aliases.extend(
            self.known_aliases_in(text)
                .into_iter()
                .filter(|alias| !surfaces.iter().any(|s| s != alias && s.contains(alias.as_str()))),
        );

        let mut seen = HashSet::new();
        let mut unresolved_now = HashSet::new();
        for alias in aliases.into_iter().filter(|a| seen.insert(a.clone())) {
            match self.resolve(&alias) {
                Resolution::Resolved(term) => observation.resolved.push((alias, term)),
                Resolution::Ambiguous(terms) => {
                    warn!(
                        "Ambiguous term '{}': {}",
                        alias,
                        terms.iter().map(|t| t.canonical.as_str()).collect::<Vec<_>>().join(", ")
                    );
                    observation.ambiguous.push((alias, terms));
                }
                Resolution::Unresolved => {
                    unresolved_now.insert(alias.clone());
                    observation.unresolved.push(alias);
                }
            }
        }

        if learn {
            let pending: Vec<String> = self.state.read().pending.iter().cloned().collect();
            for alias in pending.into_iter().filter(|a| !unresolved_now.contains(a)) {
                if let Resolution::Resolved(term) = self.resolve(&alias) {
                    debug!("Pending alias '{}' now resolves to '{}'", alias, term.canonical);
                    self.state.write().pending.remove(&alias);
                    observation.newly_resolved.push((alias, term));
                }
            }
            if !unresolved_now.is_empty() {
                self.state.write().pending.extend(unresolved_now);
            }
        }

        observation
    }

    /// Record the agreed rendering of a term. The first rendering wins.
    pub fn set_rendering(&self, id: TermId, rendering: &str) -> Option<RenderingEvent> {
        let rendering = rendering.trim();
        if rendering.is_empty() {
            return None;
        }
        let mut state = self.state.write();
        let term = state.terms.get_mut(id.0)?;
        let event = match &term.rendering {
            None => {
                term.rendering = Some(rendering.to_string());
                RenderingEvent::Added {
                    canonical: term.canonical.clone(),
                    rendering: rendering.to_string(),
                }
            }
            Some(existing) if existing == rendering => RenderingEvent::Unchanged,
            Some(existing) => {
                warn!(
                    "Conflicting rendering for '{}': keeping '{}', got '{}'",
                    term.canonical, existing, rendering
                );
                RenderingEvent::Conflict {
                    canonical: term.canonical.clone(),
                    existing: existing.clone(),
                    proposed: rendering.to_string(),
                }
            }
        };
        Some(event)
    }

    pub fn set_description(&self, id: TermId, description: &str) {
        if let Some(term) = self.state.write().terms.get_mut(id.0) {
            if term.description.is_none() && !description.trim().is_empty() {
                term.description = Some(description.trim().to_string());
            }
        }
    }

    pub fn get(&self, id: TermId) -> Option<Term> {
        self.state.read().term(id)
    }

    /// Snapshot of every term, in registration order.
    pub fn terms(&self) -> Vec<Term> {
        self.state.read().terms.clone()
    }

    /// Aliases seen but not yet resolved.
    pub fn pending(&self) -> Vec<String> {
        self.state.read().pending.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().terms.is_empty()
    }

    /// Known aliases occurring in `text`, in order of first occurrence.
    fn known_aliases_in(&self, text: &str) -> Vec<String> {
        let state = self.state.read();
        let mut found: Vec<(usize, String)> = state
            .aliases
            .keys()
            .filter_map(|alias| find_alias(text, alias).map(|pos| (pos, alias.clone())))
            .collect();
        found.sort();
        found.into_iter().map(|(_, alias)| alias).collect()
    }

    /// "Yesterday John Smith" at the start of a sentence is "John Smith":
    /// a capitalised opener in a run of three or more words is dropped
    /// unless it is already a known alias.
    fn drop_sentence_opener(&self, text: &str, candidate: NameCandidate) -> NameCandidate {
        if candidate.honorific.is_some()
            || candidate.parts.len() < 3
            || !starts_sentence(text, candidate.start)
        {
            return candidate;
        }
        let opener = &candidate.parts[0];
        if self.state.read().aliases.contains_key(opener) {
            return candidate;
        }
        let Some(offset) = candidate.surface[opener.len()..]
            .find(candidate.parts[1].as_str())
            .map(|i| opener.len() + i)
        else {
            return candidate;
        };
        debug!("Dropping sentence opener '{}' from '{}'", opener, candidate.surface);
        NameCandidate {
            surface: candidate.surface[offset..].to_string(),
            honorific: None,
            parts: candidate.parts[1..].to_vec(),
            start: candidate.start + offset,
        }
    }

    fn strip_honorific(&self, key: &str) -> Option<String> {
        let (first, rest) = key.split_once(' ')?;
        if self.extractor.is_honorific(first) && !rest.is_empty() {
            Some(rest.to_string())
        } else {
            None
        }
    }
}

fn normalize(alias: &str) -> String {
    alias.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether byte offset `start` opens a sentence: text start, or sentence
/// punctuation before it, skipping whitespace and quotes.
fn starts_sentence(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’' | '「' | '『' | '(')
    });
    before
        .chars()
        .next_back()
        .map_or(true, |c| matches!(c, '.' | '!' | '?' | '…' | '。' | '！' | '？'))
}

/// Position of the first standalone occurrence of `alias` in `text`.
///
/// Cased aliases must sit on word boundaries; aliases in caseless scripts
/// match anywhere.
fn find_alias(text: &str, alias: &str) -> Option<usize> {
    let cased = alias.chars().next().is_some_and(|c| c.is_uppercase());
    text.match_indices(alias).map(|(pos, _)| pos).find(|&pos| {
        if !cased {
            return true;
        }
        let before = text[..pos].chars().next_back();
        let after = text[pos + alias.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
