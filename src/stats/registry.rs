//! Provider registry.
//!
//! The registry is built once, before any scanning, and never mutated
//! afterwards. Construction fails if two stats (across all providers) share an
//! identifier or label, compared case-insensitively, or if a stat would shadow
//! one of the fixed table columns.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{HashKey, Matcher, ProviderError, Stat, StatProvider, StatValue};

/// Identifiers reserved by the fixed snapshot/log columns.
const RESERVED: &[&str] = &["GROUP", "TYPE", "BY", "KEEP", "PATH"];

/// Errors raised while building or querying the registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    /// Two stats share an identifier or label.
    #[error("Stat identifier '{ident}' is defined by both the {first} and {second} providers")]
    Collision {
        /// Colliding identifier (uppercased)
        ident: String,
        /// Provider that registered it first
        first: &'static str,
        /// Provider that tried to register it again
        second: &'static str,
    },

    /// A stat identifier shadows a fixed table column.
    #[error("Stat identifier '{ident}' of the {provider} provider is reserved for a table column")]
    Reserved {
        /// Offending identifier
        ident: String,
        /// Provider defining it
        provider: &'static str,
    },

    /// Two providers share a name.
    #[error("Provider '{0}' is registered twice")]
    DuplicateProvider(&'static str),

    /// A provider defines no stats.
    #[error("Provider '{0}' defines no stats")]
    EmptyProvider(&'static str),

    /// A stat name could not be resolved.
    #[error("Unknown stat '{name}'{}", suggestion.map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
    UnknownStat {
        /// Name as given
        name: String,
        /// Closest registered stat name
        suggestion: Option<&'static str>,
    },
}

/// The set of registered providers plus the derived matcher map.
pub struct Registry {
    providers: Vec<Box<dyn StatProvider>>,
    owners: HashMap<Stat, usize>,
    matchers: HashMap<Stat, Matcher>,
}

impl Registry {
    /// Register `providers` in order, checking for identifier collisions.
    ///
    /// Later providers take precedence when several default keep pipelines
    /// apply to the same group.
    pub fn new(providers: Vec<Box<dyn StatProvider>>) -> Result<Self, RegistryError> {
        check_collisions(providers.iter().map(AsRef::as_ref))?;

        let mut owners = HashMap::new();
        let mut matchers = HashMap::new();
        for (idx, provider) in providers.iter().enumerate() {
            for stat in provider.stats() {
                owners.insert(*stat, idx);
            }
            for (stat, matcher) in provider.matchers() {
                matchers.insert(stat, matcher);
            }
        }

        log::debug!(
            "Registered {} stat providers: {}",
            providers.len(),
            providers
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            providers,
            owners,
            matchers,
        })
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> impl DoubleEndedIterator<Item = &dyn StatProvider> {
        self.providers.iter().map(AsRef::as_ref)
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&dyn StatProvider> {
        self.providers().find(|p| p.name() == name)
    }

    /// The provider that owns `stat`.
    #[must_use]
    pub fn provider_for(&self, stat: Stat) -> Option<&dyn StatProvider> {
        self.owners
            .get(&stat)
            .and_then(|idx| self.providers.get(*idx))
            .map(AsRef::as_ref)
    }

    /// Every registered stat in registration order.
    pub fn stats(&self) -> impl Iterator<Item = Stat> + '_ {
        self.providers().flat_map(|p| p.stats().iter().copied())
    }

    /// Stats shown in the default snapshot header (hidden stats excluded).
    #[must_use]
    pub fn header_stats(&self) -> Vec<Stat> {
        self.providers()
            .flat_map(|p| {
                let hidden = p.hidden();
                p.stats().iter().copied().filter(move |s| !hidden.contains(s))
            })
            .collect()
    }

    /// Union of every provider's recommended clustering stats.
    #[must_use]
    pub fn default_group_by(&self) -> Vec<Stat> {
        self.providers()
            .flat_map(|p| p.group_by().iter().copied())
            .collect()
    }

    /// Resolve a stat by identifier or label, case-insensitively.
    #[must_use]
    pub fn lookup(&self, ident: &str) -> Option<Stat> {
        self.stats().find(|s| s.is(ident))
    }

    /// Like [`Registry::lookup`], with a spelling suggestion on failure.
    pub fn resolve(&self, ident: &str) -> Result<Stat, RegistryError> {
        self.lookup(ident).ok_or_else(|| {
            let wanted = ident.trim().to_uppercase();
            let suggestion = self
                .stats()
                .map(|s| (s.name(), strsim::jaro_winkler(&wanted, s.name())))
                .filter(|(_, score)| *score > 0.8)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(name, _)| name);
            RegistryError::UnknownStat {
                name: ident.to_string(),
                suggestion,
            }
        })
    }

    /// The matcher for `stat`; exact equality unless a provider overrides it.
    #[must_use]
    pub fn matcher(&self, stat: Stat) -> &Matcher {
        self.matchers.get(&stat).unwrap_or(&Matcher::Exact)
    }

    /// Compare two keys of `stat`.
    #[must_use]
    pub fn is_match(&self, stat: Stat, a: &HashKey, b: &HashKey) -> bool {
        self.matcher(stat).matches(a, b)
    }

    fn owner(&self, stat: Stat) -> Result<&dyn StatProvider, ProviderError> {
        self.provider_for(stat).ok_or(ProviderError::UnknownStat {
            stat,
            provider: "registry",
        })
    }

    /// Project `value` onto its clustering key.
    pub fn hash(&self, stat: Stat, value: &StatValue) -> Result<HashKey, ProviderError> {
        self.owner(stat)?.hash(stat, value)
    }

    /// Convert a value to its storage string.
    pub fn to_str(&self, stat: Stat, value: &StatValue) -> Result<String, ProviderError> {
        Ok(self.owner(stat)?.to_str(stat, value))
    }

    /// Parse a storage string.
    pub fn from_str(&self, stat: Stat, value: &str) -> Result<StatValue, ProviderError> {
        self.owner(stat)?.from_str(stat, value)
    }

    /// Convert a clustering key to its storage string.
    pub fn key_to_str(&self, stat: Stat, key: &HashKey) -> Result<String, ProviderError> {
        self.owner(stat)?.key_to_str(stat, key)
    }

    /// Parse a key storage string.
    pub fn str_to_key(&self, stat: Stat, value: &str) -> Result<HashKey, ProviderError> {
        self.owner(stat)?.str_to_key(stat, value)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "providers",
                &self.providers().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("matchers", &self.matchers)
            .finish()
    }
}

/// Check a provider set for duplicate names and colliding stat identifiers.
pub fn check_collisions<'a>(
    providers: impl IntoIterator<Item = &'a dyn StatProvider>,
) -> Result<(), RegistryError> {
    let mut names = HashSet::new();
    let mut seen: HashMap<String, &'static str> = HashMap::new();

    for provider in providers {
        if !names.insert(provider.name()) {
            return Err(RegistryError::DuplicateProvider(provider.name()));
        }
        if provider.stats().is_empty() {
            return Err(RegistryError::EmptyProvider(provider.name()));
        }
        for stat in provider.stats() {
            // A stat may use the same text for its name and label.
            let idents: HashSet<String> = [stat.name(), stat.label()]
                .iter()
                .map(|s| s.to_uppercase())
                .collect();
            for ident in &idents {
                if RESERVED.contains(&ident.as_str()) {
                    return Err(RegistryError::Reserved {
                        ident: ident.clone(),
                        provider: provider.name(),
                    });
                }
                if let Some(first) = seen.get(ident) {
                    return Err(RegistryError::Collision {
                        ident: ident.clone(),
                        first: *first,
                        second: provider.name(),
                    });
                }
            }
            for ident in idents {
                seen.insert(ident, provider.name());
            }
        }
    }
    Ok(())
}
