//! Known client codes, client-name aliases and sender-domain hints.

use regex::Regex;

/// Read-only client vocabulary used by the extractor.
#[derive(Debug, Clone)]
pub struct ClientVocabulary {
    codes: Vec<String>,
    /// (lowercase alias, code)
    aliases: Vec<(String, String)>,
    /// (lowercase email domain, code)
    domains: Vec<(String, String)>,
    alias_regex: Option<Regex>,
}

impl ClientVocabulary {
    /// Empty vocabulary (every code is unknown).
    pub fn empty() -> Self {
        Self {
            codes: Vec::new(),
            aliases: Vec::new(),
            domains: Vec::new(),
            alias_regex: None,
        }
    }

    /// The agency's current client list.
    pub fn agency_defaults() -> Self {
        let mut vocab = Self::empty();
        for code in [
            "ONE", "ONS", "ONB", "SKY", "TOW", "FIS", "FST", "HUN", "EON", "LAB", "WES", "WKA",
            "OTH",
        ] {
            vocab = vocab.with_code(code);
        }
        for (alias, code) in [
            ("one nz", "ONE"),
            ("one nz marketing", "ONE"),
            ("one nz - marketing", "ONE"),
            ("one nz simplification", "ONS"),
            ("one nz - simplification", "ONS"),
            ("one nz business", "ONB"),
            ("one nz - business", "ONB"),
            ("sky tv", "SKY"),
            ("tower insurance", "TOW"),
            ("fisher funds", "FIS"),
            ("firestop", "FST"),
            ("eon fibre", "EON"),
            ("whakarongorau", "WKA"),
            ("westpac", "WES"),
        ] {
            vocab = vocab.with_alias(alias, code);
        }
        for (domain, code) in [
            ("one.nz", "ONE"),
            ("sky.co.nz", "SKY"),
            ("tower.co.nz", "TOW"),
            ("fisherfunds.co.nz", "FIS"),
            ("firestop.co.nz", "FST"),
            ("whakarongorau.nz", "WKA"),
            ("labour.org.nz", "LAB"),
            ("eonfibre.co.nz", "EON"),
        ] {
            vocab = vocab.with_domain(domain, code);
        }
        vocab
    }

    pub fn with_code(mut self, code: &str) -> Self {
        let code = code.trim().to_uppercase();
        if !code.is_empty() && !self.codes.contains(&code) {
            self.codes.push(code);
        }
        self
    }

    pub fn with_alias(mut self, alias: &str, code: &str) -> Self {
        self = self.with_code(code);
        self.aliases
            .push((alias.trim().to_lowercase(), code.trim().to_uppercase()));
        self.alias_regex = build_alias_regex(&self.aliases);
        self
    }

    pub fn with_domain(mut self, domain: &str, code: &str) -> Self {
        self = self.with_code(code);
        self.domains
            .push((domain.trim().to_lowercase(), code.trim().to_uppercase()));
        self
    }

    pub fn is_known_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.eq_ignore_ascii_case(code))
    }

    /// Client codes named by alias in `text`, in order of appearance.
    pub fn codes_named_in(&self, text: &str) -> Vec<String> {
        let Some(regex) = &self.alias_regex else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        for m in regex.find_iter(text) {
            let alias = m.as_str().to_lowercase();
            if let Some((_, code)) = self.aliases.iter().find(|(a, _)| *a == alias)
                && !found.contains(code)
            {
                found.push(code.clone());
            }
        }
        found
    }

    /// Client code implied by the sender's email domain (subdomains included).
    pub fn code_for_sender(&self, email: &str) -> Option<&str> {
        let domain = email.rsplit_once('@')?.1.trim().to_lowercase();
        self.domains
            .iter()
            .find(|(d, _)| domain == *d || domain.ends_with(&format!(".{d}")))
            .map(|(_, code)| code.as_str())
    }
}

impl Default for ClientVocabulary {
    fn default() -> Self {
        Self::agency_defaults()
    }
}

/// One alternation over all aliases, longest first so "one nz business"
/// wins over "one nz".
fn build_alias_regex(aliases: &[(String, String)]) -> Option<Regex> {
    if aliases.is_empty() {
        return None;
    }
    let mut names: Vec<&str> = aliases.iter().map(|(a, _)| a.as_str()).collect();
    names.sort_by_key(|a| std::cmp::Reverse(a.len()));
    let alternation = names
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).ok()
}
