use crate::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A catalog phrase or URL fragment with its evidence weight
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeightedTerm {
    pub term: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl WeightedTerm {
    pub fn new(term: &str, weight: f64) -> Self {
        Self {
            term: term.to_string(),
            weight,
        }
    }
}

fn default_priority_link_terms() -> Vec<String> {
    ["affiliate", "partner", "contact"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Keyword data driving affiliate detection and link ranking
///
/// The same shape is accepted from a TOML file:
///
/// ```toml
/// url-patterns = [{ term = "/affiliate", weight = 5.0 }]
/// strong-indicators = ["affiliate dashboard"]
/// priority-link-terms = ["affiliate", "partner"]
///
/// [languages]
/// en = [{ term = "affiliate program", weight = 3.0 }]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeywordCatalog {
    /// Fragments matched against the lowercase URL path
    #[serde(default)]
    pub url_patterns: Vec<WeightedTerm>,

    /// Language code to weighted content phrases
    #[serde(default)]
    pub languages: BTreeMap<String, Vec<WeightedTerm>>,

    /// Phrases that alone qualify a page
    #[serde(default)]
    pub strong_indicators: Vec<String>,

    /// Terms that move a discovered link to the front of the queue
    #[serde(default = "default_priority_link_terms")]
    pub priority_link_terms: Vec<String>,
}

fn weighted(entries: &[(&str, f64)]) -> Vec<WeightedTerm> {
    entries
        .iter()
        .map(|(term, weight)| WeightedTerm::new(term, *weight))
        .collect()
}

impl KeywordCatalog {
    /// The built-in multilingual catalog (en, fr, es, de, pt, it)
    pub fn builtin() -> Self {
        let url_patterns = weighted(&[
            ("/affiliate", 5.0),
            ("/affiliates", 1.0),
            ("/partner", 4.0),
            ("/partners", 1.0),
            ("/partnership", 1.0),
            ("/referral", 4.0),
            ("/referrals", 1.0),
            ("/parrainage", 4.0),
            ("/referidos", 4.0),
            ("/empfehlung", 4.0),
            ("/influencer", 3.0),
            ("/ambassador", 3.0),
            ("/rewards", 2.0),
            ("/commission", 3.0),
            ("/revenue-share", 3.0),
        ]);

        let mut languages = BTreeMap::new();
        languages.insert(
            "en".to_string(),
            weighted(&[
                ("affiliate program", 3.0),
                ("partner program", 3.0),
                ("referral program", 3.0),
                ("influencer program", 2.5),
                ("ambassador program", 2.5),
                ("rewards program", 1.5),
                ("earn commission", 2.5),
                ("commission rates", 2.5),
                ("become an affiliate", 4.0),
                ("become a partner", 3.5),
                ("join our program", 2.0),
                ("affiliate partnership", 3.0),
                ("revenue share", 2.0),
                ("earn money", 1.0),
                ("promote our", 1.0),
                ("partner with us", 3.0),
                ("affiliate login", 4.0),
                ("partner portal", 4.0),
                ("refer a friend", 1.5),
            ]),
        );
        languages.insert(
            "fr".to_string(),
            weighted(&[
                ("programme d'affiliation", 3.0),
                ("programme de partenariat", 3.0),
                ("programme de parrainage", 3.0),
                ("programme d'influenceurs", 2.5),
                ("programme ambassadeur", 2.5),
                ("devenir partenaire", 3.5),
                ("commission d'affiliation", 3.0),
                ("gagner une commission", 2.5),
                ("rejoindre notre programme", 2.0),
                ("partenariat affilié", 3.0),
                ("revenus partagés", 2.0),
                ("promouvoir", 1.0),
                ("parrainer un ami", 1.5),
            ]),
        );
        languages.insert(
            "es".to_string(),
            weighted(&[
                ("programa de afiliados", 3.0),
                ("programa de socios", 3.0),
                ("programa de referidos", 3.0),
                ("programa de influencers", 2.5),
                ("programa de embajadores", 2.5),
                ("hazte afiliado", 4.0),
                ("comisiones de afiliados", 3.0),
                ("únete a nuestro programa", 2.0),
                ("gana comisiones", 2.5),
                ("recomienda y gana", 1.5),
            ]),
        );
        languages.insert(
            "de".to_string(),
            weighted(&[
                ("partnerprogramm", 3.0),
                ("affiliate programm", 3.0),
                ("empfehlungsprogramm", 3.0),
                ("partner werden", 3.5),
                ("provision verdienen", 2.5),
                ("jetzt partner werden", 4.0),
                ("als partner registrieren", 3.5),
                ("freunde werben", 1.5),
            ]),
        );
        languages.insert(
            "pt".to_string(),
            weighted(&[
                ("programa de afiliados", 3.0),
                ("programa de parceiros", 3.0),
                ("programa de referência", 3.0),
                ("indique e ganhe", 1.5),
                ("torne-se um afiliado", 4.0),
                ("ganhe comissão", 2.5),
                ("portal de parceiros", 4.0),
            ]),
        );
        languages.insert(
            "it".to_string(),
            weighted(&[
                ("programma di affiliazione", 3.0),
                ("programma partner", 3.0),
                ("diventa un affiliato", 4.0),
                ("guadagna commissioni", 2.5),
                ("portale partner", 4.0),
                ("invita un amico", 1.5),
            ]),
        );

        let strong_indicators = [
            "affiliate dashboard",
            "partner portal",
            "affiliate login",
            "partner login",
            "commission structure",
            "payout rates",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            url_patterns,
            languages,
            strong_indicators,
            priority_link_terms: default_priority_link_terms(),
        }
        .normalized()
    }

    /// Loads a catalog from a TOML file
    ///
    /// # Returns
    ///
    /// * `Ok(KeywordCatalog)` - Lowercased and validated catalog
    /// * `Err(ConfigError)` - The file could not be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let catalog: KeywordCatalog = toml::from_str(content)?;
        let catalog = catalog.normalized();
        catalog.validate()?;
        Ok(catalog)
    }

    /// Lowercases and trims every term
    fn normalized(mut self) -> Self {
        let fix = |t: &mut WeightedTerm| t.term = t.term.trim().to_lowercase();
        self.url_patterns.iter_mut().for_each(fix);
        for terms in self.languages.values_mut() {
            terms.iter_mut().for_each(fix);
        }
        for s in self
            .strong_indicators
            .iter_mut()
            .chain(self.priority_link_terms.iter_mut())
        {
            *s = s.trim().to_lowercase();
        }
        self
    }

    /// Checks that the catalog can drive detection
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url_patterns.is_empty() && self.languages.values().all(|v| v.is_empty()) {
            return Err(ConfigError::Catalog(
                "catalog needs at least one URL pattern or content phrase".to_string(),
            ));
        }

        let all_terms = self
            .url_patterns
            .iter()
            .chain(self.languages.values().flatten());
        for term in all_terms {
            if term.term.is_empty() {
                return Err(ConfigError::Catalog("empty term in catalog".to_string()));
            }
            if !term.weight.is_finite() || term.weight <= 0.0 {
                return Err(ConfigError::Catalog(format!(
                    "weight of '{}' must be a positive number, got {}",
                    term.term, term.weight
                )));
            }
        }

        if self
            .strong_indicators
            .iter()
            .chain(self.priority_link_terms.iter())
            .any(|s| s.is_empty())
        {
            return Err(ConfigError::Catalog(
                "strong indicators and priority link terms cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// All content phrases across languages, deduplicated by term
    ///
    /// A phrase listed by several languages keeps its highest weight. The
    /// result is sorted by term so matching order never depends on map order.
    pub fn content_terms(&self) -> Vec<WeightedTerm> {
        let mut merged: BTreeMap<&str, f64> = BTreeMap::new();
        for term in self.languages.values().flatten() {
            let weight = merged.entry(term.term.as_str()).or_insert(term.weight);
            if term.weight > *weight {
                *weight = term.weight;
            }
        }
        merged
            .into_iter()
            .map(|(term, weight)| WeightedTerm::new(term, weight))
            .collect()
    }
}

impl Default for KeywordCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
