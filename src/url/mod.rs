//! URL handling for Affiliate-Scout
//!
//! Target URL validation, link canonicalization, registrable-domain
//! extraction and same-site checks.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, is_same_site, registrable_domain};
pub use matcher::matches_wildcard;
pub use normalize::{canonicalize_link, normalize_target_url};
