//! Email address parsing with IDNA2008 domain handling.

/// A parsed email address, shared by every checker in the pipeline.
///
/// `domain_ascii` is the lowercase Punycode form used on the wire for DNS
/// and SMTP; `domain_unicode` is the human-readable form used for display
/// and typo matching. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// The original input, trimmed of surrounding whitespace.
    pub raw: String,
    /// The part before the last `@`, preserved as written (RFC 6531 permits
    /// Unicode here).
    pub local: String,
    /// The part after the last `@`, lowercased and Punycode-encoded.
    pub domain_ascii: String,
    /// The part after the last `@`, lowercased, in Unicode display form.
    pub domain_unicode: String,
    /// False when the input cannot be split into local and domain, or the
    /// domain fails IDNA2008 conversion.
    pub valid: bool,
}

impl ParsedEmail {
    /// Parses `raw`. On failure `valid` is false but `raw` is still
    /// populated, so diagnostics can echo the input.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();

        let Some(at) = raw.rfind('@') else {
            return Self::invalid(raw);
        };
        let (local, domain) = (&raw[..at], &raw[at + 1..]);
        if local.is_empty() || domain.is_empty() {
            return Self::invalid(raw);
        }

        let domain_lower = domain.to_lowercase();
        let Some((domain_ascii, domain_unicode)) = convert_domain(&domain_lower) else {
            return Self::invalid(raw);
        };

        Self {
            raw: raw.to_string(),
            local: local.to_string(),
            domain_ascii,
            domain_unicode,
            valid: true,
        }
    }

    fn invalid(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            local: String::new(),
            domain_ascii: String::new(),
            domain_unicode: String::new(),
            valid: false,
        }
    }
}

/// Converts a lowercased domain into its (ASCII, Unicode) pair.
///
/// A non-ASCII domain goes through strict IDNA2008 lookup conversion and
/// `None` means it failed. An ASCII domain always succeeds; a permissive
/// Unicode conversion recovers the display form from existing Punycode
/// labels, falling back to the ASCII form itself.
fn convert_domain(domain: &str) -> Option<(String, String)> {
    if domain.is_ascii() {
        let (unicode, outcome) = idna::domain_to_unicode(domain);
        let unicode = if outcome.is_ok() {
            unicode
        } else {
            domain.to_string()
        };
        return Some((domain.to_string(), unicode));
    }

    let ascii = idna::domain_to_ascii_strict(domain).ok()?;
    Some((ascii, domain.to_string()))
}
