//! Author-key confirmation against DNS-published records.
//!
//! An author's claimed signing key is checked against a DKIM-style TXT
//! record published at
//! `<service>.crypto-licensing._domainkey.<domain>.`, where `<service>` is
//! the punycode-encoded product name.  The record reads
//! `v=DKIM1; k=ed25519; p=<base64 32-byte key>`.
//!
//! Whoever controls the domain's DNS is the authority for keys under it;
//! there is no CA hierarchy.  Resolution failures are reported distinctly
//! from key mismatches so callers can decide whether "could not look up"
//! means "skip confirmation" (offline) or "fail".

use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::Resolver;

use crate::model::{Author, Pubkey};
use crate::{DnsError, LicenseError, LicenseResult};

/// The fixed service namespace below which product keys are published.
pub const DOMAINKEY_SERVICE: &str = "crypto-licensing";

/// Encodes a product name as a single DNS label: unicode-lowercased, ASCII
/// punctuation and whitespace mapped to `-`, punycoded when non-ASCII.
///
/// # Errors
///
/// Returns [`LicenseError::Punycode`] when the label cannot be encoded.
pub fn domainkey_service(product: &str) -> LicenseResult<String> {
    let sanitized: String = product
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_alphanumeric() {
                '-'
            } else {
                c
            }
        })
        .collect();
    encode_label(&sanitized)
}

/// Punycode-encodes one DNS label when it contains non-ASCII.
fn encode_label(label: &str) -> LicenseResult<String> {
    if label.is_ascii() {
        return Ok(label.to_string());
    }
    idna::punycode::encode_str(label)
        .map(|encoded| format!("xn--{encoded}"))
        .ok_or_else(|| LicenseError::Punycode(label.to_string()))
}

/// Computes the full TXT record path for `(product, domain)`, each label
/// punycode-encoded independently; ends with the root dot.
///
/// # Errors
///
/// Returns [`LicenseError::Punycode`] when a label cannot be encoded.
pub fn domainkey(product: &str, domain: &str) -> LicenseResult<String> {
    let service = domainkey_service(product)?;
    let labels = domain
        .trim_end_matches('.')
        .split('.')
        .map(|label| encode_label(&label.to_lowercase()))
        .collect::<LicenseResult<Vec<_>>>()?;
    Ok(format!(
        "{service}.{DOMAINKEY_SERVICE}._domainkey.{}.",
        labels.join(".")
    ))
}

/// Parses a published record of the form
/// `v=DKIM1; k=ed25519; p=<base64 key>`; unknown tags are ignored.
///
/// # Errors
///
/// Returns [`LicenseError::MalformedRecord`] on any grammar or key-type
/// violation.
pub fn parse_domainkey_record(record: &str) -> LicenseResult<Pubkey> {
    let malformed = |detail: &str| LicenseError::MalformedRecord {
        record: record.to_string(),
        detail: detail.to_string(),
    };

    let mut version = None;
    let mut key_type = None;
    let mut pubkey = None;
    for field in record.split(';') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let Some((tag, value)) = field.split_once('=') else {
            return Err(malformed("field without '='"));
        };
        match tag.trim() {
            "v" => version = Some(value.trim().to_string()),
            "k" => key_type = Some(value.trim().to_string()),
            "p" => pubkey = Some(value.trim().to_string()),
            _ => {}
        }
    }

    match version {
        Some(v) if v.eq_ignore_ascii_case("DKIM1") => {}
        Some(_) | None => return Err(malformed("missing or unsupported v= tag")),
    }
    match key_type {
        Some(k) if k.eq_ignore_ascii_case("ed25519") => {}
        Some(_) | None => return Err(malformed("missing or unsupported k= tag")),
    }
    let Some(encoded) = pubkey else {
        return Err(malformed("missing p= tag"));
    };
    Pubkey::from_b64(&encoded)
        .map_err(|_| malformed("p= tag is not a base64 32-byte key"))
}

/// A blocking TXT lookup capability.
///
/// Implementations must distinguish "no such record" from "lookup failed"
/// via the [`DnsError`] kind.
pub trait TxtResolver {
    /// Resolves every TXT record at `name`, chunks joined per record.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::NotFound`] for NXDOMAIN / empty answers and
    /// [`DnsError::Lookup`] for everything else.
    fn txt(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// The system resolver (hickory), configured from the host where
/// possible.
pub struct SystemResolver {
    inner: Resolver,
}

impl SystemResolver {
    /// Builds a resolver from the system configuration, falling back to
    /// public defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Lookup`] when no resolver can be constructed.
    pub fn new() -> Result<Self, DnsError> {
        if let Ok(inner) = Resolver::from_system_conf() {
            return Ok(Self { inner });
        }
        Resolver::new(Default::default(), Default::default())
            .map(|inner| Self { inner })
            .map_err(|e| DnsError::Lookup {
                name: "<resolver configuration>".to_string(),
                detail: e.to_string(),
            })
    }
}

impl TxtResolver for SystemResolver {
    fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        match self.inner.txt_lookup(name) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|record| {
                    record
                        .txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect::<String>()
                })
                .collect()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Err(DnsError::NotFound {
                    name: name.to_string(),
                }),
                _ => Err(DnsError::Lookup {
                    name: name.to_string(),
                    detail: err.to_string(),
                }),
            },
        }
    }
}

/// Fetches the published key for `(product, domain)`.
///
/// # Errors
///
/// Propagates [`DnsError`] by kind; returns
/// [`LicenseError::MalformedRecord`] when no record parses.
pub fn fetch_domainkey(
    product: &str,
    domain: &str,
    resolver: &dyn TxtResolver,
) -> LicenseResult<Pubkey> {
    let path = domainkey(product, domain)?;
    let records = resolver.txt(&path)?;
    let mut last_err = None;
    for record in &records {
        match parse_domainkey_record(record) {
            Ok(pubkey) => return Ok(pubkey),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or(LicenseError::Dns(DnsError::NotFound { name: path })))
}

/// Confirms an author's claimed key against the DNS-published one.
///
/// Authors without a domain and product publish nothing; they are skipped
/// (their trust comes from the dependency chain).
///
/// # Errors
///
/// Returns [`LicenseError::Incompatible`] naming both keys on mismatch,
/// and propagates [`DnsError`] when the lookup could not be attempted.
pub fn confirm_author(author: &Author, resolver: &dyn TxtResolver) -> LicenseResult<()> {
    let (Some(domain), Some(product)) = (&author.domain, &author.product) else {
        tracing::debug!(author = %author.describe(), "no domain/product; confirmation skipped");
        return Ok(());
    };
    let Some(claimed) = author.pubkey else {
        return Err(LicenseError::Incompatible {
            who: author.describe(),
            detail: "no author key claimed; nothing to confirm".to_string(),
        });
    };
    let published = fetch_domainkey(product, domain, resolver)?;
    if published != claimed {
        return Err(LicenseError::Incompatible {
            who: author.describe(),
            detail: format!("author key from DKIM {published} != {claimed}"),
        });
    }
    Ok(())
}

/// DNS-over-HTTPS TXT resolution via the Google/Cloudflare JSON API.
#[cfg(feature = "online")]
pub struct DohResolver {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[cfg(feature = "online")]
impl DohResolver {
    /// A resolver against `https://dns.google/resolve`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoint("https://dns.google/resolve")
    }

    /// A resolver against a custom JSON API endpoint.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(feature = "online")]
impl Default for DohResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "online")]
impl TxtResolver for DohResolver {
    fn txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        #[derive(serde::Deserialize)]
        struct Reply {
            #[serde(rename = "Status")]
            status: u32,
            #[serde(rename = "Answer", default)]
            answer: Vec<Answer>,
        }
        #[derive(serde::Deserialize)]
        struct Answer {
            #[serde(rename = "type", default)]
            rtype: u16,
            data: String,
        }

        const NXDOMAIN: u32 = 3;
        const TYPE_TXT: u16 = 16;

        let reply: Reply = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| DnsError::Lookup {
                name: name.to_string(),
                detail: e.to_string(),
            })?
            .json()
            .map_err(|e| DnsError::Lookup {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        if reply.status == NXDOMAIN {
            return Err(DnsError::NotFound {
                name: name.to_string(),
            });
        }
        if reply.status != 0 {
            return Err(DnsError::Lookup {
                name: name.to_string(),
                detail: format!("DoH status {}", reply.status),
            });
        }
        let records: Vec<String> = reply
            .answer
            .iter()
            .filter(|answer| answer.rtype == TYPE_TXT)
            .map(|answer| unquote_txt(&answer.data))
            .collect();
        if records.is_empty() {
            return Err(DnsError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(records)
    }
}

/// Strips the quoting some DoH endpoints put around TXT data, joining
/// quoted chunks (`"abc" "def"` -> `abcdef`).
#[cfg(feature = "online")]
fn unquote_txt(data: &str) -> String {
    let trimmed = data.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].split("\" \"").collect()
    } else {
        trimmed.to_string()
    }
}
