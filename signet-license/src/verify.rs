//! The recursive license-dependency verification engine.
//!
//! Per node: authenticate the signature over the canonical encoding,
//! optionally confirm the author key against DNS, recurse into
//! dependencies (left-to-right, deterministic error order), intersect the
//! validity windows, and merge the grants.  All policy travels in
//! [`VerifyOptions`], passed by value through every recursive call; there
//! is no ambient state.  Verification never mutates the license, only
//! computes a derived view.
//!
//! Cycles are detected with an explicit digest stack before recursion can
//! unwind unboundedly.

use std::collections::BTreeMap;

use uuid::Uuid;

use signet_types::{Timespan, Timestamp};

use crate::domainkey::{confirm_author, TxtResolver};
use crate::model::{Author, Grant, License, LicenseSigned, Machine};
use crate::{LicenseError, LicenseResult};

/// Verification policy, threaded explicitly through the recursion.
#[derive(Clone, Copy)]
pub struct VerifyOptions<'a> {
    /// Confirm author keys against their DNS-published records.
    pub confirm: bool,
    /// The instant validity is judged at.
    pub now: Timestamp,
    /// The verifying host's machine UUID, when machine constraints should
    /// be enforced.
    pub machine_id: Option<Uuid>,
    /// The TXT resolver used for confirmation.
    pub resolver: Option<&'a dyn TxtResolver>,
}

impl<'a> VerifyOptions<'a> {
    /// Options judging validity at `now`, without confirmation or machine
    /// enforcement.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            confirm: false,
            now,
            machine_id: None,
            resolver: None,
        }
    }

    /// Enables DNS confirmation through `resolver`.
    #[must_use]
    pub fn with_confirm(mut self, resolver: &'a dyn TxtResolver) -> Self {
        self.confirm = true;
        self.resolver = Some(resolver);
        self
    }

    /// Enforces machine constraints against `machine_id`.
    #[must_use]
    pub fn with_machine(mut self, machine_id: Uuid) -> Self {
        self.machine_id = Some(machine_id);
        self
    }
}

/// The derived view of a fully verified license: everything needed to use
/// it, or to issue a machine-bound sub-license from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseDerived {
    /// The verified license, unchanged.
    pub signed: LicenseSigned,
    /// The effective validity window: the intersection of the license's
    /// own window, every dependency's effective window, and any caller
    /// constraints.  Never wider than any dependency's window.
    pub timespan: Timespan,
    /// The merged effective grant.  Its `timespan` carries the caller's
    /// requested window verbatim when one was given (the dependency chain,
    /// not the copy, bounds actual validity).
    pub grant: Grant,
}

/// Per-subtree accumulation during recursion.
struct NodeView {
    span: Timespan,
    machine: Option<Machine>,
    options: BTreeMap<String, serde_json::Value>,
}

/// Verifies a signed license and its whole dependency DAG.
///
/// `constraints` narrows the result further: its timespan intersects the
/// effective window, its machine binding and options merge into the
/// effective grant.
///
/// # Errors
///
/// - [`LicenseError::InvalidSignature`]: a signature in the chain does not
///   verify (fatal for that node and everything depending on it).
/// - [`LicenseError::Incompatible`]: key/client/machine mismatch or an
///   empty window intersection; the message names the conflicting
///   licenses and their windows.
/// - [`LicenseError::Circular`]: a license depends on itself.
/// - [`LicenseError::Dns`]: confirmation could not be attempted; kind
///   distinguishes "no record" from "lookup failed" for caller policy.
pub fn verify(
    signed: &LicenseSigned,
    opts: &VerifyOptions<'_>,
    constraints: Option<&Grant>,
) -> LicenseResult<LicenseDerived> {
    let mut path = Vec::new();
    let view = verify_node(signed, opts, &mut path)?;

    let mut span = view.span;
    let mut machine = view.machine;
    let mut options = view.options;
    if let Some(wanted) = constraints {
        if let Some(requested) = wanted.timespan {
            span = span.intersect(&requested).ok_or_else(|| {
                LicenseError::Incompatible {
                    who: signed.license.author.describe(),
                    detail: format!(
                        "requested window {} does not overlap the effective window {}",
                        requested.describe(),
                        view.span.describe()
                    ),
                }
            })?;
        }
        machine = merge_machine(&signed.license.author, machine, wanted.machine)?;
        for (key, value) in &wanted.option {
            options.insert(key.clone(), value.clone());
        }
    }

    if let (Some(Machine::Id(required)), Some(host)) = (machine, opts.machine_id) {
        if required != host {
            return Err(LicenseError::Incompatible {
                who: signed.license.author.describe(),
                detail: format!("licensed machine {required} does not match this machine {host}"),
            });
        }
    }

    let grant_timespan = constraints
        .and_then(|wanted| wanted.timespan)
        .or(signed.license.grant.timespan);
    Ok(LicenseDerived {
        signed: signed.clone(),
        timespan: span,
        grant: Grant {
            machine,
            option: options,
            timespan: grant_timespan,
        },
    })
}

/// Authenticate, confirm, recurse, intersect, merge — for one node.
fn verify_node(
    signed: &LicenseSigned,
    opts: &VerifyOptions<'_>,
    path: &mut Vec<[u8; 32]>,
) -> LicenseResult<NodeView> {
    let license = &signed.license;
    let digest = license.digest()?;
    if path.contains(&digest) {
        return Err(LicenseError::Circular {
            who: license.author.describe(),
        });
    }

    signed.authenticate()?;

    if opts.confirm && license.author.domain.is_some() && license.author.product.is_some() {
        let resolver = opts.resolver.ok_or_else(|| {
            LicenseError::Dns(crate::DnsError::Lookup {
                name: license.author.domain.clone().unwrap_or_default(),
                detail: "confirmation requested but no resolver configured".to_string(),
            })
        })?;
        confirm_author(&license.author, resolver)?;
    }

    path.push(digest);
    let result = fold_dependencies(signed, opts, path);
    path.pop();
    result
}

/// Verifies each dependency in order and folds its view into this node's.
fn fold_dependencies(
    signed: &LicenseSigned,
    opts: &VerifyOptions<'_>,
    path: &mut Vec<[u8; 32]>,
) -> LicenseResult<NodeView> {
    let license = &signed.license;
    let mut span = license.timespan();
    let mut machine = license.grant.machine;
    let mut options = BTreeMap::new();
    let mut contributors = vec![license.author.describe()];

    for dependency in &license.dependencies {
        let dep_view = verify_node(dependency, opts, path)?;
        check_chain_client(license, &dependency.license)?;

        let Some(merged) = span.intersect(&dep_view.span) else {
            return Err(LicenseError::Incompatible {
                who: dependency.license.author.describe(),
                detail: format!(
                    "window {} does not overlap {} (from {})",
                    dep_view.span.describe(),
                    span.describe(),
                    contributors.join(", ")
                ),
            });
        };
        span = merged;
        contributors.push(dependency.license.author.describe());

        machine = merge_machine(&license.author, machine, dep_view.machine)?;
        for (key, value) in dep_view.options {
            options.insert(key, value);
        }
    }

    // The license's own options take precedence over inherited ones.
    for (key, value) in &license.grant.option {
        options.insert(key.clone(), value.clone());
    }

    Ok(NodeView {
        span,
        machine,
        options,
    })
}

/// A dependency constrained to a client must be vouching for this
/// license's author.
fn check_chain_client(license: &License, dependency: &License) -> LicenseResult<()> {
    let Some(client) = &dependency.client else {
        return Ok(());
    };
    let Some(client_key) = client.pubkey else {
        // Wildcard client: any author may derive from this dependency.
        return Ok(());
    };
    match license.author.pubkey {
        Some(author_key) if author_key == client_key => Ok(()),
        Some(author_key) => Err(LicenseError::Incompatible {
            who: license.author.describe(),
            detail: format!(
                "dependency {} is issued to client {client_key}, not to author key {author_key}",
                dependency.author.describe()
            ),
        }),
        None => Err(LicenseError::Incompatible {
            who: license.author.describe(),
            detail: format!(
                "dependency {} constrains its client but the author key is unknown",
                dependency.author.describe()
            ),
        }),
    }
}

/// Machine constraints only narrow: a concrete UUID at any level fixes the
/// result; two different concrete UUIDs conflict.
fn merge_machine(
    author: &Author,
    a: Option<Machine>,
    b: Option<Machine>,
) -> LicenseResult<Option<Machine>> {
    Ok(match (a, b) {
        (None, other) | (other, None) => other,
        (Some(Machine::Id(x)), Some(Machine::Id(y))) => {
            if x == y {
                Some(Machine::Id(x))
            } else {
                return Err(LicenseError::Incompatible {
                    who: author.describe(),
                    detail: format!("conflicting machine bindings {x} and {y}"),
                });
            }
        }
        (Some(Machine::Id(id)), Some(Machine::Bind(_)))
        | (Some(Machine::Bind(_)), Some(Machine::Id(id))) => Some(Machine::Id(id)),
        (Some(Machine::Bind(x)), Some(Machine::Bind(y))) => Some(Machine::Bind(x || y)),
    })
}
