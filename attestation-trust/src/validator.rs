//! Attestation chain path building and verification.
//!
//! The validator is a pure, synchronous computation over a chain, a set of trust roots,
//! optional auxiliary material, and a notion of "now". It never performs I/O.

use crate::chain::{fingerprint, hex, name_der, CertProfile, CertificateChain};
use crate::error::TrustFailure;
use crate::material::{AuxiliaryMaterial, TrustRootSet};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::pkey::{PKey, Public};
use openssl::x509::{CrlStatus, X509Ref, X509};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The default bound on the number of certificates in a path, excluding the anchor.
pub const DEFAULT_MAX_PATH_DEPTH: usize = 8;

// Path building stops once it has this many complete candidates to verify.
const MAX_CANDIDATE_PATHS: usize = 32;

// Path building gives up after expanding this many partial paths.
const MAX_PATH_BUILDING_STEPS: usize = 1024;

// Certificates beyond these counts are not considered as issuers.
const MAX_CHAIN_CERTIFICATES: usize = 16;
const MAX_AUXILIARY_INTERMEDIATES: usize = 64;

/// How revocation lists are consulted during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationMode {
    /// Revocation lists are ignored.
    Disabled,
    /// Every applicable revocation list that is available is consulted. Certificates that
    /// no list covers are accepted.
    #[default]
    BestEffort,
    /// As `BestEffort`, but every certificate in the path (except the anchor) must be
    /// covered by a current revocation list from its issuer.
    Strict,
}

/// A trust anchor that an attestation chain was verified against.
#[derive(Clone)]
pub struct VerifiedAnchor {
    anchor: X509,
    fingerprint: Vec<u8>,
    path: Vec<X509>,
}

impl fmt::Debug for VerifiedAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedAnchor")
            .field("anchor", &self.anchor.subject_name())
            .field("fingerprint", &hex(&self.fingerprint))
            .field("path_len", &self.path.len())
            .finish()
    }
}

impl VerifiedAnchor {
    /// The trust root certificate that validated the chain.
    pub fn anchor(&self) -> &X509 {
        &self.anchor
    }

    /// The SHA-256 fingerprint of the anchor.
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    /// The verified path, leaf first, anchor last. Intermediates spliced in from auxiliary
    /// material appear here even though the presented chain omitted them.
    pub fn path(&self) -> &[X509] {
        &self.path
    }
}

/// Verifies attestation certificate chains against trust roots.
#[derive(Debug, Clone)]
pub struct ChainValidator {
    revocation: RevocationMode,
    check_constraints: bool,
    max_path_depth: usize,
}

impl Default for ChainValidator {
    fn default() -> Self {
        ChainValidator {
            revocation: RevocationMode::default(),
            check_constraints: true,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

/// A certificate that may appear in a path, with everything the checks need precomputed.
struct Node {
    cert: X509,
    kid: Vec<u8>,
    subject: Option<Vec<u8>>,
    issuer: Option<Vec<u8>>,
    profile: Option<CertProfile>,
}

impl Node {
    fn new(cert: &X509) -> Option<Self> {
        let kid = fingerprint(cert)
            .map_err(|e| {
                error!(?e, "unable to fingerprint certificate");
            })
            .ok()?;
        Some(Node {
            subject: name_der(cert.subject_name()),
            issuer: name_der(cert.issuer_name()),
            profile: CertProfile::parse(cert),
            cert: cert.clone(),
            kid,
        })
    }
}

/// Everything path building may draw on. The declared chain comes first, in order, and
/// auxiliary intermediates follow. Certificates are de-duplicated by fingerprint, and each
/// part is capped in size.
struct Pool {
    nodes: Vec<Node>,
    chain_len: usize,
    anchors: Vec<Node>,
}

impl Pool {
    fn new(
        chain: &CertificateChain,
        roots: &TrustRootSet,
        aux: Option<&AuxiliaryMaterial>,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let mut nodes = Vec::new();

        if chain.len() > MAX_CHAIN_CERTIFICATES {
            warn!(
                len = chain.len(),
                max = MAX_CHAIN_CERTIFICATES,
                "attestation chain is too long, ignoring the excess certificates"
            );
        }

        for cert in chain.iter().take(MAX_CHAIN_CERTIFICATES) {
            if let Some(node) = Node::new(cert) {
                if seen.insert(node.kid.clone()) {
                    nodes.push(node);
                }
            }
        }
        let chain_len = nodes.len();

        let mut intermediates = 0;
        for cert in aux.iter().flat_map(|aux| aux.intermediates()) {
            if intermediates >= MAX_AUXILIARY_INTERMEDIATES {
                warn!(
                    max = MAX_AUXILIARY_INTERMEDIATES,
                    "too many auxiliary intermediates, ignoring the excess certificates"
                );
                break;
            }
            if let Some(node) = Node::new(cert) {
                if seen.insert(node.kid.clone()) {
                    nodes.push(node);
                    intermediates += 1;
                }
            }
        }

        let anchors = roots.iter().filter_map(Node::new).collect();

        Pool {
            nodes,
            chain_len,
            anchors,
        }
    }

    fn anchor_with_kid(&self, kid: &[u8]) -> Option<usize> {
        self.anchors.iter().position(|anchor| anchor.kid == kid)
    }
}

/// A path from the leaf through `nodes` (indexes into the pool, leaf first) to an anchor.
#[derive(Debug)]
struct Candidate {
    nodes: Vec<usize>,
    anchor: usize,
}

/// The state of one path search over a [Pool].
#[derive(Default)]
struct PathSearch {
    candidates: Vec<Candidate>,
    steps: usize,
    /// For each node, the largest remaining depth from which it is known to reach no anchor.
    dead_ends: BTreeMap<usize, usize>,
    /// Whether `(subject, issuer)` carries a signature made by the issuer's key.
    signatures: BTreeMap<(usize, usize), bool>,
}

impl PathSearch {
    fn is_exhausted(&self) -> bool {
        self.candidates.len() >= MAX_CANDIDATE_PATHS || self.steps >= MAX_PATH_BUILDING_STEPS
    }

    fn is_dead_end(&self, node: usize, remaining: usize) -> bool {
        self.dead_ends
            .get(&node)
            .map_or(false, |known| *known >= remaining)
    }

    fn mark_dead_end(&mut self, node: usize, remaining: usize) {
        let known = self.dead_ends.entry(node).or_insert(remaining);
        *known = (*known).max(remaining);
    }

    fn signed_by(&mut self, pool: &Pool, subject: usize, issuer: usize) -> bool {
        *self.signatures.entry((subject, issuer)).or_insert_with(|| {
            pool.nodes[issuer]
                .cert
                .public_key()
                .map(|key| verify_signature(&pool.nodes[subject].cert, &key))
                .unwrap_or(false)
        })
    }
}

impl ChainValidator {
    /// A validator with best-effort revocation checking and constraint checks enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how revocation lists are consulted.
    pub fn with_revocation(mut self, revocation: RevocationMode) -> Self {
        self.revocation = revocation;
        self
    }

    /// Enable or disable basic constraints, key usage and path length checks.
    pub fn with_constraint_checks(mut self, check_constraints: bool) -> Self {
        self.check_constraints = check_constraints;
        self
    }

    /// Bound the number of certificates in a path, excluding the anchor.
    pub fn with_max_path_depth(mut self, max_path_depth: usize) -> Self {
        self.max_path_depth = max_path_depth.max(1);
        self
    }

    /// Validate `chain` against `roots` at time `now`.
    ///
    /// Returns the anchor of the first candidate path that fully verifies. If none do, the
    /// most specific failure across every candidate path is returned.
    pub fn validate(
        &self,
        chain: &CertificateChain,
        roots: &TrustRootSet,
        aux: Option<&AuxiliaryMaterial>,
        now: SystemTime,
    ) -> Result<VerifiedAnchor, TrustFailure> {
        debug!(?chain, ?roots, "validating attestation chain");

        if roots.is_empty() {
            debug!("no trust roots to validate against");
            return Err(TrustFailure::Untrusted);
        }

        if chain.is_empty() {
            debug!("empty attestation chain");
            return Err(TrustFailure::Untrusted);
        }

        let Some(now) = asn1_time(now) else {
            error!(?now, "validation time is not representable as a certificate time");
            return Err(TrustFailure::Untrusted);
        };

        let pool = Pool::new(chain, roots, aux);
        if pool.nodes.is_empty() {
            return Err(TrustFailure::PathUnresolvable);
        }

        let candidates = self.build_paths(&pool);
        if candidates.is_empty() {
            debug!("no path from leaf to any trust root");
            return Err(TrustFailure::PathUnresolvable);
        }

        let mut worst = TrustFailure::PathUnresolvable;
        for candidate in candidates.iter() {
            match self.verify_path(&pool, candidate, aux, &now) {
                Ok(()) => {
                    let anchor = &pool.anchors[candidate.anchor];
                    debug!(anchor = ?anchor.cert.subject_name(), "attestation chain verified");
                    let path = candidate
                        .nodes
                        .iter()
                        .map(|idx| pool.nodes[*idx].cert.clone())
                        .chain(std::iter::once(anchor.cert.clone()))
                        .collect();
                    return Ok(VerifiedAnchor {
                        anchor: anchor.cert.clone(),
                        fingerprint: anchor.kid.clone(),
                        path,
                    });
                }
                Err(failure) => {
                    debug!(?candidate, ?failure, "candidate path rejected");
                    worst = worst.max(failure);
                }
            }
        }

        Err(worst)
    }

    fn build_paths(&self, pool: &Pool) -> Vec<Candidate> {
        let mut search = PathSearch::default();
        let mut path = vec![0];
        self.extend_path(pool, &mut path, &mut search);
        if search.steps >= MAX_PATH_BUILDING_STEPS {
            warn!(
                steps = search.steps,
                candidates = search.candidates.len(),
                "path building stopped early"
            );
        }
        search.candidates
    }

    /// Extend `path` towards every anchor reachable from its last certificate. Returns true
    /// if at least one candidate was found below it.
    fn extend_path(&self, pool: &Pool, path: &mut Vec<usize>, search: &mut PathSearch) -> bool {
        let Some(&current_idx) = path.last() else {
            return false;
        };
        let remaining = self.max_path_depth.saturating_sub(path.len());

        if search.is_exhausted() || search.is_dead_end(current_idx, remaining) {
            return false;
        }
        search.steps += 1;

        let current = &pool.nodes[current_idx];

        // The presented chain included a trust root. The path ends there.
        if let Some(anchor) = pool.anchor_with_kid(&current.kid) {
            search.candidates.push(Candidate {
                nodes: path[..path.len() - 1].to_vec(),
                anchor,
            });
            return true;
        }

        let Some(issuer) = current.issuer.as_ref() else {
            search.mark_dead_end(current_idx, remaining);
            return false;
        };

        let mut found = false;
        for (anchor, root) in pool.anchors.iter().enumerate() {
            if root.subject.as_ref() == Some(issuer) && !search.is_exhausted() {
                search.candidates.push(Candidate {
                    nodes: path.clone(),
                    anchor,
                });
                found = true;
            }
        }

        if remaining > 0 {
            // Prefer issuers whose key verifies this certificate, then the declared next
            // certificate, then the rest in pool order.
            let declared_next = Some(current_idx + 1).filter(|next| *next < pool.chain_len);
            let mut issuers: Vec<(bool, bool, usize)> = (0..pool.nodes.len())
                .filter(|idx| pool.nodes[*idx].subject.as_ref() == Some(issuer))
                .filter(|idx| !path.contains(idx))
                .map(|idx| {
                    (
                        !search.signed_by(pool, current_idx, idx),
                        Some(idx) != declared_next,
                        idx,
                    )
                })
                .collect();
            issuers.sort();

            for (_, _, next) in issuers {
                path.push(next);
                found |= self.extend_path(pool, path, search);
                path.pop();
            }
        }

        if !found && !search.is_exhausted() {
            search.mark_dead_end(current_idx, remaining);
        }
        found
    }

    fn verify_path(
        &self,
        pool: &Pool,
        candidate: &Candidate,
        aux: Option<&AuxiliaryMaterial>,
        now: &Asn1TimeRef,
    ) -> Result<(), TrustFailure> {
        let mut worst: Option<TrustFailure> = None;
        let anchor = &pool.anchors[candidate.anchor];

        for (depth, idx) in candidate.nodes.iter().enumerate() {
            let node = &pool.nodes[*idx];
            let issuer = candidate
                .nodes
                .get(depth + 1)
                .map(|next| &pool.nodes[*next])
                .unwrap_or(anchor);
            let issuer_is_anchor = depth + 1 == candidate.nodes.len();

            let mut fail = |failure: TrustFailure| {
                debug!(subject = ?node.cert.subject_name(), ?failure, "certificate check failed");
                worst = worst.max(Some(failure));
            };

            let issuer_key = match issuer.cert.public_key() {
                Ok(key) => Some(key),
                Err(e) => {
                    error!(?e, "unable to read issuer public key");
                    fail(TrustFailure::SignatureMismatch);
                    None
                }
            };

            if let Some(key) = issuer_key.as_ref() {
                if !verify_signature(&node.cert, key) {
                    fail(TrustFailure::SignatureMismatch);
                }
            }

            if !within_validity(&node.cert, now) {
                fail(TrustFailure::Expired);
            }

            if self.revocation != RevocationMode::Disabled {
                if let Some(failure) = self.check_revocation(node, issuer_key.as_ref(), aux, now)
                {
                    fail(failure);
                }
            }

            if self.check_constraints && !issuer_is_anchor && !may_issue(issuer, depth) {
                fail(TrustFailure::ConstraintViolation);
            }
        }

        worst.map_or(Ok(()), Err)
    }

    /// Consult every applicable revocation list for `node`. A list applies if it names the
    /// node's issuer, is signed by the issuer's key, and has already been issued.
    fn check_revocation(
        &self,
        node: &Node,
        issuer_key: Option<&PKey<Public>>,
        aux: Option<&AuxiliaryMaterial>,
        now: &Asn1TimeRef,
    ) -> Option<TrustFailure> {
        let unknown = match self.revocation {
            RevocationMode::Strict => Some(TrustFailure::RevocationUnknown),
            _ => None,
        };

        let (Some(aux), Some(issuer_key)) = (aux, issuer_key) else {
            return unknown;
        };

        let distribution_points = node
            .profile
            .iter()
            .flat_map(|profile| profile.crl_uris.iter())
            .flat_map(|uri| aux.crls_at(uri));

        let mut covered = false;

        for list in aux.crls().iter().chain(distribution_points) {
            if name_der(list.issuer_name()) != node.issuer {
                continue;
            }

            let crl = list.as_crl();
            match crl.verify(issuer_key) {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    warn!(issuer = ?list.issuer_name(), "ignoring revocation list not signed by its issuer");
                    continue;
                }
            }

            if !matches!(
                crl.last_update().compare(now),
                Ok(Ordering::Less | Ordering::Equal)
            ) {
                debug!(issuer = ?list.issuer_name(), "ignoring revocation list issued in the future");
                continue;
            }

            match crl.get_by_cert(&node.cert) {
                CrlStatus::Revoked(_) => {
                    debug!(subject = ?node.cert.subject_name(), "certificate is revoked");
                    return Some(TrustFailure::Revoked);
                }
                CrlStatus::NotRevoked | CrlStatus::RemoveFromCrl(_) => {}
            }

            // A stale list can still prove revocation, but not its absence.
            let current = crl
                .next_update()
                .map(|next| matches!(next.compare(now), Ok(Ordering::Greater)))
                .unwrap_or(true);
            covered |= current;
        }

        if covered {
            None
        } else {
            unknown
        }
    }
}

fn asn1_time(now: SystemTime) -> Option<Asn1Time> {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|since| i64::try_from(since.as_secs()).ok())?;
    Asn1Time::from_unix(secs.try_into().ok()?)
        .map_err(|e| {
            debug!(?e, "unable to represent validation time");
        })
        .ok()
}

fn verify_signature(cert: &X509Ref, key: &PKey<Public>) -> bool {
    cert.verify(key)
        .map_err(|e| {
            debug!(?e, "signature verification error");
        })
        .unwrap_or(false)
}

fn within_validity(cert: &X509Ref, now: &Asn1TimeRef) -> bool {
    let started = cert.not_before().compare(now);
    let ends = cert.not_after().compare(now);
    matches!(
        (started, ends),
        (Ok(Ordering::Less | Ordering::Equal), Ok(Ordering::Greater | Ordering::Equal))
    )
}

/// True if `issuer` may sign a certificate `depth` positions above the leaf, ie with
/// `depth` intermediates already below it.
fn may_issue(issuer: &Node, depth: usize) -> bool {
    let Some(profile) = issuer.profile.as_ref() else {
        return false;
    };

    if profile.is_ca != Some(true) {
        return false;
    }

    if profile.key_cert_sign == Some(false) {
        return false;
    }

    match profile.path_len {
        Some(path_len) => usize::try_from(path_len).map_or(true, |limit| depth <= limit),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::fixtures::*;

    fn roots(certs: Vec<X509>) -> TrustRootSet {
        TrustRootSet::new(certs).unwrap()
    }

    fn chain(certs: Vec<X509>) -> CertificateChain {
        CertificateChain::from(certs)
    }

    #[test]
    fn test_no_roots_is_untrusted() {
        let _ = tracing_subscriber::fmt::try_init();
        let validator = ChainValidator::new();
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &TrustRootSet::empty(),
            None,
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Untrusted);
    }

    #[test]
    fn test_empty_chain_is_untrusted() {
        let validator = ChainValidator::new();
        let res = validator.validate(
            &CertificateChain::empty(),
            &roots(vec![root()]),
            None,
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Untrusted);
    }

    #[test]
    fn test_leaf_signed_by_root() {
        let validator = ChainValidator::new();
        let verified = validator
            .validate(
                &chain(vec![leaf_a()]),
                &roots(vec![other_root(), root()]),
                None,
                during_validity(),
            )
            .unwrap();
        assert_eq!(verified.fingerprint(), fingerprint(&root()).unwrap());
        assert_eq!(verified.path().len(), 2);
    }

    #[test]
    fn test_chain_through_intermediate() {
        let validator = ChainValidator::new();
        let verified = validator
            .validate(
                &chain(vec![leaf_via_int(), intermediate()]),
                &roots(vec![root()]),
                None,
                during_validity(),
            )
            .unwrap();
        assert_eq!(verified.fingerprint(), fingerprint(&root()).unwrap());
        assert_eq!(verified.path().len(), 3);
    }

    #[test]
    fn test_chain_including_anchor() {
        let validator = ChainValidator::new();
        let verified = validator
            .validate(
                &chain(vec![leaf_a(), root()]),
                &roots(vec![root()]),
                None,
                during_validity(),
            )
            .unwrap();
        assert_eq!(verified.path().len(), 2);
    }

    #[test]
    fn test_out_of_order_chain() {
        let validator = ChainValidator::new();
        let verified = validator.validate(
            &chain(vec![leaf_via_int(), other_root(), intermediate()]),
            &roots(vec![root()]),
            None,
            during_validity(),
        );
        assert!(verified.is_ok());
    }

    #[test]
    fn test_gap_filled_by_auxiliary_intermediate() {
        let validator = ChainValidator::new();
        let short = chain(vec![leaf_via_int()]);

        let res = validator.validate(&short, &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);

        let aux = AuxiliaryMaterial::new().with_intermediate(intermediate());
        let verified = validator
            .validate(&short, &roots(vec![root()]), Some(&aux), during_validity())
            .unwrap();
        assert_eq!(verified.path().len(), 3);
    }

    #[test]
    fn test_unrelated_root_is_unresolvable() {
        let validator = ChainValidator::new();
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![other_root()]),
            None,
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);
    }

    #[test]
    fn test_auxiliary_material_never_grants_trust() {
        // However complete the material, with no matching root nothing is trusted.
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new()
            .with_intermediate(intermediate())
            .with_intermediate(root())
            .with_crl(crl(CRL_ROOT_EMPTY))
            .with_crl(crl(CRL_INT_EMPTY));

        let res = validator.validate(
            &chain(vec![leaf_via_int(), intermediate()]),
            &TrustRootSet::empty(),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Untrusted);

        let res = validator.validate(
            &chain(vec![leaf_via_int(), intermediate()]),
            &roots(vec![other_root()]),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);
    }

    #[test]
    fn test_forged_signature() {
        let validator = ChainValidator::new();
        let res = validator.validate(
            &chain(vec![forged_leaf()]),
            &roots(vec![root()]),
            None,
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::SignatureMismatch);

        // The forger's own root verifies it, which is why the root set must be right.
        assert!(validator
            .validate(
                &chain(vec![forged_leaf()]),
                &roots(vec![fake_root()]),
                None,
                during_validity(),
            )
            .is_ok());
    }

    #[test]
    fn test_same_name_roots_pick_the_right_one() {
        // Both roots share a subject. Only one of them signed the leaf.
        let validator = ChainValidator::new();
        let verified = validator
            .validate(
                &chain(vec![leaf_a()]),
                &roots(vec![fake_root(), root()]),
                None,
                during_validity(),
            )
            .unwrap();
        assert_eq!(verified.fingerprint(), fingerprint(&root()).unwrap());
    }

    #[test]
    fn test_expired_and_not_yet_valid() {
        let validator = ChainValidator::new();
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            None,
            after_leaf_expiry(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Expired);

        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            None,
            before_leaf_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Expired);
    }

    #[test]
    fn test_revoked_leaf() {
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_LEAF));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Revoked);

        // Model B's leaf has a different serial.
        let res = validator.validate(
            &chain(vec![leaf_b()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_revoked_intermediate() {
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_INT));
        let res = validator.validate(
            &chain(vec![leaf_via_int(), intermediate()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Revoked);
    }

    #[test]
    fn test_revocation_beats_expiry() {
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_INT));
        let res = validator.validate(
            &chain(vec![leaf_via_int(), intermediate()]),
            &roots(vec![root()]),
            Some(&aux),
            after_leaf_expiry(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Revoked);

        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_LEAF));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            after_leaf_expiry(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Revoked);
    }

    #[test]
    fn test_revocation_disabled() {
        let validator = ChainValidator::new().with_revocation(RevocationMode::Disabled);
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_LEAF));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_forged_crl_is_ignored() {
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_FORGED_REVOKES_LEAF));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_strict_revocation_direct_leaf() {
        let validator = ChainValidator::new().with_revocation(RevocationMode::Strict);
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_EMPTY));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert!(res.is_ok());

        // A list signed by someone else covers nothing.
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_FORGED_REVOKES_LEAF));
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::RevocationUnknown);
    }

    #[test]
    fn test_distribution_point_crl() {
        let validator = ChainValidator::new();
        let chain = chain(vec![leaf_via_int(), intermediate()]);

        // The intermediate names this URI, so the list is consulted for it.
        let aux = AuxiliaryMaterial::new()
            .with_distribution_point(ROOT_CRL_URI, crl(CRL_ROOT_REVOKES_INT));
        let res = validator.validate(&chain, &roots(vec![root()]), Some(&aux), during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::Revoked);

        // A list published somewhere the intermediate doesn't name is not.
        let aux = AuxiliaryMaterial::new().with_distribution_point(
            "http://crl.example.test/other.crl",
            crl(CRL_ROOT_REVOKES_INT),
        );
        let res = validator.validate(&chain, &roots(vec![root()]), Some(&aux), during_validity());
        assert!(res.is_ok());
    }

    #[test]
    fn test_strict_revocation() {
        let validator = ChainValidator::new().with_revocation(RevocationMode::Strict);
        let chain = chain(vec![leaf_via_int(), intermediate()]);

        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::RevocationUnknown);

        // Only the intermediate is covered.
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_EMPTY));
        let res = validator.validate(&chain, &roots(vec![root()]), Some(&aux), during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::RevocationUnknown);

        let aux = aux.with_crl(crl(CRL_INT_EMPTY));
        let res = validator.validate(&chain, &roots(vec![root()]), Some(&aux), during_validity());
        assert!(res.is_ok());
    }

    #[test]
    fn test_non_ca_issuer() {
        let validator = ChainValidator::new();
        let chain = chain(vec![leaf_via_not_ca(), not_a_ca()]);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::ConstraintViolation);

        let validator = ChainValidator::new().with_constraint_checks(false);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert!(res.is_ok());
    }

    #[test]
    fn test_path_length_constraint() {
        // The intermediate has pathlen 0, so it may not issue another CA.
        let validator = ChainValidator::new();
        let chain = chain(vec![leaf_via_sub_ca(), sub_ca(), intermediate()]);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::ConstraintViolation);

        let validator = ChainValidator::new().with_constraint_checks(false);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert!(res.is_ok());
    }

    #[test]
    fn test_ca_without_cert_signing() {
        let validator = ChainValidator::new();
        let chain = chain(vec![leaf_via_no_cert_sign_ca(), no_cert_sign_ca()]);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::ConstraintViolation);

        let validator = ChainValidator::new().with_constraint_checks(false);
        let res = validator.validate(&chain, &roots(vec![root()]), None, during_validity());
        assert!(res.is_ok());
    }

    #[test]
    fn test_many_same_name_issuers() {
        let _ = tracing_subscriber::fmt::try_init();
        // Each of these could have issued every other one, and none leads to a root.
        let looping = name("Looping CA");
        let validator = ChainValidator::new();

        let mut certs = vec![leaf_naming(&looping)];
        certs.extend(same_name_cas(&looping, 24));
        let res = validator.validate(&chain(certs), &roots(vec![root()]), None, during_validity());
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);

        // The same, offered as auxiliary material rather than in the chain.
        let aux = same_name_cas(&looping, 24)
            .into_iter()
            .fold(AuxiliaryMaterial::new(), |aux, cert| aux.with_intermediate(cert));
        let res = validator.validate(
            &chain(vec![leaf_naming(&looping)]),
            &roots(vec![root()]),
            Some(&aux),
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);
    }

    #[test]
    fn test_same_name_intermediates_do_not_hide_the_issuer() {
        let validator = ChainValidator::new();
        let int = intermediate();
        let aux = same_name_cas(int.subject_name(), 24)
            .into_iter()
            .fold(AuxiliaryMaterial::new(), |aux, cert| aux.with_intermediate(cert))
            .with_intermediate(int);

        let verified = validator
            .validate(
                &chain(vec![leaf_via_int()]),
                &roots(vec![root()]),
                Some(&aux),
                during_validity(),
            )
            .unwrap();
        assert_eq!(verified.path().len(), 3);
        assert_eq!(
            fingerprint(&verified.path()[1]).unwrap(),
            fingerprint(&intermediate()).unwrap()
        );
    }

    #[test]
    fn test_unrepresentable_time() {
        let validator = ChainValidator::new();
        let res = validator.validate(
            &chain(vec![leaf_a()]),
            &roots(vec![root()]),
            None,
            UNIX_EPOCH - std::time::Duration::from_secs(1),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::Untrusted);
    }

    #[test]
    fn test_max_path_depth() {
        let validator = ChainValidator::new().with_max_path_depth(1);
        let res = validator.validate(
            &chain(vec![leaf_via_int(), intermediate()]),
            &roots(vec![root()]),
            None,
            during_validity(),
        );
        assert_eq!(res.unwrap_err(), TrustFailure::PathUnresolvable);
    }

    #[test]
    fn test_deterministic() {
        let validator = ChainValidator::new();
        let aux = AuxiliaryMaterial::new().with_crl(crl(CRL_ROOT_REVOKES_INT));
        let chain = chain(vec![leaf_via_int(), intermediate()]);
        let roots = roots(vec![root()]);
        let first = validator.validate(&chain, &roots, Some(&aux), after_leaf_expiry());
        let second = validator.validate(&chain, &roots, Some(&aux), after_leaf_expiry());
        assert_eq!(first.unwrap_err(), second.unwrap_err());
    }
}
