//! Static certificates and CRLs shared by the unit tests. See `tests/data/README.md` for how
//! each of them relates to the others.

#![allow(clippy::unwrap_used)]

use crate::material::RevocationList;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509NameRef, X509};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const AAGUID_A: Uuid = uuid::uuid!("00112233-4455-6677-8899-aabbccddeeff");
pub const AAGUID_B: Uuid = uuid::uuid!("ffeeddcc-bbaa-9988-7766-554433221100");
pub const ROOT_CRL_URI: &str = "http://crl.example.test/root.crl";

pub const ROOT_PEM: &[u8] = include_bytes!("../tests/data/root.pem");
pub const OTHER_ROOT_PEM: &[u8] = include_bytes!("../tests/data/other.pem");
pub const FAKE_ROOT_PEM: &[u8] = include_bytes!("../tests/data/fakeroot.pem");
pub const INT_PEM: &[u8] = include_bytes!("../tests/data/int.pem");
pub const LEAF_A_PEM: &[u8] = include_bytes!("../tests/data/leaf.pem");
pub const LEAF_B_PEM: &[u8] = include_bytes!("../tests/data/leafb.pem");
pub const LEAF_VIA_INT_PEM: &[u8] = include_bytes!("../tests/data/leafi.pem");
pub const NOT_CA_PEM: &[u8] = include_bytes!("../tests/data/notca.pem");
pub const LEAF_VIA_NOT_CA_PEM: &[u8] = include_bytes!("../tests/data/leafn.pem");
pub const FORGED_LEAF_PEM: &[u8] = include_bytes!("../tests/data/forged.pem");
pub const SUB_CA_PEM: &[u8] = include_bytes!("../tests/data/subca.pem");
pub const LEAF_VIA_SUB_CA_PEM: &[u8] = include_bytes!("../tests/data/leafs.pem");
pub const NO_CERT_SIGN_CA_PEM: &[u8] = include_bytes!("../tests/data/nokcs.pem");
pub const LEAF_VIA_NO_CERT_SIGN_CA_PEM: &[u8] = include_bytes!("../tests/data/leafk.pem");

pub const CRL_ROOT_REVOKES_INT: &[u8] = include_bytes!("../tests/data/root-revokes-int.crl.pem");
pub const CRL_ROOT_REVOKES_LEAF: &[u8] =
    include_bytes!("../tests/data/root-revokes-leaf.crl.pem");
pub const CRL_ROOT_EMPTY: &[u8] = include_bytes!("../tests/data/root-empty.crl.pem");
pub const CRL_INT_EMPTY: &[u8] = include_bytes!("../tests/data/int-empty.crl.pem");
pub const CRL_FORGED_REVOKES_LEAF: &[u8] =
    include_bytes!("../tests/data/forged-revokes-leaf.crl.pem");

fn pem(data: &[u8]) -> X509 {
    X509::from_pem(data).unwrap()
}

pub fn root() -> X509 {
    pem(ROOT_PEM)
}

pub fn other_root() -> X509 {
    pem(OTHER_ROOT_PEM)
}

pub fn fake_root() -> X509 {
    pem(FAKE_ROOT_PEM)
}

pub fn intermediate() -> X509 {
    pem(INT_PEM)
}

pub fn leaf_a() -> X509 {
    pem(LEAF_A_PEM)
}

pub fn leaf_b() -> X509 {
    pem(LEAF_B_PEM)
}

pub fn leaf_via_int() -> X509 {
    pem(LEAF_VIA_INT_PEM)
}

pub fn not_a_ca() -> X509 {
    pem(NOT_CA_PEM)
}

pub fn leaf_via_not_ca() -> X509 {
    pem(LEAF_VIA_NOT_CA_PEM)
}

pub fn forged_leaf() -> X509 {
    pem(FORGED_LEAF_PEM)
}

pub fn sub_ca() -> X509 {
    pem(SUB_CA_PEM)
}

pub fn leaf_via_sub_ca() -> X509 {
    pem(LEAF_VIA_SUB_CA_PEM)
}

pub fn no_cert_sign_ca() -> X509 {
    pem(NO_CERT_SIGN_CA_PEM)
}

pub fn leaf_via_no_cert_sign_ca() -> X509 {
    pem(LEAF_VIA_NO_CERT_SIGN_CA_PEM)
}

pub fn name(cn: &str) -> X509Name {
    let mut builder = X509Name::builder().unwrap();
    builder.append_entry_by_text("C", "AU").unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.build()
}

fn generate_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// A certificate valid from 2020 to 2050, signed by `signer`.
fn build_cert(
    subject: &X509NameRef,
    issuer: &X509NameRef,
    key: &PKey<Private>,
    signer: &PKey<Private>,
    serial: u32,
    ca: bool,
) -> X509 {
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial)
        .and_then(|serial| serial.to_asn1_integer())
        .unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(subject).unwrap();
    builder.set_issuer_name(issuer).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(1_577_836_800).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(2_524_608_000).unwrap())
        .unwrap();
    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(KeyUsage::new().critical().key_cert_sign().build().unwrap())
            .unwrap();
    } else {
        builder
            .append_extension(BasicConstraints::new().critical().build().unwrap())
            .unwrap();
    }
    builder.set_pubkey(key).unwrap();
    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// `count` self-issued CA certificates that all carry `name`, each with its own key.
pub fn same_name_cas(name: &X509NameRef, count: u32) -> Vec<X509> {
    (0..count)
        .map(|serial| {
            let key = generate_key();
            build_cert(name, name, &key, &key, serial + 1, true)
        })
        .collect()
}

/// A leaf that names `issuer`, signed by a key nothing else holds.
pub fn leaf_naming(issuer: &X509NameRef) -> X509 {
    let key = generate_key();
    build_cert(&name("Stray Leaf"), issuer, &key, &generate_key(), 1, false)
}

pub fn crl(data: &[u8]) -> RevocationList {
    RevocationList::from_pem(data).unwrap()
}

fn unix(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// 2025-06-01, inside every fixture's validity window.
pub fn during_validity() -> SystemTime {
    unix(1_748_736_000)
}

/// 2031-01-01, after the leaves expire but before the CAs do.
pub fn after_leaf_expiry() -> SystemTime {
    unix(1_924_992_000)
}

/// 2023-06-01, before the leaves become valid.
pub fn before_leaf_validity() -> SystemTime {
    unix(1_685_577_600)
}
