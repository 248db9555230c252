use openssl::version::{number, version};

const OPENSSL_DOC: &str = "https://github.com/kanidm/webauthn-rs/blob/master/OpenSSL.md";

fn main() {
    // CRL signature checks and ASN.1 time comparison need OpenSSL 1.1 or later.
    // LibreSSL reports as OpenSSL v2 (which was skipped).
    #[allow(clippy::unusual_byte_groupings)]
    if number() < 0x1_01_00_00_0 {
        println!(
            r#"
Your version of OpenSSL is too old to validate attestation certificate chains.

Please upgrade to OpenSSL v1.1.0 or later (v3.0.0 or later is recommended).

More info: {OPENSSL_DOC}
OpenSSL version string: {}
"#,
            version(),
        );
        panic!("The installed version of OpenSSL cannot validate attestation chains.");
    }
}
