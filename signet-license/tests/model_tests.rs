mod common;

use common::{
    awesome_derived_signed, awesome_keypair, dominion_license, dominion_signed, enduser_keypair,
    span,
};
use pretty_assertions::assert_eq;
use signet_license::{issue, Author, Grant, License, LicenseSigned, Machine, Pubkey};

// ── Canonical encoding ───────────────────────────────────────────

const DOMINION_CANONICAL: &str = r#"{
    "author":{
        "domain":"dominionrnd.com",
        "name":"Dominion Research & Development Corp.",
        "product":"Cpppo Test",
        "pubkey":"qZERnjDZZTmnDNNJg90AcUJZ+LYKIWO9t0jz/AzwNsk="
    },
    "grant":{
        "timespan":{
            "length":"1y",
            "start":"2021-09-30 17:22:33 UTC"
        }
    }
}"#;

#[test]
fn license_canonical_form() {
    assert_eq!(dominion_license().to_canonical().unwrap(), DOMINION_CANONICAL);
}

#[test]
fn license_digest() {
    let license = dominion_license();
    assert_eq!(
        license.digest_b64().unwrap(),
        "L8OYHjQTj8/BWJ0PtmdIwPFNHFdiccZ2nVKngVNYqOo="
    );
    assert_eq!(
        license.digest_hex().unwrap(),
        "2fc3981e34138fcfc1589d0fb66748c0f14d1c576271c6769d52a7815358a8ea"
    );
}

#[test]
fn issuance_signature_is_deterministic() {
    let signed = dominion_signed();
    assert_eq!(
        signed.signature.to_b64(),
        "P7KDDhl7QDaV1OtFD1wxRtZ2o8nPux7gR2sGtvKjbscdYWJWhM11X3dkUZDEGi9k3zT9b4540cfqFzVz2EXFDw=="
    );
    assert_eq!(
        signed.to_canonical().unwrap(),
        format!(
            "{{\n    \"license\":{},\n    \"signature\":\"{}\"\n}}",
            DOMINION_CANONICAL.replace('\n', "\n    "),
            signed.signature.to_b64()
        )
    );
}

const DERIVED_CANONICAL: &str = r#"{
    "license":{
        "author":{
            "domain":"awesome-inc.com",
            "name":"Awesome, Inc.",
            "product":"EtherNet/IP Tool",
            "pubkey":"cyHOei+4c5X+D/niQWvDG5olR1qi4jddcPTDJv/UfrQ="
        },
        "client":{
            "name":"End User, LLC",
            "pubkey":"O2onvM62pC1io6jQKm8Nc2UyFXcd4kOmOsBIoYtZ2ik="
        },
        "dependencies":[
            {
                "license":{
                    "author":{
                        "domain":"dominionrnd.com",
                        "name":"Dominion Research & Development Corp.",
                        "product":"Cpppo Test",
                        "pubkey":"qZERnjDZZTmnDNNJg90AcUJZ+LYKIWO9t0jz/AzwNsk="
                    },
                    "client":{
                        "name":"Awesome, Inc.",
                        "pubkey":"cyHOei+4c5X+D/niQWvDG5olR1qi4jddcPTDJv/UfrQ="
                    },
                    "grant":{
                        "timespan":{
                            "length":"1y",
                            "start":"2021-09-30 17:22:33 UTC"
                        }
                    }
                },
                "signature":"G7BJOgc3BNB4stMhFOOzaykcz89KlcCFXibJo+kjhbAWCW+7bbhM937PWxD157O+5MxP59r0qNXxWJN4ujKSAQ=="
            }
        ],
        "grant":{
            "timespan":{
                "length":"1y",
                "start":"2022-09-29 17:22:33 UTC"
            }
        }
    },
    "signature":"UGKTU7zFceUI1+VewqabvV5Hfms6ynOlMp/wBEHXdA79FjpWCg35DeLfeBvg04k6k5+kwiGo2Vu+5dQb+Uv6Dg=="
}"#;

#[test]
fn derived_license_canonical_form() {
    let derived = awesome_derived_signed();
    assert_eq!(derived.to_canonical().unwrap(), DERIVED_CANONICAL);
    assert_eq!(
        derived.digest_b64().unwrap(),
        "tTCX0oxHIRn6L0D1cntR36/o6k2mda0XiJg/jDI6vwM="
    );
}

#[test]
fn serialized_form_parses_back() {
    let parsed = LicenseSigned::from_json(DERIVED_CANONICAL).unwrap();
    assert_eq!(parsed, awesome_derived_signed());
    assert_eq!(parsed.to_canonical().unwrap(), DERIVED_CANONICAL);
}

#[test]
fn unknown_fields_rejected() {
    let tweaked = DERIVED_CANONICAL.replacen("\"license\":", "\"surprise\":1,\n    \"license\":", 1);
    assert!(LicenseSigned::from_json(&tweaked).is_err());
}

// ── Authentication ───────────────────────────────────────────────

#[test]
fn authentication_accepts_untouched_license() {
    assert!(dominion_signed().authenticate().is_ok());
}

#[test]
fn any_mutation_invalidates_the_signature() {
    let mut signed = dominion_signed();
    signed.license.author.name = "Dominion Research & Development Corp".to_string();
    assert!(signed.authenticate().is_err());

    let mut signed = dominion_signed();
    signed.license.grant.timespan = Some(span("2021-09-30 11:22:33 Canada/Mountain", "2y"));
    assert!(signed.authenticate().is_err());
}

// ── Issuance ─────────────────────────────────────────────────────

#[test]
fn issue_fills_missing_author_key() {
    let license = License::new(Author::new("Keyless").with_product("thing"));
    let signed = issue(license, &enduser_keypair()).unwrap();
    assert_eq!(
        signed.license.author.pubkey,
        Some(Pubkey::from(&enduser_keypair()))
    );
    assert!(signed.authenticate().is_ok());
}

#[test]
fn issue_rejects_foreign_author_key() {
    let license = dominion_license(); // claims the Dominion key
    let err = issue(license, &awesome_keypair()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("does not match signing key"), "{message}");
    assert!(message.contains("Cpppo Test"), "{message}");
}

// ── Grant form ───────────────────────────────────────────────────

#[test]
fn grant_canonical_form() {
    let grant = Grant {
        machine: Some(Machine::Id(common::MACHINE_UUID.parse().unwrap())),
        option: [("Hz".to_string(), serde_json::json!(1000))].into(),
        timespan: Some(span("2021-01-01 00:00:00 Canada/Pacific", "1w1d1h1m1s1ms")),
    };
    assert_eq!(
        signet_types::canonical::to_canonical(&grant).unwrap(),
        r#"{
    "machine":"00010203-0405-4607-8809-0a0b0c0d0e0f",
    "option":{
        "Hz":1000
    },
    "timespan":{
        "length":"1w1d1h1m1.001s",
        "start":"2021-01-01 08:00:00 UTC"
    }
}"#
    );
}

#[test]
fn machine_binding_forms() {
    let bind: Machine = serde_json::from_str("true").unwrap();
    assert_eq!(bind, Machine::Bind(true));
    let id: Machine =
        serde_json::from_str("\"00010203-0405-4607-8809-0a0b0c0d0e0f\"").unwrap();
    assert!(matches!(id, Machine::Id(_)));
}
