//! Unit tests for the SSL configuration encoder and decoder.

use rstest::rstest;
use serde_json::{Value, json};

use super::*;

fn encoded_json(config: &SslConfiguration) -> Value {
    let bytes = encode_ssl_configuration(config).expect("encode configuration");
    serde_json::from_slice(&bytes).expect("encoder emits JSON")
}

#[test]
fn missing_values_are_written_as_null() {
    let value = encoded_json(&SslConfiguration::new().with_command_channel_ssl(true));
    assert_eq!(
        value,
        json!({
            "sslConfiguration": {
                "keystoreFile": null,
                "keystorePass": null,
                "commandChannelUsesSSL": true,
                "backingStorageUsesSSL": false,
                "disableHostnameVerification": false
            }
        })
    );
}

#[test]
fn populated_values_are_written() {
    let config = SslConfiguration::new()
        .with_keystore_file("/etc/agent/keystore.p12")
        .with_keystore_password("changeit")
        .with_backing_storage_ssl(true)
        .with_hostname_verification_disabled(true);
    let fields = &encoded_json(&config)["sslConfiguration"];

    assert_eq!(fields["keystoreFile"], "/etc/agent/keystore.p12");
    assert_eq!(fields["keystorePass"], "changeit");
    assert_eq!(fields["commandChannelUsesSSL"], false);
    assert_eq!(fields["backingStorageUsesSSL"], true);
    assert_eq!(fields["disableHostnameVerification"], true);
}

#[rstest]
#[case(SslConfiguration::new())]
#[case(SslConfiguration::new().with_keystore_file("/keys").with_command_channel_ssl(true))]
#[case(SslConfiguration::new().with_keystore_password("pw").with_hostname_verification_disabled(true))]
fn decoder_reads_what_the_encoder_writes(#[case] config: SslConfiguration) {
    let bytes = encode_ssl_configuration(&config).expect("encode");
    assert_eq!(decode_ssl_configuration(&bytes).expect("decode"), config);
}

#[test]
fn decoder_requires_every_key() {
    let incomplete = br#"{"sslConfiguration":{"keystorePass":null,"commandChannelUsesSSL":true,"backingStorageUsesSSL":false,"disableHostnameVerification":false}}"#;
    let error = decode_ssl_configuration(incomplete).expect_err("keystoreFile is required");
    assert!(matches!(error, SslConfigError::Decode(_)));
}

#[test]
fn debug_output_hides_the_password() {
    let config = SslConfiguration::new().with_keystore_password("hunter2");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("<redacted>"));
}

#[cfg(unix)]
#[test]
fn non_utf8_keystore_paths_fail_to_encode() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let config = SslConfiguration::new().with_keystore_file(OsStr::from_bytes(b"/keys/\xff"));
    let error = encode_ssl_configuration(&config).expect_err("path is not UTF-8");
    assert!(matches!(error, SslConfigError::NonUtf8KeystorePath { .. }));
}
