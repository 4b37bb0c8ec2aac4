//! Mutual TLS material for the Kafka connection.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use sourcegate_audit::{params, Actor, AuditSink, EventKind, Status};
use sourcegate_core::error::CoreError;
use sourcegate_secrets::{SecretBroker, SecretRef};

use crate::error::EventError;

pub const SECRET_SUBSYSTEM: &str = "kafka";
pub const CERTIFICATE: &str = "CERTIFICATE";
pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
pub const CA_ROOT_CERTIFICATE: &str = "CA_ROOT_CERTIFICATE";

/// Build a client config presenting `cert_pem`/`key_pem`. Server
/// certificates are verified against the public web roots plus `ca_pem`.
pub fn client_config(
    cert_pem: &str,
    key_pem: &str,
    ca_pem: Option<&str>,
) -> Result<ClientConfig, EventError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    if let Some(ca) = ca_pem {
        for cert in parse_certs(ca, "CA bundle")? {
            roots
                .add(cert)
                .map_err(|e| EventError::Tls(format!("add CA certificate: {e}")))?;
        }
    }

    let chain = parse_certs(cert_pem, "client certificate")?;
    let key = parse_key(key_pem)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| EventError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| EventError::Tls(format!("client certificate: {e}")))
}

fn parse_certs(pem: &str, what: &str) -> Result<Vec<CertificateDer<'static>>, EventError> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EventError::Tls(format!("parse {what}: {e}")))?;
    if certs.is_empty() {
        return Err(EventError::Tls(format!("{what} contains no certificates")));
    }
    Ok(certs)
}

fn parse_key(pem: &str) -> Result<PrivateKeyDer<'static>, EventError> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| EventError::Tls(format!("parse private key: {e}")))?
        .ok_or_else(|| EventError::Tls("private key PEM contains no key".into()))
}

/// Fetch the client certificate, key and optional CA from the secret store
/// and turn them into a TLS configuration.
pub async fn load_from_broker(
    broker: &SecretBroker,
    secret: &SecretRef,
    audit: &AuditSink,
) -> Result<Arc<ClientConfig>, EventError> {
    let section = format!("sourcecontrol.vault.{SECRET_SUBSYSTEM}");
    for required in [CERTIFICATE, PRIVATE_KEY] {
        if secret.key(required).is_none() {
            return Err(CoreError::missing(&section, required).into());
        }
    }
    if secret.key(CA_ROOT_CERTIFICATE).is_none() {
        tracing::warn!("Kafka CA certificate key is not configured, using public roots only");
    }

    let values = broker
        .get_secret_keys_with_optional(secret, &[CA_ROOT_CERTIFICATE])
        .await;
    audit_step(audit, EventKind::MtlsCredsGetFromSecMan, values.as_ref().err());
    let values = values?;

    // Both keys were checked above and the broker only returns non-empty values.
    let cert = values.get(CERTIFICATE).map(String::as_str).unwrap_or_default();
    let key = values.get(PRIVATE_KEY).map(String::as_str).unwrap_or_default();
    let ca = values.get(CA_ROOT_CERTIFICATE).map(String::as_str);

    let config = client_config(cert, key, ca);
    audit_step(audit, EventKind::TlsConfigCreatingWithMtls, config.as_ref().err());
    Ok(Arc::new(config?))
}

fn audit_step(audit: &AuditSink, kind: EventKind, error: Option<&impl ToString>) {
    let mut audit_params = params([("subsystem", SECRET_SUBSYSTEM)]);
    if let Some(e) = error {
        audit_params.insert("error".into(), e.to_string());
    }
    audit.emit(kind, &Actor::anonymous(), Status::from_ok(error.is_none()), "-", audit_params);
}
